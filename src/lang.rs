//! Grammar language pipeline
//!
//!     A grammar definition moves through this module in stages. Lexing
//!     turns source segments plus interpolated values into a flat token
//!     stream and folds it into a token tree on the declared structural
//!     terminals. The meta-grammar parser reads that tree and produces a
//!     tagged AST. The compiler walks the AST against a mutable rule scope
//!     and yields a composed parser, which the language module wraps into
//!     the re-runnable handle handed to callers.
//!
//!     Each stage receives the previous stage's output whole; there is no
//!     streaming. Compiling a grammar and running a parse are ordinary
//!     recursive computations with no shared state between compiles.

pub mod ast;
pub mod combinators;
pub mod compiler;
pub mod error;
pub mod language;
pub mod lexing;
pub mod meta;
pub mod quote;
pub mod token;
pub mod value;
