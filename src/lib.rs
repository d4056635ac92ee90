//! # pushdown
//!
//! A compiler for grammar definitions. A grammar arrives as text segments
//! interleaved with interpolated values (semantic-action functions, pre-built
//! sub-parsers, predicate testers), and compiles into an executable parser
//! object that consumes token trees and produces typed values.
//!
//! The pipeline runs in stages: tokenization folds raw text into a token
//! tree, the meta-grammar parser turns a grammar source into a tagged AST,
//! and the compiler turns that AST into composed parser combinators with
//! lazy rule resolution, operator-precedence construction, and terminal-role
//! checking. See the [lang] module for the stage-by-stage layout.

pub mod lang;

pub use lang::error::LangError;
pub use lang::language::{lang, lang_text, Language, Source};
pub use lang::value::Value;
