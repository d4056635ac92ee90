//! Errors raised while compiling or running a grammar
//!
//!     Grammar-syntax errors and runtime parse failures carry the position
//!     of the offending token when one is available. The compile-time
//!     classes (unknown rule, mixed associativity, terminal role conflict,
//!     left recursion) are fatal: an invalid grammar never produces a
//!     usable parser. Lexical and structural problems have no class of
//!     their own; an unmatched structure simply fails to be consumed and
//!     surfaces as an ordinary parse failure.

use std::fmt;

use crate::lang::token::{Span, TerminalRole};

#[derive(Debug, Clone, PartialEq)]
pub enum LangError {
    /// The grammar source does not reduce to a valid AST.
    GrammarSyntax { expected: String, span: Option<Span> },
    /// A rule name was referenced but never defined.
    UnknownRule(String),
    /// A `%name` typed terminal names no known token type.
    UnknownTokenType(String),
    /// Left- and right-associative arms mixed in one precedence group.
    MixedAssociativity,
    /// A terminal value was reused under an incompatible structural role.
    RoleConflict {
        value: String,
        requested: TerminalRole,
        existing: TerminalRole,
    },
    /// A rule recurses into itself before consuming any input.
    LeftRecursion,
    /// Ordinary backtracking exhaustion: no alternative matched the input.
    ParseFailed { expected: String, span: Option<Span> },
    /// Invariant violation inside the compiler; unreachable by construction.
    Internal(&'static str),
}

impl fmt::Display for LangError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LangError::GrammarSyntax { expected, span } => {
                write!(f, "grammar syntax error: expected {}", expected)?;
                if let Some(span) = span {
                    write!(f, " at {}", span)?;
                }
                Ok(())
            }
            LangError::UnknownRule(name) => write!(f, "unknown rule: {}", name),
            LangError::UnknownTokenType(name) => write!(f, "unknown token type: %{}", name),
            LangError::MixedAssociativity => {
                write!(f, "all arms of a precedence group must share one associativity")
            }
            LangError::RoleConflict { value, requested, existing } => write!(
                f,
                "{} cannot be used as both {} and {}",
                value, requested, existing
            ),
            LangError::LeftRecursion => {
                write!(f, "rule recurses into itself before consuming input")
            }
            LangError::ParseFailed { expected, span } => {
                write!(f, "parse failed: expected {}", expected)?;
                if let Some(span) = span {
                    write!(f, " at {}", span)?;
                }
                Ok(())
            }
            LangError::Internal(what) => write!(f, "internal invariant violated: {}", what),
        }
    }
}

impl std::error::Error for LangError {}
