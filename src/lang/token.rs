//! Token types for the grammar language
//!
//!     The lexer produces a flat stream of [Token]s, which the skeleton
//!     pass folds into a [TokenTree]: a nested sequence where each node is
//!     either a leaf token or a [Structure] grouping the tokens between a
//!     declared start marker and its matching end marker.
//!
//!     Terminal roles record how a literal value is used by a compiled
//!     grammar: as ordinary matched content, or as the start/end marker of
//!     a nested structure. The role registry built during compilation
//!     doubles as the structural terminal map consulted by the skeleton
//!     pass when the compiled grammar tokenizes new input.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::lang::value::Value;

/// Lexical class of a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenKind {
    /// A run of newlines, optionally followed by indentation.
    Line,
    /// A literal (string or number) or an interpolated runtime value.
    Value,
    Identifier,
    Operator,
    Punctuation,
}

/// Source position of a token: global byte offset plus 1-based line and
/// column. Positions span segment boundaries; interpolation slots occupy
/// no offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub offset: usize,
    pub line: usize,
    pub col: usize,
}

impl Default for Span {
    fn default() -> Self {
        Span { offset: 0, line: 1, col: 1 }
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {} col {}", self.line, self.col)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub value: Value,
    pub span: Span,
}

/// One node of the skeletonized token stream.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenTree {
    Token(Token),
    Structure(Structure),
}

impl TokenTree {
    pub fn span(&self) -> Span {
        match self {
            TokenTree::Token(t) => t.span,
            TokenTree::Structure(s) => s.span,
        }
    }

    /// The leaf token at this node, if it is not a structure.
    pub fn as_token(&self) -> Option<&Token> {
        match self {
            TokenTree::Token(t) => Some(t),
            TokenTree::Structure(_) => None,
        }
    }
}

/// A nested group created by a structural start marker. `end` is `None`
/// when the input ended before the frame was closed; such a structure never
/// matches a delimited group, so the mismatch surfaces at consumption time.
#[derive(Debug, Clone, PartialEq)]
pub struct Structure {
    pub children: Vec<TokenTree>,
    pub start: Token,
    pub end: Option<Token>,
    pub span: Span,
}

/// The role a terminal value has been compiled with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TerminalRole {
    ContentToken,
    StartToken,
    EndToken,
}

impl fmt::Display for TerminalRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TerminalRole::ContentToken => "a content terminal",
            TerminalRole::StartToken => "a structure start marker",
            TerminalRole::EndToken => "a structure end marker",
        };
        write!(f, "{}", name)
    }
}

/// Hashable key for a scalar terminal value. Only scalars can take a
/// terminal role; interpolated parsers and testers are never registered.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum TerminalKey {
    Text(String),
    // f64 bit pattern; terminal equality is exact, not numeric
    Number(u64),
}

impl TerminalKey {
    fn for_value(value: &Value) -> Option<TerminalKey> {
        match value {
            Value::Str(s) => Some(TerminalKey::Text(s.to_string())),
            Value::Number(n) => Some(TerminalKey::Number(n.to_bits())),
            _ => None,
        }
    }
}

/// Terminal-value-to-role mapping. Built once per compiling pass; the
/// start/end entries drive skeletonization of the compiled grammar's input.
#[derive(Debug, Clone, Default)]
pub struct TerminalMap {
    map: HashMap<TerminalKey, TerminalRole>,
}

impl TerminalMap {
    /// The registered role of `value`, if any.
    pub fn role_of(&self, value: &Value) -> Option<TerminalRole> {
        let key = TerminalKey::for_value(value)?;
        self.map.get(&key).copied()
    }

    /// Record `value` as used with `role`. A value already registered under
    /// a different role is a conflict; the existing role is returned so the
    /// caller can report both sides. Non-scalar values are ignored.
    pub fn register(&mut self, value: &Value, role: TerminalRole) -> Result<(), TerminalRole> {
        let key = match TerminalKey::for_value(value) {
            Some(key) => key,
            None => return Ok(()),
        };
        match self.map.get(&key) {
            Some(existing) if *existing != role => Err(*existing),
            _ => {
                let _ = self.map.insert(key, role);
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_same_role_twice() {
        let mut map = TerminalMap::default();
        let paren = Value::string("(");
        assert_eq!(map.register(&paren, TerminalRole::StartToken), Ok(()));
        assert_eq!(map.register(&paren, TerminalRole::StartToken), Ok(()));
        assert_eq!(map.role_of(&paren), Some(TerminalRole::StartToken));
    }

    #[test]
    fn test_register_conflicting_role() {
        let mut map = TerminalMap::default();
        let paren = Value::string("(");
        assert_eq!(map.register(&paren, TerminalRole::ContentToken), Ok(()));
        assert_eq!(
            map.register(&paren, TerminalRole::StartToken),
            Err(TerminalRole::ContentToken)
        );
    }

    #[test]
    fn test_non_scalar_values_never_register() {
        let mut map = TerminalMap::default();
        let reducer = Value::reducer(|_| Value::Nil);
        assert_eq!(map.register(&reducer, TerminalRole::ContentToken), Ok(()));
        assert_eq!(map.role_of(&reducer), None);
    }

    #[test]
    fn test_number_terminals_keyed_by_bits() {
        let mut map = TerminalMap::default();
        assert_eq!(
            map.register(&Value::Number(2.0), TerminalRole::ContentToken),
            Ok(())
        );
        assert_eq!(map.role_of(&Value::Number(2.0)), Some(TerminalRole::ContentToken));
        assert_eq!(map.role_of(&Value::Number(3.0)), None);
    }
}
