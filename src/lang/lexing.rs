//! Lexer
//!
//!     Tokenization runs in two stages. Base tokenization scans each text
//!     segment with a logos lexer, weaving one interpolated value into the
//!     stream at each segment boundary and tracking comment state across
//!     boundaries (an interpolation inside a comment is dropped; comments
//!     never observe interpolations). See
//!     [base_tokenization](base_tokenization).
//!
//!     The skeleton stage folds the flat stream into a token tree using
//!     the structural terminal map declared by the consuming grammar:
//!     start markers open nested structures, end markers close them, and
//!     consecutive line tokens are consolidated into one. See
//!     [skeleton](skeleton).
//!
//!     Whitespace within a line is discarded during the base scan; a run
//!     of newlines plus indentation becomes a single line token, so
//!     grammars can treat blank lines and single newlines identically.

pub mod base_tokenization;
pub mod skeleton;

use crate::lang::token::{TerminalMap, TokenTree};
use crate::lang::value::Value;

/// Tokenize source segments plus interpolated values into a token tree.
///
/// `terminals` is the structural terminal map of the consuming grammar; an
/// empty map produces a flat tree. This is the whole lexing pipeline: every
/// entry point (grammar compilation and compiled-grammar invocation) runs
/// through here.
pub fn tokenize(
    segments: &[&str],
    interpolations: Vec<Value>,
    terminals: &TerminalMap,
) -> Vec<TokenTree> {
    let tokens = base_tokenization::scan(segments, interpolations);
    skeleton::fold(tokens, terminals)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lang::token::TokenKind;

    fn flat(source: &str) -> Vec<TokenTree> {
        tokenize(&[source], Vec::new(), &TerminalMap::default())
    }

    #[test]
    fn test_tokenize_flat_expression() {
        let nodes = flat("Expr = \"-\" Expr | value");
        let kinds: Vec<TokenKind> = nodes
            .iter()
            .map(|n| n.as_token().expect("flat stream").kind)
            .collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::Identifier,
                TokenKind::Operator,
                TokenKind::Value,
                TokenKind::Identifier,
                TokenKind::Operator,
                TokenKind::Identifier,
            ]
        );
    }

    #[test]
    fn test_blank_lines_fold_to_one_line_token() {
        let nodes = flat("1\n\n\n  2");
        let kinds: Vec<TokenKind> = nodes
            .iter()
            .map(|n| n.as_token().expect("flat stream").kind)
            .collect();
        assert_eq!(kinds, vec![TokenKind::Value, TokenKind::Line, TokenKind::Value]);
    }
}
