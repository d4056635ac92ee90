//! Skeleton builder
//!
//!     Folds the flat token stream into a token tree. A stack of frames
//!     tracks open structures: a token whose value is registered as a
//!     start marker pushes a frame, the matching end marker pops it and
//!     attaches the completed structure to its parent. Nesting is
//!     unbounded; matching is validated by consumption, not here — an end
//!     marker with no open frame stays in the stream as an ordinary token,
//!     and a frame still open at end of input is attached without its end
//!     token. Either way the consuming parser fails on it.
//!
//!     Consecutive line tokens are consolidated into one. This is the only
//!     context-sensitive rule in the lexer; it lets grammars treat blank
//!     lines and single newlines identically without duplicating rules.
//!     Value tokens never take part in structural matching, so an
//!     interpolated value equal to a marker cannot open a structure.

use crate::lang::token::{Structure, TerminalMap, TerminalRole, Token, TokenKind, TokenTree};

/// Fold a flat token stream into a token tree on the given terminal map.
pub fn fold(tokens: Vec<Token>, terminals: &TerminalMap) -> Vec<TokenTree> {
    let mut root: Vec<TokenTree> = Vec::new();
    let mut open: Vec<(Token, Vec<TokenTree>)> = Vec::new();
    let mut last_was_line = false;

    for token in tokens {
        if token.kind == TokenKind::Line {
            if last_was_line {
                continue;
            }
            last_was_line = true;
        } else {
            last_was_line = false;
        }

        let role = if token.kind == TokenKind::Value {
            None
        } else {
            terminals.role_of(&token.value)
        };
        match role {
            Some(TerminalRole::StartToken) => open.push((token, Vec::new())),
            Some(TerminalRole::EndToken) => match open.pop() {
                Some((start, children)) => {
                    let structure = Structure {
                        span: start.span,
                        children,
                        start,
                        end: Some(token),
                    };
                    append(&mut root, &mut open, TokenTree::Structure(structure));
                }
                // no open frame: keep the marker for the parser to choke on
                None => append(&mut root, &mut open, TokenTree::Token(token)),
            },
            _ => append(&mut root, &mut open, TokenTree::Token(token)),
        }
    }

    // unclosed frames: attach without an end token, innermost first
    while let Some((start, children)) = open.pop() {
        let structure = Structure { span: start.span, children, start, end: None };
        append(&mut root, &mut open, TokenTree::Structure(structure));
    }

    root
}

fn append(root: &mut Vec<TokenTree>, open: &mut [(Token, Vec<TokenTree>)], node: TokenTree) {
    match open.last_mut() {
        Some((_, children)) => children.push(node),
        None => root.push(node),
    }
}
