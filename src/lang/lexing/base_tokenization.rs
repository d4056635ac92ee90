//! Base tokenization
//!
//!     Raw tokenization of source segments using the logos lexer. This is
//!     the entry point where text becomes a token stream; the skeleton
//!     stage operates on what this produces.
//!
//!     The scanner is mode-stacked in the small: `main` mode is the logos
//!     machine; line and block comments switch the driver into plain
//!     scan-to-terminator modes. Comment state persists across segment
//!     boundaries so that an interpolation slot inside a comment is
//!     consumed but never emitted.

use logos::Logos;

use crate::lang::token::{Span, Token, TokenKind};
use crate::lang::value::Value;

/// Raw token classes recognized in `main` mode.
///
/// Comment openers are matched together with any operator characters that
/// follow them so that a run like `///` still opens a comment (the driver
/// consumes exactly the two marker characters and hands the rest to the
/// comment mode).
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r]+")]
enum RawToken {
    #[regex(r"\n[ \t\r\n]*")]
    Line,

    #[regex(r"//[!@#%^&*\-+=|/:<>.?~]*", priority = 10)]
    LineCommentStart,

    #[regex(r"/\*[!@#%^&*\-+=|/:<>.?~]*", priority = 10)]
    BlockCommentStart,

    #[regex(r#""(?:\\["\\]|[^\n"\\])*""#, unquote)]
    #[regex(r#"'(?:\\['\\]|[^\n'\\])*'"#, unquote)]
    Str(String),

    #[regex(r"0x[0-9A-Fa-f][0-9A-Fa-f_]*", |lex| parse_radix(lex.slice(), 16))]
    #[regex(r"0o[0-7][0-7_]*", |lex| parse_radix(lex.slice(), 8))]
    #[regex(r"0b[01][01_]*", |lex| parse_radix(lex.slice(), 2))]
    #[regex(r"-?[0-9][0-9_]*(?:\.[0-9_]*)?(?:[eE][+-]?[0-9][0-9_]*)?", parse_decimal)]
    Number(f64),

    #[regex(r"[A-Za-z_$][A-Za-z0-9_$]*", |lex| lex.slice().to_string())]
    Identifier(String),

    #[regex(r"[,;(){}\[\]]", |lex| lex.slice().to_string())]
    Punctuation(String),

    #[regex(r"[!@#%^&*\-+=|/:<>.?~]+", |lex| lex.slice().to_string())]
    Operator(String),
}

fn unquote(lex: &mut logos::Lexer<'_, RawToken>) -> String {
    let slice = lex.slice();
    let inner = &slice[1..slice.len() - 1];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(escaped) = chars.next() {
                out.push(escaped);
            }
        } else {
            out.push(c);
        }
    }
    out
}

fn parse_decimal(lex: &mut logos::Lexer<'_, RawToken>) -> Option<f64> {
    lex.slice().replace('_', "").parse::<f64>().ok()
}

fn parse_radix(slice: &str, radix: u32) -> Option<f64> {
    let digits = slice[2..].replace('_', "");
    u64::from_str_radix(&digits, radix).ok().map(|n| n as f64)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Main,
    LineComment,
    BlockComment,
}

struct Scanner {
    tokens: Vec<Token>,
    mode: Mode,
    pos: Span,
}

impl Scanner {
    fn new() -> Scanner {
        Scanner { tokens: Vec::new(), mode: Mode::Main, pos: Span::default() }
    }

    fn advance(&mut self, text: &str) {
        for c in text.chars() {
            if c == '\n' {
                self.pos.line += 1;
                self.pos.col = 1;
            } else {
                self.pos.col += 1;
            }
        }
        self.pos.offset += text.len();
    }

    fn emit(&mut self, kind: TokenKind, value: Value, span: Span) {
        self.tokens.push(Token { kind, value, span });
    }

    fn scan_segment(&mut self, segment: &str) {
        let mut rest = 0;
        while rest < segment.len() {
            match self.mode {
                Mode::Main => rest = self.scan_main(segment, rest),
                Mode::LineComment => rest = self.scan_line_comment(segment, rest),
                Mode::BlockComment => rest = self.scan_block_comment(segment, rest),
            }
        }
    }

    /// Run the logos machine from `rest`; returns the new offset, having
    /// switched mode if a comment opener was hit.
    fn scan_main(&mut self, segment: &str, rest: usize) -> usize {
        let slice = &segment[rest..];
        let mut lexer = RawToken::lexer(slice);
        let mut last_end = 0;
        while let Some(item) = lexer.next() {
            let span = lexer.span();
            self.advance(&slice[last_end..span.start]);
            let token_span = self.pos;
            let text = &slice[span.start..span.end];
            last_end = span.end;
            match item {
                Ok(RawToken::LineCommentStart) => {
                    self.advance(&text[..2]);
                    self.mode = Mode::LineComment;
                    return rest + span.start + 2;
                }
                Ok(RawToken::BlockCommentStart) => {
                    self.advance(&text[..2]);
                    self.mode = Mode::BlockComment;
                    return rest + span.start + 2;
                }
                Ok(raw) => {
                    self.advance(text);
                    match raw {
                        RawToken::Line => self.emit(TokenKind::Line, Value::string(text), token_span),
                        RawToken::Str(s) => {
                            self.emit(TokenKind::Value, Value::string(&s), token_span)
                        }
                        RawToken::Number(n) => {
                            self.emit(TokenKind::Value, Value::Number(n), token_span)
                        }
                        RawToken::Identifier(s) => {
                            self.emit(TokenKind::Identifier, Value::string(&s), token_span)
                        }
                        RawToken::Punctuation(s) => {
                            self.emit(TokenKind::Punctuation, Value::string(&s), token_span)
                        }
                        RawToken::Operator(s) => {
                            self.emit(TokenKind::Operator, Value::string(&s), token_span)
                        }
                        RawToken::LineCommentStart | RawToken::BlockCommentStart => {}
                    }
                }
                // unrecognized characters are skipped, not errors
                Err(()) => self.advance(text),
            }
        }
        self.advance(&slice[last_end..]);
        segment.len()
    }

    /// Scan to the end of a line comment. The terminating newline run is
    /// emitted as a line token; a comment that reaches the end of the
    /// segment continues into the next one.
    fn scan_line_comment(&mut self, segment: &str, rest: usize) -> usize {
        let slice = &segment[rest..];
        match slice.find('\n') {
            None => {
                self.advance(slice);
                segment.len()
            }
            Some(i) => {
                self.advance(&slice[..i]);
                let after = &slice[i..];
                let run: usize = after
                    .char_indices()
                    .take_while(|(_, c)| c.is_ascii_whitespace())
                    .map(|(j, c)| j + c.len_utf8())
                    .last()
                    .unwrap_or(0);
                let text = &after[..run];
                let token_span = self.pos;
                self.advance(text);
                self.emit(TokenKind::Line, Value::string(text), token_span);
                self.mode = Mode::Main;
                rest + i + run
            }
        }
    }

    fn scan_block_comment(&mut self, segment: &str, rest: usize) -> usize {
        let slice = &segment[rest..];
        match slice.find("*/") {
            None => {
                self.advance(slice);
                segment.len()
            }
            Some(i) => {
                self.advance(&slice[..i + 2]);
                self.mode = Mode::Main;
                rest + i + 2
            }
        }
    }
}

/// Scan all segments, consuming one interpolated value at each boundary.
/// An interpolation reached while the scanner is inside a comment is
/// consumed but not emitted.
pub fn scan(segments: &[&str], interpolations: Vec<Value>) -> Vec<Token> {
    let mut scanner = Scanner::new();
    let mut values = interpolations.into_iter();
    let last = segments.len().saturating_sub(1);
    for (i, segment) in segments.iter().enumerate() {
        scanner.scan_segment(segment);
        if i < last {
            if let Some(value) = values.next() {
                if scanner.mode == Mode::Main {
                    let span = scanner.pos;
                    scanner.emit(TokenKind::Value, value, span);
                }
            }
        }
    }
    scanner.tokens
}
