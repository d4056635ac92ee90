//! Language entry points
//!
//!     `lang` runs the whole pipeline over a grammar source — tokenize,
//!     parse the meta-grammar, compile — and hands back a [Language]: the
//!     composed parser plus its rule scope and structural terminal map.
//!     Invoking the language re-runs the lexer path on new input with that
//!     terminal map, so the structures a grammar declared are folded
//!     before its parser ever sees the tokens.
//!
//!     A [Source] collects text and interpolation slots in order, which
//!     keeps call sites readable when a grammar embeds several values.

use crate::lang::combinators::{ParseError, Parser};
use crate::lang::compiler::{self, Scope};
use crate::lang::error::LangError;
use crate::lang::lexing;
use crate::lang::meta;
use crate::lang::token::{TerminalMap, TokenTree};
use crate::lang::value::Value;

/// Compile a grammar from text segments interleaved with interpolated
/// values: one value slot sits between each pair of adjacent segments.
pub fn lang(segments: &[&str], interpolations: Vec<Value>) -> Result<Language, LangError> {
    // grammar sources are lexed flat; no structural terminals exist yet
    let nodes = lexing::tokenize(segments, interpolations, &TerminalMap::default());
    let ast = meta::parse_grammar(&nodes)?;
    let compiled = compiler::compile(&ast)?;
    Ok(Language {
        parser: compiled.parser,
        scope: compiled.scope,
        terminals: compiled.terminals,
    })
}

/// Compile a grammar with no interpolation slots.
pub fn lang_text(source: &str) -> Result<Language, LangError> {
    lang(&[source], Vec::new())
}

/// A compiled grammar: parse new input, or reach into the rule scope to
/// embed named rules in other grammars.
pub struct Language {
    parser: Parser,
    scope: Scope,
    terminals: TerminalMap,
}

impl std::fmt::Debug for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Language").finish_non_exhaustive()
    }
}

impl Language {
    /// Run the full pipeline against new input segments plus interpolated
    /// values, using this grammar's structural terminal map.
    pub fn run(&self, segments: &[&str], interpolations: Vec<Value>) -> Result<Value, LangError> {
        let nodes = lexing::tokenize(segments, interpolations, &self.terminals);
        self.parse(&nodes)
    }

    pub fn run_text(&self, source: &str) -> Result<Value, LangError> {
        self.run(&[source], Vec::new())
    }

    /// Parse a token tree directly, for callers that already hold one.
    /// All input must be consumed.
    pub fn parse(&self, nodes: &[TokenTree]) -> Result<Value, LangError> {
        self.parser.parse(nodes).map_err(from_parse_error)
    }

    /// The compiled parser bound to a rule name, for reuse in other
    /// grammars via interpolation.
    pub fn get(&self, rule: &str) -> Option<Parser> {
        self.scope.get(rule)
    }

    /// This grammar's whole parser as an interpolatable value.
    pub fn as_value(&self) -> Value {
        Value::Parser(self.parser.clone())
    }
}

fn from_parse_error(err: ParseError) -> LangError {
    match err {
        ParseError::Mismatch { expected, span, .. } => LangError::ParseFailed { expected, span },
        ParseError::UnresolvedRule { name } => LangError::UnknownRule(name),
        ParseError::DepthExceeded => LangError::ParseFailed {
            expected: "input within the recursion limit".to_string(),
            span: None,
        },
    }
}

/// Builder collecting grammar or input text with interpolation slots.
pub struct Source {
    segments: Vec<String>,
    values: Vec<Value>,
}

impl Default for Source {
    fn default() -> Source {
        Source::new()
    }
}

impl Source {
    pub fn new() -> Source {
        Source { segments: vec![String::new()], values: Vec::new() }
    }

    /// Append text to the current segment.
    pub fn text(mut self, text: &str) -> Source {
        match self.segments.last_mut() {
            Some(segment) => segment.push_str(text),
            None => self.segments.push(text.to_string()),
        }
        self
    }

    /// Append an interpolation slot.
    pub fn slot(mut self, value: Value) -> Source {
        self.values.push(value);
        self.segments.push(String::new());
        self
    }

    /// Compile the collected source as a grammar.
    pub fn compile(self) -> Result<Language, LangError> {
        let segments: Vec<&str> = self.segments.iter().map(String::as_str).collect();
        lang(&segments, self.values)
    }

    /// Run the collected source as input to a compiled grammar.
    pub fn run(self, language: &Language) -> Result<Value, LangError> {
        let segments: Vec<&str> = self.segments.iter().map(String::as_str).collect();
        language.run(&segments, self.values)
    }
}
