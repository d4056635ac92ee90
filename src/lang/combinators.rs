//! Parser combinator engine
//!
//!     The execution engine the grammar compiler composes. A [Parser] is a
//!     cheaply clonable handle over a closed set of primitives: terminal
//!     matchers, ordered choice, sequencing with a reducer, bounded
//!     repetition, separated lists, lookahead, delimiter-wrapped
//!     structures, a left-fold precedence chain, and lazily resolved rule
//!     references.
//!
//!     Execution is purely functional over an immutable cursor into a
//!     token-tree slice: a parser either succeeds with a value and a new
//!     position or fails, and a failed alternative leaves no observable
//!     side effect. Backtracking is cursor restoration, nothing more.
//!
//!     Recursion depth is the one resource bound. An invalid grammar can
//!     tie a rule to itself with no intervening consumption; the depth cap
//!     turns what would be stack exhaustion into a reportable error, which
//!     is what lets the compiler's eager-forcing pass detect unbounded
//!     left recursion at build time.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::lang::token::{Span, Token, TokenKind, TokenTree};
use crate::lang::value::{ReducerFn, Value};

/// Recursion cap for a single parse. Deep enough for any realistic input
/// nesting, shallow enough to fail fast on non-consuming rule cycles.
pub const MAX_DEPTH: usize = 2048;

pub type TokenTestFn = Rc<dyn Fn(&Token) -> bool>;

#[derive(Clone)]
pub struct Parser {
    imp: Rc<Imp>,
}

enum Imp {
    /// Always succeeds with `Value::Nil`, consuming nothing.
    Nil,
    /// One leaf token whose value equals the literal.
    Literal(Value),
    /// One leaf token of the given kind; yields the token's value.
    TokenType(TokenKind),
    /// One leaf token satisfying a custom predicate.
    Test { name: Rc<str>, test: TokenTestFn },
    Seq { reduce: Option<ReducerFn>, items: Vec<Parser> },
    Alt(Vec<Parser>),
    Repeat { item: Parser, min: usize },
    SepBy { item: Parser, sep: Parser, min: usize },
    Not(Parser),
    Peek(Parser),
    /// One structure node with matching delimiters; `inner` must consume
    /// all of its children.
    Wrapped { start: Value, end: Value, inner: Parser },
    /// Left-associative precedence chain: base, then any number of arm
    /// matches folded onto the accumulator left to right.
    FoldLeft { base: Parser, arms: Vec<FoldArm> },
    /// A forward or self reference, resolved through its cell on first use.
    Lazy(ForwardCell),
}

/// One operator arm of a fold chain. `combine` receives the accumulator
/// followed by the arm's matched values.
#[derive(Clone)]
pub struct FoldArm {
    pub items: Vec<Parser>,
    pub combine: ReducerFn,
}

/// Indirection cell backing lazy rule references: empty until the named
/// rule is bound, then shared by every reference to it.
#[derive(Clone)]
pub struct ForwardCell {
    name: Rc<str>,
    slot: Rc<RefCell<Option<Parser>>>,
}

impl ForwardCell {
    pub fn new(name: &str) -> ForwardCell {
        ForwardCell { name: Rc::from(name), slot: Rc::new(RefCell::new(None)) }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fill(&self, parser: Parser) {
        *self.slot.borrow_mut() = Some(parser);
    }

    fn get(&self) -> Option<Parser> {
        self.slot.borrow().clone()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParseError {
    /// Backtrackable failure at a position.
    Mismatch { expected: String, at: usize, span: Option<Span> },
    /// A lazy reference whose rule was never bound. Fatal.
    UnresolvedRule { name: String },
    /// Recursion cap hit: a non-consuming rule cycle. Fatal.
    DepthExceeded,
}

impl ParseError {
    /// Fatal errors abort alternation instead of backtracking.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, ParseError::Mismatch { .. })
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::Mismatch { expected, span, .. } => {
                write!(f, "expected {}", expected)?;
                if let Some(span) = span {
                    write!(f, " at {}", span)?;
                }
                Ok(())
            }
            ParseError::UnresolvedRule { name } => write!(f, "unresolved rule: {}", name),
            ParseError::DepthExceeded => write!(f, "recursion limit exceeded"),
        }
    }
}

fn mismatch(expected: impl Into<String>, nodes: &[TokenTree], at: usize) -> ParseError {
    ParseError::Mismatch {
        expected: expected.into(),
        at,
        span: nodes.get(at).map(TokenTree::span),
    }
}

impl Parser {
    fn new(imp: Imp) -> Parser {
        Parser { imp: Rc::new(imp) }
    }

    pub fn nil() -> Parser {
        Parser::new(Imp::Nil)
    }

    pub fn literal(value: Value) -> Parser {
        Parser::new(Imp::Literal(value))
    }

    pub fn token_type(kind: TokenKind) -> Parser {
        Parser::new(Imp::TokenType(kind))
    }

    pub fn test(name: &str, test: TokenTestFn) -> Parser {
        Parser::new(Imp::Test { name: Rc::from(name), test })
    }

    pub fn seq(reduce: Option<ReducerFn>, items: Vec<Parser>) -> Parser {
        Parser::new(Imp::Seq { reduce, items })
    }

    pub fn alt(arms: Vec<Parser>) -> Parser {
        Parser::new(Imp::Alt(arms))
    }

    pub fn repeat(item: Parser, min: usize) -> Parser {
        Parser::new(Imp::Repeat { item, min })
    }

    pub fn sep_by(item: Parser, sep: Parser, min: usize) -> Parser {
        Parser::new(Imp::SepBy { item, sep, min })
    }

    pub fn maybe(item: Parser) -> Parser {
        Parser::alt(vec![item, Parser::nil()])
    }

    pub fn not(item: Parser) -> Parser {
        Parser::new(Imp::Not(item))
    }

    pub fn peek(item: Parser) -> Parser {
        Parser::new(Imp::Peek(item))
    }

    pub fn wrapped(start: Value, end: Value, inner: Parser) -> Parser {
        Parser::new(Imp::Wrapped { start, end, inner })
    }

    pub fn fold_left(base: Parser, arms: Vec<FoldArm>) -> Parser {
        Parser::new(Imp::FoldLeft { base, arms })
    }

    pub fn lazy(cell: ForwardCell) -> Parser {
        Parser::new(Imp::Lazy(cell))
    }

    /// Identity comparison; two handles are the same parser when they share
    /// one primitive node.
    pub fn same(&self, other: &Parser) -> bool {
        Rc::ptr_eq(&self.imp, &other.imp)
    }

    /// Run against a full token tree, requiring all input consumed.
    pub fn parse(&self, nodes: &[TokenTree]) -> Result<Value, ParseError> {
        let (value, at) = self.run(nodes, 0, 0)?;
        if at < nodes.len() {
            return Err(mismatch("end of input", nodes, at));
        }
        Ok(value)
    }

    fn run(
        &self,
        nodes: &[TokenTree],
        at: usize,
        depth: usize,
    ) -> Result<(Value, usize), ParseError> {
        if depth > MAX_DEPTH {
            return Err(ParseError::DepthExceeded);
        }
        let depth = depth + 1;
        match &*self.imp {
            Imp::Nil => Ok((Value::Nil, at)),
            Imp::Literal(value) => match leaf(nodes, at) {
                Some(token) if token.value == *value => Ok((token.value.clone(), at + 1)),
                _ => Err(mismatch(value.to_string(), nodes, at)),
            },
            Imp::TokenType(kind) => match leaf(nodes, at) {
                Some(token) if token.kind == *kind => Ok((token.value.clone(), at + 1)),
                _ => Err(mismatch(format!("{:?} token", kind), nodes, at)),
            },
            Imp::Test { name, test } => match leaf(nodes, at) {
                Some(token) if test(token) => Ok((token.value.clone(), at + 1)),
                _ => Err(mismatch(name.to_string(), nodes, at)),
            },
            Imp::Seq { reduce, items } => {
                let (values, next) = run_items(items, nodes, at, depth)?;
                Ok((apply_reduce(reduce, values), next))
            }
            Imp::Alt(arms) => {
                let mut best: Option<ParseError> = None;
                for arm in arms {
                    match arm.run(nodes, at, depth) {
                        Ok(result) => return Ok(result),
                        Err(err) if err.is_fatal() => return Err(err),
                        Err(err) => best = Some(further(best.take(), err)),
                    }
                }
                Err(best.unwrap_or_else(|| mismatch("one of no alternatives", nodes, at)))
            }
            Imp::Repeat { item, min } => {
                let mut values = Vec::new();
                let mut at = at;
                loop {
                    match item.run(nodes, at, depth) {
                        Ok((value, next)) => {
                            values.push(value);
                            // a non-consuming success would repeat forever
                            if next == at {
                                break;
                            }
                            at = next;
                        }
                        Err(err) if err.is_fatal() => return Err(err),
                        Err(_) => break,
                    }
                }
                if values.len() < *min {
                    return Err(mismatch("at least one repetition", nodes, at));
                }
                Ok((Value::List(values), at))
            }
            Imp::SepBy { item, sep, min } => {
                let mut values = Vec::new();
                let mut at = at;
                match item.run(nodes, at, depth) {
                    Ok((value, next)) => {
                        values.push(value);
                        at = next;
                        loop {
                            let rewind = at;
                            let sep_next = match sep.run(nodes, at, depth) {
                                Ok((_, next)) => next,
                                Err(err) if err.is_fatal() => return Err(err),
                                Err(_) => break,
                            };
                            match item.run(nodes, sep_next, depth) {
                                Ok((value, next)) => {
                                    values.push(value);
                                    if next == rewind {
                                        break;
                                    }
                                    at = next;
                                }
                                Err(err) if err.is_fatal() => return Err(err),
                                Err(_) => {
                                    at = rewind;
                                    break;
                                }
                            }
                        }
                    }
                    Err(err) if err.is_fatal() => return Err(err),
                    Err(err) => {
                        if *min > 0 {
                            return Err(err);
                        }
                    }
                }
                if values.len() < *min {
                    return Err(mismatch("at least one list item", nodes, at));
                }
                Ok((Value::List(values), at))
            }
            Imp::Not(item) => match item.run(nodes, at, depth) {
                Ok(_) => Err(mismatch("anything else", nodes, at)),
                Err(err) if err.is_fatal() => Err(err),
                Err(_) => Ok((Value::Nil, at)),
            },
            Imp::Peek(item) => {
                let (value, _) = item.run(nodes, at, depth)?;
                Ok((value, at))
            }
            Imp::Wrapped { start, end, inner } => {
                let structure = match nodes.get(at) {
                    Some(TokenTree::Structure(s)) => s,
                    _ => return Err(mismatch(format!("{} group", start), nodes, at)),
                };
                let closed = match &structure.end {
                    Some(end_token) => end_token.value == *end,
                    None => false,
                };
                if structure.start.value != *start || !closed {
                    return Err(mismatch(format!("{} {} group", start, end), nodes, at));
                }
                let (value, used) = inner.run(&structure.children, 0, depth)?;
                if used < structure.children.len() {
                    return Err(mismatch(end.to_string(), &structure.children, used));
                }
                Ok((value, at + 1))
            }
            Imp::FoldLeft { base, arms } => {
                let (mut acc, mut at) = base.run(nodes, at, depth)?;
                'fold: loop {
                    for arm in arms {
                        match run_items(&arm.items, nodes, at, depth) {
                            Ok((values, next)) => {
                                if next == at {
                                    break 'fold;
                                }
                                let mut args = Vec::with_capacity(values.len() + 1);
                                args.push(acc);
                                args.extend(values);
                                acc = (arm.combine)(args);
                                at = next;
                                continue 'fold;
                            }
                            Err(err) if err.is_fatal() => return Err(err),
                            Err(_) => {}
                        }
                    }
                    break;
                }
                Ok((acc, at))
            }
            Imp::Lazy(cell) => match cell.get() {
                Some(parser) => parser.run(nodes, at, depth),
                None => Err(ParseError::UnresolvedRule { name: cell.name().to_string() }),
            },
        }
    }
}

impl fmt::Debug for Parser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match &*self.imp {
            Imp::Nil => "nil",
            Imp::Literal(_) => "literal",
            Imp::TokenType(_) => "token",
            Imp::Test { .. } => "test",
            Imp::Seq { .. } => "seq",
            Imp::Alt(_) => "alt",
            Imp::Repeat { .. } => "repeat",
            Imp::SepBy { .. } => "sep-by",
            Imp::Not(_) => "not",
            Imp::Peek(_) => "peek",
            Imp::Wrapped { .. } => "wrapped",
            Imp::FoldLeft { .. } => "fold-left",
            Imp::Lazy(_) => "lazy",
        };
        write!(f, "Parser({})", name)
    }
}

fn leaf(nodes: &[TokenTree], at: usize) -> Option<&Token> {
    nodes.get(at).and_then(TokenTree::as_token)
}

fn run_items(
    items: &[Parser],
    nodes: &[TokenTree],
    at: usize,
    depth: usize,
) -> Result<(Vec<Value>, usize), ParseError> {
    let mut values = Vec::with_capacity(items.len());
    let mut at = at;
    for item in items {
        let (value, next) = item.run(nodes, at, depth)?;
        values.push(value);
        at = next;
    }
    Ok((values, at))
}

fn apply_reduce(reduce: &Option<ReducerFn>, values: Vec<Value>) -> Value {
    match reduce {
        Some(f) => f(values),
        // identity: a sequence without a mapping function yields its first value
        None => values.into_iter().next().unwrap_or(Value::Nil),
    }
}

/// Between two mismatches, keep the one that got further into the input.
fn further(best: Option<ParseError>, err: ParseError) -> ParseError {
    match (best, err) {
        (None, err) => err,
        (
            Some(ParseError::Mismatch { expected, at, span }),
            ParseError::Mismatch { expected: e2, at: a2, span: s2 },
        ) => {
            if a2 > at {
                ParseError::Mismatch { expected: e2, at: a2, span: s2 }
            } else {
                ParseError::Mismatch { expected, at, span }
            }
        }
        (Some(best), _) => best,
    }
}
