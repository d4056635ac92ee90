//! Grammar AST
//!
//!     The tagged tree produced by the meta-grammar parser and consumed
//!     exactly once by the compiler. The tag set is closed and every
//!     consumer matches it exhaustively, so a new construct cannot fall
//!     through silently.
//!
//!     Interpolated runtime values ride the tree as [Value] payloads: a
//!     literal node may hold a scalar terminal, a pre-built parser, or a
//!     predicate tester; sequence and wrapped nodes may hold a reducer;
//!     include nodes hold the compile-time scope function.

use crate::lang::value::Value;

#[derive(Debug, Clone)]
pub enum Ast {
    /// An ordered sequence of named rules; the first is the entry point.
    Program(Vec<RuleDef>),
    /// A single anonymous expression.
    RootExpr(Box<Ast>),
    /// An empty grammar.
    Empty,
    Alt(Vec<Ast>),
    Seq { items: Vec<Ast>, reduce: Option<Value> },
    Repeat0(Box<Ast>),
    Repeat1(Box<Ast>),
    Maybe(Box<Ast>),
    /// One-or-more `item` separated by `sep`.
    SepBy { item: Box<Ast>, sep: Box<Ast> },
    /// Zero-or-more `item` separated by `sep`.
    SepByMaybe { item: Box<Ast>, sep: Box<Ast> },
    /// A precedence group: infix arms over a base expression. All arms
    /// must share one orientation; the compiler enforces it.
    AltInfix { arms: Vec<InfixArm>, base: Box<Ast> },
    /// A delimited group declaring a structural start/end terminal pair.
    Wrapped {
        start: Box<Ast>,
        item: Box<Ast>,
        end: Box<Ast>,
        reduce: Option<Value>,
    },
    /// A rule reference, resolved through the scope (lazily if needed).
    Identifier(String),
    /// A terminal: scalar literal, interpolated parser, or tester.
    Literal(Value),
    /// A `%name` typed terminal.
    TokenType(String),
    /// Compile-time parser selection through a function of the scope.
    Include(Value),
    Not(Box<Ast>),
    Peek(Box<Ast>),
    /// The `nil` keyword: the always-succeeding empty match.
    NilExpr,
}

#[derive(Debug, Clone)]
pub struct RuleDef {
    pub name: String,
    pub body: Ast,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Left,
    Right,
}

/// One arm of a precedence group: the operator-plus-operand sequence and
/// the function combining (accumulator, matched...) into a new accumulator.
#[derive(Debug, Clone)]
pub struct InfixArm {
    pub orientation: Orientation,
    pub items: Vec<Ast>,
    pub reduce: Value,
}
