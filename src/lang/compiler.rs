//! Grammar compiler
//!
//!     Walks the tagged AST against a mutable rule scope and produces a
//!     composed parser per rule. Rule bodies compile in reverse
//!     declaration order, so later-declared rules are already bound when
//!     earlier ones compile; a reference to a rule not yet bound becomes a
//!     lazy forward cell, filled when the rule's own compilation lands.
//!     Forward and mutual recursion cost nothing beyond the indirection.
//!
//!     Each AST node compiles to a [Quote] — a deferred construction —
//!     and the quote resolves against the compile context (scope plus
//!     used-terminal registry) exactly once per rule. Terminal values
//!     register the role they are compiled with; reuse under a
//!     conflicting role is fatal, which is what stops `"("` from meaning
//!     both verbatim content and a structure delimiter in one grammar.
//!
//!     After the whole program compiles, the exported parser is forced
//!     once against empty input. Forcing resolves every reachable lazy
//!     reference (surfacing unknown rules immediately) and drives any
//!     non-consuming rule cycle into the engine's depth cap, turning
//!     unbounded left recursion into a build-time error.

use std::collections::HashMap;
use std::rc::Rc;

use crate::lang::ast::{Ast, InfixArm, Orientation};
use crate::lang::combinators::{FoldArm, ForwardCell, ParseError, Parser};
use crate::lang::error::LangError;
use crate::lang::quote::{Quote, QuoteArg};
use crate::lang::token::{TerminalMap, TerminalRole, TokenKind};
use crate::lang::value::{ReducerFn, Value};

/// The rule scope of one compiled grammar: rule name to compiled parser,
/// or to a forward cell for names referenced before they are bound.
#[derive(Default)]
pub struct Scope {
    map: HashMap<String, Binding>,
}

enum Binding {
    Built(Parser),
    Forward(ForwardCell),
}

impl Scope {
    /// The base scope every grammar starts from: typed terminals for the
    /// built-in token classes and the always-succeeding empty match.
    fn base() -> Scope {
        let mut scope = Scope::default();
        scope.bind("line", Parser::token_type(TokenKind::Line));
        scope.bind("value", Parser::token_type(TokenKind::Value));
        scope.bind("identifier", Parser::token_type(TokenKind::Identifier));
        scope.bind("operator", Parser::token_type(TokenKind::Operator));
        scope.bind("nil", Parser::nil());
        scope
    }

    /// The parser bound to `name`, if the scope knows the name at all. A
    /// still-unbound forward reference yields its lazy placeholder.
    pub fn get(&self, name: &str) -> Option<Parser> {
        match self.map.get(name) {
            Some(Binding::Built(parser)) => Some(parser.clone()),
            Some(Binding::Forward(cell)) => Some(Parser::lazy(cell.clone())),
            None => None,
        }
    }

    /// Look up a rule reference from inside a rule body. An unknown name
    /// opens a forward cell; if no later binding fills it, the eager
    /// forcing pass reports the unknown rule.
    pub fn lookup(&mut self, name: &str) -> Parser {
        if let Some(parser) = self.get(name) {
            return parser;
        }
        let cell = ForwardCell::new(name);
        let parser = Parser::lazy(cell.clone());
        let _ = self.map.insert(name.to_string(), Binding::Forward(cell));
        parser
    }

    fn bind(&mut self, name: &str, parser: Parser) {
        if let Some(Binding::Forward(cell)) = self.map.get(name) {
            cell.fill(parser.clone());
        }
        let _ = self.map.insert(name.to_string(), Binding::Built(parser));
    }
}

/// Mutable state of one compiling pass. Never shared across compiles.
pub struct CompileCtx {
    pub scope: Scope,
    pub used: TerminalMap,
}

impl CompileCtx {
    pub fn new() -> CompileCtx {
        CompileCtx { scope: Scope::base(), used: TerminalMap::default() }
    }

    fn register_terminal(&mut self, value: &Value, role: TerminalRole) -> Result<(), LangError> {
        self.used.register(value, role).map_err(|existing| LangError::RoleConflict {
            value: value.to_string(),
            requested: role,
            existing,
        })
    }

    /// Compile a terminal value under a role: interpolated parsers pass
    /// through, testers become custom matchers, scalars register and match
    /// by value.
    fn compile_terminal(&mut self, value: &Value, role: TerminalRole) -> Result<Parser, LangError> {
        match value {
            Value::Parser(parser) => Ok(parser.clone()),
            Value::Tester { name, test } => {
                let test = test.clone();
                Ok(Parser::test(name, Rc::new(move |token| test(&token.value))))
            }
            Value::Reducer(_) | Value::Include(_) => Err(LangError::GrammarSyntax {
                expected: "a terminal, not an interpolated function".to_string(),
                span: None,
            }),
            _ => {
                self.register_terminal(value, role)?;
                Ok(Parser::literal(value.clone()))
            }
        }
    }
}

impl Default for CompileCtx {
    fn default() -> Self {
        CompileCtx::new()
    }
}

/// The output of one compiling pass.
pub struct Compiled {
    pub parser: Parser,
    pub scope: Scope,
    pub terminals: TerminalMap,
}

impl std::fmt::Debug for Compiled {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Compiled").finish_non_exhaustive()
    }
}

/// Compile a grammar AST into an executable parser, then force it once
/// against empty input to surface unknown-rule and left-recursion errors
/// at build time rather than at first use.
pub fn compile(ast: &Ast) -> Result<Compiled, LangError> {
    let mut ctx = CompileCtx::new();
    let parser = match ast {
        Ast::Program(rules) => {
            for rule in rules.iter().rev() {
                let quote = compile_expr(&rule.body)?;
                let parser = quote.resolve(&mut ctx)?;
                ctx.scope.bind(&rule.name, parser);
            }
            let entry = match rules.first() {
                Some(rule) => ctx
                    .scope
                    .get(&rule.name)
                    .ok_or_else(|| LangError::UnknownRule(rule.name.clone()))?,
                None => Parser::nil(),
            };
            wrap_ignore_lines(entry)
        }
        Ast::RootExpr(expr) => {
            let parser = compile_expr(expr)?.resolve(&mut ctx)?;
            wrap_ignore_lines(parser)
        }
        Ast::Empty => wrap_ignore_lines(Parser::nil()),
        other => {
            let parser = compile_expr(other)?.resolve(&mut ctx)?;
            wrap_ignore_lines(parser)
        }
    };

    match parser.parse(&[]) {
        Ok(_) | Err(ParseError::Mismatch { .. }) => {}
        Err(ParseError::UnresolvedRule { name }) => return Err(LangError::UnknownRule(name)),
        Err(ParseError::DepthExceeded) => return Err(LangError::LeftRecursion),
    }

    Ok(Compiled { parser, scope: ctx.scope, terminals: ctx.used })
}

/// Compile one expression node into a deferred construction.
fn compile_expr(ast: &Ast) -> Result<Quote, LangError> {
    match ast {
        Ast::Program(_) | Ast::RootExpr(_) | Ast::Empty => {
            Err(LangError::Internal("grammar root nested inside an expression"))
        }
        Ast::Alt(arms) => {
            let args = pending(arms)?;
            Ok(Quote::new(|parsers| Ok(Parser::alt(parsers)), args))
        }
        Ast::Seq { items, reduce } => {
            let args = pending(items)?;
            let reduce = reduce.as_ref().map(to_reducer).transpose()?;
            Ok(Quote::new(
                move |parsers| Ok(Parser::seq(reduce.clone(), parsers)),
                args,
            ))
        }
        Ast::Repeat0(item) => {
            let args = vec![QuoteArg::Pending(compile_expr(item)?)];
            Ok(Quote::new(|parsers| Ok(Parser::repeat(one(parsers)?, 0)), args))
        }
        Ast::Repeat1(item) => {
            let args = vec![QuoteArg::Pending(compile_expr(item)?)];
            Ok(Quote::new(|parsers| Ok(Parser::repeat(one(parsers)?, 1)), args))
        }
        Ast::Maybe(item) => {
            let args = vec![QuoteArg::Pending(compile_expr(item)?)];
            Ok(Quote::new(|parsers| Ok(Parser::maybe(one(parsers)?)), args))
        }
        Ast::SepBy { item, sep } => {
            let args = vec![
                QuoteArg::Pending(compile_expr(item)?),
                QuoteArg::Pending(compile_expr(sep)?),
            ];
            Ok(Quote::new(|parsers| build_sep_by(parsers, 1), args))
        }
        Ast::SepByMaybe { item, sep } => {
            let args = vec![
                QuoteArg::Pending(compile_expr(item)?),
                QuoteArg::Pending(compile_expr(sep)?),
            ];
            Ok(Quote::new(
                |parsers| {
                    let non_empty = build_sep_by(parsers, 1)?;
                    let empty = Parser::seq(
                        Some(Rc::new(|_: Vec<Value>| Value::List(Vec::new())) as ReducerFn),
                        vec![Parser::nil()],
                    );
                    Ok(Parser::alt(vec![non_empty, empty]))
                },
                args,
            ))
        }
        Ast::AltInfix { arms, base } => compile_alt_infix(arms, base),
        Ast::Wrapped { start, item, end, reduce } => {
            let start = delimiter(start)?;
            let end = delimiter(end)?;
            let reduce = reduce.as_ref().map(to_reducer).transpose()?;
            let args = vec![QuoteArg::Pending(compile_expr(item)?)];
            Ok(Quote::with_context(
                move |ctx, parsers| {
                    ctx.register_terminal(&start, TerminalRole::StartToken)?;
                    ctx.register_terminal(&end, TerminalRole::EndToken)?;
                    let mut inner = wrap_ignore_lines(one(parsers)?);
                    if let Some(reduce) = &reduce {
                        inner = Parser::seq(Some(reduce.clone()), vec![inner]);
                    }
                    Ok(Parser::wrapped(start.clone(), end.clone(), inner))
                },
                args,
            ))
        }
        Ast::Identifier(name) => {
            let name = name.clone();
            Ok(Quote::with_context(
                move |ctx, _| Ok(ctx.scope.lookup(&name)),
                Vec::new(),
            ))
        }
        Ast::Literal(value) => {
            let value = value.clone();
            Ok(Quote::with_context(
                move |ctx, _| ctx.compile_terminal(&value, TerminalRole::ContentToken),
                Vec::new(),
            ))
        }
        Ast::TokenType(name) => token_type_quote(name),
        Ast::Include(value) => match value {
            Value::Include(f) => {
                let f = f.clone();
                Ok(Quote::with_context(move |ctx, _| f(&ctx.scope), Vec::new()))
            }
            _ => Err(LangError::GrammarSyntax {
                expected: "a scope function after 'include'".to_string(),
                span: None,
            }),
        },
        Ast::Not(item) => {
            let args = vec![QuoteArg::Pending(compile_expr(item)?)];
            Ok(Quote::new(|parsers| Ok(Parser::not(one(parsers)?)), args))
        }
        Ast::Peek(item) => {
            let args = vec![QuoteArg::Pending(compile_expr(item)?)];
            Ok(Quote::new(|parsers| Ok(Parser::peek(one(parsers)?)), args))
        }
        Ast::NilExpr => Ok(Quote::new(|_| Ok(Parser::nil()), Vec::new())),
    }
}

/// Compile a precedence group. Left arms fold onto the base with the
/// engine's fold primitive; right arms become a right-recursive choice
/// between "arm then self" and the base.
fn compile_alt_infix(arms: &[InfixArm], base: &Ast) -> Result<Quote, LangError> {
    let orientation = match arms.first() {
        Some(arm) => arm.orientation,
        None => return Err(LangError::Internal("precedence group with no arms")),
    };
    if arms.iter().any(|arm| arm.orientation != orientation) {
        return Err(LangError::MixedAssociativity);
    }

    let mut args = vec![QuoteArg::Pending(compile_expr(base)?)];
    let mut arities = Vec::with_capacity(arms.len());
    let mut combines = Vec::with_capacity(arms.len());
    for arm in arms {
        arities.push(arm.items.len());
        combines.push(to_reducer(&arm.reduce)?);
        for item in &arm.items {
            args.push(QuoteArg::Pending(compile_expr(item)?));
        }
    }

    Ok(Quote::new(
        move |parsers| {
            let mut parsers = parsers.into_iter();
            let base = match parsers.next() {
                Some(parser) => parser,
                None => return Err(LangError::Internal("precedence group lost its base")),
            };
            let mut fold_arms = Vec::with_capacity(arities.len());
            for (arity, combine) in arities.iter().zip(&combines) {
                let items: Vec<Parser> = parsers.by_ref().take(*arity).collect();
                if items.len() != *arity {
                    return Err(LangError::Internal("precedence arm arity mismatch"));
                }
                fold_arms.push(FoldArm { items, combine: combine.clone() });
            }
            match orientation {
                Orientation::Left => Ok(Parser::fold_left(base, fold_arms)),
                Orientation::Right => {
                    let cell = ForwardCell::new("<precedence chain>");
                    let chain = Parser::lazy(cell.clone());
                    let mut alts = Vec::with_capacity(fold_arms.len() + 1);
                    for arm in fold_arms {
                        let mut items = arm.items;
                        items.push(chain.clone());
                        alts.push(Parser::seq(Some(arm.combine), items));
                    }
                    alts.push(base);
                    let parser = Parser::alt(alts);
                    cell.fill(parser.clone());
                    Ok(parser)
                }
            }
        },
        args,
    ))
}

fn token_type_quote(name: &str) -> Result<Quote, LangError> {
    let parser = match name {
        "line" => Parser::token_type(TokenKind::Line),
        "value" => Parser::token_type(TokenKind::Value),
        "identifier" => Parser::token_type(TokenKind::Identifier),
        "operator" => Parser::token_type(TokenKind::Operator),
        "punctuation" => Parser::token_type(TokenKind::Punctuation),
        // payload-typed terminals over lexed literals
        "number" => Parser::test(
            "%number",
            Rc::new(|token| {
                token.kind == TokenKind::Value && matches!(token.value, Value::Number(_))
            }),
        ),
        "string" => Parser::test(
            "%string",
            Rc::new(|token| {
                token.kind == TokenKind::Value && matches!(token.value, Value::Str(_))
            }),
        ),
        _ => return Err(LangError::UnknownTokenType(name.to_string())),
    };
    Ok(Quote::new(move |_| Ok(parser.clone()), Vec::new()))
}

fn pending(items: &[Ast]) -> Result<Vec<QuoteArg>, LangError> {
    items
        .iter()
        .map(|item| Ok(QuoteArg::Pending(compile_expr(item)?)))
        .collect()
}

fn one(parsers: Vec<Parser>) -> Result<Parser, LangError> {
    let mut parsers = parsers.into_iter();
    match (parsers.next(), parsers.next()) {
        (Some(parser), None) => Ok(parser),
        _ => Err(LangError::Internal("quote arity mismatch")),
    }
}

fn to_reducer(value: &Value) -> Result<ReducerFn, LangError> {
    match value {
        Value::Reducer(f) => Ok(f.clone()),
        _ => Err(LangError::GrammarSyntax {
            expected: "a mapping function after ':'".to_string(),
            span: None,
        }),
    }
}

fn delimiter(ast: &Ast) -> Result<Value, LangError> {
    match ast {
        Ast::Literal(value @ (Value::Str(_) | Value::Number(_))) => Ok(value.clone()),
        _ => Err(LangError::GrammarSyntax {
            expected: "a literal delimiter in a structural group".to_string(),
            span: None,
        }),
    }
}

/// Skip an optional line token.
fn ignore_lines() -> Parser {
    Parser::maybe(Parser::token_type(TokenKind::Line))
}

fn second() -> ReducerFn {
    Rc::new(|values: Vec<Value>| values.into_iter().nth(1).unwrap_or(Value::Nil))
}

/// Tolerate one line token on each side of `parser`.
pub(crate) fn wrap_ignore_lines(parser: Parser) -> Parser {
    Parser::seq(Some(second()), vec![ignore_lines(), parser, ignore_lines()])
}

/// A separated list whose separator tolerates an optional line break
/// before the separator and skips one after it.
fn build_sep_by(parsers: Vec<Parser>, min: usize) -> Result<Parser, LangError> {
    let mut parsers = parsers.into_iter();
    let (item, sep) = match (parsers.next(), parsers.next(), parsers.next()) {
        (Some(item), Some(sep), None) => (item, sep),
        _ => return Err(LangError::Internal("separated list arity mismatch")),
    };
    let before = Parser::seq(Some(second()), vec![ignore_lines(), sep.clone()]);
    let tolerant_sep = Parser::seq(None, vec![Parser::alt(vec![sep, before]), ignore_lines()]);
    Ok(Parser::sep_by(item, tolerant_sep, min))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lang::lexing;
    use crate::lang::meta;
    use crate::lang::token::TerminalMap;

    fn compile_source(source: &str) -> Result<Compiled, LangError> {
        let nodes = lexing::tokenize(&[source], Vec::new(), &TerminalMap::default());
        compile(&meta::parse_grammar(&nodes)?)
    }

    fn run(compiled: &Compiled, source: &str) -> Result<Value, ParseError> {
        let nodes = lexing::tokenize(&[source], Vec::new(), &compiled.terminals);
        compiled.parser.parse(&nodes)
    }

    #[test]
    fn test_base_scope_terminals() {
        let compiled = compile_source("value").expect("compiles");
        assert_eq!(run(&compiled, "123").unwrap(), Value::Number(123.0));
        assert!(run(&compiled, "foo").is_err());
    }

    #[test]
    fn test_forward_reference_through_lazy_cell() {
        let compiled = compile_source("A = \"x\" | B\nB = value").expect("compiles");
        assert_eq!(run(&compiled, "1").unwrap(), Value::Number(1.0));
        assert_eq!(run(&compiled, "x").unwrap(), Value::string("x"));
    }

    #[test]
    fn test_backward_reference() {
        let compiled = compile_source("A = B\nB = value").expect("compiles");
        assert_eq!(run(&compiled, "2").unwrap(), Value::Number(2.0));
    }

    #[test]
    fn test_unknown_rule_fails_at_compile_time() {
        let err = compile_source("A = Missing \"x\"").expect_err("must not compile");
        assert_eq!(err, LangError::UnknownRule("Missing".to_string()));
    }

    #[test]
    fn test_left_recursion_fails_at_compile_time() {
        let err = compile_source("A = A \"*\" | value").expect_err("must not compile");
        assert_eq!(err, LangError::LeftRecursion);
    }

    #[test]
    fn test_structural_roles_feed_the_terminal_map() {
        let compiled = compile_source("Expr = [\"(\" Expr* \")\"] | identifier").expect("compiles");
        assert_eq!(
            compiled.terminals.role_of(&Value::string("(")),
            Some(TerminalRole::StartToken)
        );
        assert_eq!(
            compiled.terminals.role_of(&Value::string(")")),
            Some(TerminalRole::EndToken)
        );
    }

    #[test]
    fn test_role_conflict_is_fatal() {
        let err =
            compile_source("Root = [\"(\" Value \")\"]\nValue = \"(\"").expect_err("must not compile");
        assert!(matches!(err, LangError::RoleConflict { .. }));
    }

    #[test]
    fn test_empty_grammar_accepts_blank_input() {
        let compiled = compile_source("").expect("compiles");
        assert_eq!(run(&compiled, " \n ").unwrap(), Value::Nil);
    }
}
