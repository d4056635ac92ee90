//! Meta-grammar parser
//!
//!     Reads the token tree of a grammar source and yields the tagged AST
//!     the compiler consumes. Recursive descent with save/restore
//!     backtracking over a flat token stream (grammar sources are
//!     tokenized with no structural terminals declared).
//!
//!     Precedence, high to low: prefix `!`/`&` and the `nil` keyword;
//!     postfix `*`/`+`/`?`; the separator operators `**`/`++`;
//!     juxtaposition sequencing with an optional trailing mapping
//!     function; `|` alternation. Primaries are parenthesized groups,
//!     `[ start item end ]` structural groups, `include` forms, `%name`
//!     typed terminals, rule references, and literal/interpolated
//!     terminals. Precedence groups `< . ... >` / `< ... . >` may only
//!     appear as top-level alternatives of a rule body.
//!
//!     Alternation and rule separation tolerate line breaks; everything
//!     else is line-sensitive, which is what lets a newline end one rule
//!     and start the next without explicit punctuation.

use crate::lang::ast::{Ast, InfixArm, Orientation, RuleDef};
use crate::lang::error::LangError;
use crate::lang::token::{Token, TokenKind, TokenTree};
use crate::lang::value::Value;

/// Parse a grammar source's token tree into a `Program`, `RootExpr`, or
/// `Empty` node.
pub fn parse_grammar(nodes: &[TokenTree]) -> Result<Ast, LangError> {
    let mut p = Meta { nodes, at: 0 };
    p.skip_lines();
    if p.at_end() {
        return Ok(Ast::Empty);
    }
    let ast = if p.at_rule_start() {
        let mut rules = vec![p.rule()?];
        loop {
            let mark = p.mark();
            if !p.eat_line() {
                break;
            }
            if p.at_rule_start() {
                rules.push(p.rule()?);
            } else {
                p.reset(mark);
                break;
            }
        }
        Ast::Program(rules)
    } else {
        Ast::RootExpr(Box::new(p.expr()?))
    };
    p.skip_lines();
    if !p.at_end() {
        return Err(p.error("end of grammar"));
    }
    Ok(ast)
}

struct Meta<'a> {
    nodes: &'a [TokenTree],
    at: usize,
}

impl<'a> Meta<'a> {
    fn peek(&self) -> Option<&Token> {
        self.peek_at(0)
    }

    fn peek_at(&self, n: usize) -> Option<&Token> {
        self.nodes.get(self.at + n).and_then(TokenTree::as_token)
    }

    fn bump(&mut self) {
        self.at += 1;
    }

    fn mark(&self) -> usize {
        self.at
    }

    fn reset(&mut self, mark: usize) {
        self.at = mark;
    }

    fn at_end(&self) -> bool {
        self.at >= self.nodes.len()
    }

    fn error(&self, expected: &str) -> LangError {
        LangError::GrammarSyntax {
            expected: expected.to_string(),
            span: self.nodes.get(self.at).map(TokenTree::span),
        }
    }

    fn skip_lines(&mut self) {
        while self.eat_line() {}
    }

    fn eat_line(&mut self) -> bool {
        match self.peek() {
            Some(token) if token.kind == TokenKind::Line => {
                self.bump();
                true
            }
            _ => false,
        }
    }

    fn peek_is(&self, kind: TokenKind, text: &str) -> bool {
        matches!(
            self.peek(),
            Some(token) if token.kind == kind && token.value.as_str() == Some(text)
        )
    }

    fn eat_operator(&mut self, text: &str) -> bool {
        if self.peek_is(TokenKind::Operator, text) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn eat_punct(&mut self, text: &str) -> bool {
        if self.peek_is(TokenKind::Punctuation, text) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn expect_operator(&mut self, text: &str) -> Result<(), LangError> {
        if self.eat_operator(text) {
            Ok(())
        } else {
            Err(self.error(&format!("'{}'", text)))
        }
    }

    fn expect_punct(&mut self, text: &str) -> Result<(), LangError> {
        if self.eat_punct(text) {
            Ok(())
        } else {
            Err(self.error(&format!("'{}'", text)))
        }
    }

    fn identifier(&mut self) -> Option<String> {
        let name = match self.peek() {
            Some(token) if token.kind == TokenKind::Identifier => {
                token.value.as_str().map(str::to_string)
            }
            _ => None,
        }?;
        self.bump();
        Some(name)
    }

    fn value_token(&mut self) -> Result<Value, LangError> {
        match self.peek() {
            Some(token) if token.kind == TokenKind::Value => {
                let value = token.value.clone();
                self.bump();
                Ok(value)
            }
            _ => Err(self.error("an interpolated or literal value")),
        }
    }

    fn at_rule_start(&self) -> bool {
        matches!(self.peek(), Some(t) if t.kind == TokenKind::Identifier)
            && self
                .peek_at(1)
                .map(|t| t.kind == TokenKind::Operator && t.value.as_str() == Some("="))
                .unwrap_or(false)
    }

    fn rule(&mut self) -> Result<RuleDef, LangError> {
        let name = match self.identifier() {
            Some(name) => name,
            None => return Err(self.error("a rule name")),
        };
        self.expect_operator("=")?;
        let body = self.expr()?;
        Ok(RuleDef { name, body })
    }

    fn at_infix_start(&self) -> bool {
        self.peek_is(TokenKind::Operator, "<") || self.peek_is(TokenKind::Operator, "<.")
    }

    fn expr(&mut self) -> Result<Ast, LangError> {
        if !self.at_infix_start() {
            return self.alt_expr();
        }
        let mut arms = vec![self.infix_arm()?];
        loop {
            let mark = self.mark();
            self.skip_lines();
            if !self.eat_operator("|") {
                self.reset(mark);
                return Err(self.error("'|' and a base alternative after a precedence arm"));
            }
            self.skip_lines();
            if self.at_infix_start() {
                arms.push(self.infix_arm()?);
            } else {
                let base = self.alt_expr()?;
                return Ok(Ast::AltInfix { arms, base: Box::new(base) });
            }
        }
    }

    fn infix_arm(&mut self) -> Result<InfixArm, LangError> {
        let orientation = if self.eat_operator("<.") {
            Orientation::Left
        } else {
            self.expect_operator("<")?;
            if self.eat_operator(".") {
                Orientation::Left
            } else {
                Orientation::Right
            }
        };
        let items = self.sep_exprs()?;
        match orientation {
            Orientation::Left => self.expect_operator(">")?,
            Orientation::Right => {
                if !self.eat_operator(".>") {
                    self.expect_operator(".")?;
                    self.expect_operator(">")?;
                }
            }
        }
        let reduce = match self.try_map_fn() {
            Some(value) => value,
            None => return Err(self.error("a mapping function after a precedence arm")),
        };
        Ok(InfixArm { orientation, items, reduce })
    }

    fn alt_expr(&mut self) -> Result<Ast, LangError> {
        let mut arms = vec![self.seq_expr()?];
        loop {
            let mark = self.mark();
            self.skip_lines();
            if self.eat_operator("|") {
                self.skip_lines();
                arms.push(self.seq_expr()?);
            } else {
                self.reset(mark);
                break;
            }
        }
        Ok(match arms.len() {
            1 => arms.swap_remove(0),
            _ => Ast::Alt(arms),
        })
    }

    fn seq_expr(&mut self) -> Result<Ast, LangError> {
        let mut items = self.sep_exprs()?;
        let mut reduce = self.try_map_fn();
        // a trailing interpolated function is also accepted as the reducer
        if reduce.is_none() && items.len() > 1 {
            if matches!(items.last(), Some(Ast::Literal(Value::Reducer(_)))) {
                if let Some(Ast::Literal(value)) = items.pop() {
                    reduce = Some(value);
                }
            }
        }
        if items.len() == 1 && reduce.is_none() {
            return Ok(items.swap_remove(0));
        }
        Ok(Ast::Seq { items, reduce })
    }

    /// One or more space-juxtaposed separator expressions.
    fn sep_exprs(&mut self) -> Result<Vec<Ast>, LangError> {
        let mut items = vec![self.sep_expr()?];
        loop {
            let mark = self.mark();
            match self.sep_expr() {
                Ok(item) => items.push(item),
                Err(_) => {
                    self.reset(mark);
                    break;
                }
            }
        }
        Ok(items)
    }

    fn try_map_fn(&mut self) -> Option<Value> {
        let mark = self.mark();
        self.skip_lines();
        if self.eat_operator(":") {
            if let Ok(value) = self.value_token() {
                return Some(value);
            }
        }
        self.reset(mark);
        None
    }

    fn sep_expr(&mut self) -> Result<Ast, LangError> {
        let first = self.postfix_expr()?;
        if self.eat_operator("**") {
            let sep = self.postfix_expr()?;
            return Ok(Ast::SepByMaybe { item: Box::new(first), sep: Box::new(sep) });
        }
        if self.eat_operator("++") {
            let sep = self.postfix_expr()?;
            return Ok(Ast::SepBy { item: Box::new(first), sep: Box::new(sep) });
        }
        Ok(first)
    }

    fn postfix_expr(&mut self) -> Result<Ast, LangError> {
        let base = self.prefix_expr()?;
        if self.eat_operator("*") {
            return Ok(Ast::Repeat0(Box::new(base)));
        }
        if self.eat_operator("+") {
            return Ok(Ast::Repeat1(Box::new(base)));
        }
        if self.eat_operator("?") {
            return Ok(Ast::Maybe(Box::new(base)));
        }
        Ok(base)
    }

    fn prefix_expr(&mut self) -> Result<Ast, LangError> {
        if self.eat_operator("!") {
            return Ok(Ast::Not(Box::new(self.prefix_expr()?)));
        }
        if self.eat_operator("&") {
            return Ok(Ast::Peek(Box::new(self.prefix_expr()?)));
        }
        if self.peek_is(TokenKind::Identifier, "nil") {
            self.bump();
            return Ok(Ast::NilExpr);
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<Ast, LangError> {
        if self.eat_punct("(") {
            let inner = self.expr()?;
            self.expect_punct(")")?;
            return Ok(inner);
        }
        if self.eat_punct("[") {
            let start = self.terminal()?;
            let item = self.sep_expr()?;
            let end = self.terminal()?;
            let reduce = self.try_map_fn();
            self.expect_punct("]")?;
            return Ok(Ast::Wrapped {
                start: Box::new(start),
                item: Box::new(item),
                end: Box::new(end),
                reduce,
            });
        }
        if self.peek_is(TokenKind::Identifier, "include") {
            self.bump();
            return Ok(Ast::Include(self.value_token()?));
        }
        if self.eat_operator("%") {
            return match self.identifier() {
                Some(name) => Ok(Ast::TokenType(name)),
                None => Err(self.error("a token type name after '%'")),
            };
        }
        if let Some(name) = self.identifier() {
            return Ok(Ast::Identifier(name));
        }
        if let Some(token) = self.peek() {
            if token.kind == TokenKind::Value {
                let value = token.value.clone();
                self.bump();
                return Ok(Ast::Literal(value));
            }
        }
        Err(self.error("an expression"))
    }

    fn terminal(&mut self) -> Result<Ast, LangError> {
        Ok(Ast::Literal(self.value_token()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lang::lexing;
    use crate::lang::token::TerminalMap;

    fn parse(source: &str) -> Ast {
        let nodes = lexing::tokenize(&[source], Vec::new(), &TerminalMap::default());
        parse_grammar(&nodes).expect("grammar should parse")
    }

    fn parse_with(segments: &[&str], values: Vec<Value>) -> Ast {
        let nodes = lexing::tokenize(segments, values, &TerminalMap::default());
        parse_grammar(&nodes).expect("grammar should parse")
    }

    #[test]
    fn test_empty_grammar() {
        assert!(matches!(parse("  \n  "), Ast::Empty));
    }

    #[test]
    fn test_root_expression() {
        let ast = parse("\"(\" value \")\"");
        let items = match ast {
            Ast::RootExpr(inner) => match *inner {
                Ast::Seq { items, reduce: None } => items,
                other => panic!("expected seq, got {:?}", other),
            },
            other => panic!("expected root expr, got {:?}", other),
        };
        assert_eq!(items.len(), 3);
        assert!(matches!(&items[0], Ast::Literal(Value::Str(s)) if &s[..] == "("));
        assert!(matches!(&items[1], Ast::Identifier(name) if name == "value"));
    }

    #[test]
    fn test_program_rules_and_alternation() {
        let ast = parse("A = B | \"x\"\nB = value");
        let rules = match ast {
            Ast::Program(rules) => rules,
            other => panic!("expected program, got {:?}", other),
        };
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0].name, "A");
        assert!(matches!(&rules[0].body, Ast::Alt(arms) if arms.len() == 2));
        assert_eq!(rules[1].name, "B");
    }

    #[test]
    fn test_postfix_and_separator_operators() {
        let ast = parse("A = value* ++ line");
        let rules = match ast {
            Ast::Program(rules) => rules,
            other => panic!("expected program, got {:?}", other),
        };
        assert!(matches!(
            &rules[0].body,
            Ast::SepBy { item, .. } if matches!(&**item, Ast::Repeat0(_))
        ));
    }

    #[test]
    fn test_prefix_lookahead_and_nil() {
        let ast = parse("!\"x\" &value nil");
        let items = match ast {
            Ast::RootExpr(inner) => match *inner {
                Ast::Seq { items, .. } => items,
                other => panic!("expected seq, got {:?}", other),
            },
            other => panic!("expected root expr, got {:?}", other),
        };
        assert!(matches!(&items[0], Ast::Not(_)));
        assert!(matches!(&items[1], Ast::Peek(_)));
        assert!(matches!(&items[2], Ast::NilExpr));
    }

    #[test]
    fn test_infix_arms() {
        let reduce = Value::reducer(|values| values.into_iter().next().unwrap_or(Value::Nil));
        let ast = parse_with(
            &["A = < . \"+\" B > : ", " | B\nB = value"],
            vec![reduce],
        );
        let rules = match ast {
            Ast::Program(rules) => rules,
            other => panic!("expected program, got {:?}", other),
        };
        let (arms, base) = match &rules[0].body {
            Ast::AltInfix { arms, base } => (arms, base),
            other => panic!("expected precedence group, got {:?}", other),
        };
        assert_eq!(arms.len(), 1);
        assert_eq!(arms[0].orientation, Orientation::Left);
        assert_eq!(arms[0].items.len(), 2);
        assert!(matches!(&**base, Ast::Identifier(name) if name == "B"));
    }

    #[test]
    fn test_right_infix_orientation() {
        let reduce = Value::reducer(|values| values.into_iter().next().unwrap_or(Value::Nil));
        let ast = parse_with(&["A = < B \"**\" . > : ", " | B\nB = value"], vec![reduce]);
        let rules = match ast {
            Ast::Program(rules) => rules,
            other => panic!("expected program, got {:?}", other),
        };
        let arms = match &rules[0].body {
            Ast::AltInfix { arms, .. } => arms,
            other => panic!("expected precedence group, got {:?}", other),
        };
        assert_eq!(arms[0].orientation, Orientation::Right);
    }

    #[test]
    fn test_wrapped_group_with_mapping() {
        let reduce = Value::reducer(|values| values.into_iter().next().unwrap_or(Value::Nil));
        let ast = parse_with(&["[\"(\" value ** \",\" \")\" : ", "]"], vec![reduce]);
        let wrapped = match ast {
            Ast::RootExpr(inner) => *inner,
            other => panic!("expected root expr, got {:?}", other),
        };
        match wrapped {
            Ast::Wrapped { start, item, end, reduce } => {
                assert!(matches!(*start, Ast::Literal(Value::Str(s)) if &s[..] == "("));
                assert!(matches!(*item, Ast::SepByMaybe { .. }));
                assert!(matches!(*end, Ast::Literal(Value::Str(s)) if &s[..] == ")"));
                assert!(reduce.is_some());
            }
            other => panic!("expected wrapped, got {:?}", other),
        }
    }

    #[test]
    fn test_trailing_function_is_sequence_reducer() {
        let reduce = Value::reducer(|values| values.into_iter().next().unwrap_or(Value::Nil));
        let ast = parse_with(&["\"-\" value ", ""], vec![reduce]);
        match ast {
            Ast::RootExpr(inner) => match *inner {
                Ast::Seq { items, reduce } => {
                    assert_eq!(items.len(), 2);
                    assert!(reduce.is_some());
                }
                other => panic!("expected seq, got {:?}", other),
            },
            other => panic!("expected root expr, got {:?}", other),
        }
    }

    #[test]
    fn test_include_and_token_type() {
        let include = Value::include(|scope| {
            scope.get("X").ok_or(LangError::UnknownRule("X".to_string()))
        });
        let ast = parse_with(&["include ", " | %number"], vec![include]);
        match ast {
            Ast::RootExpr(inner) => match *inner {
                Ast::Alt(arms) => {
                    assert!(matches!(&arms[0], Ast::Include(Value::Include(_))));
                    assert!(matches!(&arms[1], Ast::TokenType(name) if name == "number"));
                }
                other => panic!("expected alt, got {:?}", other),
            },
            other => panic!("expected root expr, got {:?}", other),
        }
    }

    #[test]
    fn test_syntax_error_reports_position() {
        let nodes = lexing::tokenize(&["A = | x"], Vec::new(), &TerminalMap::default());
        let err = parse_grammar(&nodes).expect_err("bad grammar must not parse");
        assert!(matches!(err, LangError::GrammarSyntax { .. }));
    }
}
