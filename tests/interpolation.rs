//! Interpolation kinds: pre-built parsers, rule lookup across grammars,
//! predicate testers, include forms, and reducer slots with and without
//! the `:` marker.

use pushdown::{lang_text, LangError, Language, Source, Value};

#[test]
fn test_interpolated_parser_as_terminal() {
    let num = lang_text("value").expect("compiles");
    let list = Source::new()
        .slot(num.as_value())
        .text("+")
        .compile()
        .expect("compiles");
    assert_eq!(
        list.run_text("1 2 3").unwrap(),
        Value::List(vec![Value::Number(1.0), Value::Number(2.0), Value::Number(3.0)])
    );
}

#[test]
fn test_interpolated_parser_matches_inlined_text() {
    let sub = lang_text("value").expect("compiles");
    let interpolated = Source::new()
        .slot(sub.as_value())
        .text(" ++ \",\"")
        .compile()
        .expect("compiles");
    let inlined = lang_text("value ++ \",\"").expect("compiles");
    for input in ["1", "1, 2", "1 , 2 , 3"] {
        assert_eq!(
            interpolated.run_text(input).unwrap(),
            inlined.run_text(input).unwrap(),
            "{}",
            input
        );
    }
    assert!(interpolated.run_text("1,").is_err());
    assert!(inlined.run_text("1,").is_err());
}

fn parenthesized(rule: Value) -> Language {
    Source::new()
        .text("[\"(\" ")
        .slot(rule.clone())
        .text(" \")\"] | ")
        .slot(rule)
        .compile()
        .expect("compiles")
}

#[test]
fn test_rules_looked_up_by_name_compose_into_other_grammars() {
    let l = lang_text("Number = value\nKeyword = \"foo\"").expect("compiles");

    let paren_number = parenthesized(l.as_value());
    assert_eq!(paren_number.run_text("(1)").unwrap(), Value::Number(1.0));
    assert_eq!(paren_number.run_text("1").unwrap(), Value::Number(1.0));

    let keyword = l.get("Keyword").expect("rule is exported");
    let paren_keyword = parenthesized(Value::Parser(keyword));
    assert_eq!(paren_keyword.run_text("(foo)").unwrap(), Value::string("foo"));
    assert!(paren_keyword.run_text("(bar)").is_err());
}

#[test]
fn test_tester_as_custom_terminal() {
    let keyword = Value::pattern(regex::Regex::new("^(foo|bar)$").unwrap());
    let l = Source::new().slot(keyword).text("+").compile().expect("compiles");
    assert_eq!(
        l.run_text("foo bar foo").unwrap(),
        Value::List(vec![Value::string("foo"), Value::string("bar"), Value::string("foo")])
    );
    assert!(l.run_text("foo baz").is_err());
}

#[test]
fn test_include_selects_a_rule_at_compile_time() {
    let pick = Value::include(|scope| {
        scope.get("B").ok_or(LangError::UnknownRule("B".to_string()))
    });
    let l = Source::new()
        .text("Root = include ")
        .slot(pick)
        .text("\nA = \"a\"\nB = \"b\"")
        .compile()
        .expect("compiles");
    assert_eq!(l.run_text("b").unwrap(), Value::string("b"));
    assert!(l.run_text("a").is_err());
}

#[test]
fn test_optional_trailing_comma_with_colon_reducer() {
    let both = Value::reducer(|args| Value::List(vec![args[0].clone(), args[2].clone()]));
    let l = Source::new()
        .text("value \",\" value \",\"? : ")
        .slot(both)
        .compile()
        .expect("compiles");
    let expected = Value::List(vec![Value::Number(1.0), Value::Number(2.0)]);
    assert_eq!(l.run_text("1, 2").unwrap(), expected);
    assert_eq!(l.run_text("1, 2,").unwrap(), expected);
}

#[test]
fn test_trailing_function_slot_without_colon_is_the_reducer() {
    let neg = Value::reducer(|args| {
        Value::Number(-args[1].as_number().unwrap_or(f64::NAN))
    });
    let l = Source::new()
        .text("\"-\" value ")
        .slot(neg)
        .compile()
        .expect("compiles");
    assert_eq!(l.run_text("- 5").unwrap(), Value::Number(-5.0));
}

#[test]
fn test_line_separated_lists() {
    let lines = lang_text("value+ ++ line").expect("compiles");
    let text = lines.run_text("\n    1 2 \n  \n    3 4\n  ").unwrap();
    assert_eq!(
        text,
        Value::List(vec![
            Value::List(vec![Value::Number(1.0), Value::Number(2.0)]),
            Value::List(vec![Value::Number(3.0), Value::Number(4.0)]),
        ])
    );
}

#[test]
fn test_lookahead_guards() {
    // a value not followed by an operator
    let l = lang_text("value !operator").expect("compiles");
    assert_eq!(l.run_text("5").unwrap(), Value::Number(5.0));
    assert!(l.run_text("5 +").is_err());

    let l = Source::new()
        .text("&value value : ")
        .slot(Value::reducer(|args| args[1].clone()))
        .compile()
        .expect("compiles");
    assert_eq!(l.run_text("7").unwrap(), Value::Number(7.0));
}

#[test]
fn test_interpolation_inside_comment_is_ignored() {
    // the slot sits inside a line comment; the grammar is just `value`
    let l = Source::new()
        .text("value // reducer disabled: ")
        .slot(Value::reducer(|_| Value::Nil))
        .text("\n")
        .compile()
        .expect("compiles");
    assert_eq!(l.run_text("42").unwrap(), Value::Number(42.0));
}
