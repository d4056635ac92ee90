//! A JSON-equivalent grammar built on structural groups, typed terminals,
//! and reducers, checked through the serde_json conversion.

use pushdown::{LangError, Language, Source, Value};

fn pair() -> Value {
    // ["key", ":", value] -> ["key", value]
    Value::reducer(|args| {
        let mut args = args.into_iter();
        let key = args.next().unwrap_or(Value::Nil);
        let value = args.nth(1).unwrap_or(Value::Nil);
        Value::List(vec![key, value])
    })
}

fn object() -> Value {
    Value::reducer(|args| {
        let pairs = args.into_iter().next().unwrap_or(Value::Nil);
        let entries = match pairs {
            Value::List(items) => items
                .into_iter()
                .filter_map(|item| match item {
                    Value::List(pair) => {
                        let mut pair = pair.into_iter();
                        let key = pair.next()?.as_str()?.to_string();
                        Some((key, pair.next()?))
                    }
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        };
        Value::Record(entries)
    })
}

fn constant(value: Value) -> Value {
    Value::reducer(move |_| value.clone())
}

fn json() -> Language {
    Source::new()
        .text("Expr = [\"[\" Expr ** \",\" \"]\"]\n")
        .text("     | [\"{\" Pair ** \",\" \"}\" : ")
        .slot(object())
        .text("]\n")
        .text("     | %number\n")
        .text("     | %string\n")
        .text("     | \"true\" : ")
        .slot(constant(Value::Bool(true)))
        .text("\n     | \"false\" : ")
        .slot(constant(Value::Bool(false)))
        .text("\n     | \"null\" : ")
        .slot(constant(Value::Nil))
        .text("\nPair = %string \":\" Expr : ")
        .slot(pair())
        .text("\n")
        .compile()
        .expect("json grammar compiles")
}

#[test]
fn test_scalars() {
    let json = json();
    assert_eq!(json.run_text("null").unwrap().to_json(), serde_json::json!(null));
    assert_eq!(json.run_text(" false ").unwrap().to_json(), serde_json::json!(false));
    assert_eq!(json.run_text(" 123.45 ").unwrap().to_json(), serde_json::json!(123.45));
    assert_eq!(json.run_text("\"foo\"").unwrap().to_json(), serde_json::json!("foo"));
}

#[test]
fn test_arrays() {
    let json = json();
    assert_eq!(json.run_text("[]").unwrap().to_json(), serde_json::json!([]));
    assert_eq!(
        json.run_text("[\"foo\", \"bar\"]").unwrap().to_json(),
        serde_json::json!(["foo", "bar"])
    );
    assert_eq!(
        json.run_text("[1, [2, 3], true]").unwrap().to_json(),
        serde_json::json!([1.0, [2.0, 3.0], true])
    );
}

#[test]
fn test_objects() {
    let json = json();
    assert_eq!(
        json.run_text("{\"x\": {\"y\": {}}}").unwrap().to_json(),
        serde_json::json!({ "x": { "y": {} } })
    );
    assert_eq!(
        json.run_text("{\"a\": 1, \"b\": [true, null]}").unwrap().to_json(),
        serde_json::json!({ "a": 1.0, "b": [true, null] })
    );
}

#[test]
fn test_quoted_strings_are_not_keywords() {
    // "true" in quotes is a string token, never the keyword
    let json = json();
    assert_eq!(
        json.run_text("[\"true\", true]").unwrap().to_json(),
        serde_json::json!(["true", true])
    );
}

#[test]
fn test_malformed_documents_are_rejected() {
    let json = json();
    for input in ["[1, ]", "{\"a\" 1}", "{1: 2}", "[1", "1]"] {
        let err = json.run_text(input).expect_err(input);
        assert!(matches!(err, LangError::ParseFailed { .. }), "{}: {:?}", input, err);
    }
}
