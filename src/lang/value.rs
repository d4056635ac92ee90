//! Runtime values
//!
//!     Every value that flows through a compiled parser is a [Value]:
//!     lexed literals, interpolated runtime data, reducer results, and the
//!     lists built by repetition. The function-bearing variants are the
//!     interpolation kinds a grammar source can embed: reducers (sequence
//!     mapping functions), predicate testers (custom terminal matchers),
//!     already-compiled parsers, and include functions resolved against the
//!     rule scope at compile time.
//!
//!     Functions compare by identity, everything else structurally, so
//!     tokens and parse results stay cheaply comparable in tests.

use std::fmt;
use std::rc::Rc;

use crate::lang::combinators::Parser;
use crate::lang::compiler::Scope;
use crate::lang::error::LangError;

pub type ReducerFn = Rc<dyn Fn(Vec<Value>) -> Value>;
pub type TesterFn = Rc<dyn Fn(&Value) -> bool>;
pub type IncludeFn = Rc<dyn Fn(&Scope) -> Result<Parser, LangError>>;

#[derive(Clone)]
pub enum Value {
    /// The absent value: result of `nil`, failed `maybe`, dropped matches.
    Nil,
    Bool(bool),
    Number(f64),
    Str(Rc<str>),
    List(Vec<Value>),
    /// Ordered key/value pairs, for reducers that build object-like data.
    Record(Vec<(String, Value)>),
    /// A sequence mapping function: receives the matched values in order.
    Reducer(ReducerFn),
    /// A custom terminal matcher over a token's value.
    Tester { name: Rc<str>, test: TesterFn },
    /// An already-compiled parser, used as-is where it is interpolated.
    Parser(Parser),
    /// A compile-time function of the rule scope, for `include` forms.
    Include(IncludeFn),
}

impl Value {
    pub fn string(s: &str) -> Value {
        Value::Str(Rc::from(s))
    }

    pub fn list(items: Vec<Value>) -> Value {
        Value::List(items)
    }

    pub fn reducer(f: impl Fn(Vec<Value>) -> Value + 'static) -> Value {
        Value::Reducer(Rc::new(f))
    }

    pub fn tester(name: &str, test: impl Fn(&Value) -> bool + 'static) -> Value {
        Value::Tester { name: Rc::from(name), test: Rc::new(test) }
    }

    /// A tester matching string-valued tokens against a regular expression.
    pub fn pattern(pattern: regex::Regex) -> Value {
        let name = format!("/{}/", pattern.as_str());
        Value::Tester {
            name: Rc::from(name.as_str()),
            test: Rc::new(move |value| match value {
                Value::Str(s) => pattern.is_match(s),
                _ => false,
            }),
        }
    }

    pub fn parser(parser: Parser) -> Value {
        Value::Parser(parser)
    }

    pub fn include(f: impl Fn(&Scope) -> Result<Parser, LangError> + 'static) -> Value {
        Value::Include(Rc::new(f))
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// Convert to a JSON value. Function-bearing variants have no data
    /// representation and become null.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Nil => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Number(n) => serde_json::Number::from_f64(*n)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Str(s) => serde_json::Value::String(s.to_string()),
            Value::List(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Record(pairs) => serde_json::Value::Object(
                pairs
                    .iter()
                    .map(|(key, value)| (key.clone(), value.to_json()))
                    .collect(),
            ),
            Value::Reducer(_) | Value::Tester { .. } | Value::Parser(_) | Value::Include(_) => {
                serde_json::Value::Null
            }
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Record(a), Value::Record(b)) => a == b,
            (Value::Reducer(a), Value::Reducer(b)) => Rc::ptr_eq(a, b),
            (Value::Tester { test: a, .. }, Value::Tester { test: b, .. }) => Rc::ptr_eq(a, b),
            (Value::Parser(a), Value::Parser(b)) => a.same(b),
            (Value::Include(a), Value::Include(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Number(n) => write!(f, "{}", n),
            Value::Str(s) => write!(f, "{:?}", &s[..]),
            Value::List(items) => f.debug_list().entries(items.iter()).finish(),
            Value::Record(pairs) => f
                .debug_map()
                .entries(pairs.iter().map(|(k, v)| (k, v)))
                .finish(),
            Value::Reducer(_) => write!(f, "<reducer>"),
            Value::Tester { name, .. } => write!(f, "<tester {}>", name),
            Value::Parser(_) => write!(f, "<parser>"),
            Value::Include(_) => write!(f, "<include>"),
        }
    }
}

// A Value in an error message reads like the grammar source that produced it.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Value {
        Value::Number(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Value {
        Value::Number(n as f64)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Value {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Value {
        Value::string(s)
    }
}
