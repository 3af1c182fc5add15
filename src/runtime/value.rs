//! Dynamic values seen by a running view.
//!
//! Models arrive as JSON and are converted once into [`Value`]. Operators follow
//! the loose semantics templates are written against: `+` concatenates when
//! either side is text, comparisons of two strings are lexicographic, and every
//! value has a truthiness.

use crate::error::RenderError;
use crate::generate::BinaryOp;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Array(Vec<Value>),
    Object(BTreeMap<String, Value>),
    /// Markup that is written without escaping
    Raw(String),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) | Value::Raw(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::String(s) | Value::Raw(s) => !s.is_empty(),
            Value::Array(_) | Value::Object(_) => true,
        }
    }

    pub fn to_number(&self) -> f64 {
        match self {
            Value::Null => 0.0,
            Value::Bool(b) => f64::from(u8::from(*b)),
            Value::Number(n) => *n,
            Value::String(s) | Value::Raw(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    0.0
                } else {
                    trimmed.parse().unwrap_or(f64::NAN)
                }
            }
            Value::Array(_) | Value::Object(_) => f64::NAN,
        }
    }

    fn as_text(&self) -> Option<&str> {
        match self {
            Value::String(s) | Value::Raw(s) => Some(s),
            _ => None,
        }
    }

    /// Property lookup used for model names. Anything but an object has no properties.
    pub fn property(&self, name: &str) -> Value {
        match self {
            Value::Object(map) => map.get(name).cloned().unwrap_or_default(),
            _ => Value::Null,
        }
    }

    /// `object.name`
    pub fn member(&self, name: &str) -> Result<Value, RenderError> {
        match (self, name) {
            (Value::Null, _) => Err(RenderError::NullReference { member: name.to_string() }),
            (Value::String(s) | Value::Raw(s), "length") => Ok(Value::Number(s.chars().count() as f64)),
            (Value::Array(items), "length") => Ok(Value::Number(items.len() as f64)),
            (Value::Object(map), _) => Ok(map.get(name).cloned().unwrap_or_default()),
            _ => Ok(Value::Null),
        }
    }

    /// `target[index]`
    pub fn index(&self, index: &Value) -> Result<Value, RenderError> {
        match (self, index) {
            (Value::Null, _) => Err(RenderError::NullReference { member: index.to_string() }),
            (Value::Array(items), Value::Number(n)) => Ok(position(*n).and_then(|i| items.get(i)).cloned().unwrap_or_default()),
            (Value::String(s) | Value::Raw(s), Value::Number(n)) => Ok(position(*n)
                .and_then(|i| s.chars().nth(i))
                .map(|c| Value::String(c.to_string()))
                .unwrap_or_default()),
            (Value::Object(map), key) => Ok(map.get(&key.to_string()).cloned().unwrap_or_default()),
            (target, key) => target.member(&key.to_string()),
        }
    }

    /// Items visited by `foreach`: array items, the characters of a string, or
    /// the values of an object in key order.
    pub fn iterate(&self) -> Result<Vec<Value>, RenderError> {
        match self {
            Value::Array(items) => Ok(items.clone()),
            Value::String(s) | Value::Raw(s) => Ok(s.chars().map(|c| Value::String(c.to_string())).collect()),
            Value::Object(map) => Ok(map.values().cloned().collect()),
            other => Err(RenderError::NotIterable {
                type_name: other.type_name(),
            }),
        }
    }

    /// Built-in methods of strings and arrays.
    pub fn call_method(&self, name: &str, arguments: &[Value]) -> Result<Value, RenderError> {
        let argument = |i: usize| arguments.get(i).cloned().unwrap_or_default();
        match self {
            Value::Null => Err(RenderError::NullReference { member: name.to_string() }),
            Value::String(s) | Value::Raw(s) => match name {
                "toUpperCase" => Ok(Value::String(s.to_uppercase())),
                "toLowerCase" => Ok(Value::String(s.to_lowercase())),
                "trim" => Ok(Value::String(s.trim().to_string())),
                "toString" => Ok(Value::String(s.clone())),
                "indexOf" => {
                    let needle = argument(0).to_string();
                    Ok(Value::Number(
                        s.find(&needle).map(|i| s[..i].chars().count() as f64).unwrap_or(-1.0),
                    ))
                }
                "substring" => {
                    let chars: Vec<char> = s.chars().collect();
                    let clamp = |n: f64| if n.is_nan() { 0 } else { n.clamp(0.0, chars.len() as f64) as usize };
                    let start = clamp(argument(0).to_number());
                    let end = match argument(1) {
                        Value::Null => chars.len(),
                        end => clamp(end.to_number()),
                    };
                    let (start, end) = if start > end { (end, start) } else { (start, end) };
                    Ok(Value::String(chars[start..end].iter().collect()))
                }
                "slice" => {
                    let chars: Vec<char> = s.chars().collect();
                    let (start, end) = slice_bounds(chars.len(), &argument(0), &argument(1));
                    Ok(Value::String(chars[start..end].iter().collect()))
                }
                "split" => {
                    let parts = match argument(0) {
                        Value::Null => vec![Value::String(s.clone())],
                        separator => {
                            let separator = separator.to_string();
                            if separator.is_empty() {
                                s.chars().map(|c| Value::String(c.to_string())).collect()
                            } else {
                                s.split(separator.as_str()).map(|part| Value::String(part.to_string())).collect()
                            }
                        }
                    };
                    Ok(Value::Array(parts))
                }
                _ => Err(self.unknown_method(name)),
            },
            Value::Array(items) => match name {
                "join" => {
                    let separator = match argument(0) {
                        Value::Null => ",".to_string(),
                        separator => separator.to_string(),
                    };
                    Ok(Value::String(join(items, &separator)))
                }
                "indexOf" => {
                    let needle = argument(0);
                    Ok(Value::Number(
                        items
                            .iter()
                            .position(|item| strict_equals(item, &needle))
                            .map(|i| i as f64)
                            .unwrap_or(-1.0),
                    ))
                }
                "slice" => {
                    let (start, end) = slice_bounds(items.len(), &argument(0), &argument(1));
                    Ok(Value::Array(items[start..end].to_vec()))
                }
                "toString" => Ok(Value::String(self.to_string())),
                _ => Err(self.unknown_method(name)),
            },
            Value::Bool(_) | Value::Number(_) if name == "toString" => Ok(Value::String(self.to_string())),
            _ => Err(self.unknown_method(name)),
        }
    }

    fn unknown_method(&self, name: &str) -> RenderError {
        RenderError::UnknownMethod {
            name: name.to_string(),
            type_name: self.type_name(),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Number(n) if is_integral(*n) => serde_json::Value::from(*n as i64),
            Value::Number(n) => serde_json::Number::from_f64(*n)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::String(s) | Value::Raw(s) => serde_json::Value::String(s.clone()),
            Value::Array(items) => serde_json::Value::Array(items.iter().map(Value::to_json).collect()),
            Value::Object(map) => serde_json::Value::Object(map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect()),
        }
    }
}

/// Apply a binary operator. `&&` and `||` return one of their operands.
pub fn binary(op: BinaryOp, left: &Value, right: &Value) -> Result<Value, RenderError> {
    let value = match op {
        BinaryOp::And => {
            if left.is_truthy() {
                right.clone()
            } else {
                left.clone()
            }
        }
        BinaryOp::Or => {
            if left.is_truthy() {
                left.clone()
            } else {
                right.clone()
            }
        }
        BinaryOp::Equal => Value::Bool(loose_equals(left, right)),
        BinaryOp::NotEqual => Value::Bool(!loose_equals(left, right)),
        BinaryOp::StrictEqual => Value::Bool(strict_equals(left, right)),
        BinaryOp::StrictNotEqual => Value::Bool(!strict_equals(left, right)),
        BinaryOp::Less | BinaryOp::Greater | BinaryOp::LessEqual | BinaryOp::GreaterEqual => {
            let ordering = match (left.as_text(), right.as_text()) {
                (Some(l), Some(r)) => Some(l.cmp(r)),
                _ => left.to_number().partial_cmp(&right.to_number()),
            };
            Value::Bool(match (op, ordering) {
                (_, None) => false,
                (BinaryOp::Less, Some(o)) => o == Ordering::Less,
                (BinaryOp::Greater, Some(o)) => o == Ordering::Greater,
                (BinaryOp::LessEqual, Some(o)) => o != Ordering::Greater,
                (_, Some(o)) => o != Ordering::Less,
            })
        }
        BinaryOp::Add if left.as_text().is_some() || right.as_text().is_some() => {
            Value::String(format!("{}{}", left, right))
        }
        _ => {
            let (l, r) = (arithmetic_operand(op, left)?, arithmetic_operand(op, right)?);
            Value::Number(match op {
                BinaryOp::Add => l + r,
                BinaryOp::Subtract => l - r,
                BinaryOp::Multiply => l * r,
                BinaryOp::Divide => l / r,
                _ => l % r,
            })
        }
    };
    Ok(value)
}

/// Number behind an arithmetic operand; collections cannot take part.
fn arithmetic_operand(op: BinaryOp, value: &Value) -> Result<f64, RenderError> {
    match value {
        Value::Array(_) | Value::Object(_) => Err(RenderError::Type(format!(
            "cannot apply `{}` to {}",
            op.as_str(),
            value.type_name()
        ))),
        other => Ok(other.to_number()),
    }
}

/// `===`: same type and same value. Raw markup compares equal to the same text.
pub fn strict_equals(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Null, Value::Null) => true,
        (Value::Bool(l), Value::Bool(r)) => l == r,
        (Value::Number(l), Value::Number(r)) => l == r,
        (Value::Array(l), Value::Array(r)) => l.len() == r.len() && l.iter().zip(r).all(|(l, r)| strict_equals(l, r)),
        (Value::Object(l), Value::Object(r)) => l == r,
        _ => match (left.as_text(), right.as_text()) {
            (Some(l), Some(r)) => l == r,
            _ => false,
        },
    }
}

/// `==`: numbers, booleans and numeric text compare by value.
pub fn loose_equals(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Null, Value::Null) => true,
        (Value::Null, _) | (_, Value::Null) => false,
        (Value::Number(_) | Value::Bool(_), _) | (_, Value::Number(_) | Value::Bool(_))
            if !matches!((left, right), (Value::Bool(_), Value::Bool(_))) =>
        {
            left.to_number() == right.to_number()
        }
        _ => strict_equals(left, right),
    }
}

fn position(n: f64) -> Option<usize> {
    (n >= 0.0 && n.fract() == 0.0).then_some(n as usize)
}

fn slice_bounds(len: usize, start: &Value, end: &Value) -> (usize, usize) {
    let resolve = |value: &Value, default: usize| -> usize {
        if matches!(value, Value::Null) {
            return default;
        }
        let n = value.to_number();
        if n.is_nan() {
            0
        } else if n < 0.0 {
            (len as f64 + n).max(0.0) as usize
        } else {
            n.min(len as f64) as usize
        }
    };
    let start = resolve(start, 0);
    let end = resolve(end, len);
    (start, end.max(start))
}

fn is_integral(n: f64) -> bool {
    n.fract() == 0.0 && n.abs() < 1e15
}

fn join(items: &[Value], separator: &str) -> String {
    items
        .iter()
        .map(|item| match item {
            Value::Null => String::new(),
            item => item.to_string(),
        })
        .collect::<Vec<_>>()
        .join(separator)
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Number(n) if n.is_nan() => write!(f, "NaN"),
            Value::Number(n) if n.is_infinite() => write!(f, "{}Infinity", if *n < 0.0 { "-" } else { "" }),
            Value::Number(n) if is_integral(*n) => write!(f, "{}", *n as i64),
            Value::Number(n) => write!(f, "{}", n),
            Value::String(s) | Value::Raw(s) => write!(f, "{}", s),
            Value::Array(items) => write!(f, "{}", join(items, ",")),
            Value::Object(_) => write!(f, "{}", self.to_json()),
        }
    }
}

impl From<&serde_json::Value> for Value {
    fn from(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::String(s.clone()),
            serde_json::Value::Array(items) => Value::Array(items.iter().map(Value::from).collect()),
            serde_json::Value::Object(map) => Value::Object(map.iter().map(|(k, v)| (k.clone(), Value::from(v))).collect()),
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        Value::from(&value)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::Array(items.into_iter().map(Into::into).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn eval(op: BinaryOp, left: impl Into<Value>, right: impl Into<Value>) -> Value {
        binary(op, &left.into(), &right.into()).unwrap()
    }

    #[test]
    fn test_truthiness() {
        assert!(!Value::Null.is_truthy());
        assert!(!Value::from(0.0).is_truthy());
        assert!(!Value::from("").is_truthy());
        assert!(Value::from("0").is_truthy());
        assert!(Value::Array(vec![]).is_truthy());
        assert!(!Value::Number(f64::NAN).is_truthy());
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::from(3.0).to_string(), "3");
        assert_eq!(Value::from(2.5).to_string(), "2.5");
        assert_eq!(Value::from(-0.0).to_string(), "0");
        assert_eq!(Value::Number(f64::NAN).to_string(), "NaN");
        assert_eq!(Value::Number(f64::NEG_INFINITY).to_string(), "-Infinity");
        assert_eq!(Value::from(vec![1i64, 2, 3]).to_string(), "1,2,3");
        assert_eq!(Value::from(json!({"a": 1})).to_string(), r#"{"a":1}"#);
    }

    #[test]
    fn test_addition() {
        assert_eq!(eval(BinaryOp::Add, 1.0, 2.0), Value::from(3.0));
        assert_eq!(eval(BinaryOp::Add, "a", 1.0), Value::from("a1"));
        assert_eq!(eval(BinaryOp::Add, 1.0, "b"), Value::from("1b"));
        assert_eq!(eval(BinaryOp::Add, true, 1.0), Value::from(2.0));
    }

    #[test]
    fn test_arithmetic_on_collections_fails() {
        let err = binary(BinaryOp::Multiply, &Value::Array(vec![]), &Value::from(2.0)).unwrap_err();
        assert_eq!(err, RenderError::Type("cannot apply `*` to array".to_string()));
    }

    #[test]
    fn test_comparisons() {
        assert_eq!(eval(BinaryOp::Less, 1.0, 2.0), Value::Bool(true));
        assert_eq!(eval(BinaryOp::Less, "b", "a"), Value::Bool(false));
        assert_eq!(eval(BinaryOp::GreaterEqual, "10", 9.0), Value::Bool(true));
        assert_eq!(eval(BinaryOp::Less, "x", 1.0), Value::Bool(false));
    }

    #[test]
    fn test_equality() {
        assert_eq!(eval(BinaryOp::Equal, "1", 1.0), Value::Bool(true));
        assert_eq!(eval(BinaryOp::StrictEqual, "1", 1.0), Value::Bool(false));
        assert_eq!(eval(BinaryOp::Equal, true, 1.0), Value::Bool(true));
        assert_eq!(eval(BinaryOp::Equal, Value::Null, 0.0), Value::Bool(false));
        assert_eq!(eval(BinaryOp::NotEqual, "a", "b"), Value::Bool(true));
        assert!(strict_equals(&Value::Raw("x".to_string()), &Value::from("x")));
    }

    #[test]
    fn test_logical_returns_operand() {
        assert_eq!(eval(BinaryOp::Or, Value::Null, "fallback"), Value::from("fallback"));
        assert_eq!(eval(BinaryOp::And, 0.0, "never"), Value::from(0.0));
    }

    #[test]
    fn test_member_and_index() {
        let value = Value::from(json!({"items": ["a", "b"], "name": "Ada"}));
        assert_eq!(value.member("name").unwrap(), Value::from("Ada"));
        assert_eq!(value.member("missing").unwrap(), Value::Null);
        let items = value.member("items").unwrap();
        assert_eq!(items.member("length").unwrap(), Value::from(2.0));
        assert_eq!(items.index(&Value::from(1.0)).unwrap(), Value::from("b"));
        assert_eq!(items.index(&Value::from(5.0)).unwrap(), Value::Null);
        assert_eq!(value.index(&Value::from("name")).unwrap(), Value::from("Ada"));
        assert_eq!(
            Value::Null.member("name").unwrap_err(),
            RenderError::NullReference {
                member: "name".to_string()
            }
        );
    }

    #[test]
    fn test_string_methods() {
        let s = Value::from(" Hello ");
        assert_eq!(s.call_method("trim", &[]).unwrap(), Value::from("Hello"));
        assert_eq!(s.call_method("toUpperCase", &[]).unwrap(), Value::from(" HELLO "));
        let s = Value::from("a,b,c");
        assert_eq!(s.call_method("split", &[Value::from(",")]).unwrap(), Value::from(vec!["a", "b", "c"]));
        assert_eq!(s.call_method("indexOf", &[Value::from("b")]).unwrap(), Value::from(2.0));
        assert_eq!(
            s.call_method("substring", &[Value::from(4.0), Value::from(2.0)]).unwrap(),
            Value::from("b,")
        );
        assert_eq!(s.call_method("slice", &[Value::from(-1.0)]).unwrap(), Value::from("c"));
    }

    #[test]
    fn test_array_methods() {
        let items = Value::from(vec!["x", "y"]);
        assert_eq!(items.call_method("join", &[Value::from(" - ")]).unwrap(), Value::from("x - y"));
        assert_eq!(items.call_method("join", &[]).unwrap(), Value::from("x,y"));
        assert_eq!(items.call_method("indexOf", &[Value::from("y")]).unwrap(), Value::from(1.0));
        assert_eq!(
            items.call_method("push", &[]).unwrap_err(),
            RenderError::UnknownMethod {
                name: "push".to_string(),
                type_name: "array"
            }
        );
    }

    #[test]
    fn test_iterate() {
        assert_eq!(Value::from("ab").iterate().unwrap(), vec![Value::from("a"), Value::from("b")]);
        assert_eq!(
            Value::from(json!({"b": 2, "a": 1})).iterate().unwrap(),
            vec![Value::from(1.0), Value::from(2.0)]
        );
        assert_eq!(
            Value::from(1.0).iterate().unwrap_err(),
            RenderError::NotIterable { type_name: "number" }
        );
    }

    #[test]
    fn test_json_round_trip() {
        let model = json!({"n": 1, "f": 1.5, "list": [true, null], "s": "x"});
        assert_eq!(Value::from(&model).to_json(), model);
    }
}
