// ----------------------------
// File: src/interp/value.rs
// ----------------------------

use std::fmt;

use crate::interp::{CoercionSnafu, RuntimeError, UnsupportedImmediateSnafu};

/// A runtime value. `Unknown` is the zero value for never-written slots.
#[derive(Clone, Debug, PartialEq, Default)]
pub enum Value {
    #[default]
    Unknown,
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
}

impl Value {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Unknown => "unknown",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Bool(_) => "bool",
            Value::Str(_) => "string",
        }
    }

    pub fn as_i64(&self) -> Result<i64, RuntimeError> {
        match self {
            Value::Int(v) => Ok(*v),
            Value::Float(v) => Ok(*v as i64),
            Value::Bool(b) => Ok(i64::from(*b)),
            _ => CoercionSnafu { from: self.kind_name(), to: "int" }.fail(),
        }
    }

    pub fn as_f64(&self) -> Result<f64, RuntimeError> {
        match self {
            Value::Float(v) => Ok(*v),
            Value::Int(v) => Ok(*v as f64),
            Value::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
            _ => CoercionSnafu { from: self.kind_name(), to: "float" }.fail(),
        }
    }

    pub fn as_bool(&self) -> Result<bool, RuntimeError> {
        match self {
            Value::Bool(b) => Ok(*b),
            Value::Int(v) => Ok(*v != 0),
            Value::Float(v) => Ok(v.abs() > 0.0),
            _ => CoercionSnafu { from: self.kind_name(), to: "bool" }.fail(),
        }
    }

    pub fn is_float(&self) -> bool {
        matches!(self, Value::Float(_))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Unknown => f.write_str("<nil>"),
            Value::Int(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Bool(b) => f.write_str(if *b { "true" } else { "false" }),
            Value::Str(s) => f.write_str(s),
        }
    }
}

/// Decode an immediate operand: `#1`, `#3.14`, `#true`, or `#"…"` (the
/// quotes are retained around string contents in the IR).
pub fn parse_immediate(imm: &str) -> Result<Value, RuntimeError> {
    let Some(body) = imm.strip_prefix('#') else {
        return UnsupportedImmediateSnafu { imm }.fail();
    };

    if body == "true" {
        return Ok(Value::Bool(true));
    }
    if body == "false" {
        return Ok(Value::Bool(false));
    }

    if body.len() >= 2 && body.starts_with('"') && body.ends_with('"') {
        return Ok(Value::Str(body[1..body.len() - 1].to_string()));
    }

    if let Ok(v) = body.parse::<i64>() {
        return Ok(Value::Int(v));
    }
    if let Ok(v) = body.parse::<f64>() {
        return Ok(Value::Float(v));
    }

    UnsupportedImmediateSnafu { imm }.fail()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn immediates_decode_by_shape() {
        assert_eq!(parse_immediate("#42").expect("int"), Value::Int(42));
        assert_eq!(parse_immediate("#-7").expect("int"), Value::Int(-7));
        assert_eq!(parse_immediate("#2.5").expect("float"), Value::Float(2.5));
        assert_eq!(parse_immediate("#1e3").expect("float"), Value::Float(1000.0));
        assert_eq!(parse_immediate("#true").expect("bool"), Value::Bool(true));
        assert_eq!(parse_immediate("#false").expect("bool"), Value::Bool(false));
        assert_eq!(parse_immediate("#\"hi\"").expect("string"), Value::Str("hi".into()));
    }

    #[test]
    fn malformed_immediates_error() {
        assert!(parse_immediate("42").is_err());
        assert!(parse_immediate("#abc").is_err());
    }

    #[test]
    fn conversions_cross_numeric_kinds() {
        assert_eq!(Value::Float(2.9).as_i64().expect("convert"), 2);
        assert_eq!(Value::Int(3).as_f64().expect("convert"), 3.0);
        assert!(Value::Int(1).as_bool().expect("convert"));
        assert!(!Value::Float(0.0).as_bool().expect("convert"));
        assert!(Value::Str("x".into()).as_i64().is_err());
        assert!(Value::Unknown.as_bool().is_err());
    }
}
