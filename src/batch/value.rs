//! Scalar cell values and column types

use serde::Deserialize;
use std::fmt;

/// Declared type of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    /// Every cell in the column is null
    Null,
    Boolean,
    Integer,
    Float,
    String,
}

impl DataType {
    /// Widest type able to hold values of both `self` and `other`
    ///
    /// Null unifies with anything, Integer widens to Float, and every other
    /// mismatch falls back to String.
    pub fn unify(self, other: DataType) -> DataType {
        match (self, other) {
            (a, b) if a == b => a,
            (DataType::Null, b) => b,
            (a, DataType::Null) => a,
            (DataType::Integer, DataType::Float) | (DataType::Float, DataType::Integer) => {
                DataType::Float
            }
            _ => DataType::String,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DataType::Null => "null",
            DataType::Boolean => "boolean",
            DataType::Integer => "integer",
            DataType::Float => "float",
            DataType::String => "string",
        };
        write!(f, "{}", name)
    }
}

/// A single cell
///
/// Deserializes untagged so a YAML scalar like `0`, `1.5`, `true` or
/// `"unknown"` maps onto the matching variant.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn data_type(&self) -> DataType {
        match self {
            Value::Null => DataType::Null,
            Value::Boolean(_) => DataType::Boolean,
            Value::Integer(_) => DataType::Integer,
            Value::Float(_) => DataType::Float,
            Value::String(_) => DataType::String,
        }
    }

    /// Convert to `target`, following the same widening as [`DataType::unify`]
    ///
    /// Nulls stay null. Conversions that would narrow (e.g. String to
    /// Integer) are never requested by callers and leave the value unchanged.
    pub fn cast(self, target: DataType) -> Value {
        match (self, target) {
            (Value::Null, _) => Value::Null,
            (Value::Integer(i), DataType::Float) => Value::Float(i as f64),
            (Value::String(s), DataType::String) => Value::String(s),
            (other, DataType::String) => Value::String(other.to_string()),
            (other, _) => other,
        }
    }

    /// Text form used for warehouse parameter binding; `None` for null
    pub fn to_text(&self) -> Option<String> {
        match self {
            Value::Null => None,
            other => Some(other.to_string()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::String(s) => write!(f, "{}", s),
        }
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

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Integer(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}
