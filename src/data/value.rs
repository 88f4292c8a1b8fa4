//! Dynamically shaped values passed between datasets, methods and tables.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A value that can be a scalar, a vector, or a named collection.
///
/// Numeric vectors use `NaN` as the missing marker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Value {
    /// Missing value.
    Missing,
    /// Logical scalar.
    Bool(bool),
    /// Numeric scalar.
    Number(f64),
    /// Text scalar.
    Text(String),
    /// Numeric vector.
    Numeric(Vec<f64>),
    /// Text vector.
    Strings(Vec<String>),
    /// Vector of heterogeneous values.
    List(Vec<Value>),
    /// Named fields, in insertion order.
    Record(Vec<(String, Value)>),
}

impl Value {
    /// Check if this is a missing value.
    pub fn is_missing(&self) -> bool {
        matches!(self, Value::Missing)
    }

    /// Try to get as a numeric scalar.
    ///
    /// Booleans map to 0/1 and missing maps to `NaN`.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(v) => Some(*v),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Value::Missing => Some(f64::NAN),
            _ => None,
        }
    }

    /// Try to get as a text scalar.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Look up a named field of a record.
    pub fn field(&self, name: &str) -> Option<&Value> {
        match self {
            Value::Record(fields) => fields.iter().find(|(k, _)| k == name).map(|(_, v)| v),
            _ => None,
        }
    }

    /// Number of elements (1 for scalars, 0 for missing).
    pub fn len(&self) -> usize {
        match self {
            Value::Missing => 0,
            Value::Bool(_) | Value::Number(_) | Value::Text(_) => 1,
            Value::Numeric(v) => v.len(),
            Value::Strings(v) => v.len(),
            Value::List(v) => v.len(),
            Value::Record(v) => v.len(),
        }
    }

    /// Check if the value holds no elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Short name of the value's shape, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Missing => "missing",
            Value::Bool(_) => "bool",
            Value::Number(_) => "number",
            Value::Text(_) => "text",
            Value::Numeric(_) => "numeric vector",
            Value::Strings(_) => "string vector",
            Value::List(_) => "list",
            Value::Record(_) => "record",
        }
    }

    /// Convert to a numeric vector.
    ///
    /// Scalars become length-one vectors; lists must hold only numeric scalars
    /// or missing values. Text and records cannot be converted.
    pub fn to_numeric_vec(&self) -> Option<Vec<f64>> {
        match self {
            Value::Number(_) | Value::Bool(_) => self.as_number().map(|v| vec![v]),
            Value::Numeric(v) => Some(v.clone()),
            Value::List(items) => items.iter().map(Value::as_number).collect(),
            _ => None,
        }
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Number(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<Vec<f64>> for Value {
    fn from(v: Vec<f64>) -> Self {
        Value::Numeric(v)
    }
}

impl From<Vec<String>> for Value {
    fn from(v: Vec<String>) -> Self {
        Value::Strings(v)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Missing => write!(f, "NA"),
            Value::Bool(b) => write!(f, "{}", if *b { "TRUE" } else { "FALSE" }),
            Value::Number(v) if v.is_nan() => write!(f, "NA"),
            Value::Number(v) => write!(f, "{}", v),
            Value::Text(s) => write!(f, "{}", s),
            Value::Numeric(v) => {
                write!(f, "[")?;
                for (i, x) in v.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    if x.is_nan() {
                        write!(f, "NA")?;
                    } else {
                        write!(f, "{}", x)?;
                    }
                }
                write!(f, "]")
            }
            Value::Strings(v) => write!(f, "[{}]", v.join(", ")),
            Value::List(v) => {
                write!(f, "[")?;
                for (i, x) in v.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", x)?;
                }
                write!(f, "]")
            }
            Value::Record(fields) => {
                write!(f, "{{")?;
                for (i, (k, v)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", k, v)?;
                }
                write!(f, "}}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_conversion() {
        assert_eq!(Value::Number(2.0).to_numeric_vec(), Some(vec![2.0]));
        assert_eq!(Value::Bool(true).to_numeric_vec(), Some(vec![1.0]));
        assert_eq!(
            Value::Numeric(vec![0.1, 0.2]).to_numeric_vec(),
            Some(vec![0.1, 0.2])
        );
        let list = Value::List(vec![Value::Number(1.0), Value::Missing]);
        let converted = list.to_numeric_vec().unwrap();
        assert_eq!(converted[0], 1.0);
        assert!(converted[1].is_nan());
        assert_eq!(Value::Text("a".into()).to_numeric_vec(), None);
    }

    #[test]
    fn test_record_field() {
        let rec = Value::Record(vec![
            ("pvalue".into(), Value::Numeric(vec![0.5])),
            ("lfc".into(), Value::Numeric(vec![1.5])),
        ]);
        assert_eq!(rec.field("lfc"), Some(&Value::Numeric(vec![1.5])));
        assert!(rec.field("LFC").is_none());
        assert_eq!(rec.len(), 2);
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::Number(0.5).to_string(), "0.5");
        assert_eq!(Value::Missing.to_string(), "NA");
        assert_eq!(Value::Numeric(vec![1.0, f64::NAN]).to_string(), "[1, NA]");
        assert_eq!(Value::Bool(false).to_string(), "FALSE");
    }
}
