//! Method arguments captured without evaluation.

use crate::data::{Dataset, Value};
use serde::{Deserialize, Serialize};
use std::fmt;

/// An argument is either a literal or a reference to a dataset field.
///
/// Field references are only looked up when the design is built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Arg {
    Literal(Value),
    Field(String),
}

impl Arg {
    /// A literal argument.
    pub fn literal(value: impl Into<Value>) -> Self {
        Arg::Literal(value.into())
    }

    /// A symbolic reference to a dataset field.
    pub fn field(name: &str) -> Self {
        Arg::Field(name.to_string())
    }

    /// Field name referenced by this argument, if any.
    pub fn field_name(&self) -> Option<&str> {
        match self {
            Arg::Field(name) => Some(name),
            Arg::Literal(_) => None,
        }
    }

    /// Bind the argument against a dataset.
    ///
    /// Returns `None` when a referenced field does not exist.
    pub fn resolve(&self, dataset: &Dataset) -> Option<Value> {
        match self {
            Arg::Literal(value) => Some(value.clone()),
            Arg::Field(name) => dataset.field(name),
        }
    }
}

impl fmt::Display for Arg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arg::Field(name) => write!(f, "{}", name),
            Arg::Literal(Value::Text(s)) => write!(f, "\"{}\"", s),
            Arg::Literal(value) => write!(f, "{}", value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve() {
        let ds = Dataset::from_fields(vec![("p".into(), Value::Numeric(vec![0.5]))]).unwrap();
        assert_eq!(
            Arg::field("p").resolve(&ds),
            Some(Value::Numeric(vec![0.5]))
        );
        assert_eq!(Arg::field("q").resolve(&ds), None);
        assert_eq!(Arg::literal(2.0).resolve(&ds), Some(Value::Number(2.0)));
    }

    #[test]
    fn test_display() {
        assert_eq!(Arg::field("pval").to_string(), "pval");
        assert_eq!(Arg::literal("BH").to_string(), "\"BH\"");
        assert_eq!(Arg::literal(0.05).to_string(), "0.05");
    }
}
