//! The input dataset a benchmark design is bound to.

use crate::data::{Table, Value};
use crate::error::{BenchError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Input data shared by every method of a design.
///
/// Symbolic argument references resolve against top-level columns of a
/// table, or against named fields of a field container. Lookup is
/// case-sensitive and requires an exact match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Dataset {
    /// Rows are test cases, columns are named fields.
    Table(Table),
    /// Heterogeneous named fields.
    Fields(Vec<(String, Value)>),
}

impl Dataset {
    /// Bind a dataset from an arbitrary value.
    ///
    /// Only a record (named fields) is accepted; anything else is not a
    /// dataset shape.
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Record(fields) => Self::from_fields(fields),
            other => Err(BenchError::Configuration(format!(
                "a dataset must be a table or a set of named fields, got {}",
                other.kind()
            ))),
        }
    }

    /// Bind a field container. Field names must be unique and non-empty.
    pub fn from_fields(fields: Vec<(String, Value)>) -> Result<Self> {
        for (i, (name, _)) in fields.iter().enumerate() {
            if name.is_empty() {
                return Err(BenchError::Configuration(
                    "dataset fields must be named".to_string(),
                ));
            }
            if fields[..i].iter().any(|(n, _)| n == name) {
                return Err(BenchError::Configuration(format!(
                    "dataset field '{}' appears more than once",
                    name
                )));
            }
        }
        Ok(Dataset::Fields(fields))
    }

    /// Load a tabular dataset from TSV.
    pub fn from_tsv<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Dataset::Table(Table::from_tsv(path)?))
    }

    /// Look up a field by exact name.
    pub fn field(&self, name: &str) -> Option<Value> {
        match self {
            Dataset::Table(table) => table.column_value(name),
            Dataset::Fields(fields) => fields
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.clone()),
        }
    }

    /// Check if a field exists.
    pub fn has_field(&self, name: &str) -> bool {
        match self {
            Dataset::Table(table) => table.has_column(name),
            Dataset::Fields(fields) => fields.iter().any(|(k, _)| k == name),
        }
    }

    /// Names of all top-level fields.
    pub fn field_names(&self) -> Vec<&str> {
        match self {
            Dataset::Table(table) => table.column_names().iter().map(String::as_str).collect(),
            Dataset::Fields(fields) => fields.iter().map(|(k, _)| k.as_str()).collect(),
        }
    }

    /// Row identifiers, if the dataset is tabular.
    pub fn row_ids(&self) -> Option<&[String]> {
        match self {
            Dataset::Table(table) => Some(table.row_ids()),
            Dataset::Fields(_) => None,
        }
    }
}

impl From<Table> for Dataset {
    fn from(table: Table) -> Self {
        Dataset::Table(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_lookup() {
        let ds = Dataset::from_fields(vec![
            ("p".into(), Value::Numeric(vec![0.1, 0.2])),
            ("label".into(), Value::Numeric(vec![1.0, 0.0])),
        ])
        .unwrap();
        assert_eq!(ds.field("p"), Some(Value::Numeric(vec![0.1, 0.2])));
        assert!(ds.field("P").is_none());
        assert!(ds.has_field("label"));
        assert_eq!(ds.field_names(), vec!["p", "label"]);
        assert!(ds.row_ids().is_none());
    }

    #[test]
    fn test_rejects_non_container() {
        let err = Dataset::from_value(Value::Numeric(vec![1.0])).unwrap_err();
        assert!(matches!(err, BenchError::Configuration(_)));

        let ok = Dataset::from_value(Value::Record(vec![("x".into(), Value::Number(1.0))]));
        assert!(ok.is_ok());
    }

    #[test]
    fn test_rejects_duplicate_fields() {
        let err = Dataset::from_fields(vec![
            ("x".into(), Value::Number(1.0)),
            ("x".into(), Value::Number(2.0)),
        ])
        .unwrap_err();
        assert!(matches!(err, BenchError::Configuration(_)));
    }

    #[test]
    fn test_table_dataset() {
        let table = Table::from_rows(
            vec!["r1".into(), "r2".into()],
            vec!["p".into()],
            vec![vec![Value::Number(0.3)], vec![Value::Number(0.7)]],
        )
        .unwrap();
        let ds = Dataset::from(table);
        assert_eq!(ds.field("p"), Some(Value::Numeric(vec![0.3, 0.7])));
        assert_eq!(ds.row_ids().unwrap().len(), 2);
    }
}
