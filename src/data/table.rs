//! Row-identified tables with named, heterogeneous columns.
//!
//! Used for tabular datasets, method metadata, ground truth and wide
//! performance tables.

use crate::data::Value;
use crate::error::{BenchError, Result};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// A table of `Value` cells with row identifiers and ordered column names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    /// Row identifiers in order.
    row_ids: Vec<String>,
    /// Column names in insertion order.
    column_names: Vec<String>,
    /// Column-major cells, parallel to `column_names`.
    columns: Vec<Vec<Value>>,
}

impl Table {
    /// Create a table with the given rows and no columns.
    pub fn new(row_ids: Vec<String>) -> Self {
        Self {
            row_ids,
            column_names: Vec::new(),
            columns: Vec::new(),
        }
    }

    /// Create a table from row-major cells.
    pub fn from_rows(
        row_ids: Vec<String>,
        column_names: Vec<String>,
        rows: Vec<Vec<Value>>,
    ) -> Result<Self> {
        if rows.len() != row_ids.len() {
            return Err(BenchError::Configuration(format!(
                "{} row identifiers for {} rows",
                row_ids.len(),
                rows.len()
            )));
        }
        let mut columns = vec![Vec::with_capacity(rows.len()); column_names.len()];
        for (i, row) in rows.into_iter().enumerate() {
            if row.len() != column_names.len() {
                return Err(BenchError::Configuration(format!(
                    "row '{}' has {} cells, expected {}",
                    row_ids[i],
                    row.len(),
                    column_names.len()
                )));
            }
            for (col, cell) in columns.iter_mut().zip(row) {
                col.push(cell);
            }
        }
        Ok(Self {
            row_ids,
            column_names,
            columns,
        })
    }

    /// Load a table from a TSV file.
    ///
    /// The first column holds row identifiers. Empty cells and `NA` are read
    /// as missing, cells that parse as numbers become numbers, everything
    /// else is kept as text.
    pub fn from_tsv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(true)
            .flexible(true)
            .from_path(path)?;

        let header: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
        if header.len() < 2 {
            return Err(BenchError::Configuration(
                "table must have an identifier column and at least one data column".to_string(),
            ));
        }
        let column_names: Vec<String> = header[1..].to_vec();

        let mut row_ids = Vec::new();
        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            let mut fields = record.iter();
            let Some(id) = fields.next() else { continue };
            row_ids.push(id.to_string());
            let mut row: Vec<Value> = fields.map(parse_cell).collect();
            row.resize(column_names.len(), Value::Missing);
            rows.push(row);
        }

        Self::from_rows(row_ids, column_names, rows)
    }

    /// Write the table to a TSV file, with `id_header` naming the identifier column.
    pub fn to_tsv<P: AsRef<Path>>(&self, path: P, id_header: &str) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);

        write!(writer, "{}", tsv_field(id_header))?;
        for name in &self.column_names {
            write!(writer, "\t{}", tsv_field(name))?;
        }
        writeln!(writer)?;

        for (i, id) in self.row_ids.iter().enumerate() {
            write!(writer, "{}", tsv_field(id))?;
            for col in &self.columns {
                write!(writer, "\t{}", tsv_field(&col[i].to_string()))?;
            }
            writeln!(writer)?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Serialize to a JSON string.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(BenchError::from)
    }

    /// Number of rows.
    pub fn n_rows(&self) -> usize {
        self.row_ids.len()
    }

    /// Number of columns.
    pub fn n_cols(&self) -> usize {
        self.column_names.len()
    }

    /// Row identifiers.
    pub fn row_ids(&self) -> &[String] {
        &self.row_ids
    }

    /// Column names.
    pub fn column_names(&self) -> &[String] {
        &self.column_names
    }

    /// Check if a column exists.
    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    fn column_index(&self, name: &str) -> Option<usize> {
        self.column_names.iter().position(|c| c == name)
    }

    /// Get the cells of a column.
    pub fn column(&self, name: &str) -> Option<&[Value]> {
        self.column_index(name).map(|i| self.columns[i].as_slice())
    }

    /// Get a single cell by row index and column name.
    pub fn get(&self, row: usize, column: &str) -> Option<&Value> {
        self.column(column).and_then(|c| c.get(row))
    }

    /// Get a row as (column name, value) pairs.
    pub fn row(&self, row: usize) -> Option<Vec<(&str, &Value)>> {
        if row >= self.n_rows() {
            return None;
        }
        Some(
            self.column_names
                .iter()
                .zip(&self.columns)
                .map(|(name, col)| (name.as_str(), &col[row]))
                .collect(),
        )
    }

    /// Get a column collapsed into a single vector value.
    ///
    /// Numeric or logical columns (missing allowed) become `Value::Numeric`,
    /// all-text columns become `Value::Strings`, anything else a `Value::List`.
    pub fn column_value(&self, name: &str) -> Option<Value> {
        let cells = self.column(name)?;
        if cells
            .iter()
            .all(|c| matches!(c, Value::Number(_) | Value::Bool(_) | Value::Missing))
        {
            let values = cells.iter().filter_map(Value::as_number).collect();
            return Some(Value::Numeric(values));
        }
        if cells.iter().all(|c| matches!(c, Value::Text(_))) {
            let values = cells
                .iter()
                .filter_map(|c| c.as_text().map(str::to_string))
                .collect();
            return Some(Value::Strings(values));
        }
        Some(Value::List(cells.to_vec()))
    }

    /// Insert a column, replacing any existing column of the same name.
    pub fn set_column(&mut self, name: &str, cells: Vec<Value>) -> Result<()> {
        if cells.len() != self.n_rows() {
            return Err(BenchError::Configuration(format!(
                "column '{}' has {} cells but the table has {} rows",
                name,
                cells.len(),
                self.n_rows()
            )));
        }
        match self.column_index(name) {
            Some(i) => self.columns[i] = cells,
            None => {
                self.column_names.push(name.to_string());
                self.columns.push(cells);
            }
        }
        Ok(())
    }

    /// Remove a column, returning its cells.
    pub fn remove_column(&mut self, name: &str) -> Option<Vec<Value>> {
        let i = self.column_index(name)?;
        self.column_names.remove(i);
        Some(self.columns.remove(i))
    }

    /// Keep only the rows at `indices`, in that order.
    pub fn subset_rows(&self, indices: &[usize]) -> Result<Self> {
        if let Some(&bad) = indices.iter().find(|&&i| i >= self.n_rows()) {
            return Err(BenchError::NotFound(format!(
                "row index {} (table has {} rows)",
                bad,
                self.n_rows()
            )));
        }
        Ok(Self {
            row_ids: indices.iter().map(|&i| self.row_ids[i].clone()).collect(),
            column_names: self.column_names.clone(),
            columns: self
                .columns
                .iter()
                .map(|col| indices.iter().map(|&i| col[i].clone()).collect())
                .collect(),
        })
    }

    /// Column-bind another table with identical row identifiers.
    pub fn hcat(&mut self, other: &Table) -> Result<()> {
        if self.row_ids != other.row_ids {
            return Err(BenchError::Configuration(
                "cannot column-bind tables with different row identifiers".to_string(),
            ));
        }
        for (name, cells) in other.column_names.iter().zip(&other.columns) {
            self.set_column(name, cells.clone())?;
        }
        Ok(())
    }
}

fn parse_cell(raw: &str) -> Value {
    let raw = raw.trim();
    if raw.is_empty() || raw == "NA" || raw == "na" {
        Value::Missing
    } else if raw == "TRUE" || raw == "FALSE" {
        Value::Bool(raw == "TRUE")
    } else if let Ok(v) = raw.parse::<f64>() {
        Value::Number(v)
    } else {
        Value::Text(raw.to_string())
    }
}

/// Tabs and line breaks inside a cell would shift columns or rows.
pub(crate) fn tsv_field(text: &str) -> Cow<'_, str> {
    if text.contains(['\t', '\n', '\r']) {
        Cow::Owned(text.replace(['\t', '\n', '\r'], " "))
    } else {
        Cow::Borrowed(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn sample_table() -> Table {
        Table::from_rows(
            vec!["a".into(), "b".into(), "c".into()],
            vec!["p".into(), "group".into()],
            vec![
                vec![Value::Number(0.01), Value::Text("x".into())],
                vec![Value::Number(0.5), Value::Text("y".into())],
                vec![Value::Missing, Value::Text("x".into())],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_from_tsv() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "id\tp\tgroup").unwrap();
        writeln!(file, "f1\t0.01\tcase").unwrap();
        writeln!(file, "f2\tNA\tcontrol").unwrap();
        file.flush().unwrap();

        let table = Table::from_tsv(file.path()).unwrap();
        assert_eq!(table.n_rows(), 2);
        assert_eq!(table.column_names(), &["p".to_string(), "group".to_string()]);
        assert_eq!(table.get(0, "p"), Some(&Value::Number(0.01)));
        assert!(table.get(1, "p").unwrap().is_missing());
        assert_eq!(table.get(1, "group"), Some(&Value::Text("control".into())));
    }

    #[test]
    fn test_tsv_roundtrip() {
        let table = sample_table();
        let file = NamedTempFile::new().unwrap();
        table.to_tsv(file.path(), "id").unwrap();
        let back = Table::from_tsv(file.path()).unwrap();
        assert_eq!(back, table);
    }

    #[test]
    fn test_to_tsv_flattens_line_breaks() {
        let mut table = Table::new(vec!["m1".into(), "m2".into()]);
        table
            .set_column(
                "error",
                vec![Value::from("panicked\tat\nline 3"), Value::Missing],
            )
            .unwrap();
        let file = NamedTempFile::new().unwrap();
        table.to_tsv(file.path(), "method").unwrap();

        let back = Table::from_tsv(file.path()).unwrap();
        assert_eq!(back.n_rows(), 2);
        assert_eq!(back.get(0, "error"), Some(&Value::Text("panicked at line 3".into())));
        assert!(back.get(1, "error").unwrap().is_missing());
    }

    #[test]
    fn test_column_value() {
        let table = sample_table();
        match table.column_value("p").unwrap() {
            Value::Numeric(v) => {
                assert_eq!(v.len(), 3);
                assert!(v[2].is_nan());
            }
            other => panic!("expected numeric column, got {:?}", other),
        }
        assert_eq!(
            table.column_value("group"),
            Some(Value::Strings(vec!["x".into(), "y".into(), "x".into()]))
        );
        assert!(table.column_value("P").is_none());
    }

    #[test]
    fn test_subset_rows() {
        let table = sample_table();
        let sub = table.subset_rows(&[2, 0]).unwrap();
        assert_eq!(sub.row_ids(), &["c".to_string(), "a".to_string()]);
        assert_eq!(sub.get(1, "p"), Some(&Value::Number(0.01)));
        assert!(table.subset_rows(&[3]).is_err());
    }

    #[test]
    fn test_set_column_length_check() {
        let mut table = sample_table();
        assert!(table.set_column("q", vec![Value::Missing]).is_err());
        table
            .set_column("p", vec![Value::Number(1.0); 3])
            .unwrap();
        assert_eq!(table.n_cols(), 2);
        assert_eq!(table.get(2, "p"), Some(&Value::Number(1.0)));
    }

    #[test]
    fn test_hcat() {
        let mut left = sample_table();
        let mut right = Table::new(left.row_ids().to_vec());
        right.set_column("q", vec![Value::Bool(true); 3]).unwrap();
        left.hcat(&right).unwrap();
        assert_eq!(left.n_cols(), 3);

        let other = Table::new(vec!["z".into()]);
        assert!(left.hcat(&other).is_err());
    }
}
