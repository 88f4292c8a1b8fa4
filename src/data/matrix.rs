//! Dense result matrices: rows are test cases, columns are methods.

use crate::data::table::tsv_field;
use crate::error::{BenchError, Result};
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// One assay's results, with `NaN` marking unavailable entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultMatrix {
    /// Values (rows × methods).
    data: DMatrix<f64>,
    /// Row identifiers (features / test cases).
    row_ids: Vec<String>,
    /// Method labels (column names).
    col_ids: Vec<String>,
}

impl ResultMatrix {
    /// Column-bind per-method vectors into a matrix.
    ///
    /// Every column must have exactly `row_ids.len()` entries.
    pub fn from_columns(
        row_ids: Vec<String>,
        col_ids: Vec<String>,
        columns: &[Vec<f64>],
    ) -> Result<Self> {
        if columns.len() != col_ids.len() {
            return Err(BenchError::Configuration(format!(
                "{} column labels for {} columns",
                col_ids.len(),
                columns.len()
            )));
        }
        let n_rows = row_ids.len();
        for (label, col) in col_ids.iter().zip(columns) {
            if col.len() != n_rows {
                return Err(BenchError::Assembly {
                    method: label.clone(),
                    reason: format!("output has length {}, expected {}", col.len(), n_rows),
                });
            }
        }
        let data = DMatrix::from_fn(n_rows, columns.len(), |i, j| columns[j][i]);
        Ok(Self {
            data,
            row_ids,
            col_ids,
        })
    }

    /// Number of rows.
    pub fn n_rows(&self) -> usize {
        self.data.nrows()
    }

    /// Number of columns (methods).
    pub fn n_cols(&self) -> usize {
        self.data.ncols()
    }

    /// Row identifiers.
    pub fn row_ids(&self) -> &[String] {
        &self.row_ids
    }

    /// Method labels.
    pub fn col_ids(&self) -> &[String] {
        &self.col_ids
    }

    /// Underlying dense matrix.
    pub fn data(&self) -> &DMatrix<f64> {
        &self.data
    }

    /// Get a single value.
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.data[(row, col)]
    }

    /// Get one method's column by label.
    pub fn column(&self, label: &str) -> Option<Vec<f64>> {
        let j = self.col_ids.iter().position(|c| c == label)?;
        Some(self.column_at(j))
    }

    /// Get a column by index.
    pub fn column_at(&self, j: usize) -> Vec<f64> {
        self.data.column(j).iter().copied().collect()
    }

    /// Keep only the columns at `indices`, in that order.
    pub fn select_columns(&self, indices: &[usize]) -> Self {
        Self {
            data: self.data.select_columns(indices.iter()),
            row_ids: self.row_ids.clone(),
            col_ids: indices.iter().map(|&j| self.col_ids[j].clone()).collect(),
        }
    }

    /// Keep only the rows at `indices`, in that order.
    pub fn select_rows(&self, indices: &[usize]) -> Self {
        Self {
            data: self.data.select_rows(indices.iter()),
            row_ids: indices.iter().map(|&i| self.row_ids[i].clone()).collect(),
            col_ids: self.col_ids.clone(),
        }
    }

    /// Compare values, treating two `NaN`s as equal.
    pub fn same_values(&self, other: &ResultMatrix) -> bool {
        self.row_ids == other.row_ids
            && self.col_ids == other.col_ids
            && self
                .data
                .iter()
                .zip(other.data.iter())
                .all(|(a, b)| (a.is_nan() && b.is_nan()) || a == b)
    }

    /// Write the matrix to a TSV file.
    pub fn to_tsv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);

        write!(writer, "feature_id")?;
        for label in &self.col_ids {
            write!(writer, "\t{}", tsv_field(label))?;
        }
        writeln!(writer)?;

        for (i, id) in self.row_ids.iter().enumerate() {
            write!(writer, "{}", tsv_field(id))?;
            for j in 0..self.n_cols() {
                let v = self.data[(i, j)];
                if v.is_nan() {
                    write!(writer, "\tNA")?;
                } else {
                    write!(writer, "\t{}", v)?;
                }
            }
            writeln!(writer)?;
        }
        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(prefix: &str, n: usize) -> Vec<String> {
        (1..=n).map(|i| format!("{}{}", prefix, i)).collect()
    }

    #[test]
    fn test_from_columns() {
        let m = ResultMatrix::from_columns(
            ids("r", 3),
            vec!["a".into(), "b".into()],
            &[vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]],
        )
        .unwrap();
        assert_eq!(m.n_rows(), 3);
        assert_eq!(m.n_cols(), 2);
        assert_eq!(m.get(2, 1), 6.0);
        assert_eq!(m.column("a"), Some(vec![1.0, 2.0, 3.0]));
    }

    #[test]
    fn test_length_mismatch_is_assembly_error() {
        let err = ResultMatrix::from_columns(
            ids("r", 3),
            vec!["a".into(), "b".into()],
            &[vec![1.0, 2.0, 3.0], vec![4.0]],
        )
        .unwrap_err();
        match err {
            BenchError::Assembly { method, .. } => assert_eq!(method, "b"),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_select_and_compare() {
        let m = ResultMatrix::from_columns(
            ids("r", 2),
            vec!["a".into(), "b".into()],
            &[vec![f64::NAN, 2.0], vec![3.0, 4.0]],
        )
        .unwrap();
        let b = m.select_columns(&[1]);
        assert_eq!(b.col_ids(), &["b".to_string()]);
        assert_eq!(b.column_at(0), vec![3.0, 4.0]);

        let r = m.select_rows(&[1]);
        assert_eq!(r.row_ids(), &["r2".to_string()]);
        assert_eq!(r.get(0, 0), 2.0);

        assert!(m.same_values(&m.clone()));
        assert!(!m.same_values(&b));
    }
}
