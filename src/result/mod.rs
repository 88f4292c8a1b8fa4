//! The output of a build: assays, method metadata, ground truth and metrics.

use crate::data::{ResultMatrix, Table};
use crate::error::{BenchError, Result};
use crate::metric::{MetricFunction, MetricRegistry};
use chrono::{DateTime, Utc};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

/// Result of building a benchmark design.
///
/// Every assay matrix has the same rows (test cases) and the same columns
/// (method labels, in design order). Method metadata has one row per method
/// and ground truth one row per test case, both in matching order.
#[derive(Debug, Clone)]
pub struct BenchmarkResult {
    assays: Vec<(String, ResultMatrix)>,
    method_metadata: Table,
    ground_truth: Option<Table>,
    metrics: MetricRegistry,
    built_at: DateTime<Utc>,
}

impl BenchmarkResult {
    /// Assemble a result, checking that all parts are aligned.
    pub(crate) fn new(
        assays: Vec<(String, ResultMatrix)>,
        method_metadata: Table,
        ground_truth: Option<Table>,
    ) -> Result<Self> {
        let (_, first) = assays.first().ok_or_else(|| {
            BenchError::Configuration("a benchmark result needs at least one assay".to_string())
        })?;
        for (name, m) in &assays[1..] {
            if m.row_ids() != first.row_ids() || m.col_ids() != first.col_ids() {
                return Err(BenchError::Assembly {
                    method: name.clone(),
                    reason: "assay is not aligned with the other assays".to_string(),
                });
            }
        }
        if method_metadata.row_ids() != first.col_ids() {
            return Err(BenchError::Configuration(
                "method metadata rows do not match assay columns".to_string(),
            ));
        }
        if let Some(truth) = &ground_truth {
            if truth.row_ids() != first.row_ids() {
                return Err(BenchError::Configuration(
                    "ground truth rows do not match assay rows".to_string(),
                ));
            }
        }
        Ok(Self {
            assays,
            method_metadata,
            ground_truth,
            metrics: MetricRegistry::new(),
            built_at: Utc::now(),
        })
    }

    /// Assay names in creation order.
    pub fn assay_names(&self) -> Vec<&str> {
        self.assays.iter().map(|(n, _)| n.as_str()).collect()
    }

    /// Get an assay matrix.
    pub fn assay(&self, name: &str) -> Option<&ResultMatrix> {
        self.assays.iter().find(|(n, _)| n == name).map(|(_, m)| m)
    }

    /// Check if an assay exists.
    pub fn has_assay(&self, name: &str) -> bool {
        self.assay(name).is_some()
    }

    /// Iterate over `(name, matrix)` pairs.
    pub fn assays(&self) -> impl Iterator<Item = (&str, &ResultMatrix)> {
        self.assays.iter().map(|(n, m)| (n.as_str(), m))
    }

    /// Method labels, matching assay columns.
    pub fn method_labels(&self) -> &[String] {
        self.method_metadata.row_ids()
    }

    /// Test-case identifiers, matching assay rows.
    pub fn row_ids(&self) -> &[String] {
        self.assays
            .first()
            .map(|(_, m)| m.row_ids())
            .unwrap_or(&[])
    }

    /// Number of test cases.
    pub fn n_rows(&self) -> usize {
        self.row_ids().len()
    }

    /// Number of methods.
    pub fn n_methods(&self) -> usize {
        self.method_labels().len()
    }

    /// Per-method metadata table.
    pub fn method_metadata(&self) -> &Table {
        &self.method_metadata
    }

    pub(crate) fn method_metadata_mut(&mut self) -> &mut Table {
        &mut self.method_metadata
    }

    /// Ground truth table, one column per assay that has truth.
    pub fn ground_truth(&self) -> Option<&Table> {
        self.ground_truth.as_ref()
    }

    /// Ground truth for one assay as numbers; missing cells are `NaN`.
    pub fn truth_for(&self, assay: &str) -> Option<Vec<f64>> {
        let cells = self.ground_truth.as_ref()?.column(assay)?;
        Some(
            cells
                .iter()
                .map(|c| c.as_number().unwrap_or(f64::NAN))
                .collect(),
        )
    }

    /// Registered metrics.
    pub fn metrics(&self) -> &MetricRegistry {
        &self.metrics
    }

    /// When the result was built.
    pub fn built_at(&self) -> DateTime<Utc> {
        self.built_at
    }

    /// Register a metric for an assay.
    pub fn add_metric(&mut self, assay: &str, name: &str, function: MetricFunction) -> Result<()> {
        if !self.has_assay(assay) {
            return Err(BenchError::Configuration(format!(
                "cannot add metric '{}': assay '{}' does not exist (available: {})",
                name,
                assay,
                self.assay_names().join(", ")
            )));
        }
        self.metrics.register(assay, name, function);
        Ok(())
    }

    /// Remove a registered metric.
    pub fn remove_metric(&mut self, assay: &str, name: &str) -> Result<MetricFunction> {
        self.metrics.remove(assay, name).ok_or_else(|| {
            BenchError::NotFound(format!("metric '{}' on assay '{}'", name, assay))
        })
    }

    /// Keep only the named methods, in the given order.
    ///
    /// Assay columns and metadata rows are subset together.
    pub fn subset_methods(&self, labels: &[&str]) -> Result<Self> {
        if let Some((i, _)) = labels
            .iter()
            .enumerate()
            .find(|&(i, label)| labels[..i].contains(label))
        {
            return Err(BenchError::DuplicateLabel(labels[i].to_string()));
        }
        let indices = labels
            .iter()
            .map(|label| {
                self.method_labels()
                    .iter()
                    .position(|l| l.as_str() == *label)
                    .ok_or_else(|| BenchError::NotFound(format!("method '{}'", label)))
            })
            .collect::<Result<Vec<_>>>()?;
        debug!("Subsetting result to {} methods", indices.len());

        Ok(Self {
            assays: self
                .assays
                .iter()
                .map(|(n, m)| (n.clone(), m.select_columns(&indices)))
                .collect(),
            method_metadata: self.method_metadata.subset_rows(&indices)?,
            ground_truth: self.ground_truth.clone(),
            metrics: self.metrics.clone(),
            built_at: self.built_at,
        })
    }

    /// Keep only the test cases at `indices`, in that order.
    ///
    /// Assay rows and ground truth rows are subset together.
    pub fn subset_rows(&self, indices: &[usize]) -> Result<Self> {
        if let Some(&bad) = indices.iter().find(|&&i| i >= self.n_rows()) {
            return Err(BenchError::NotFound(format!(
                "row index {} (result has {} rows)",
                bad,
                self.n_rows()
            )));
        }
        Ok(Self {
            assays: self
                .assays
                .iter()
                .map(|(n, m)| (n.clone(), m.select_rows(indices)))
                .collect(),
            method_metadata: self.method_metadata.clone(),
            ground_truth: self
                .ground_truth
                .as_ref()
                .map(|t| t.subset_rows(indices))
                .transpose()?,
            metrics: self.metrics.clone(),
            built_at: self.built_at,
        })
    }

    /// Compare assays, metadata and ground truth, ignoring the build time.
    pub fn same_results(&self, other: &BenchmarkResult) -> bool {
        self.assays.len() == other.assays.len()
            && self
                .assays
                .iter()
                .zip(&other.assays)
                .all(|((na, a), (nb, b))| na == nb && a.same_values(b))
            && self.method_metadata == other.method_metadata
            && self.ground_truth == other.ground_truth
    }

    /// Write every part of the result as TSV files into `dir`.
    ///
    /// Produces `assay_<name>.tsv` per assay, `metadata.tsv` and, when
    /// present, `truth.tsv`.
    pub fn write_tsv_dir<P: AsRef<Path>>(&self, dir: P) -> Result<()> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        for (name, matrix) in &self.assays {
            matrix.to_tsv(dir.join(format!("assay_{}.tsv", name)))?;
        }
        self.method_metadata
            .to_tsv(dir.join("metadata.tsv"), "method")?;
        if let Some(truth) = &self.ground_truth {
            truth.to_tsv(dir.join("truth.tsv"), "feature_id")?;
        }
        info!("Wrote benchmark result to {}", dir.display());
        Ok(())
    }
}
