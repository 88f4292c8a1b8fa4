//! Evaluating registered metrics over every method and parameter combination.

use crate::data::{Table, Value};
use crate::error::{BenchError, Result};
use crate::metric::MetricFunction;
use crate::result::BenchmarkResult;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::{debug, info, warn};

/// Candidate values per extra metric parameter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParamGrid {
    params: BTreeMap<String, Vec<f64>>,
}

impl ParamGrid {
    /// Create an empty grid.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the candidate values of a parameter.
    pub fn with(mut self, name: &str, values: Vec<f64>) -> Self {
        self.params.insert(name.to_string(), values);
        self
    }

    /// Parameter names, sorted.
    pub fn names(&self) -> Vec<&str> {
        self.params.keys().map(String::as_str).collect()
    }

    /// Check if the grid has no parameters.
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Cartesian product over all parameters.
    ///
    /// An empty grid has exactly one (empty) combination.
    pub fn combinations(&self) -> Vec<Vec<(String, f64)>> {
        self.combinations_where(|_| true)
    }

    /// Cartesian product over the parameters `keep` selects.
    fn combinations_where<F: Fn(&str) -> bool>(&self, keep: F) -> Vec<Vec<(String, f64)>> {
        let mut combos: Vec<Vec<(String, f64)>> = vec![Vec::new()];
        for (name, values) in self.params.iter().filter(|(n, _)| keep(n)) {
            combos = combos
                .into_iter()
                .flat_map(|prefix| {
                    values.iter().map(move |&v| {
                        let mut combo = prefix.clone();
                        combo.push((name.clone(), v));
                        combo
                    })
                })
                .collect();
        }
        combos
    }

    fn validate(&self) -> Result<()> {
        for (name, values) in &self.params {
            if values.is_empty() {
                return Err(BenchError::Configuration(format!(
                    "parameter grid entry '{}' has no values",
                    name
                )));
            }
        }
        Ok(())
    }
}

/// How evaluation output is shaped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvalOptions {
    /// Bind metric columns onto the method metadata instead of returning them.
    #[serde(default)]
    pub merge_into_metadata: bool,
    /// Long format: one record per value.
    #[serde(default)]
    pub tidy: bool,
}

impl EvalOptions {
    /// Wide output.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable long format.
    pub fn tidy(mut self, tidy: bool) -> Self {
        self.tidy = tidy;
        self
    }

    /// Enable merging into method metadata.
    pub fn merge_into_metadata(mut self, merge: bool) -> Self {
        self.merge_into_metadata = merge;
        self
    }
}

/// Evaluation configuration for serialization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvaluationConfig {
    #[serde(default)]
    pub grid: ParamGrid,
    #[serde(default)]
    pub tidy: bool,
    #[serde(default)]
    pub merge_into_metadata: bool,
}

impl EvaluationConfig {
    /// Load from YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(BenchError::from)
    }

    /// Save to YAML string.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(BenchError::from)
    }

    /// Output options.
    pub fn options(&self) -> EvalOptions {
        EvalOptions {
            merge_into_metadata: self.merge_into_metadata,
            tidy: self.tidy,
        }
    }
}

/// One metric value in long format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TidyRecord {
    pub label: String,
    pub assay: String,
    pub metric: String,
    /// Grid values used, for parameters the metric declares.
    pub params: Vec<(String, f64)>,
    pub value: f64,
}

/// Output of [`evaluate`].
#[derive(Debug, Clone, PartialEq)]
pub enum Evaluation {
    /// One row per method and grid combination, one column per metric.
    Wide(Table),
    /// One record per method, metric and grid combination.
    Tidy(Vec<TidyRecord>),
    /// Metrics were bound onto the method metadata; holds the new column names.
    Merged(Vec<String>),
}

impl Evaluation {
    /// Tabular form, for writing. `None` for merged output.
    pub fn to_table(&self) -> Result<Option<Table>> {
        match self {
            Evaluation::Wide(table) => Ok(Some(table.clone())),
            Evaluation::Tidy(records) => tidy_table(records).map(Some),
            Evaluation::Merged(_) => Ok(None),
        }
    }
}

/// Method columns and truth of one assay, gathered once.
struct AssayData<'a> {
    name: &'a str,
    columns: Vec<Vec<f64>>,
    truth: Option<Vec<f64>>,
    metrics: &'a [(String, MetricFunction)],
}

fn gather(result: &BenchmarkResult) -> Vec<AssayData<'_>> {
    result
        .assays()
        .filter_map(|(name, matrix)| {
            let metrics = result.metrics().metrics_for(name);
            if metrics.is_empty() {
                return None;
            }
            Some(AssayData {
                name,
                columns: (0..matrix.n_cols()).map(|j| matrix.column_at(j)).collect(),
                truth: result.truth_for(name),
                metrics,
            })
        })
        .collect()
}

/// Evaluate one metric; `NaN` when truth is needed but absent or the metric panics.
fn score(
    assay: &AssayData<'_>,
    metric: &str,
    function: &MetricFunction,
    query: &[f64],
    combo: &[(String, f64)],
) -> f64 {
    let truth: &[f64] = match (&assay.truth, function.requires_truth()) {
        (Some(t), _) => t.as_slice(),
        (None, false) => &[],
        (None, true) => return f64::NAN,
    };
    let args = function.resolve_args(combo);
    match catch_unwind(AssertUnwindSafe(|| function.call(query, truth, &args))) {
        Ok(v) => v,
        Err(_) => {
            warn!("Metric '{}' panicked on assay '{}'", metric, assay.name);
            f64::NAN
        }
    }
}

/// Restrict a combination to the parameters a metric declares.
fn declared(function: &MetricFunction, combo: &[(String, f64)]) -> Vec<(String, f64)> {
    combo
        .iter()
        .filter(|(n, _)| function.accepts(n))
        .cloned()
        .collect()
}

fn check_grid(result: &BenchmarkResult, grid: &ParamGrid) -> Result<()> {
    grid.validate()?;
    for name in grid.names() {
        let used = result.metrics().assays().into_iter().any(|assay| {
            result
                .metrics()
                .metrics_for(assay)
                .iter()
                .any(|(_, f)| f.accepts(name))
        });
        if !used {
            warn!("Grid parameter '{}' is not declared by any metric; ignoring", name);
        }
    }
    Ok(())
}

/// Long format: assays in result order, then metrics in registration order,
/// then methods, then the combinations of grid values the metric declares.
pub fn evaluate_tidy(result: &BenchmarkResult, grid: &ParamGrid) -> Result<Vec<TidyRecord>> {
    check_grid(result, grid)?;
    let labels = result.method_labels();
    let mut records = Vec::new();

    for assay in gather(result) {
        for (metric, function) in assay.metrics {
            let combos = grid.combinations_where(|n| function.accepts(n));
            for (label, query) in labels.iter().zip(&assay.columns) {
                for combo in &combos {
                    records.push(TidyRecord {
                        label: label.clone(),
                        assay: assay.name.to_string(),
                        metric: metric.clone(),
                        params: combo.clone(),
                        value: score(&assay, metric, function, query, combo),
                    });
                }
            }
        }
    }
    debug!("Computed {} metric values", records.len());
    Ok(records)
}

/// Wide format: one row per method and full grid combination.
///
/// Columns are `label`, one per grid parameter, then `<assay>.<metric>`.
pub fn evaluate_wide(result: &BenchmarkResult, grid: &ParamGrid) -> Result<Table> {
    check_grid(result, grid)?;
    let labels = result.method_labels();
    let combos = grid.combinations();
    let assays = gather(result);

    let mut row_ids = Vec::new();
    let mut label_cells = Vec::new();
    let mut param_cells: Vec<Vec<Value>> = vec![Vec::new(); grid.names().len()];
    let mut metric_cells: Vec<(String, Vec<Value>)> = assays
        .iter()
        .flat_map(|a| {
            a.metrics
                .iter()
                .map(move |(m, _)| (format!("{}.{}", a.name, m), Vec::new()))
        })
        .collect();

    for (j, label) in labels.iter().enumerate() {
        for combo in &combos {
            row_ids.push(format!("{}{}", label, combo_suffix(combo)));
            label_cells.push(Value::from(label.as_str()));
            for (cells, (_, v)) in param_cells.iter_mut().zip(combo) {
                cells.push(Value::Number(*v));
            }
            let values = assays.iter().flat_map(|a| {
                a.metrics.iter().map(move |(metric, function)| {
                    score(a, metric, function, &a.columns[j], &declared(function, combo))
                })
            });
            for ((_, cells), v) in metric_cells.iter_mut().zip(values) {
                cells.push(Value::Number(v));
            }
        }
    }

    let mut seen: Vec<&str> = vec!["label"];
    for name in grid.names().into_iter().chain(metric_cells.iter().map(|(n, _)| n.as_str())) {
        if seen.contains(&name) {
            return Err(BenchError::Configuration(format!(
                "wide output would have two columns named '{}'",
                name
            )));
        }
        seen.push(name);
    }

    let mut table = Table::new(row_ids);
    table.set_column("label", label_cells)?;
    for (name, cells) in grid.names().into_iter().zip(param_cells) {
        table.set_column(name, cells)?;
    }
    for (name, cells) in metric_cells {
        table.set_column(&name, cells)?;
    }
    Ok(table)
}

/// Bind one column per assay, metric and declared grid combination onto
/// the method metadata. Returns the new column names.
pub fn merge_into_metadata(result: &mut BenchmarkResult, grid: &ParamGrid) -> Result<Vec<String>> {
    check_grid(result, grid)?;
    let mut columns: Vec<(String, Vec<Value>)> = Vec::new();

    for assay in gather(result) {
        for (metric, function) in assay.metrics {
            for combo in grid.combinations_where(|n| function.accepts(n)) {
                let name = format!("{}.{}{}", assay.name, metric, combo_suffix(&combo));
                let cells = assay
                    .columns
                    .iter()
                    .map(|query| Value::Number(score(&assay, metric, function, query, &combo)))
                    .collect();
                columns.push((name, cells));
            }
        }
    }

    let metadata = result.method_metadata_mut();
    for (name, cells) in &columns {
        metadata.set_column(name, cells.clone())?;
    }
    Ok(columns.into_iter().map(|(name, _)| name).collect())
}

/// Evaluate every registered metric.
///
/// Assays without ground truth yield `NaN` for metrics that need it. With
/// `merge_into_metadata`, the `tidy` option is ignored.
pub fn evaluate(
    result: &mut BenchmarkResult,
    grid: &ParamGrid,
    options: &EvalOptions,
) -> Result<Evaluation> {
    if result.metrics().is_empty() {
        warn!("No metrics registered; evaluation output will be empty");
    }
    let evaluation = if options.merge_into_metadata {
        Evaluation::Merged(merge_into_metadata(result, grid)?)
    } else if options.tidy {
        Evaluation::Tidy(evaluate_tidy(result, grid)?)
    } else {
        Evaluation::Wide(evaluate_wide(result, grid)?)
    };
    info!(
        "Evaluated metrics on {} assays for {} methods",
        result.metrics().assays().len(),
        result.n_methods()
    );
    Ok(evaluation)
}

fn combo_suffix(combo: &[(String, f64)]) -> String {
    if combo.is_empty() {
        return String::new();
    }
    let parts: Vec<String> = combo.iter().map(|(n, v)| format!("{}={}", n, v)).collect();
    format!("[{}]", parts.join(","))
}

fn tidy_table(records: &[TidyRecord]) -> Result<Table> {
    let mut table = Table::new((1..=records.len()).map(|i| i.to_string()).collect());
    let text = |f: fn(&TidyRecord) -> &str| -> Vec<Value> {
        records.iter().map(|r| Value::from(f(r))).collect()
    };
    table.set_column("label", text(|r| r.label.as_str()))?;
    table.set_column("assay", text(|r| r.assay.as_str()))?;
    table.set_column("metric", text(|r| r.metric.as_str()))?;
    table.set_column(
        "params",
        records
            .iter()
            .map(|r| Value::from(combo_suffix(&r.params)))
            .collect(),
    )?;
    table.set_column(
        "value",
        records.iter().map(|r| Value::Number(r.value)).collect(),
    )?;
    Ok(table)
}
