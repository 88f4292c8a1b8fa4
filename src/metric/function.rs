//! Metric functions with a fixed `(query, truth, ...)` signature.

use crate::error::{BenchError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

type MetricBody = Arc<dyn Fn(&[f64], &[f64], &MetricArgs) -> f64 + Send + Sync>;

/// A declared metric parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricParam {
    pub name: String,
    pub default: Option<f64>,
}

impl MetricParam {
    /// A parameter without a default.
    pub fn required(name: &str) -> Self {
        Self {
            name: name.to_string(),
            default: None,
        }
    }

    /// A parameter with a default value.
    pub fn with_default(name: &str, default: f64) -> Self {
        Self {
            name: name.to_string(),
            default: Some(default),
        }
    }
}

/// Values of the extra parameters for one metric invocation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricArgs {
    values: Vec<(String, f64)>,
}

impl MetricArgs {
    /// Get a parameter value.
    pub fn get(&self, name: &str) -> Option<f64> {
        self.values.iter().find(|(n, _)| n == name).map(|(_, v)| *v)
    }

    /// Get a parameter value, `NaN` if it is not set.
    pub fn value(&self, name: &str) -> f64 {
        self.get(name).unwrap_or(f64::NAN)
    }

    /// Iterate over `(name, value)` pairs in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.values.iter().map(|(n, v)| (n.as_str(), *v))
    }
}

/// A performance metric for one method's output on one assay.
///
/// The first two declared parameters are always `query` (the method's
/// column) and `truth` (the assay's ground truth). Every further parameter
/// carries a default, so the metric can be called with no extra arguments.
#[derive(Clone)]
pub struct MetricFunction {
    params: Vec<MetricParam>,
    requires_truth: bool,
    body: MetricBody,
}

impl MetricFunction {
    /// Create a metric from an explicit parameter list.
    ///
    /// Fails with a configuration error if the first two parameters are not
    /// `query` and `truth`, or if any extra parameter lacks a default.
    pub fn new<F>(params: Vec<MetricParam>, body: F) -> Result<Self>
    where
        F: Fn(&[f64], &[f64], &MetricArgs) -> f64 + Send + Sync + 'static,
    {
        validate(&params)?;
        Ok(Self {
            params,
            requires_truth: true,
            body: Arc::new(body),
        })
    }

    /// Create a metric taking `query`, `truth` and the given defaulted
    /// extra parameters.
    pub fn standard<F>(extra: &[(&str, f64)], body: F) -> Result<Self>
    where
        F: Fn(&[f64], &[f64], &MetricArgs) -> f64 + Send + Sync + 'static,
    {
        let mut params = vec![MetricParam::required("query"), MetricParam::required("truth")];
        params.extend(extra.iter().map(|(n, d)| MetricParam::with_default(n, *d)));
        Self::new(params, body)
    }

    /// Mark the metric as computable without ground truth.
    ///
    /// Such metrics receive an empty `truth` slice when the assay has none.
    pub fn without_truth(mut self) -> Self {
        self.requires_truth = false;
        self
    }

    /// Replace the default of an extra parameter.
    pub fn with_default(mut self, name: &str, value: f64) -> Result<Self> {
        let param = self.params[2..]
            .iter_mut()
            .find(|p| p.name == name)
            .ok_or_else(|| {
                BenchError::Configuration(format!("metric has no extra parameter '{}'", name))
            })?;
        param.default = Some(value);
        Ok(self)
    }

    /// All declared parameters, `query` and `truth` first.
    pub fn params(&self) -> &[MetricParam] {
        &self.params
    }

    /// Parameters after `query` and `truth`.
    pub fn extra_params(&self) -> &[MetricParam] {
        &self.params[2..]
    }

    /// Check if a parameter is declared.
    pub fn accepts(&self, name: &str) -> bool {
        self.extra_params().iter().any(|p| p.name == name)
    }

    /// Check if ground truth is needed.
    pub fn requires_truth(&self) -> bool {
        self.requires_truth
    }

    /// Extra parameter values: defaults, overridden by any declared name in
    /// `overrides`. Undeclared names are ignored.
    pub fn resolve_args(&self, overrides: &[(String, f64)]) -> MetricArgs {
        let values = self
            .extra_params()
            .iter()
            .map(|p| {
                let value = overrides
                    .iter()
                    .find(|(n, _)| *n == p.name)
                    .map(|(_, v)| *v)
                    .or(p.default)
                    .unwrap_or(f64::NAN);
                (p.name.clone(), value)
            })
            .collect();
        MetricArgs { values }
    }

    /// Evaluate the metric.
    pub fn call(&self, query: &[f64], truth: &[f64], args: &MetricArgs) -> f64 {
        (self.body)(query, truth, args)
    }

    /// Evaluate with default parameter values.
    pub fn call_default(&self, query: &[f64], truth: &[f64]) -> f64 {
        self.call(query, truth, &self.resolve_args(&[]))
    }
}

impl fmt::Debug for MetricFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetricFunction")
            .field("params", &self.params)
            .field("requires_truth", &self.requires_truth)
            .finish_non_exhaustive()
    }
}

fn validate(params: &[MetricParam]) -> Result<()> {
    let leading: Vec<&str> = params.iter().take(2).map(|p| p.name.as_str()).collect();
    if leading != ["query", "truth"] {
        return Err(BenchError::Configuration(format!(
            "metric functions must take (query, truth, ...) but the leading parameters are ({})",
            leading.join(", ")
        )));
    }
    for (i, param) in params.iter().enumerate().skip(2) {
        if param.default.is_none() {
            return Err(BenchError::Configuration(format!(
                "metric parameter '{}' must declare a default value",
                param.name
            )));
        }
        if params[..i].iter().any(|p| p.name == param.name) {
            return Err(BenchError::Configuration(format!(
                "metric parameter '{}' is declared twice",
                param.name
            )));
        }
    }
    Ok(())
}
