//! Built-in metrics for thresholded outputs against binary truth.
//!
//! A test case is called positive when its value is below `alpha` and is
//! truly positive when its truth is non-zero. Pairs where either side is
//! missing are skipped; rates with a zero denominator are `NaN`.

use crate::error::{BenchError, Result};
use crate::metric::{MetricArgs, MetricFunction};
use crate::result::BenchmarkResult;
use serde::Serialize;

/// Default significance threshold.
pub const DEFAULT_ALPHA: f64 = 0.1;

/// Metrics registered by [`add_all_default_metrics`].
pub const DEFAULT_METRICS: [&str; 5] = ["rejections", "TPR", "TNR", "FPR", "FNR"];

/// Description of a built-in metric.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MetricInfo {
    pub name: &'static str,
    pub description: &'static str,
    pub requires_truth: bool,
    pub default_alpha: f64,
}

const AVAILABLE: [MetricInfo; 6] = [
    MetricInfo {
        name: "rejections",
        description: "Number of values below alpha",
        requires_truth: false,
        default_alpha: DEFAULT_ALPHA,
    },
    MetricInfo {
        name: "TPR",
        description: "True positive rate, TP / (TP + FN)",
        requires_truth: true,
        default_alpha: DEFAULT_ALPHA,
    },
    MetricInfo {
        name: "TNR",
        description: "True negative rate, TN / (TN + FP)",
        requires_truth: true,
        default_alpha: DEFAULT_ALPHA,
    },
    MetricInfo {
        name: "FPR",
        description: "False positive rate, FP / (FP + TN)",
        requires_truth: true,
        default_alpha: DEFAULT_ALPHA,
    },
    MetricInfo {
        name: "FNR",
        description: "False negative rate, FN / (FN + TP)",
        requires_truth: true,
        default_alpha: DEFAULT_ALPHA,
    },
    MetricInfo {
        name: "FDR",
        description: "False discovery rate, FP / (FP + TP)",
        requires_truth: true,
        default_alpha: DEFAULT_ALPHA,
    },
];

/// Table of built-in metrics.
pub fn available_metrics() -> &'static [MetricInfo] {
    &AVAILABLE
}

/// Confusion counts at one threshold.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Confusion {
    tp: usize,
    fp: usize,
    tn: usize,
    fn_: usize,
}

fn confusion(query: &[f64], truth: &[f64], alpha: f64) -> Confusion {
    let mut c = Confusion::default();
    for (&q, &t) in query.iter().zip(truth) {
        if q.is_nan() || t.is_nan() {
            continue;
        }
        match (q < alpha, t != 0.0) {
            (true, true) => c.tp += 1,
            (true, false) => c.fp += 1,
            (false, false) => c.tn += 1,
            (false, true) => c.fn_ += 1,
        }
    }
    c
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        f64::NAN
    } else {
        num as f64 / den as f64
    }
}

fn rejections(query: &[f64], _truth: &[f64], args: &MetricArgs) -> f64 {
    let alpha = args.value("alpha");
    let observed: Vec<f64> = query.iter().copied().filter(|v| !v.is_nan()).collect();
    if observed.is_empty() {
        return f64::NAN;
    }
    observed.iter().filter(|&&v| v < alpha).count() as f64
}

fn rate(f: fn(&Confusion) -> (usize, usize)) -> impl Fn(&[f64], &[f64], &MetricArgs) -> f64 {
    move |query: &[f64], truth: &[f64], args: &MetricArgs| {
        let (num, den) = f(&confusion(query, truth, args.value("alpha")));
        ratio(num, den)
    }
}

/// Construct a built-in metric by name.
pub fn default_metric(name: &str) -> Result<MetricFunction> {
    let alpha = [("alpha", DEFAULT_ALPHA)];
    let function = match name {
        "rejections" => MetricFunction::standard(&alpha, rejections)?.without_truth(),
        "TPR" => MetricFunction::standard(&alpha, rate(|c| (c.tp, c.tp + c.fn_)))?,
        "TNR" => MetricFunction::standard(&alpha, rate(|c| (c.tn, c.tn + c.fp)))?,
        "FPR" => MetricFunction::standard(&alpha, rate(|c| (c.fp, c.fp + c.tn)))?,
        "FNR" => MetricFunction::standard(&alpha, rate(|c| (c.fn_, c.fn_ + c.tp)))?,
        "FDR" => MetricFunction::standard(&alpha, rate(|c| (c.fp, c.fp + c.tp)))?,
        other => {
            return Err(BenchError::NotFound(format!(
                "default metric '{}' (available: {})",
                other,
                AVAILABLE.iter().map(|m| m.name).collect::<Vec<_>>().join(", ")
            )))
        }
    };
    Ok(function)
}

/// Register the named built-in metrics for an assay.
///
/// Nothing is registered if any name is unknown.
pub fn add_default_metrics(result: &mut BenchmarkResult, assay: &str, names: &[&str]) -> Result<()> {
    let functions = names
        .iter()
        .map(|name| default_metric(name).map(|f| (*name, f)))
        .collect::<Result<Vec<_>>>()?;
    for (name, function) in functions {
        result.add_metric(assay, name, function)?;
    }
    Ok(())
}

/// Register rejections, TPR, TNR, FPR and FNR for an assay.
pub fn add_all_default_metrics(result: &mut BenchmarkResult, assay: &str) -> Result<()> {
    add_default_metrics(result, assay, &DEFAULT_METRICS)
}
