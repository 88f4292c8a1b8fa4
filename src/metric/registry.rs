//! Per-assay metric registry owned by a benchmark result.

use crate::metric::MetricFunction;
use tracing::{debug, warn};

/// Named metrics grouped by assay, in registration order.
#[derive(Debug, Clone, Default)]
pub struct MetricRegistry {
    assays: Vec<(String, Vec<(String, MetricFunction)>)>,
}

impl MetricRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a metric for an assay, replacing one with the same name.
    ///
    /// Assay existence is checked by [`crate::result::BenchmarkResult::add_metric`].
    pub fn register(&mut self, assay: &str, name: &str, function: MetricFunction) {
        let idx = match self.assays.iter().position(|(a, _)| a == assay) {
            Some(i) => i,
            None => {
                self.assays.push((assay.to_string(), Vec::new()));
                self.assays.len() - 1
            }
        };
        let metrics = &mut self.assays[idx].1;
        match metrics.iter_mut().find(|(n, _)| n == name) {
            Some(entry) => {
                warn!("Replacing metric '{}' on assay '{}'", name, assay);
                entry.1 = function;
            }
            None => {
                debug!("Registering metric '{}' on assay '{}'", name, assay);
                metrics.push((name.to_string(), function));
            }
        }
    }

    /// Remove a metric, returning it.
    pub fn remove(&mut self, assay: &str, name: &str) -> Option<MetricFunction> {
        let idx = self.assays.iter().position(|(a, _)| a == assay)?;
        let metrics = &mut self.assays[idx].1;
        let pos = metrics.iter().position(|(n, _)| n == name)?;
        let (_, function) = metrics.remove(pos);
        if metrics.is_empty() {
            self.assays.remove(idx);
        }
        Some(function)
    }

    /// Metrics registered for an assay.
    pub fn metrics_for(&self, assay: &str) -> &[(String, MetricFunction)] {
        self.assays
            .iter()
            .find(|(a, _)| a == assay)
            .map(|(_, m)| m.as_slice())
            .unwrap_or(&[])
    }

    /// Metric names registered for an assay.
    pub fn metric_names(&self, assay: &str) -> Vec<&str> {
        self.metrics_for(assay).iter().map(|(n, _)| n.as_str()).collect()
    }

    /// Look up one metric.
    pub fn get(&self, assay: &str, name: &str) -> Option<&MetricFunction> {
        self.metrics_for(assay)
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, f)| f)
    }

    /// Assays with at least one metric, in registration order.
    pub fn assays(&self) -> Vec<&str> {
        self.assays.iter().map(|(a, _)| a.as_str()).collect()
    }

    /// Check if no metric is registered.
    pub fn is_empty(&self) -> bool {
        self.assays.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn constant(v: f64) -> MetricFunction {
        MetricFunction::standard(&[], move |_, _, _| v).unwrap()
    }

    #[test]
    fn test_register_and_replace() {
        let mut reg = MetricRegistry::new();
        reg.register("pv", "a", constant(1.0));
        reg.register("pv", "b", constant(2.0));
        reg.register("lfc", "a", constant(3.0));
        reg.register("pv", "a", constant(4.0));

        assert_eq!(reg.assays(), vec!["pv", "lfc"]);
        assert_eq!(reg.metric_names("pv"), vec!["a", "b"]);
        assert_eq!(reg.get("pv", "a").unwrap().call_default(&[], &[]), 4.0);
        assert!(reg.metrics_for("missing").is_empty());
    }

    #[test]
    fn test_remove() {
        let mut reg = MetricRegistry::new();
        reg.register("pv", "a", constant(1.0));
        assert!(reg.remove("pv", "b").is_none());
        assert!(reg.remove("pv", "a").is_some());
        assert!(reg.is_empty());
    }
}
