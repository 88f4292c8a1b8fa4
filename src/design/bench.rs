//! Benchmark designs: an ordered set of methods bound to one dataset.
//!
//! Every operation here is declarative. No method body runs until the
//! design is handed to [`crate::build::build`].

use crate::data::{Dataset, Value};
use crate::design::{Arg, MethodChanges, MethodSpec, MethodSummary};
use crate::error::{BenchError, Result};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

/// A dataset plus the methods to compare on it.
#[derive(Debug, Clone)]
pub struct BenchDesign {
    dataset: Arc<Dataset>,
    methods: Vec<MethodSpec>,
}

impl BenchDesign {
    /// Create an empty design bound to `dataset`.
    pub fn new(dataset: impl Into<Dataset>) -> Self {
        Self {
            dataset: Arc::new(dataset.into()),
            methods: Vec::new(),
        }
    }

    /// Create a design from an arbitrary value, which must be a record of
    /// named fields.
    pub fn from_value(value: Value) -> Result<Self> {
        Ok(Self::new(Dataset::from_value(value)?))
    }

    /// The bound dataset.
    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    pub(crate) fn shared_dataset(&self) -> Arc<Dataset> {
        Arc::clone(&self.dataset)
    }

    /// Methods in insertion order.
    pub fn methods(&self) -> &[MethodSpec] {
        &self.methods
    }

    /// Method labels in insertion order.
    pub fn labels(&self) -> Vec<&str> {
        self.methods.iter().map(MethodSpec::label).collect()
    }

    /// Look up a method.
    pub fn method(&self, label: &str) -> Option<&MethodSpec> {
        self.methods.iter().find(|m| m.label() == label)
    }

    /// Check if a label is present.
    pub fn contains(&self, label: &str) -> bool {
        self.position(label).is_some()
    }

    /// Number of methods.
    pub fn len(&self) -> usize {
        self.methods.len()
    }

    /// Check if the design has no methods.
    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }

    fn position(&self, label: &str) -> Option<usize> {
        self.methods.iter().position(|m| m.label() == label)
    }

    fn require(&self, label: &str) -> Result<usize> {
        self.position(label)
            .ok_or_else(|| BenchError::NotFound(format!("method '{}'", label)))
    }

    /// Add a method. Fails if its label is already taken.
    pub fn add_method(&mut self, spec: MethodSpec) -> Result<()> {
        if spec.label().is_empty() {
            return Err(BenchError::Configuration(
                "method label must not be empty".to_string(),
            ));
        }
        if self.contains(spec.label()) {
            return Err(BenchError::DuplicateLabel(spec.label().to_string()));
        }
        debug!("Adding method '{}' ({})", spec.label(), spec.func().name());
        self.methods.push(spec);
        Ok(())
    }

    /// Modify a method in place.
    ///
    /// See [`MethodSpec::apply`] for merge versus overwrite semantics.
    pub fn modify_method(
        &mut self,
        label: &str,
        changes: MethodChanges,
        overwrite: bool,
    ) -> Result<()> {
        let idx = self.require(label)?;
        debug!("Modifying method '{}' (overwrite = {})", label, overwrite);
        self.methods[idx].apply(&changes, overwrite);
        Ok(())
    }

    /// Duplicate a method once per variant, applying each variant's changes.
    ///
    /// Variants are appended in the given order. With `replace`, the source
    /// method is removed and the variants take its position.
    pub fn expand_method(
        &mut self,
        label: &str,
        variants: Vec<(String, MethodChanges)>,
        replace: bool,
    ) -> Result<()> {
        let idx = self.require(label)?;
        if variants.is_empty() {
            return Err(BenchError::Configuration(format!(
                "expanding '{}' requires at least one variant",
                label
            )));
        }

        let mut seen = HashSet::new();
        for (new_label, _) in &variants {
            if new_label.is_empty() {
                return Err(BenchError::Configuration(
                    "method label must not be empty".to_string(),
                ));
            }
            let collides = self.contains(new_label) && !(replace && new_label == label);
            if collides || !seen.insert(new_label.as_str()) {
                return Err(BenchError::DuplicateLabel(new_label.clone()));
            }
        }

        let source = self.methods[idx].clone();
        let expanded: Vec<MethodSpec> = variants
            .iter()
            .map(|(new_label, changes)| {
                let mut spec = source.clone();
                spec.relabel(new_label);
                spec.apply(changes, false);
                spec
            })
            .collect();

        debug!("Expanding method '{}' into {} variants", label, expanded.len());
        if replace {
            self.methods.splice(idx..=idx, expanded);
        } else {
            self.methods.extend(expanded);
        }
        Ok(())
    }

    /// Expand a method over values of a single parameter.
    pub fn expand_method_param(
        &mut self,
        label: &str,
        param: &str,
        values: Vec<(String, Arg)>,
        replace: bool,
    ) -> Result<()> {
        let variants = values
            .into_iter()
            .map(|(new_label, arg)| (new_label, MethodChanges::new().arg(param, arg)))
            .collect();
        self.expand_method(label, variants, replace)
    }

    /// Remove a method, returning its definition.
    pub fn remove_method(&mut self, label: &str) -> Result<MethodSpec> {
        let idx = self.require(label)?;
        debug!("Removing method '{}'", label);
        Ok(self.methods.remove(idx))
    }

    /// Summarize all methods without executing them.
    pub fn list_methods(&self) -> Vec<MethodSummary> {
        self.methods.iter().map(MethodSpec::summary).collect()
    }
}
