//! Executing a design: resolve arguments, run every method, post-process.

use crate::build::assemble::{assay_names, assemble, truth_mapping, MethodOutcome};
use crate::build::provenance::{resolve_provenance, NoPackages, PackageLookup};
use crate::data::{Dataset, Value};
use crate::design::{BenchDesign, CallArgs, MethodSpec, PostProcess, Transform};
use crate::error::{BenchError, Result};
use crate::result::BenchmarkResult;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::{BTreeMap, HashSet};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Assay name used when methods do not declare named outputs.
pub const DEFAULT_ASSAY: &str = "default";

/// Which dataset fields hold ground truth.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TruthColumns {
    /// No ground truth.
    #[default]
    None,
    /// One field, valid only when the build produces a single assay.
    Single(String),
    /// Assay name → field name.
    PerAssay(BTreeMap<String, String>),
}

impl TruthColumns {
    /// A single truth column.
    pub fn single(column: &str) -> Self {
        TruthColumns::Single(column.to_string())
    }

    /// A per-assay mapping.
    pub fn per_assay(pairs: &[(&str, &str)]) -> Self {
        TruthColumns::PerAssay(
            pairs
                .iter()
                .map(|(a, c)| (a.to_string(), c.to_string()))
                .collect(),
        )
    }
}

fn default_assay_name() -> String {
    DEFAULT_ASSAY.to_string()
}

/// Build configuration for serialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildConfig {
    /// Run methods on a worker pool.
    #[serde(default)]
    pub parallel: bool,
    /// Worker count; capped at the number of methods.
    #[serde(default)]
    pub threads: Option<usize>,
    /// Ground-truth fields to attach.
    #[serde(default)]
    pub truth: TruthColumns,
    /// Name of the assay produced by methods without named outputs.
    #[serde(default = "default_assay_name")]
    pub default_assay: String,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            parallel: false,
            threads: None,
            truth: TruthColumns::None,
            default_assay: default_assay_name(),
        }
    }
}

impl BuildConfig {
    /// Create a serial build without ground truth.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set ground truth.
    pub fn with_truth(mut self, truth: TruthColumns) -> Self {
        self.truth = truth;
        self
    }

    /// Use a single ground-truth column.
    pub fn truth_column(self, column: &str) -> Self {
        self.with_truth(TruthColumns::single(column))
    }

    /// Enable or disable parallel execution.
    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Set the worker count.
    pub fn threads(mut self, threads: usize) -> Self {
        self.threads = Some(threads);
        self
    }

    /// Load from YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(BenchError::from)
    }

    /// Save to YAML string.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(BenchError::from)
    }
}

/// One method ready to run: its spec and fully resolved arguments.
struct MethodTask<'a> {
    spec: &'a MethodSpec,
    args: CallArgs,
}

/// Build a design without package version information.
pub fn build(design: &BenchDesign, config: &BuildConfig) -> Result<BenchmarkResult> {
    build_with(design, config, &NoPackages)
}

/// Build a design, resolving package versions through `lookup`.
///
/// Configuration problems and unresolved field references fail the whole
/// build before any method runs. Failures inside a method are recorded
/// against that method and do not stop the others.
pub fn build_with(
    design: &BenchDesign,
    config: &BuildConfig,
    lookup: &dyn PackageLookup,
) -> Result<BenchmarkResult> {
    if design.is_empty() {
        return Err(BenchError::Configuration(
            "design has no methods to build".to_string(),
        ));
    }
    if config.default_assay.is_empty() {
        return Err(BenchError::Configuration(
            "default assay name must not be empty".to_string(),
        ));
    }
    check_post_processing(design)?;

    let assays = assay_names(design, &config.default_assay);
    let truth = truth_mapping(&config.truth, &assays)?;
    for (_, column) in &truth {
        if !design.dataset().has_field(column) {
            return Err(BenchError::NotFound(format!(
                "ground truth column '{}'",
                column
            )));
        }
    }

    let dataset = design.shared_dataset();
    let tasks = design
        .methods()
        .iter()
        .map(|spec| {
            Ok(MethodTask {
                spec,
                args: resolve_args(spec, &dataset)?,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    info!(
        "Building {} methods over {} assays (parallel = {})",
        tasks.len(),
        assays.len(),
        config.parallel
    );
    let start = Instant::now();

    let outcomes: Vec<MethodOutcome> = if config.parallel && tasks.len() > 1 {
        let n_threads = worker_count(config.threads, tasks.len());
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(n_threads)
            .build()
            .map_err(|e| BenchError::Configuration(format!("cannot start worker pool: {}", e)))?;
        debug!("Dispatching methods to {} workers", n_threads);
        pool.install(|| {
            tasks
                .par_iter()
                .map(|task| run_method(task, &config.default_assay))
                .collect()
        })
    } else {
        tasks
            .iter()
            .map(|task| run_method(task, &config.default_assay))
            .collect()
    };

    let provenance: Vec<_> = design
        .methods()
        .iter()
        .map(|spec| resolve_provenance(spec, lookup))
        .collect();

    let result = assemble(design, &outcomes, &provenance, &assays, &truth)?;

    let n_failed = outcomes.iter().filter(|o| o.outputs.is_err()).count();
    info!(
        "Build finished in {:.3}s: {} rows, {} methods ({} failed)",
        start.elapsed().as_secs_f64(),
        result.n_rows(),
        result.n_methods(),
        n_failed
    );
    Ok(result)
}

/// Requested workers, or rayon's default, capped at one per method.
fn worker_count(requested: Option<usize>, n_methods: usize) -> usize {
    requested
        .unwrap_or_else(rayon::current_num_threads)
        .clamp(1, n_methods.max(1))
}

/// Either every method uses a named post-processing mapping or none does.
fn check_post_processing(design: &BenchDesign) -> Result<()> {
    let named: Vec<&MethodSpec> = design
        .methods()
        .iter()
        .filter(|m| m.post_process().is_named())
        .collect();

    if !named.is_empty() && named.len() != design.len() {
        let offending = design
            .methods()
            .iter()
            .find(|m| !m.post_process().is_named())
            .map(MethodSpec::label)
            .unwrap_or_default();
        return Err(BenchError::Configuration(format!(
            "method '{}' has no named post-processing but '{}' does; \
             either all methods or none must use named outputs",
            offending,
            named[0].label()
        )));
    }

    for spec in named {
        if let PostProcess::Named(outputs) = spec.post_process() {
            if outputs.is_empty() {
                return Err(BenchError::Configuration(format!(
                    "method '{}' declares an empty post-processing mapping",
                    spec.label()
                )));
            }
            let mut seen = HashSet::new();
            if let Some((dup, _)) = outputs.iter().find(|(k, _)| !seen.insert(k.as_str())) {
                return Err(BenchError::Configuration(format!(
                    "method '{}' declares output '{}' twice",
                    spec.label(),
                    dup
                )));
            }
        }
    }
    Ok(())
}

fn resolve_args(spec: &MethodSpec, dataset: &Dataset) -> Result<CallArgs> {
    spec.args()
        .iter()
        .map(|(name, arg)| {
            arg.resolve(dataset)
                .map(|value| (name.clone(), value))
                .ok_or_else(|| BenchError::UnresolvedReference {
                    method: spec.label().to_string(),
                    field: arg.field_name().unwrap_or_default().to_string(),
                })
        })
        .collect::<Result<Vec<_>>>()
        .map(CallArgs::new)
}

fn run_method(task: &MethodTask<'_>, default_assay: &str) -> MethodOutcome {
    let spec = task.spec;
    debug!("Running method '{}'", spec.label());

    let outputs = match catch_unwind(AssertUnwindSafe(|| spec.func().call(&task.args))) {
        Ok(Ok(raw)) => post_process(spec.post_process(), &raw, default_assay),
        Ok(Err(e)) => Err(format!("{} failed: {}", spec.func().name(), e)),
        Err(payload) => Err(format!(
            "{} panicked: {}",
            spec.func().name(),
            panic_message(payload.as_ref())
        )),
    };

    if let Err(reason) = &outputs {
        warn!("Method '{}' failed: {}", spec.label(), reason);
    }
    MethodOutcome { outputs }
}

fn post_process(
    post: &PostProcess,
    raw: &Value,
    default_assay: &str,
) -> std::result::Result<Vec<(String, Value)>, String> {
    match post {
        PostProcess::None => Ok(vec![(default_assay.to_string(), raw.clone())]),
        PostProcess::Single(t) => {
            apply_transform(t, raw).map(|v| vec![(default_assay.to_string(), v)])
        }
        PostProcess::Named(outputs) => outputs
            .iter()
            .map(|(name, t)| apply_transform(t, raw).map(|v| (name.clone(), v)))
            .collect(),
    }
}

fn apply_transform(t: &Transform, raw: &Value) -> std::result::Result<Value, String> {
    match catch_unwind(AssertUnwindSafe(|| t.apply(raw))) {
        Ok(Ok(v)) => Ok(v),
        Ok(Err(e)) => Err(format!("post-processing '{}' failed: {}", t.name(), e)),
        Err(payload) => Err(format!(
            "post-processing '{}' panicked: {}",
            t.name(),
            panic_message(payload.as_ref())
        )),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
