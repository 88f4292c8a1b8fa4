//! Performance metrics: definition, registration and evaluation.

mod defaults;
mod evaluate;
mod function;
mod registry;

pub use defaults::{
    add_all_default_metrics, add_default_metrics, available_metrics, default_metric, MetricInfo,
    DEFAULT_ALPHA, DEFAULT_METRICS,
};
pub use evaluate::{
    evaluate, evaluate_tidy, evaluate_wide, merge_into_metadata, EvalOptions, Evaluation,
    EvaluationConfig, ParamGrid, TidyRecord,
};
pub use function::{MetricArgs, MetricFunction, MetricParam};
pub use registry::MetricRegistry;
