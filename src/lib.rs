//! Summarized Benchmark Library
//!
//! Bookkeeping and evaluation for benchmark studies that compare several
//! analysis methods on one shared dataset.
//!
//! # Overview
//!
//! The library is organized into modules that follow the life of a study:
//!
//! - **data**: Core data structures (Value, Table, Dataset, ResultMatrix)
//! - **design**: Declarative method definitions and benchmark designs
//! - **build**: Executing a design, serially or on a worker pool
//! - **result**: The built result container (assays, metadata, ground truth)
//! - **metric**: Metric definition, default metrics and evaluation
//!
//! # Example
//!
//! ```no_run
//! use summarized_bench::prelude::*;
//!
//! let data = Dataset::from_tsv("pvalues.tsv").unwrap();
//! let mut design = BenchDesign::new(data);
//!
//! let identity = MethodFn::new("identity", |args| Ok(args.require("x")?.clone()));
//! design
//!     .add_method(MethodSpec::new("raw", identity).arg("x", Arg::field("p")))
//!     .unwrap();
//!
//! let mut result = build(&design, &BuildConfig::new().truth_column("label")).unwrap();
//! add_all_default_metrics(&mut result, DEFAULT_ASSAY).unwrap();
//!
//! let grid = ParamGrid::new().with("alpha", vec![0.01, 0.05, 0.1]);
//! let table = evaluate(&mut result, &grid, &EvalOptions::new()).unwrap();
//! ```

pub mod build;
pub mod data;
pub mod design;
pub mod error;
pub mod metric;
pub mod result;

/// Convenient re-exports for common usage.
pub mod prelude {
    pub use crate::build::{
        build, build_with, BuildConfig, NoPackages, PackageLookup, PackageRegistry,
        TruthColumns, VersionSource, DEFAULT_ASSAY,
    };
    pub use crate::data::{Dataset, ResultMatrix, Table, Value};
    pub use crate::design::{
        Arg, BenchDesign, CallArgs, DesignConfig, MethodCatalog, MethodChanges, MethodFn,
        MethodMeta, MethodSpec, MethodSummary, PostProcess, Transform,
    };
    pub use crate::error::{BenchError, MethodError, Result};
    pub use crate::metric::{
        add_all_default_metrics, add_default_metrics, available_metrics, evaluate,
        EvalOptions, Evaluation, EvaluationConfig, MetricFunction, MetricParam, MetricRegistry,
        ParamGrid, TidyRecord,
    };
    pub use crate::result::BenchmarkResult;
}
