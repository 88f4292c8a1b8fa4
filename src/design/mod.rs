//! Declarative benchmark designs.
//!
//! A design records which methods to run and how, without running them.

mod arg;
mod bench;
mod callable;
mod config;
mod method;

pub use arg::Arg;
pub use bench::BenchDesign;
pub use callable::{CallArgs, MethodFn, Transform};
pub use config::{
    ArgConfig, DesignConfig, LiteralConfig, MetaConfig, MethodCatalog, MethodConfig,
    NamedPostConfig, PostConfig,
};
pub use method::{MethodChanges, MethodMeta, MethodSpec, MethodSummary, PostProcess};
