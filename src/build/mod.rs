//! Executing benchmark designs.
//!
//! Building runs every method of a design against its dataset and collects
//! the outputs into a [`crate::result::BenchmarkResult`].

mod assemble;
mod engine;
mod provenance;

pub use engine::{build, build_with, BuildConfig, TruthColumns, DEFAULT_ASSAY};
pub use provenance::{
    resolve_provenance, NoPackages, PackageLookup, PackageRegistry, Provenance, VersionSource,
};
