//! Package provenance for methods.
//!
//! The host supplies package versions through [`PackageLookup`]; nothing is
//! discovered by reflection.

use crate::design::{MethodFn, MethodSpec};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Source of package version information, queried at build time.
pub trait PackageLookup: Send + Sync {
    /// Installed version of `package`, if known.
    fn version(&self, package: &str) -> Option<String>;
}

/// A lookup that knows no packages.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPackages;

impl PackageLookup for NoPackages {
    fn version(&self, _package: &str) -> Option<String> {
        None
    }
}

/// In-memory package → version table.
#[derive(Debug, Clone, Default)]
pub struct PackageRegistry {
    versions: HashMap<String, String>,
}

impl PackageRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a package version.
    pub fn with(mut self, package: &str, version: &str) -> Self {
        self.insert(package, version);
        self
    }

    /// Add or replace a package version.
    pub fn insert(&mut self, package: &str, version: &str) {
        self.versions
            .insert(package.to_string(), version.to_string());
    }
}

impl PackageLookup for PackageRegistry {
    fn version(&self, package: &str) -> Option<String> {
        self.versions.get(package).cloned()
    }
}

/// Where a method's package name and version came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VersionSource {
    /// Derived from the primary callable.
    Function,
    /// Given manually as `pkg_name` / `pkg_vers`.
    ManualMeta,
    /// Derived from the callable given as `pkg_func`.
    MetaFunction,
}

impl VersionSource {
    /// Short code recorded in method metadata.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Function => "bfunc",
            Self::ManualMeta => "bmeta_manual",
            Self::MetaFunction => "bmeta_func",
        }
    }
}

/// Resolved provenance of one method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Provenance {
    pub pkg_name: Option<String>,
    pub pkg_vers: Option<String>,
    pub source: VersionSource,
}

/// Resolve provenance for a method.
///
/// Precedence: `pkg_func` from metadata, then manual `pkg_name`/`pkg_vers`,
/// then the primary callable.
pub fn resolve_provenance(spec: &MethodSpec, lookup: &dyn PackageLookup) -> Provenance {
    let meta = spec.method_meta();

    if let Some(func) = meta.provenance_func() {
        return introspect(func, lookup, VersionSource::MetaFunction);
    }

    if meta.manual_pkg_name().is_some() || meta.manual_pkg_vers().is_some() {
        let pkg_name = meta.manual_pkg_name().map(str::to_string);
        let pkg_vers = meta
            .manual_pkg_vers()
            .map(str::to_string)
            .or_else(|| pkg_name.as_deref().and_then(|p| lookup.version(p)));
        return Provenance {
            pkg_name,
            pkg_vers,
            source: VersionSource::ManualMeta,
        };
    }

    introspect(spec.func(), lookup, VersionSource::Function)
}

fn introspect(func: &MethodFn, lookup: &dyn PackageLookup, source: VersionSource) -> Provenance {
    let pkg_name = func.package().map(str::to_string);
    let pkg_vers = pkg_name.as_deref().and_then(|p| lookup.version(p));
    Provenance {
        pkg_name,
        pkg_vers,
        source,
    }
}
