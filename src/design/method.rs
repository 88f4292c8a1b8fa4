//! Method specifications: what to call, with which arguments, and how to
//! turn the raw return value into assay outputs.

use crate::data::Value;
use crate::design::{Arg, MethodFn, Transform};
use crate::error::{BenchError, Result};
use std::fmt;

/// Post-processing of a method's raw return value.
#[derive(Debug, Clone, Default)]
pub enum PostProcess {
    /// Use the raw return value as the single output.
    #[default]
    None,
    /// Apply one transform; the result is the single output.
    Single(Transform),
    /// Apply each transform to the raw value, one output per name.
    Named(Vec<(String, Transform)>),
}

impl PostProcess {
    /// Check if this is a named mapping.
    pub fn is_named(&self) -> bool {
        matches!(self, PostProcess::Named(_))
    }

    /// Output names produced, using `default_assay` for unnamed outputs.
    pub fn output_names(&self, default_assay: &str) -> Vec<String> {
        match self {
            PostProcess::Named(outputs) => outputs.iter().map(|(k, _)| k.clone()).collect(),
            _ => vec![default_assay.to_string()],
        }
    }

    /// Short text description for metadata and listings.
    pub fn describe(&self) -> String {
        match self {
            PostProcess::None => "none".to_string(),
            PostProcess::Single(t) => t.name().to_string(),
            PostProcess::Named(outputs) => outputs
                .iter()
                .map(|(k, t)| format!("{}={}", k, t.name()))
                .collect::<Vec<_>>()
                .join(", "),
        }
    }

    fn same_as(&self, other: &PostProcess) -> bool {
        match (self, other) {
            (PostProcess::None, PostProcess::None) => true,
            (PostProcess::Single(a), PostProcess::Single(b)) => a.same_transform(b),
            (PostProcess::Named(a), PostProcess::Named(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .zip(b)
                        .all(|((ka, ta), (kb, tb))| ka == kb && ta.same_transform(tb))
            }
            _ => false,
        }
    }
}

/// Manual metadata attached to a method.
///
/// `pkg_name`, `pkg_vers` and `pkg_func` override provenance derived from
/// the primary callable; everything else is free-form.
#[derive(Debug, Clone, Default)]
pub struct MethodMeta {
    pkg_name: Option<String>,
    pkg_vers: Option<String>,
    pkg_func: Option<MethodFn>,
    extra: Vec<(String, Value)>,
}

impl MethodMeta {
    /// Create empty metadata.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the package name manually.
    pub fn pkg_name(mut self, name: &str) -> Self {
        self.pkg_name = Some(name.to_string());
        self
    }

    /// Set the package version manually.
    pub fn pkg_vers(mut self, version: &str) -> Self {
        self.pkg_vers = Some(version.to_string());
        self
    }

    /// Derive provenance from this callable instead of the primary one.
    pub fn pkg_func(mut self, func: MethodFn) -> Self {
        self.pkg_func = Some(func);
        self
    }

    /// Set a metadata entry.
    ///
    /// Text values under `pkg_name` or `pkg_vers` fill the reserved fields.
    /// Any other value under a reserved key is refused, as is `pkg_func`,
    /// which only takes a callable through [`MethodMeta::pkg_func`].
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Result<Self> {
        match (key, value.into()) {
            ("pkg_name", Value::Text(s)) => self.pkg_name = Some(s),
            ("pkg_vers", Value::Text(s)) => self.pkg_vers = Some(s),
            ("pkg_name" | "pkg_vers", other) => {
                return Err(BenchError::Configuration(format!(
                    "metadata key '{}' must be text, got {}",
                    key,
                    other.kind()
                )))
            }
            ("pkg_func", _) => {
                return Err(BenchError::Configuration(
                    "metadata key 'pkg_func' takes a callable, not a value".to_string(),
                ))
            }
            (key, value) => self.set_extra(key, value),
        }
        Ok(self)
    }

    fn set_extra(&mut self, key: &str, value: Value) {
        match self.extra.iter_mut().find(|(k, _)| k == key) {
            Some(entry) => entry.1 = value,
            None => self.extra.push((key.to_string(), value)),
        }
    }

    /// Manual package name.
    pub fn manual_pkg_name(&self) -> Option<&str> {
        self.pkg_name.as_deref()
    }

    /// Manual package version.
    pub fn manual_pkg_vers(&self) -> Option<&str> {
        self.pkg_vers.as_deref()
    }

    /// Callable to introspect for provenance.
    pub fn provenance_func(&self) -> Option<&MethodFn> {
        self.pkg_func.as_ref()
    }

    /// Free-form entries.
    pub fn extra(&self) -> &[(String, Value)] {
        &self.extra
    }

    /// Check if nothing is set.
    pub fn is_empty(&self) -> bool {
        self.pkg_name.is_none()
            && self.pkg_vers.is_none()
            && self.pkg_func.is_none()
            && self.extra.is_empty()
    }

    /// Merge `other` into `self`; entries set in `other` win.
    pub fn merge(&mut self, other: &MethodMeta) {
        if other.pkg_name.is_some() {
            self.pkg_name = other.pkg_name.clone();
        }
        if other.pkg_vers.is_some() {
            self.pkg_vers = other.pkg_vers.clone();
        }
        if other.pkg_func.is_some() {
            self.pkg_func = other.pkg_func.clone();
        }
        for (k, v) in &other.extra {
            self.set_extra(k, v.clone());
        }
    }

    fn same_as(&self, other: &MethodMeta) -> bool {
        let funcs_match = match (&self.pkg_func, &other.pkg_func) {
            (None, None) => true,
            (Some(a), Some(b)) => a.same_callable(b),
            _ => false,
        };
        funcs_match
            && self.pkg_name == other.pkg_name
            && self.pkg_vers == other.pkg_vers
            && self.extra == other.extra
    }
}

/// One candidate method of a benchmark design.
#[derive(Debug, Clone)]
pub struct MethodSpec {
    label: String,
    func: MethodFn,
    args: Vec<(String, Arg)>,
    post: PostProcess,
    meta: MethodMeta,
}

impl MethodSpec {
    /// Create a method with no arguments, post-processing or metadata.
    pub fn new(label: &str, func: MethodFn) -> Self {
        Self {
            label: label.to_string(),
            func,
            args: Vec::new(),
            post: PostProcess::None,
            meta: MethodMeta::default(),
        }
    }

    /// Add (or replace) an argument.
    pub fn arg(mut self, name: &str, arg: Arg) -> Self {
        self.set_arg(name, arg);
        self
    }

    /// Set the post-processing step.
    pub fn post(mut self, post: PostProcess) -> Self {
        self.post = post;
        self
    }

    /// Post-process with a single transform.
    pub fn post_fn(self, transform: Transform) -> Self {
        self.post(PostProcess::Single(transform))
    }

    /// Post-process into named outputs.
    pub fn post_named(self, outputs: Vec<(&str, Transform)>) -> Self {
        self.post(PostProcess::Named(
            outputs
                .into_iter()
                .map(|(k, t)| (k.to_string(), t))
                .collect(),
        ))
    }

    /// Set the metadata.
    pub fn meta(mut self, meta: MethodMeta) -> Self {
        self.meta = meta;
        self
    }

    /// Method label.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Primary callable.
    pub fn func(&self) -> &MethodFn {
        &self.func
    }

    /// Arguments in declaration order.
    pub fn args(&self) -> &[(String, Arg)] {
        &self.args
    }

    /// Look up an argument.
    pub fn get_arg(&self, name: &str) -> Option<&Arg> {
        self.args.iter().find(|(k, _)| k == name).map(|(_, a)| a)
    }

    /// Post-processing step.
    pub fn post_process(&self) -> &PostProcess {
        &self.post
    }

    /// Manual metadata.
    pub fn method_meta(&self) -> &MethodMeta {
        &self.meta
    }

    fn set_arg(&mut self, name: &str, arg: Arg) {
        match self.args.iter_mut().find(|(k, _)| k == name) {
            Some(entry) => entry.1 = arg,
            None => self.args.push((name.to_string(), arg)),
        }
    }

    pub(crate) fn relabel(&mut self, label: &str) {
        self.label = label.to_string();
    }

    /// Apply changes.
    ///
    /// Without `overwrite`, new arguments and metadata are merged into the
    /// existing ones. With `overwrite`, the argument set and metadata are
    /// replaced by exactly what `changes` supplies. The label is never
    /// touched; callable and post-processing change only when supplied.
    pub fn apply(&mut self, changes: &MethodChanges, overwrite: bool) {
        if let Some(func) = &changes.func {
            self.func = func.clone();
        }
        if let Some(post) = &changes.post {
            self.post = post.clone();
        }
        if overwrite {
            self.args = changes.args.clone();
            self.meta = changes.meta.clone().unwrap_or_default();
        } else {
            for (name, arg) in &changes.args {
                self.set_arg(name, arg.clone());
            }
            if let Some(meta) = &changes.meta {
                self.meta.merge(meta);
            }
        }
    }

    /// Check that two specs hold the same definition apart from the label.
    pub fn same_definition(&self, other: &MethodSpec) -> bool {
        self.func.same_callable(&other.func)
            && self.args == other.args
            && self.post.same_as(&other.post)
            && self.meta.same_as(&other.meta)
    }

    /// Summarize without executing anything.
    pub fn summary(&self) -> MethodSummary {
        MethodSummary {
            label: self.label.clone(),
            func: self.func.name().to_string(),
            args: self
                .args
                .iter()
                .map(|(k, a)| (k.clone(), a.to_string()))
                .collect(),
            post: self.post.describe(),
        }
    }
}

/// Changes to apply to an existing method.
#[derive(Debug, Clone, Default)]
pub struct MethodChanges {
    func: Option<MethodFn>,
    args: Vec<(String, Arg)>,
    post: Option<PostProcess>,
    meta: Option<MethodMeta>,
}

impl MethodChanges {
    /// Create an empty change set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the primary callable.
    pub fn func(mut self, func: MethodFn) -> Self {
        self.func = Some(func);
        self
    }

    /// Set an argument.
    pub fn arg(mut self, name: &str, arg: Arg) -> Self {
        match self.args.iter_mut().find(|(k, _)| k == name) {
            Some(entry) => entry.1 = arg,
            None => self.args.push((name.to_string(), arg)),
        }
        self
    }

    /// Replace post-processing.
    pub fn post(mut self, post: PostProcess) -> Self {
        self.post = Some(post);
        self
    }

    /// Set metadata.
    pub fn meta(mut self, meta: MethodMeta) -> Self {
        self.meta = Some(meta);
        self
    }
}

/// Listing entry for a method.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodSummary {
    pub label: String,
    pub func: String,
    pub args: Vec<(String, String)>,
    pub post: String,
}

impl fmt::Display for MethodSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}(", self.label, self.func)?;
        for (i, (k, v)) in self.args.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{} = {}", k, v)?;
        }
        write!(f, ")")?;
        if self.post != "none" {
            write!(f, " -> {}", self.post)?;
        }
        Ok(())
    }
}
