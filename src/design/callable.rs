//! Callables wrapped for deferred execution: method bodies and
//! post-processing transforms.

use crate::data::Value;
use crate::error::MethodError;
use std::fmt;
use std::sync::Arc;

type MethodBody = dyn Fn(&CallArgs) -> std::result::Result<Value, MethodError> + Send + Sync;
type TransformBody = dyn Fn(&Value) -> std::result::Result<Value, MethodError> + Send + Sync;

/// Resolved arguments handed to a method body, in declaration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallArgs {
    args: Vec<(String, Value)>,
}

impl CallArgs {
    /// Create from resolved (name, value) pairs.
    pub fn new(args: Vec<(String, Value)>) -> Self {
        Self { args }
    }

    /// Look up an argument.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.args.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    /// Look up a required argument.
    pub fn require(&self, name: &str) -> std::result::Result<&Value, MethodError> {
        self.get(name)
            .ok_or_else(|| MethodError::MissingArgument(name.to_string()))
    }

    /// Look up a required argument as a numeric vector.
    pub fn numeric(&self, name: &str) -> std::result::Result<Vec<f64>, MethodError> {
        let value = self.require(name)?;
        value.to_numeric_vec().ok_or_else(|| MethodError::BadArgument {
            name: name.to_string(),
            reason: format!("expected numbers, got {}", value.kind()),
        })
    }

    /// Look up an optional numeric scalar, falling back to `default`.
    pub fn number_or(&self, name: &str, default: f64) -> std::result::Result<f64, MethodError> {
        match self.get(name) {
            None => Ok(default),
            Some(value) => value.as_number().ok_or_else(|| MethodError::BadArgument {
                name: name.to_string(),
                reason: format!("expected a number, got {}", value.kind()),
            }),
        }
    }

    /// Iterate over (name, value) pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.args.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of arguments.
    pub fn len(&self) -> usize {
        self.args.len()
    }

    /// Check if there are no arguments.
    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }
}

/// The primary callable of a method.
///
/// Carries a display name and, optionally, the package that defines it so
/// provenance can be derived at build time.
#[derive(Clone)]
pub struct MethodFn {
    name: String,
    package: Option<String>,
    body: Arc<MethodBody>,
}

impl MethodFn {
    /// Wrap a closure.
    pub fn new<F>(name: &str, body: F) -> Self
    where
        F: Fn(&CallArgs) -> std::result::Result<Value, MethodError> + Send + Sync + 'static,
    {
        Self {
            name: name.to_string(),
            package: None,
            body: Arc::new(body),
        }
    }

    /// Record the package that defines this callable.
    pub fn in_package(mut self, package: &str) -> Self {
        self.package = Some(package.to_string());
        self
    }

    /// Display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Defining package, if known.
    pub fn package(&self) -> Option<&str> {
        self.package.as_deref()
    }

    /// Invoke the callable.
    pub fn call(&self, args: &CallArgs) -> std::result::Result<Value, MethodError> {
        (self.body)(args)
    }

    /// Check whether two handles wrap the same callable.
    pub fn same_callable(&self, other: &MethodFn) -> bool {
        Arc::ptr_eq(&self.body, &other.body)
    }
}

impl fmt::Debug for MethodFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodFn")
            .field("name", &self.name)
            .field("package", &self.package)
            .finish()
    }
}

/// A post-processing step applied to a method's raw return value.
#[derive(Clone)]
pub struct Transform {
    name: String,
    body: Arc<TransformBody>,
}

impl Transform {
    /// Wrap a closure.
    pub fn new<F>(name: &str, body: F) -> Self
    where
        F: Fn(&Value) -> std::result::Result<Value, MethodError> + Send + Sync + 'static,
    {
        Self {
            name: name.to_string(),
            body: Arc::new(body),
        }
    }

    /// Extract a named field from a record-shaped return value.
    pub fn field(field: &str) -> Self {
        let key = field.to_string();
        Self::new(&format!("field:{}", field), move |value| {
            value
                .field(&key)
                .cloned()
                .ok_or_else(|| MethodError::MissingOutput(key.clone()))
        })
    }

    /// Display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Apply the transform.
    pub fn apply(&self, value: &Value) -> std::result::Result<Value, MethodError> {
        (self.body)(value)
    }

    /// Check whether two handles wrap the same closure.
    pub fn same_transform(&self, other: &Transform) -> bool {
        Arc::ptr_eq(&self.body, &other.body)
    }
}

impl fmt::Debug for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transform").field("name", &self.name).finish()
    }
}
