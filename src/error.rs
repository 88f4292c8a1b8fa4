//! Error types for the summarized-bench library.

use thiserror::Error;

/// Main error type for the library.
#[derive(Error, Debug)]
pub enum BenchError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// Malformed or inconsistent design, build request or registry call.
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Duplicate method label '{0}'")]
    DuplicateLabel(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// A symbolic argument could not be bound to the dataset at build time.
    #[error("Method '{method}': field '{field}' does not exist in the dataset")]
    UnresolvedReference { method: String, field: String },

    /// Per-method outputs cannot be combined into a uniform result matrix.
    #[error("Assembly error in method '{method}': {reason}")]
    Assembly { method: String, reason: String },
}

/// Failure raised by a user-supplied method callable or post-processing step.
///
/// These never abort a build; they are recorded against the failing method.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MethodError {
    #[error("missing argument '{0}'")]
    MissingArgument(String),

    #[error("argument '{name}' has the wrong shape: {reason}")]
    BadArgument { name: String, reason: String },

    #[error("output '{0}' not found")]
    MissingOutput(String),

    #[error("{0}")]
    Failed(String),
}

/// Result type alias for library operations.
pub type Result<T> = std::result::Result<T, BenchError>;
