//! Error types for SheetLoad.
//!
//! Library crates use [`SheetloadError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.
//!
//! Only structural problems are errors. Data-quality issues found while
//! normalizing or coercing rows are reported as
//! [`PipelineWarning`](crate::PipelineWarning)s and never abort a job.

use std::path::PathBuf;

/// Top-level error type for all SheetLoad operations.
#[derive(Debug, thiserror::Error)]
pub enum SheetloadError {
    /// No job specification exists for the requested key.
    #[error("no job configuration found for key '{key}'")]
    ConfigNotFound { key: String },

    /// The job specification exists but is missing fields or is invalid.
    #[error("job configuration for '{key}' is malformed: {message}")]
    ConfigMalformed { key: String, message: String },

    /// The schema file referenced by a job does not exist.
    #[error("schema file not found: {}", path.display())]
    SchemaNotFound { path: PathBuf },

    /// The schema file lacks required columns or holds invalid entries.
    #[error("schema file {} is malformed: {message}", path.display())]
    SchemaMalformed { path: PathBuf, message: String },

    /// The sheet header does not match the schema's original column names.
    #[error(
        "header mismatch: sheet has {observed:?}, schema expects {expected:?}"
    )]
    SchemaMismatch {
        observed: Vec<String>,
        expected: Vec<String>,
    },

    /// The destination store rejected the load.
    #[error("load into {table} failed: {message}")]
    LoadFailed { table: String, message: String },

    /// Application configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Spreadsheet source fetch error.
    #[error("source error: {0}")]
    Source(String),

    /// Warehouse or storage layer error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Webhook delivery error.
    #[error("notification error: {0}")]
    Notify(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, SheetloadError>;

impl SheetloadError {
    /// Create an app config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a malformed job config error.
    pub fn config_malformed(key: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::ConfigMalformed {
            key: key.into(),
            message: msg.into(),
        }
    }

    /// Create a malformed schema error.
    pub fn schema_malformed(path: impl Into<PathBuf>, msg: impl Into<String>) -> Self {
        Self::SchemaMalformed {
            path: path.into(),
            message: msg.into(),
        }
    }

    /// Create a load failure for `table`, wrapping the store's diagnostic text.
    pub fn load_failed(table: impl ToString, msg: impl Into<String>) -> Self {
        Self::LoadFailed {
            table: table.to_string(),
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether the caller asked for something that does not exist or is
    /// unusable, as opposed to a failure while running the job.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::ConfigNotFound { .. } | Self::ConfigMalformed { .. }
        )
    }
}
