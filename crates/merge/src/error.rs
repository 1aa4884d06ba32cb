//! Fatal errors for a merge run.
//!
//! Record-level data problems (unmapped ids, ambiguous mappings, conflicting
//! overrides) are not errors: they are collected in
//! [`Diagnostics`](crate::model::Diagnostics) and the run continues.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum MergeError {
    /// TOML parse / deserialization error.
    #[error("config parse error: {0}")]
    ConfigParse(String),

    /// Config validation error (bad tier order, unknown tier, etc.).
    #[error("config validation error: {0}")]
    ConfigValidation(String),

    /// An input record is missing a required field or has the wrong shape.
    #[error("{}: malformed record: {detail}", path.display())]
    MalformedRecord { path: PathBuf, detail: String },

    /// A mapping file references a different source than the one it is
    /// configured for.
    #[error("{}: row {row}: source '{found}' does not match '{expected}'", path.display())]
    SourceMismatch {
        path: PathBuf,
        row: usize,
        expected: String,
        found: String,
    },

    /// IO error (file read, directory listing, commit).
    #[error("IO error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// JSON serialization of an output artifact failed.
    #[error("serialization error: {0}")]
    Serialize(String),
}

impl MergeError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }

    pub(crate) fn malformed(path: impl Into<PathBuf>, detail: impl Into<String>) -> Self {
        Self::MalformedRecord {
            path: path.into(),
            detail: detail.into(),
        }
    }
}

/// Convenience alias for merge results.
pub type MergeResult<T> = Result<T, MergeError>;
