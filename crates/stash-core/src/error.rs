//! Error types for the Stash library.
//!
//! Missing input data (a record without a hash, a version without a publish
//! date) is never an error — the linking engine folds it into "no match" or
//! "unknown". Errors here are reserved for vanished records, persistence
//! failures, and invalid configuration.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the Stash library.
#[derive(Debug, Error)]
pub enum StashError {
    /// A record path referenced by the caller or by a stored link no longer
    /// exists in the store document.
    #[error("Record not found: {path}")]
    RecordNotFound { path: String },

    // File system errors (store persistence)
    #[error("IO error at {path:?}: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    // Serialization errors (store persistence)
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    // Validation errors
    #[error("Validation error for {field}: {message}")]
    Validation { field: String, message: String },

    // Generic errors
    #[error("{0}")]
    Other(String),
}

/// Result type alias for Stash operations.
pub type Result<T> = std::result::Result<T, StashError>;

impl From<std::io::Error> for StashError {
    fn from(err: std::io::Error) -> Self {
        StashError::Io {
            message: err.to_string(),
            path: None,
            source: Some(err),
        }
    }
}

impl From<serde_json::Error> for StashError {
    fn from(err: serde_json::Error) -> Self {
        StashError::Json {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl StashError {
    /// Create an IO error with path context.
    pub fn io_with_path(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        StashError::Io {
            message: err.to_string(),
            path: Some(path.into()),
            source: Some(err),
        }
    }

    /// Create a record-not-found error.
    pub fn record_not_found(path: impl Into<String>) -> Self {
        StashError::RecordNotFound { path: path.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = StashError::RecordNotFound {
            path: "loras/aduare-style.safetensors".into(),
        };
        assert_eq!(
            err.to_string(),
            "Record not found: loras/aduare-style.safetensors"
        );
    }

    #[test]
    fn test_io_error_carries_path() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err = StashError::io_with_path(io, "/data/models.json");
        match err {
            StashError::Io { path, .. } => {
                assert_eq!(path, Some(PathBuf::from("/data/models.json")));
            }
            other => panic!("unexpected error variant: {other:?}"),
        }
    }
}
