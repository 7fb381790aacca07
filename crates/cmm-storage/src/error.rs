//! Storage error types.

use std::path::Path;

use thiserror::Error;

/// Errors from storage layout and maintenance operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The configured storage root does not exist.
    #[error("Storage root not found: {path}")]
    RootMissing {
        /// The missing root path.
        path: String,
    },

    /// An operation targeted a path that does not exist.
    #[error("Path does not exist: {path}")]
    NotFound {
        /// The missing path.
        path: String,
    },

    /// Filesystem operation failed.
    #[error("I/O error on {path}: {message}")]
    Io {
        /// Path involved in the failing operation.
        path: String,
        /// Detailed error message.
        message: String,
    },
}

impl StorageError {
    /// Wrap an I/O error with the path it occurred on.
    pub fn io(path: &Path, err: &std::io::Error) -> Self {
        Self::Io {
            path: path.display().to_string(),
            message: err.to_string(),
        }
    }

    /// Create a root-missing error.
    pub fn root_missing(path: &Path) -> Self {
        Self::RootMissing {
            path: path.display().to_string(),
        }
    }
}

impl From<StorageError> for cmm_core::DownloadError {
    fn from(err: StorageError) -> Self {
        Self::layout(err.to_string())
    }
}

/// Result type alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
