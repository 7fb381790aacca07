//! Download error types.
//!
//! These errors are designed to be serializable and not depend on external
//! error types like `std::io::Error` or `reqwest::Error`. Lower layers map
//! their failures into these kinds before they reach a task's terminal
//! state; the `Display` output is the one-line message stored in
//! `DownloadTask::error_message`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Terminal error for a download job or one of its stages.
#[derive(Clone, Debug, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum DownloadError {
    /// The URL does not identify a model on the remote service.
    #[error("Invalid URL: {url}")]
    InvalidUrl {
        /// The offending URL.
        url: String,
    },

    /// Model, version or file missing on the remote server.
    #[error("Not found: {message}")]
    NotFound {
        /// What was not found.
        message: String,
    },

    /// The remote rejected our credentials (or their absence).
    #[error("Unauthorized: {message}")]
    Unauthorized {
        /// Detail from the remote, when available.
        message: String,
    },

    /// API rate limit exceeded.
    #[error("Rate limited by the remote service")]
    RateLimited,

    /// Network/HTTP failure.
    #[error("Network error: {message}")]
    Network {
        /// Detailed error message.
        message: String,
        /// HTTP status code if one was received.
        #[serde(skip_serializing_if = "Option::is_none")]
        status_code: Option<u16>,
    },

    /// The destination filesystem ran out of space.
    #[error("Disk full: {message}")]
    DiskFull {
        /// Detailed error message.
        message: String,
    },

    /// The storage root is missing or a target directory cannot be created.
    #[error("Layout error: {message}")]
    Layout {
        /// Detailed error message.
        message: String,
    },

    /// Download was cancelled by the user.
    #[error("Download cancelled")]
    Cancelled,

    /// Anything that does not fit the kinds above.
    #[error("{message}")]
    Internal {
        /// Error message.
        message: String,
    },
}

impl DownloadError {
    /// Create an invalid-URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }

    /// Create a not-found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// Create an unauthorized error.
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized {
            message: message.into(),
        }
    }

    /// Create a network error without a status code.
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
            status_code: None,
        }
    }

    /// Create a network error carrying an HTTP status code.
    pub fn network_with_status(message: impl Into<String>, status_code: u16) -> Self {
        Self::Network {
            message: message.into(),
            status_code: Some(status_code),
        }
    }

    /// Create a disk-full error.
    pub fn disk_full(message: impl Into<String>) -> Self {
        Self::DiskFull {
            message: message.into(),
        }
    }

    /// Create a layout error.
    pub fn layout(message: impl Into<String>) -> Self {
        Self::Layout {
            message: message.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Check if this is a cancellation.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Convenience result type for download operations.
pub type DownloadResult<T> = Result<T, DownloadError>;
