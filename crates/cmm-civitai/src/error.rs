//! Error types for Civitai API operations.

use cmm_core::DownloadError;
use thiserror::Error;

/// Errors from Civitai client operations.
///
/// HTTP and I/O failures are mapped to these before leaving the crate;
/// `From<CivitaiError> for DownloadError` gives the job-terminal form.
#[derive(Debug, Error)]
pub enum CivitaiError {
    /// The URL does not identify a model.
    #[error("Invalid Civitai URL: {url}")]
    InvalidUrl {
        /// The offending URL.
        url: String,
    },

    /// The remote returned 404.
    #[error("Not found: {url}")]
    NotFound {
        /// The request URL.
        url: String,
    },

    /// The remote returned 401 or 403.
    #[error("Unauthorized; check the configured API key")]
    Unauthorized,

    /// The remote returned 429.
    #[error("Rate limit exceeded, try again later")]
    RateLimited,

    /// Non-success HTTP status other than the dedicated kinds above.
    #[error("API request failed with status {status}: {url}")]
    ApiRequestFailed {
        /// The HTTP status code.
        status: u16,
        /// The request URL.
        url: String,
    },

    /// Transport-level failure (DNS, TLS, connection, timeout).
    #[error("Network error: {message}")]
    Network {
        /// Description of the failure.
        message: String,
    },

    /// The response body did not match the expected shape.
    #[error("Invalid API response: {message}")]
    InvalidResponse {
        /// What was invalid.
        message: String,
    },

    /// Local file operation failed.
    #[error("I/O error ({kind}): {message}")]
    Io {
        /// The kind of I/O error.
        kind: String,
        /// Detailed error message.
        message: String,
    },

    /// The destination filesystem has no space left.
    #[error("Disk full while writing {path}")]
    DiskFull {
        /// Path being written when space ran out.
        path: String,
    },

    /// The download was cancelled between chunks.
    #[error("Download cancelled")]
    Cancelled,
}

impl CivitaiError {
    /// Map an I/O error raised while writing `path`.
    ///
    /// Out-of-space conditions get their own kind so they surface as
    /// `DiskFull` instead of a generic I/O failure.
    pub fn from_io(err: &std::io::Error, path: &std::path::Path) -> Self {
        if err.kind() == std::io::ErrorKind::StorageFull {
            return Self::DiskFull {
                path: path.display().to_string(),
            };
        }
        Self::Io {
            kind: format!("{:?}", err.kind()),
            message: err.to_string(),
        }
    }
}

impl From<reqwest::Error> for CivitaiError {
    fn from(err: reqwest::Error) -> Self {
        Self::Network {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for CivitaiError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidResponse {
            message: err.to_string(),
        }
    }
}

impl From<CivitaiError> for DownloadError {
    fn from(err: CivitaiError) -> Self {
        match err {
            CivitaiError::InvalidUrl { url } => Self::invalid_url(url),
            CivitaiError::NotFound { url } => Self::not_found(url),
            CivitaiError::Unauthorized => {
                Self::unauthorized("check the configured API key")
            }
            CivitaiError::RateLimited => Self::RateLimited,
            CivitaiError::ApiRequestFailed { status, url } => {
                Self::network_with_status(url, status)
            }
            CivitaiError::Network { message } => Self::network(message),
            CivitaiError::InvalidResponse { message } => Self::internal(message),
            CivitaiError::Io { message, .. } => Self::internal(message),
            CivitaiError::DiskFull { path } => Self::disk_full(path),
            CivitaiError::Cancelled => Self::Cancelled,
        }
    }
}

/// Result type alias for Civitai client operations.
pub type CivitaiResult<T> = Result<T, CivitaiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_kinds_map_to_download_error() {
        assert!(matches!(
            DownloadError::from(CivitaiError::RateLimited),
            DownloadError::RateLimited
        ));
        assert!(matches!(
            DownloadError::from(CivitaiError::Unauthorized),
            DownloadError::Unauthorized { .. }
        ));
        assert!(matches!(
            DownloadError::from(CivitaiError::Cancelled),
            DownloadError::Cancelled
        ));
        assert!(matches!(
            DownloadError::from(CivitaiError::ApiRequestFailed {
                status: 502,
                url: "u".to_string()
            }),
            DownloadError::Network {
                status_code: Some(502),
                ..
            }
        ));
    }
}
