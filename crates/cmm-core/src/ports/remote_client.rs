//! Remote model-hosting client port.
//!
//! The download worker talks to the remote service exclusively through
//! this trait; the production implementation lives in `cmm-civitai`.
//! Signatures use only core domain types plus `CancellationToken`, which
//! is part of the streaming-download contract (cancellation is observed
//! between chunks and surfaced as `DownloadError::Cancelled`).

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::domain::ModelInfo;
use crate::download::{DownloadError, FileProgress, ProgressReport};

/// Model and optional version identifiers extracted from a page URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedModelUrl {
    pub model_id: i64,
    pub version_id: Option<i64>,
}

/// Callback receiving streaming-download progress.
pub type FileProgressFn = Box<dyn Fn(FileProgress) + Send + Sync>;

/// Callback receiving worker progress reports.
pub type ProgressCallback = Box<dyn Fn(ProgressReport) + Send + Sync>;

/// Callback invoked once when a job reaches a terminal state:
/// `(success, message, model_info)`.
pub type CompletionCallback = Box<dyn FnOnce(bool, String, Option<ModelInfo>) + Send>;

/// Port for the remote model-hosting service.
#[async_trait]
pub trait RemoteClientPort: Send + Sync {
    /// Extract model and version ids from a model page URL.
    fn parse_url(&self, url: &str) -> Result<ParsedModelUrl, DownloadError>;

    /// Fetch and assemble metadata for a model version.
    ///
    /// When `version_id` is `None` the latest version is used. Preview
    /// images are ranked by reaction score and truncated to `max_images`.
    async fn fetch_model_info(
        &self,
        model_id: i64,
        version_id: Option<i64>,
        max_images: usize,
    ) -> Result<ModelInfo, DownloadError>;

    /// Stream a (possibly multi-gigabyte) file into `dest_dir`.
    ///
    /// Returns the final file path. Progress reports are monotone and end
    /// at 100%. A triggered `cancel` token aborts between chunks with
    /// `DownloadError::Cancelled`.
    async fn download_file(
        &self,
        url: &str,
        dest_dir: &Path,
        on_progress: FileProgressFn,
        cancel: &CancellationToken,
    ) -> Result<PathBuf, DownloadError>;

    /// Fetch a single image to `dest` with a short total timeout.
    async fn download_image(&self, url: &str, dest: &Path) -> Result<(), DownloadError>;
}
