//! Civitai client: URL parsing, metadata assembly, file and image fetch.

mod metadata;
mod urls;

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;

use async_trait::async_trait;
use futures_util::StreamExt;
use tokio_util::sync::CancellationToken;
use url::Url;

use cmm_core::{
    DownloadError, FileProgress, ModelInfo, ParsedModelUrl, RemoteClientPort,
};

use crate::error::{CivitaiError, CivitaiResult};
use crate::http::{HttpBackend, ReqwestBackend};
use crate::models::CivitaiConfig;

pub use urls::parse_model_url;

/// Default Civitai client over the pooled reqwest backend.
pub type DefaultCivitaiClient = CivitaiClient<ReqwestBackend>;

/// Filters for the model search endpoint.
#[derive(Debug, Clone, Default)]
pub struct SearchFilters {
    pub tags: Vec<String>,
    pub types: Vec<String>,
    pub base_models: Vec<String>,
    pub nsfw: Option<bool>,
    pub limit: Option<u32>,
}

/// Client for the Civitai API, generic over an HTTP backend.
///
/// Stateless apart from configuration; a single instance is shared by all
/// download workers.
pub struct CivitaiClient<B: HttpBackend> {
    pub(crate) backend: B,
    pub(crate) config: CivitaiConfig,
}

impl DefaultCivitaiClient {
    /// Create a production client from the given configuration.
    #[must_use]
    pub fn new(config: CivitaiConfig) -> Self {
        let backend = ReqwestBackend::new(config.api_key.clone());
        Self { backend, config }
    }

    /// Create a production client from engine settings.
    #[must_use]
    pub fn from_settings(settings: &cmm_core::Config) -> Self {
        Self::new(CivitaiConfig::from_settings(settings))
    }
}

impl<B: HttpBackend> CivitaiClient<B> {
    /// Create a client over a custom backend (tests).
    #[cfg(test)]
    pub(crate) fn with_backend(config: CivitaiConfig, backend: B) -> Self {
        Self { backend, config }
    }

    fn api_url(&self, path: &str) -> CivitaiResult<Url> {
        self.config
            .base_url
            .join(path)
            .map_err(|_| CivitaiError::InvalidUrl {
                url: path.to_string(),
            })
    }

    /// Stream a file into `dest_dir`, reporting throttled progress.
    ///
    /// The filename comes from the `Content-Disposition` header when the
    /// server sends one, else from the URL path. An existing file is not
    /// re-downloaded; the callback still receives its final 100% report so
    /// progress observers converge.
    pub async fn download_file(
        &self,
        url: &str,
        dest_dir: &Path,
        on_progress: impl Fn(FileProgress) + Send + Sync,
        cancel: &CancellationToken,
    ) -> CivitaiResult<PathBuf> {
        let parsed = Url::parse(url).map_err(|_| CivitaiError::InvalidUrl {
            url: url.to_string(),
        })?;

        let mut file = self.backend.get_file(&parsed).await?;

        let filename = file
            .filename_hint
            .take()
            .or_else(|| {
                parsed
                    .path_segments()
                    .and_then(|mut segments| segments.next_back())
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
            })
            .unwrap_or_else(|| "download.bin".to_string());
        let out_path = dest_dir.join(filename);

        if out_path.exists() {
            tracing::info!(path = %out_path.display(), "File already exists, skipping download");
            let total = file.total_bytes.unwrap_or(0);
            on_progress(FileProgress {
                percent: 100,
                delta_bytes: 0,
                total_bytes: total,
            });
            return Ok(out_path);
        }

        let total = file.total_bytes.unwrap_or(0);
        let mut out = std::fs::File::create(&out_path)
            .map_err(|e| CivitaiError::from_io(&e, &out_path))?;

        let mut downloaded: u64 = 0;
        let mut pending_delta: u64 = 0;
        let mut last_percent: u8 = 0;
        let mut last_report = Instant::now();

        loop {
            let chunk = tokio::select! {
                biased;

                () = cancel.cancelled() => return Err(CivitaiError::Cancelled),

                chunk = file.stream.next() => match chunk {
                    Some(chunk) => chunk?,
                    None => break,
                },
            };

            out.write_all(&chunk)
                .map_err(|e| CivitaiError::from_io(&e, &out_path))?;
            downloaded += chunk.len() as u64;
            pending_delta += chunk.len() as u64;

            let percent = if total > 0 {
                u8::try_from(downloaded * 100 / total).unwrap_or(100).min(100)
            } else {
                0
            };

            // Report on every percent step, and at least once per second.
            if percent > last_percent || last_report.elapsed().as_secs() >= 1 {
                on_progress(FileProgress {
                    percent,
                    delta_bytes: pending_delta,
                    total_bytes: total,
                });
                last_percent = percent;
                pending_delta = 0;
                last_report = Instant::now();
            }
        }

        // The contract promises a final 100% report.
        on_progress(FileProgress {
            percent: 100,
            delta_bytes: pending_delta,
            total_bytes: if total > 0 { total } else { downloaded },
        });

        tracing::info!(
            path = %out_path.display(),
            bytes = downloaded,
            "File download complete"
        );
        Ok(out_path)
    }

    /// Fetch a single image to `dest`, bounded by the image timeout.
    pub async fn download_image(&self, url: &str, dest: &Path) -> CivitaiResult<()> {
        let parsed = Url::parse(url).map_err(|_| CivitaiError::InvalidUrl {
            url: url.to_string(),
        })?;

        let bytes = self
            .backend
            .get_bytes(&parsed, self.config.image_timeout)
            .await?;
        std::fs::write(dest, &bytes).map_err(|e| CivitaiError::from_io(&e, dest))?;
        Ok(())
    }

    /// Search models by free text and optional filters.
    ///
    /// Returns the raw result items; hosts shape them for display.
    pub async fn search_models(
        &self,
        query: &str,
        filters: &SearchFilters,
    ) -> CivitaiResult<Vec<serde_json::Value>> {
        let mut url = self.api_url("models")?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("query", query);
            pairs.append_pair(
                "limit",
                &filters
                    .limit
                    .unwrap_or(self.config.fetch_batch_size)
                    .to_string(),
            );
            for tag in &filters.tags {
                pairs.append_pair("tags", tag);
            }
            for kind in &filters.types {
                pairs.append_pair("types", kind);
            }
            for base in &filters.base_models {
                pairs.append_pair("baseModels", base);
            }
            if let Some(nsfw) = filters.nsfw {
                pairs.append_pair("nsfw", if nsfw { "true" } else { "false" });
            }
        }

        let value: serde_json::Value = self.backend.get_json(&url).await?;
        Ok(value
            .get("items")
            .and_then(serde_json::Value::as_array)
            .cloned()
            .unwrap_or_default())
    }
}

#[async_trait]
impl<B: HttpBackend + 'static> RemoteClientPort for CivitaiClient<B> {
    fn parse_url(&self, url: &str) -> Result<ParsedModelUrl, DownloadError> {
        parse_model_url(url).map_err(Into::into)
    }

    async fn fetch_model_info(
        &self,
        model_id: i64,
        version_id: Option<i64>,
        max_images: usize,
    ) -> Result<ModelInfo, DownloadError> {
        self.fetch_model_info(model_id, version_id, max_images)
            .await
            .map_err(Into::into)
    }

    async fn download_file(
        &self,
        url: &str,
        dest_dir: &Path,
        on_progress: cmm_core::FileProgressFn,
        cancel: &CancellationToken,
    ) -> Result<PathBuf, DownloadError> {
        self.download_file(url, dest_dir, move |p| on_progress(p), cancel)
            .await
            .map_err(Into::into)
    }

    async fn download_image(&self, url: &str, dest: &Path) -> Result<(), DownloadError> {
        self.download_image(url, dest).await.map_err(Into::into)
    }
}
