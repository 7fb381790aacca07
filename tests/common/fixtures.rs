//! Canned models and a scriptable fake remote client.

use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use cmm::{
    DownloadError, FileProgress, FileProgressFn, ImageStats, ModelImage, ModelInfo, ModelType,
    ParsedModelUrl, RemoteClientPort,
};

/// Build a preview image with the given reaction counts.
pub fn image(url: &str, nsfw: bool, likes: u64) -> ModelImage {
    ModelImage {
        url: url.to_string(),
        nsfw,
        meta: None,
        stats: ImageStats {
            like_count: likes,
            heart_count: 0,
            laugh_count: 0,
        },
        local_path: None,
    }
}

/// A lora with a download URL and no images.
pub fn sample_model(id: i64, name: &str) -> ModelInfo {
    ModelInfo {
        id,
        version_id: Some(id * 10),
        name: name.to_string(),
        model_type: ModelType::Lora,
        base_model: "SDXL 1.0".to_string(),
        creator: "tester".to_string(),
        version_name: "v1".to_string(),
        description: "a test model".to_string(),
        tags: vec!["test".to_string()],
        download_url: format!("https://civitai.com/api/download/models/{id}"),
        ..ModelInfo::default()
    }
}

/// Write a minimal `metadata.json` into `dir`.
pub fn write_metadata(dir: &Path, id: i64, name: &str, model_type: &str, base: &str) {
    std::fs::create_dir_all(dir).unwrap();
    let value = serde_json::json!({
        "id": id,
        "name": name,
        "type": model_type,
        "baseModel": base,
    });
    std::fs::write(
        dir.join("metadata.json"),
        serde_json::to_string_pretty(&value).unwrap(),
    )
    .unwrap();
}

/// Scriptable in-memory remote client.
///
/// Serves one canned model, streams a configurable binary in chunks with
/// an optional per-chunk delay (so cancellation can land mid-transfer),
/// and writes canned image bytes.
pub struct FakeRemote {
    pub info: ModelInfo,
    pub file_body: Vec<u8>,
    pub chunk_size: usize,
    pub chunk_delay: Duration,
    pub image_bytes: Vec<u8>,
    /// Image URLs whose download should fail.
    pub failing_images: HashSet<String>,
}

impl FakeRemote {
    pub fn new(info: ModelInfo) -> Arc<Self> {
        Arc::new(Self {
            info,
            file_body: vec![0u8; 256],
            chunk_size: 64,
            chunk_delay: Duration::ZERO,
            image_bytes: b"image-bytes".to_vec(),
            failing_images: HashSet::new(),
        })
    }

    pub fn builder(info: ModelInfo) -> FakeRemoteBuilder {
        FakeRemoteBuilder {
            inner: Self {
                info,
                file_body: vec![0u8; 256],
                chunk_size: 64,
                chunk_delay: Duration::ZERO,
                image_bytes: b"image-bytes".to_vec(),
                failing_images: HashSet::new(),
            },
        }
    }
}

pub struct FakeRemoteBuilder {
    inner: FakeRemote,
}

impl FakeRemoteBuilder {
    pub fn file_body(mut self, body: Vec<u8>) -> Self {
        self.inner.file_body = body;
        self
    }

    pub fn chunk(mut self, size: usize, delay: Duration) -> Self {
        self.inner.chunk_size = size.max(1);
        self.inner.chunk_delay = delay;
        self
    }

    pub fn failing_image(mut self, url: &str) -> Self {
        self.inner.failing_images.insert(url.to_string());
        self
    }

    pub fn build(self) -> Arc<FakeRemote> {
        Arc::new(self.inner)
    }
}

#[async_trait]
impl RemoteClientPort for FakeRemote {
    fn parse_url(&self, url: &str) -> Result<ParsedModelUrl, DownloadError> {
        let start = url
            .find("/models/")
            .ok_or_else(|| DownloadError::invalid_url(url))?
            + "/models/".len();
        let digits: String = url[start..]
            .chars()
            .take_while(char::is_ascii_digit)
            .collect();
        let model_id = digits
            .parse()
            .map_err(|_| DownloadError::invalid_url(url))?;
        Ok(ParsedModelUrl {
            model_id,
            version_id: None,
        })
    }

    async fn fetch_model_info(
        &self,
        _model_id: i64,
        _version_id: Option<i64>,
        max_images: usize,
    ) -> Result<ModelInfo, DownloadError> {
        let mut info = self.info.clone();
        info.images.truncate(max_images);
        Ok(info)
    }

    async fn download_file(
        &self,
        _url: &str,
        dest_dir: &Path,
        on_progress: FileProgressFn,
        cancel: &CancellationToken,
    ) -> Result<PathBuf, DownloadError> {
        let out_path = dest_dir.join("model.safetensors");
        let mut out = std::fs::File::create(&out_path)
            .map_err(|e| DownloadError::internal(e.to_string()))?;

        let total = self.file_body.len() as u64;
        let mut written = 0u64;
        for chunk in self.file_body.chunks(self.chunk_size) {
            if cancel.is_cancelled() {
                return Err(DownloadError::Cancelled);
            }
            if !self.chunk_delay.is_zero() {
                tokio::time::sleep(self.chunk_delay).await;
            }
            out.write_all(chunk)
                .map_err(|e| DownloadError::internal(e.to_string()))?;
            written += chunk.len() as u64;
            #[allow(clippy::cast_possible_truncation)]
            on_progress(FileProgress {
                percent: (written * 100 / total.max(1)) as u8,
                delta_bytes: chunk.len() as u64,
                total_bytes: total,
            });
        }
        Ok(out_path)
    }

    async fn download_image(&self, url: &str, dest: &Path) -> Result<(), DownloadError> {
        if self.failing_images.contains(url) {
            return Err(DownloadError::network(format!("image fetch failed: {url}")));
        }
        std::fs::write(dest, &self.image_bytes)
            .map_err(|e| DownloadError::internal(e.to_string()))?;
        Ok(())
    }
}
