//! Wire DTOs for the Civitai API and client configuration.
//!
//! These types mirror the remote JSON loosely: every field the client does
//! not strictly need is defaulted, so schema drift on the remote side does
//! not break deserialization. The client maps them into `cmm_core` domain
//! types before they leave this crate.

use std::time::Duration;

use cmm_core::{ImageMeta, ImageResource, ImageStats, ModelStats};
use serde::Deserialize;
use url::Url;

/// Default API root.
pub const DEFAULT_BASE_URL: &str = "https://civitai.com/api/v1/";

/// User agent sent with every request.
pub const USER_AGENT: &str = "cmm/0.3";

/// Configuration for the Civitai client.
#[derive(Debug, Clone)]
pub struct CivitaiConfig {
    /// API root, with a trailing slash.
    pub base_url: Url,
    /// Bearer token attached to every request when present.
    pub api_key: Option<String>,
    /// Page size hint for list endpoints.
    pub fetch_batch_size: u32,
    /// Total timeout for single image fetches.
    pub image_timeout: Duration,
}

impl Default for CivitaiConfig {
    fn default() -> Self {
        Self {
            base_url: Url::parse(DEFAULT_BASE_URL).expect("default URL is valid"),
            api_key: None,
            fetch_batch_size: 100,
            image_timeout: Duration::from_secs(15),
        }
    }
}

impl CivitaiConfig {
    /// Derive a client configuration from the engine settings.
    #[must_use]
    pub fn from_settings(settings: &cmm_core::Config) -> Self {
        Self {
            api_key: settings.api_key().map(str::to_string),
            fetch_batch_size: settings.fetch_batch_size,
            ..Self::default()
        }
    }
}

/// `GET /api/v1/models/{id}` response.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct ModelResponse {
    pub name: Option<String>,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub model_type: Option<String>,
    pub nsfw: bool,
    pub creator: Option<CreatorResponse>,
    pub stats: ModelStats,
    pub model_versions: Vec<VersionSummary>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct CreatorResponse {
    pub username: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct VersionSummary {
    pub id: i64,
}

/// `GET /api/v1/model-versions/{id}` response.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct VersionResponse {
    pub name: Option<String>,
    pub base_model: Option<String>,
    pub trained_words: Vec<String>,
    pub download_url: Option<String>,
    pub files: Vec<FileEntry>,
    pub images: Vec<ImageEntry>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct FileEntry {
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub download_url: Option<String>,
    pub primary: bool,
    pub metadata: FileMetadata,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct FileMetadata {
    pub format: Option<String>,
    pub dependencies: Option<serde_json::Value>,
}

impl FileEntry {
    /// Whether the remote advertises the safer serialization format.
    pub fn is_safetensor(&self) -> bool {
        if let Some(format) = &self.metadata.format {
            return format.eq_ignore_ascii_case("safetensor");
        }
        self.name
            .as_deref()
            .is_some_and(|name| name.ends_with(".safetensors"))
    }
}

/// The remote reports image nsfw either as a bool or a graded level.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum NsfwFlag {
    Bool(bool),
    Level(String),
}

impl Default for NsfwFlag {
    fn default() -> Self {
        Self::Bool(false)
    }
}

impl NsfwFlag {
    /// Collapse to the binary flag the filter works with.
    pub fn is_nsfw(&self) -> bool {
        match self {
            Self::Bool(value) => *value,
            Self::Level(level) => !matches!(level.as_str(), "" | "None" | "false"),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct ImageEntry {
    pub url: String,
    pub nsfw: NsfwFlag,
    pub meta: Option<serde_json::Value>,
    pub stats: ImageStats,
}

/// Extract the generation metadata the gallery cares about.
///
/// The remote's `meta` object is a free-form dump of generation
/// parameters; only `prompt`, the checkpoint name and the resource list
/// are carried over.
pub(crate) fn image_meta_from_wire(value: &serde_json::Value) -> Option<ImageMeta> {
    if !value.is_object() {
        return None;
    }

    let prompt = value
        .get("prompt")
        .and_then(serde_json::Value::as_str)
        .map(str::to_string);
    let model = value
        .get("Model")
        .or_else(|| value.get("model"))
        .and_then(serde_json::Value::as_str)
        .map(str::to_string);
    let resources = value
        .get("resources")
        .and_then(serde_json::Value::as_array)
        .map(|entries| {
            entries
                .iter()
                .filter_map(|entry| {
                    let name = entry.get("name")?.as_str()?.to_string();
                    let kind = entry
                        .get("type")
                        .and_then(serde_json::Value::as_str)
                        .unwrap_or_default()
                        .to_string();
                    Some(ImageResource { kind, name })
                })
                .collect()
        })
        .unwrap_or_default();

    Some(ImageMeta {
        prompt,
        model,
        resources,
    })
}
