//! Model metadata value objects.
//!
//! `ModelInfo` is the single source of truth for a downloaded model: it is
//! populated from remote metadata by the Civitai client, enriched by the
//! download worker (local paths, timestamps, size), serialized verbatim
//! into `metadata.json`, and read back by the storage scanner and the
//! gallery emitter. Field names in the serialized form are fixed; changing
//! them breaks every previously written metadata file.

use serde::{Deserialize, Serialize};

/// Coarse model classification as reported by the remote service.
///
/// The remote vocabulary is open-ended; values we do not recognize are
/// preserved verbatim in `Unknown` so they survive a metadata round-trip,
/// and are routed to the `Other` category directory by the storage layout.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ModelType {
    Checkpoint,
    Lora,
    LoCon,
    TextualInversion,
    Vae,
    Controlnet,
    Upscaler,
    Other,
    /// Any type string we have no dedicated handling for.
    Unknown(String),
}

impl ModelType {
    /// The remote service's name for this type.
    #[must_use]
    pub fn as_remote_str(&self) -> &str {
        match self {
            Self::Checkpoint => "Checkpoint",
            Self::Lora => "LORA",
            Self::LoCon => "LoCon",
            Self::TextualInversion => "TextualInversion",
            Self::Vae => "VAE",
            Self::Controlnet => "Controlnet",
            Self::Upscaler => "Upscaler",
            Self::Other => "Other",
            Self::Unknown(raw) => raw,
        }
    }
}

impl From<String> for ModelType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "Checkpoint" => Self::Checkpoint,
            "LORA" => Self::Lora,
            "LoCon" => Self::LoCon,
            "TextualInversion" => Self::TextualInversion,
            "VAE" => Self::Vae,
            "Controlnet" => Self::Controlnet,
            "Upscaler" => Self::Upscaler,
            "Other" => Self::Other,
            _ => Self::Unknown(value),
        }
    }
}

impl From<ModelType> for String {
    fn from(value: ModelType) -> Self {
        value.as_remote_str().to_string()
    }
}

impl Default for ModelType {
    fn default() -> Self {
        Self::Other
    }
}

impl std::fmt::Display for ModelType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_remote_str())
    }
}

/// Per-image reaction counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ImageStats {
    pub like_count: u64,
    pub heart_count: u64,
    pub laugh_count: u64,
}

impl ImageStats {
    /// Reaction score used to rank preview images (unweighted sum).
    #[must_use]
    pub const fn score(&self) -> u64 {
        self.like_count + self.heart_count + self.laugh_count
    }
}

/// A generation resource referenced by an image (checkpoint, lora, ...).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageResource {
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
}

/// Generation metadata attached to a preview image.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    /// Checkpoint name the image was generated with.
    #[serde(rename = "model", skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub resources: Vec<ImageResource>,
}

impl ImageMeta {
    /// Names of the lora resources, in declaration order.
    #[must_use]
    pub fn lora_names(&self) -> Vec<&str> {
        self.resources
            .iter()
            .filter(|r| r.kind == "lora")
            .map(|r| r.name.as_str())
            .collect()
    }
}

/// One preview image (or video) attached to a model version.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ModelImage {
    pub url: String,
    pub nsfw: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<ImageMeta>,
    pub stats: ImageStats,
    /// Absolute path of the downloaded copy, set by the worker.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_path: Option<String>,
}

impl ModelImage {
    /// Reaction score of this image.
    #[must_use]
    pub const fn score(&self) -> u64 {
        self.stats.score()
    }

    /// Basename of the image URL path, used as the on-disk filename.
    #[must_use]
    pub fn file_name(&self) -> Option<&str> {
        self.url
            .split('/')
            .next_back()
            .map(|last| last.split('?').next().unwrap_or(last))
            .filter(|name| !name.is_empty())
    }
}

/// Aggregate statistics the remote service reports for a model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ModelStats {
    pub download_count: u64,
    pub comment_count: u64,
    pub rating: f64,
    pub rating_count: u64,
}

impl ModelStats {
    /// Overall 0-100 rating mixing popularity and review signals.
    ///
    /// Downloads contribute up to 50 points, comments up to 25, and the
    /// averaged review rating up to 25.
    #[must_use]
    pub fn overall_rating(&self) -> i64 {
        #[allow(clippy::cast_precision_loss)]
        let download_rating = f64::min(50.0, self.download_count as f64 / 100.0);
        #[allow(clippy::cast_precision_loss)]
        let comment_rating = f64::min(25.0, self.comment_count as f64 / 10.0);
        let review_rating = if self.rating_count > 0 {
            #[allow(clippy::cast_precision_loss)]
            f64::min(25.0, self.rating * self.rating_count as f64 / 20.0)
        } else {
            0.0
        };

        #[allow(clippy::cast_possible_truncation)]
        {
            (download_rating + comment_rating + review_rating) as i64
        }
    }
}

/// A dependency another artifact declares on this or other models.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Dependency {
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
}

/// Full metadata for one model version, as persisted to `metadata.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ModelInfo {
    pub id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version_id: Option<i64>,
    pub name: String,
    #[serde(rename = "type")]
    pub model_type: ModelType,
    pub base_model: String,
    pub creator: String,
    pub version_name: String,
    pub description: String,
    /// Activation tags, ordered and unique.
    pub tags: Vec<String>,
    pub download_url: String,
    /// Size of the model binary in bytes, known after download.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    /// Preview media, highest reaction score first.
    pub images: Vec<ModelImage>,
    /// Local path of the first downloaded image.
    pub thumbnail: String,
    pub nsfw: bool,
    pub stats: ModelStats,
    /// Overall 0-100 rating derived from `stats`.
    pub rating: i64,
    /// Local-only user flag; never sent to the remote.
    pub favorite: bool,
    pub dependencies: Vec<Dependency>,
    pub download_date: String,
    pub last_updated: String,
    /// Absolute local directory this model lives in.
    pub path: String,
}

impl ModelInfo {
    /// Recompute `rating` from the current `stats`.
    pub fn refresh_rating(&mut self) {
        self.rating = self.stats.overall_rating();
    }

    /// Whether any preview image has been downloaded locally.
    #[must_use]
    pub fn has_local_images(&self) -> bool {
        self.images.iter().any(|img| img.local_path.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_type_round_trips_unknown_values() {
        let parsed = ModelType::from("Hypernetwork".to_string());
        assert_eq!(parsed, ModelType::Unknown("Hypernetwork".to_string()));
        assert_eq!(String::from(parsed), "Hypernetwork");
    }

    #[test]
    fn model_type_serde_uses_remote_names() {
        let json = serde_json::to_string(&ModelType::Lora).unwrap();
        assert_eq!(json, "\"LORA\"");

        let back: ModelType = serde_json::from_str("\"VAE\"").unwrap();
        assert_eq!(back, ModelType::Vae);
    }

    #[test]
    fn image_stats_score_is_unweighted_sum() {
        let stats = ImageStats {
            like_count: 3,
            heart_count: 2,
            laugh_count: 1,
        };
        assert_eq!(stats.score(), 6);
    }

    #[test]
    fn image_file_name_strips_query() {
        let img = ModelImage {
            url: "https://image.civitai.com/w/abc123.jpeg?width=450".to_string(),
            ..Default::default()
        };
        assert_eq!(img.file_name(), Some("abc123.jpeg"));
    }

    #[test]
    fn overall_rating_caps_each_component() {
        let stats = ModelStats {
            download_count: 1_000_000,
            comment_count: 100_000,
            rating: 5.0,
            rating_count: 10_000,
        };
        assert_eq!(stats.overall_rating(), 100);

        assert_eq!(ModelStats::default().overall_rating(), 0);
    }

    #[test]
    fn metadata_round_trip_preserves_fields() {
        let info = ModelInfo {
            id: 1234,
            version_id: Some(5678),
            name: "Dreamscape".to_string(),
            model_type: ModelType::Lora,
            base_model: "SDXL 1.0".to_string(),
            creator: "someone".to_string(),
            version_name: "v2".to_string(),
            description: "A lora".to_string(),
            tags: vec!["dream".to_string(), "scape".to_string()],
            download_url: "https://civitai.com/api/download/models/5678".to_string(),
            size: Some(151_020_544),
            images: vec![ModelImage {
                url: "https://image.civitai.com/x/1.png".to_string(),
                nsfw: false,
                meta: Some(ImageMeta {
                    prompt: Some("a dream".to_string()),
                    model: Some("base".to_string()),
                    resources: vec![ImageResource {
                        kind: "lora".to_string(),
                        name: "Dreamscape".to_string(),
                    }],
                }),
                stats: ImageStats {
                    like_count: 10,
                    heart_count: 4,
                    laugh_count: 1,
                },
                local_path: Some("/tmp/images/1.png".to_string()),
            }],
            thumbnail: "/tmp/images/1.png".to_string(),
            ..Default::default()
        };

        let json = serde_json::to_string_pretty(&info).unwrap();
        assert!(json.contains("\"baseModel\""));
        assert!(json.contains("\"type\": \"LORA\""));
        assert!(json.contains("\"likeCount\""));

        let back: ModelInfo = serde_json::from_str(&json).unwrap();
        assert_eq!(back, info);
    }
}
