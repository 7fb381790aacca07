//! Model metadata assembly.

use cmm_core::{Dependency, ModelImage, ModelInfo, ModelType};

use crate::error::{CivitaiError, CivitaiResult};
use crate::http::HttpBackend;
use crate::models::{image_meta_from_wire, FileEntry, ModelResponse, VersionResponse};

use super::CivitaiClient;

impl<B: HttpBackend> CivitaiClient<B> {
    /// Fetch model and version metadata and assemble a [`ModelInfo`].
    ///
    /// When `version_id` is `None` the latest version is used. Images are
    /// ranked by reaction score (ties keep server order) and truncated to
    /// `max_images`.
    pub async fn fetch_model_info(
        &self,
        model_id: i64,
        version_id: Option<i64>,
        max_images: usize,
    ) -> CivitaiResult<ModelInfo> {
        tracing::info!(model_id, "Fetching model metadata");

        let model_url = self.api_url(&format!("models/{model_id}"))?;
        let model: ModelResponse = self.backend.get_json(&model_url).await?;

        let version_id = version_id
            .or_else(|| model.model_versions.first().map(|v| v.id))
            .ok_or_else(|| CivitaiError::InvalidResponse {
                message: format!("model {model_id} has no versions"),
            })?;

        let version_url = self.api_url(&format!("model-versions/{version_id}"))?;
        let version: VersionResponse = self.backend.get_json(&version_url).await?;

        let images = rank_images(&version, max_images);
        tracing::info!(
            model_id,
            version_id,
            images = images.len(),
            "Model metadata fetched"
        );

        let primary_file = select_primary_file(&version.files);
        let download_url = primary_file
            .and_then(|f| f.download_url.clone())
            .or_else(|| version.download_url.clone())
            .unwrap_or_default();

        let mut info = ModelInfo {
            id: model_id,
            version_id: Some(version_id),
            name: model.name.unwrap_or_else(|| format!("model_{model_id}")),
            model_type: ModelType::from(
                model.model_type.unwrap_or_else(|| "Other".to_string()),
            ),
            base_model: version
                .base_model
                .unwrap_or_else(|| "unknown".to_string()),
            creator: model
                .creator
                .and_then(|c| c.username)
                .unwrap_or_else(|| "Unknown".to_string()),
            version_name: version.name.unwrap_or_default(),
            description: strip_html_tags(&model.description.unwrap_or_default()),
            tags: dedup_tags(version.trained_words),
            download_url,
            nsfw: model.nsfw,
            stats: model.stats,
            dependencies: extract_dependencies(&version.files),
            images,
            ..ModelInfo::default()
        };
        info.refresh_rating();

        Ok(info)
    }
}

/// Rank the version's images by reaction score and keep the top `max`.
///
/// `sort_by_key` is stable, so equal scores keep the server's order.
fn rank_images(version: &VersionResponse, max: usize) -> Vec<ModelImage> {
    let mut images: Vec<ModelImage> = version
        .images
        .iter()
        .filter(|entry| !entry.url.is_empty())
        .map(|entry| ModelImage {
            url: entry.url.clone(),
            nsfw: entry.nsfw.is_nsfw(),
            meta: entry.meta.as_ref().and_then(image_meta_from_wire),
            stats: entry.stats,
            local_path: None,
        })
        .collect();

    images.sort_by_key(|img| std::cmp::Reverse(img.score()));
    images.truncate(max);
    images
}

/// Choose the single file to download.
///
/// Prefers the safer serialization format when the remote offers
/// alternatives, then the entry flagged primary, then the first with a
/// download URL.
fn select_primary_file(files: &[FileEntry]) -> Option<&FileEntry> {
    let candidates: Vec<&FileEntry> = files
        .iter()
        .filter(|f| f.download_url.is_some() && f.kind.as_deref() != Some("VAE"))
        .collect();

    candidates
        .iter()
        .find(|f| f.is_safetensor())
        .or_else(|| candidates.iter().find(|f| f.primary))
        .copied()
        .or_else(|| candidates.first().copied())
}

/// Collect declared dependencies: VAE file entries plus anything the file
/// metadata lists explicitly.
fn extract_dependencies(files: &[FileEntry]) -> Vec<Dependency> {
    let mut dependencies = Vec::new();

    for file in files {
        if file.kind.as_deref() == Some("VAE") {
            dependencies.push(Dependency {
                kind: "VAE".to_string(),
                name: file
                    .name
                    .clone()
                    .unwrap_or_else(|| "Unknown VAE".to_string()),
                required: true,
                download_url: None,
            });
        }

        let Some(declared) = file
            .metadata
            .dependencies
            .as_ref()
            .and_then(serde_json::Value::as_array)
        else {
            continue;
        };
        for dep in declared {
            let Some(dep) = dep.as_object() else { continue };
            dependencies.push(Dependency {
                kind: dep
                    .get("type")
                    .and_then(serde_json::Value::as_str)
                    .unwrap_or("Unknown")
                    .to_string(),
                name: dep
                    .get("name")
                    .and_then(serde_json::Value::as_str)
                    .unwrap_or("Unknown Dependency")
                    .to_string(),
                required: dep
                    .get("required")
                    .and_then(serde_json::Value::as_bool)
                    .unwrap_or(false),
                download_url: dep
                    .get("url")
                    .and_then(serde_json::Value::as_str)
                    .map(str::to_string),
            });
        }
    }

    dependencies
}

/// Drop everything between `<` and `>`; remote descriptions are HTML.
fn strip_html_tags(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut in_tag = false;
    for ch in input.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            c if !in_tag => out.push(c),
            _ => {}
        }
    }
    out
}

/// Keep tag order, drop duplicates.
fn dedup_tags(tags: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    tags.into_iter()
        .filter(|tag| seen.insert(tag.clone()))
        .collect()
}
