//! Directory routing policy.

use std::path::{Path, PathBuf};

use cmm_core::{ModelInfo, ModelType};

use crate::error::{StorageError, StorageResult};

/// Name of the per-model metadata file.
pub const METADATA_FILE: &str = "metadata.json";

/// Extensions that identify a model binary on disk.
pub const MODEL_FILE_EXTENSIONS: &[&str] = &["ckpt", "safetensors", "pt", "pth"];

/// The distinct category directories under the storage root.
pub const CATEGORY_DIRS: &[&str] = &[
    "checkpoints",
    "loras",
    "embeddings",
    "vae",
    "controlnet",
    "upscale_models",
    "other",
];

/// Map a model type to its ComfyUI category directory.
///
/// Types without dedicated handling route to `other`.
#[must_use]
pub fn category_dir(model_type: &ModelType) -> &'static str {
    match model_type {
        ModelType::Checkpoint => "checkpoints",
        ModelType::Lora | ModelType::LoCon => "loras",
        ModelType::TextualInversion => "embeddings",
        ModelType::Vae => "vae",
        ModelType::Controlnet => "controlnet",
        ModelType::Upscaler => "upscale_models",
        ModelType::Other | ModelType::Unknown(_) => "other",
    }
}

/// Replace every character outside `[A-Za-z0-9_.-]` with `_`.
///
/// Idempotent: sanitizing twice gives the same result.
#[must_use]
pub fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// The deterministic directory for a model under `root`.
#[must_use]
pub fn model_dir(root: &Path, info: &ModelInfo) -> PathBuf {
    root.join(category_dir(&info.model_type))
        .join(&info.base_model)
        .join(sanitize(&info.name))
}

/// The images subdirectory of a model directory.
#[must_use]
pub fn images_dir(model_dir: &Path) -> PathBuf {
    model_dir.join("images")
}

/// Resolve and create the target directory for a model.
///
/// The root itself must already exist (it identifies the user's ComfyUI
/// installation); the category, base-model and model directories are
/// created as needed.
pub fn resolve_model_dir(root: &Path, info: &ModelInfo) -> StorageResult<PathBuf> {
    if root.as_os_str().is_empty() || !root.exists() {
        return Err(StorageError::root_missing(root));
    }

    let dir = model_dir(root, info);
    std::fs::create_dir_all(&dir).map_err(|e| StorageError::io(&dir, &e))?;
    tracing::info!(path = %dir.display(), "Resolved model directory");
    Ok(dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(name: &str, model_type: ModelType, base: &str) -> ModelInfo {
        ModelInfo {
            name: name.to_string(),
            model_type,
            base_model: base.to_string(),
            ..ModelInfo::default()
        }
    }

    #[test]
    fn known_types_route_to_their_category() {
        assert_eq!(category_dir(&ModelType::Checkpoint), "checkpoints");
        assert_eq!(category_dir(&ModelType::Lora), "loras");
        assert_eq!(category_dir(&ModelType::LoCon), "loras");
        assert_eq!(category_dir(&ModelType::TextualInversion), "embeddings");
        assert_eq!(category_dir(&ModelType::Vae), "vae");
        assert_eq!(category_dir(&ModelType::Controlnet), "controlnet");
        assert_eq!(category_dir(&ModelType::Upscaler), "upscale_models");
    }

    #[test]
    fn unknown_types_route_to_other() {
        assert_eq!(category_dir(&ModelType::Other), "other");
        assert_eq!(
            category_dir(&ModelType::Unknown("Hypernetwork".to_string())),
            "other"
        );
    }

    #[test]
    fn sanitize_replaces_disallowed_characters() {
        assert_eq!(sanitize("My Model: v2 (final)"), "My_Model__v2__final_");
        assert_eq!(sanitize("already_safe-1.0"), "already_safe-1.0");
        assert_eq!(sanitize("日本語モデル"), "______");
    }

    #[test]
    fn sanitize_is_idempotent() {
        for name in ["a b/c", "weird\\name?", "ok.name-1_2", ""] {
            let once = sanitize(name);
            assert_eq!(sanitize(&once), once);
            assert!(once
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-')));
        }
    }

    #[test]
    fn model_dir_combines_category_base_and_name() {
        let dir = model_dir(
            Path::new("/srv/comfy"),
            &info("My Lora!", ModelType::Lora, "SDXL 1.0"),
        );
        assert_eq!(dir, Path::new("/srv/comfy/loras/SDXL 1.0/My_Lora_"));
    }

    #[test]
    fn resolve_fails_without_root() {
        let err =
            resolve_model_dir(Path::new(""), &info("x", ModelType::Lora, "SD1.5")).unwrap_err();
        assert!(matches!(err, StorageError::RootMissing { .. }));

        let err = resolve_model_dir(
            Path::new("/definitely/not/a/real/root"),
            &info("x", ModelType::Lora, "SD1.5"),
        )
        .unwrap_err();
        assert!(matches!(err, StorageError::RootMissing { .. }));
    }

    #[test]
    fn resolve_creates_nested_directories() {
        let root = tempfile::tempdir().unwrap();
        let dir =
            resolve_model_dir(root.path(), &info("Nice Model", ModelType::Vae, "SD1.5")).unwrap();
        assert!(dir.is_dir());
        assert!(dir.ends_with("vae/SD1.5/Nice_Model"));
    }
}
