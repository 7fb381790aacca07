//! Model tree maintenance: scanning, usage, duplicates, orphans, export.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use walkdir::WalkDir;

use cmm_core::{ModelInfo, ModelType};

use crate::error::{StorageError, StorageResult};
use crate::layout::{
    category_dir, model_dir, CATEGORY_DIRS, METADATA_FILE, MODEL_FILE_EXTENSIONS,
};

/// A model found on disk during a scan.
#[derive(Debug, Clone)]
pub struct ScanRecord {
    /// Parsed metadata.
    pub info: ModelInfo,
    /// Directory the `metadata.json` lives in.
    pub local_path: PathBuf,
}

/// Filesystem usage for the storage root.
#[derive(Debug, Clone, Default)]
pub struct StorageUsage {
    /// Total bytes of the filesystem holding the root.
    pub total_bytes: u64,
    /// Free bytes of that filesystem.
    pub free_bytes: u64,
    /// Bytes per display category, in a stable order.
    pub categories: IndexMap<String, u64>,
}

/// A model-like file without a managing `metadata.json`.
#[derive(Debug, Clone)]
pub struct OrphanFile {
    pub path: PathBuf,
    pub size: u64,
    pub modified: Option<DateTime<Utc>>,
}

/// Per-path outcome of an export.
#[derive(Debug, Clone)]
pub struct ExportDetail {
    pub path: PathBuf,
    pub success: bool,
    pub error: Option<String>,
}

/// Aggregate outcome of an export.
#[derive(Debug, Clone, Default)]
pub struct ExportOutcome {
    pub success_count: usize,
    pub failed_count: usize,
    pub details: Vec<ExportDetail>,
}

/// Maintenance operations over a storage root.
#[derive(Debug, Clone)]
pub struct StorageManager {
    root: PathBuf,
}

impl StorageManager {
    /// Create a manager for the given root.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The storage root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn root_exists(&self) -> bool {
        !self.root.as_os_str().is_empty() && self.root.exists()
    }

    /// Walk every category directory and parse each `metadata.json`.
    ///
    /// Unreadable or malformed files are logged and skipped; a scan never
    /// fails as a whole.
    #[must_use]
    pub fn scan(&self) -> Vec<ScanRecord> {
        if !self.root_exists() {
            tracing::error!(root = %self.root.display(), "Storage root not found");
            return Vec::new();
        }

        let mut records = Vec::new();
        for category in CATEGORY_DIRS {
            let dir = self.root.join(category);
            if !dir.exists() {
                continue;
            }

            for entry in WalkDir::new(&dir)
                .into_iter()
                .filter_map(Result::ok)
                .filter(|e| e.file_type().is_file() && e.file_name() == METADATA_FILE)
            {
                match read_metadata(entry.path()) {
                    Ok(Some(info)) => {
                        let local_path = entry
                            .path()
                            .parent()
                            .map(Path::to_path_buf)
                            .unwrap_or_default();
                        records.push(ScanRecord { info, local_path });
                    }
                    Ok(None) => {
                        tracing::warn!(
                            path = %entry.path().display(),
                            "Skipping metadata file without id/name"
                        );
                    }
                    Err(e) => {
                        tracing::error!(
                            path = %entry.path().display(),
                            error = %e,
                            "Failed to read metadata file"
                        );
                    }
                }
            }
        }
        records
    }

    /// Recursive byte sum of a directory.
    #[must_use]
    pub fn folder_size(&self, path: &Path) -> u64 {
        WalkDir::new(path)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file())
            .filter_map(|e| e.metadata().ok())
            .map(|m| m.len())
            .sum()
    }

    /// Disk usage of the filesystem holding the root, plus per-category
    /// sizes in the aggregated display view.
    pub fn usage(&self) -> StorageResult<StorageUsage> {
        if !self.root_exists() {
            return Err(StorageError::root_missing(&self.root));
        }

        let (total_bytes, free_bytes) = disk_space_for(&self.root);

        // LORA and LoCon share the loras directory and TextualInversion is
        // the embeddings directory, so the per-directory sums already are
        // the aggregated view.
        let mut categories = IndexMap::new();
        for (label, dir) in [
            ("LoRAs", "loras"),
            ("Checkpoints", "checkpoints"),
            ("Embeddings", "embeddings"),
            ("VAEs", "vae"),
            ("ControlNet", "controlnet"),
            ("Upscalers", "upscale_models"),
            ("Other", "other"),
        ] {
            let path = self.root.join(dir);
            let size = if path.exists() {
                self.folder_size(&path)
            } else {
                0
            };
            categories.insert(label.to_string(), size);
        }

        Ok(StorageUsage {
            total_bytes,
            free_bytes,
            categories,
        })
    }

    /// Remove a model directory (or single file).
    pub fn delete(&self, path: &Path) -> StorageResult<()> {
        if !path.exists() {
            return Err(StorageError::NotFound {
                path: path.display().to_string(),
            });
        }

        let result = if path.is_dir() {
            std::fs::remove_dir_all(path)
        } else {
            std::fs::remove_file(path)
        };
        result.map_err(|e| StorageError::io(path, &e))?;
        tracing::info!(path = %path.display(), "Deleted");
        Ok(())
    }

    /// Locate a model's directory.
    ///
    /// Tries the deterministic sanitized path first; failing that, scans
    /// the category for a `metadata.json` with a matching id.
    #[must_use]
    pub fn find_path(
        &self,
        id: i64,
        model_type: &ModelType,
        base_model: &str,
        name: &str,
    ) -> Option<PathBuf> {
        if !self.root_exists() {
            return None;
        }

        let info = ModelInfo {
            name: name.to_string(),
            model_type: model_type.clone(),
            base_model: base_model.to_string(),
            ..ModelInfo::default()
        };
        let deterministic = model_dir(&self.root, &info);
        if deterministic.exists() {
            return Some(deterministic);
        }

        let category = self.root.join(category_dir(model_type));
        WalkDir::new(category)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file() && e.file_name() == METADATA_FILE)
            .find_map(|entry| {
                let info = read_metadata(entry.path()).ok()??;
                if info.id == id {
                    entry.path().parent().map(Path::to_path_buf)
                } else {
                    None
                }
            })
    }

    /// Group scanned models by `(name, type, baseModel)`; groups of two or
    /// more are duplicates.
    #[must_use]
    pub fn find_duplicates(&self) -> Vec<Vec<ScanRecord>> {
        let mut groups: IndexMap<(String, String, String), Vec<ScanRecord>> = IndexMap::new();
        for record in self.scan() {
            let key = (
                record.info.name.clone(),
                record.info.model_type.as_remote_str().to_string(),
                record.info.base_model.clone(),
            );
            groups.entry(key).or_default().push(record);
        }

        groups
            .into_values()
            .filter(|group| group.len() >= 2)
            .collect()
    }

    /// Model-like files whose directory has no `metadata.json`.
    #[must_use]
    pub fn find_orphans(&self) -> Vec<OrphanFile> {
        if !self.root_exists() {
            return Vec::new();
        }

        let mut orphans = Vec::new();
        for category in CATEGORY_DIRS {
            let dir = self.root.join(category);
            if !dir.exists() {
                continue;
            }

            for entry in WalkDir::new(&dir)
                .into_iter()
                .filter_map(Result::ok)
                .filter(|e| e.file_type().is_file())
            {
                let is_model_file = entry
                    .path()
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| {
                        MODEL_FILE_EXTENSIONS
                            .iter()
                            .any(|known| ext.eq_ignore_ascii_case(known))
                    });
                if !is_model_file {
                    continue;
                }

                let managed = entry
                    .path()
                    .parent()
                    .is_some_and(|parent| parent.join(METADATA_FILE).exists());
                if managed {
                    continue;
                }

                let metadata = entry.metadata().ok();
                orphans.push(OrphanFile {
                    path: entry.path().to_path_buf(),
                    size: metadata.as_ref().map_or(0, std::fs::Metadata::len),
                    modified: metadata
                        .and_then(|m| m.modified().ok())
                        .map(DateTime::<Utc>::from),
                });
            }
        }
        orphans
    }

    /// Copy each path (directory or file) into `dest`, keeping leaf names.
    ///
    /// One failing path does not stop the rest; the outcome carries a
    /// per-path result.
    #[must_use]
    pub fn export(&self, paths: &[PathBuf], dest: &Path) -> ExportOutcome {
        let mut outcome = ExportOutcome::default();

        if let Err(e) = std::fs::create_dir_all(dest) {
            tracing::error!(dest = %dest.display(), error = %e, "Cannot create export directory");
            for path in paths {
                outcome.failed_count += 1;
                outcome.details.push(ExportDetail {
                    path: path.clone(),
                    success: false,
                    error: Some(e.to_string()),
                });
            }
            return outcome;
        }

        for path in paths {
            let result = export_one(path, dest);
            match result {
                Ok(()) => {
                    outcome.success_count += 1;
                    outcome.details.push(ExportDetail {
                        path: path.clone(),
                        success: true,
                        error: None,
                    });
                }
                Err(e) => {
                    tracing::error!(path = %path.display(), error = %e, "Export failed");
                    outcome.failed_count += 1;
                    outcome.details.push(ExportDetail {
                        path: path.clone(),
                        success: false,
                        error: Some(e.to_string()),
                    });
                }
            }
        }
        outcome
    }

    /// Count scanned models per type.
    #[must_use]
    pub fn model_counts_by_type(&self) -> HashMap<String, usize> {
        let mut counts = HashMap::new();
        for record in self.scan() {
            *counts
                .entry(record.info.model_type.as_remote_str().to_string())
                .or_insert(0) += 1;
        }
        counts
    }
}

/// Parse a metadata file; `Ok(None)` when it lacks the identifying keys.
fn read_metadata(path: &Path) -> StorageResult<Option<ModelInfo>> {
    let raw = std::fs::read_to_string(path).map_err(|e| StorageError::io(path, &e))?;
    let value: serde_json::Value = serde_json::from_str(&raw).map_err(|e| StorageError::Io {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;

    if value.get("id").is_none() || value.get("name").is_none() {
        return Ok(None);
    }

    let info: ModelInfo = serde_json::from_value(value).map_err(|e| StorageError::Io {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    Ok(Some(info))
}

/// Total and available bytes of the disk holding `path`.
///
/// Picks the mounted disk with the longest mount-point prefix of `path`;
/// `(0, 0)` when nothing matches (e.g. exotic mount setups).
fn disk_space_for(path: &Path) -> (u64, u64) {
    let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    let disks = sysinfo::Disks::new_with_refreshed_list();

    disks
        .iter()
        .filter(|disk| canonical.starts_with(disk.mount_point()))
        .max_by_key(|disk| disk.mount_point().as_os_str().len())
        .map_or((0, 0), |disk| {
            (disk.total_space(), disk.available_space())
        })
}

fn export_one(path: &Path, dest: &Path) -> std::io::Result<()> {
    if !path.exists() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("{} does not exist", path.display()),
        ));
    }

    let leaf = path.file_name().ok_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::InvalidInput, "path has no file name")
    })?;
    let target = dest.join(leaf);

    if path.is_dir() {
        copy_dir_recursive(path, &target)
    } else {
        std::fs::copy(path, &target).map(|_| ())
    }
}

fn copy_dir_recursive(src: &Path, dest: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(dest)?;
    for entry in std::fs::read_dir(src)? {
        let entry = entry?;
        let target = dest.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir_recursive(&entry.path(), &target)?;
        } else {
            std::fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn write_metadata(dir: &Path, id: i64, name: &str, model_type: &str, base: &str) {
        std::fs::create_dir_all(dir).unwrap();
        let value = json!({
            "id": id,
            "name": name,
            "type": model_type,
            "baseModel": base,
        });
        std::fs::write(
            dir.join(METADATA_FILE),
            serde_json::to_string_pretty(&value).unwrap(),
        )
        .unwrap();
    }

    #[test]
    fn scan_finds_models_and_stamps_local_path() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("loras/SDXL/ModelA");
        write_metadata(&dir, 1, "ModelA", "LORA", "SDXL");

        let manager = StorageManager::new(root.path());
        let records = manager.scan();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].info.id, 1);
        assert_eq!(records[0].local_path, dir);
    }

    #[test]
    fn scan_skips_malformed_metadata() {
        let root = tempfile::tempdir().unwrap();
        let good = root.path().join("loras/SDXL/Good");
        write_metadata(&good, 1, "Good", "LORA", "SDXL");

        let bad = root.path().join("loras/SDXL/Bad");
        std::fs::create_dir_all(&bad).unwrap();
        std::fs::write(bad.join(METADATA_FILE), "{ not json").unwrap();

        let unidentified = root.path().join("loras/SDXL/NoId");
        std::fs::create_dir_all(&unidentified).unwrap();
        std::fs::write(unidentified.join(METADATA_FILE), "{}").unwrap();

        let records = StorageManager::new(root.path()).scan();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].info.name, "Good");
    }

    #[test]
    fn scan_of_missing_root_is_empty() {
        let manager = StorageManager::new("/definitely/not/here");
        assert!(manager.scan().is_empty());
    }

    #[test]
    fn delete_removes_directory_and_scan_forgets_it() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("vae/SD1.5/MyVae");
        write_metadata(&dir, 7, "MyVae", "VAE", "SD1.5");

        let manager = StorageManager::new(root.path());
        assert_eq!(manager.scan().len(), 1);

        manager.delete(&dir).unwrap();
        assert!(manager.scan().is_empty());
        assert!(manager.delete(&dir).is_err());
    }

    #[test]
    fn find_path_prefers_deterministic_location() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("loras/SDXL/Model_A");
        write_metadata(&dir, 5, "Model A", "LORA", "SDXL");

        let manager = StorageManager::new(root.path());
        let found = manager
            .find_path(5, &ModelType::Lora, "SDXL", "Model A")
            .unwrap();
        assert_eq!(found, dir);
    }

    #[test]
    fn find_path_falls_back_to_id_scan() {
        let root = tempfile::tempdir().unwrap();
        // Stored under an older name, so the deterministic path misses.
        let dir = root.path().join("loras/SDXL/OldName");
        write_metadata(&dir, 5, "Old Name", "LORA", "SDXL");

        let manager = StorageManager::new(root.path());
        let found = manager
            .find_path(5, &ModelType::Lora, "SDXL", "New Name")
            .unwrap();
        assert_eq!(found, dir);

        assert!(manager
            .find_path(6, &ModelType::Lora, "SDXL", "New Name")
            .is_none());
    }

    #[test]
    fn duplicates_group_by_name_type_and_base() {
        let root = tempfile::tempdir().unwrap();
        write_metadata(&root.path().join("loras/SDXL/A1"), 1, "A", "LORA", "SDXL");
        write_metadata(&root.path().join("loras/SDXL/A2"), 2, "A", "LORA", "SDXL");
        write_metadata(&root.path().join("loras/SD15/A3"), 3, "A", "LORA", "SD1.5");

        let duplicates = StorageManager::new(root.path()).find_duplicates();
        assert_eq!(duplicates.len(), 1);
        assert_eq!(duplicates[0].len(), 2);
    }

    #[test]
    fn orphans_require_missing_metadata() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("loras/SDXL");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("foo.safetensors"), b"weights").unwrap();
        std::fs::write(dir.join("notes.txt"), b"not a model").unwrap();

        let manager = StorageManager::new(root.path());
        let orphans = manager.find_orphans();
        assert_eq!(orphans.len(), 1);
        assert!(orphans[0].path.ends_with("foo.safetensors"));
        assert_eq!(orphans[0].size, 7);

        // A sibling metadata.json adopts the file.
        std::fs::write(dir.join(METADATA_FILE), "{\"id\": 1, \"name\": \"foo\"}").unwrap();
        assert!(manager.find_orphans().is_empty());
    }

    #[test]
    fn export_copies_directories_and_reports_failures() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("loras/SDXL/ModelA");
        write_metadata(&dir, 1, "ModelA", "LORA", "SDXL");
        std::fs::write(dir.join("a.safetensors"), b"weights").unwrap();

        let dest = tempfile::tempdir().unwrap();
        let missing = root.path().join("loras/SDXL/Missing");

        let outcome = StorageManager::new(root.path())
            .export(&[dir.clone(), missing.clone()], dest.path());

        assert_eq!(outcome.success_count, 1);
        assert_eq!(outcome.failed_count, 1);
        assert!(dest.path().join("ModelA/a.safetensors").exists());
        assert!(dest.path().join("ModelA").join(METADATA_FILE).exists());

        let failed = outcome.details.iter().find(|d| !d.success).unwrap();
        assert_eq!(failed.path, missing);
        assert!(failed.error.is_some());
    }

    #[test]
    fn exported_tree_scans_as_a_layout_root() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("loras/SDXL/ModelA");
        write_metadata(&dir, 1, "ModelA", "LORA", "SDXL");

        // Export the whole category tree so the destination forms a root.
        let dest = tempfile::tempdir().unwrap();
        let outcome =
            StorageManager::new(root.path()).export(&[root.path().join("loras")], dest.path());
        assert_eq!(outcome.failed_count, 0);

        let records = StorageManager::new(dest.path()).scan();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].info.name, "ModelA");
    }

    #[test]
    fn usage_aggregates_category_sizes() {
        let root = tempfile::tempdir().unwrap();
        let lora_dir = root.path().join("loras/SDXL/A");
        std::fs::create_dir_all(&lora_dir).unwrap();
        std::fs::write(lora_dir.join("a.safetensors"), vec![0u8; 100]).unwrap();

        let usage = StorageManager::new(root.path()).usage().unwrap();
        assert_eq!(usage.categories.get("LoRAs"), Some(&100));
        assert_eq!(usage.categories.get("Checkpoints"), Some(&0));
        assert_eq!(usage.categories.len(), 7);
    }

    #[test]
    fn counts_by_type() {
        let root = tempfile::tempdir().unwrap();
        write_metadata(&root.path().join("loras/SDXL/A"), 1, "A", "LORA", "SDXL");
        write_metadata(&root.path().join("loras/SDXL/B"), 2, "B", "LORA", "SDXL");
        write_metadata(&root.path().join("vae/SD15/C"), 3, "C", "VAE", "SD1.5");

        let counts = StorageManager::new(root.path()).model_counts_by_type();
        assert_eq!(counts.get("LORA"), Some(&2));
        assert_eq!(counts.get("VAE"), Some(&1));
    }
}
