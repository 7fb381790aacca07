//! Storage layout and maintenance for the ComfyUI model tree.
//!
//! Routing policy: a model lands in
//! `comfy_path / <category dir> / <base model> / <sanitized name>`, with
//! the model binary, `metadata.json`, `model_card.html` and an `images/`
//! subdirectory inside. `metadata.json` is the source of truth for "this
//! directory holds a managed model"; everything the scanner, duplicate
//! finder and orphan finder do follows from that.

mod error;
mod layout;
mod manager;

pub use error::{StorageError, StorageResult};
pub use layout::{
    category_dir, images_dir, model_dir, resolve_model_dir, sanitize, CATEGORY_DIRS,
    METADATA_FILE, MODEL_FILE_EXTENSIONS,
};
pub use manager::{
    ExportDetail, ExportOutcome, OrphanFile, ScanRecord, StorageManager, StorageUsage,
};
