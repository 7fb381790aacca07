//! # cmm
//!
//! Convenience facade over the cmm workspace: a download orchestration
//! engine that fetches model artifacts and their preview media from
//! Civitai into a ComfyUI-shaped storage tree.
//!
//! Most applications only need this crate; it re-exports the public
//! surface of the workspace members:
//!
//! - `cmm_core` — domain types, errors, configuration, ports
//! - `cmm_civitai` — the remote API client
//! - `cmm_download` — queue, workers, manager, bandwidth monitor
//! - `cmm_storage` — layout policy and tree maintenance
//! - `cmm_gallery` — static `model_card.html` emission

// Re-export core domain types
pub use cmm_core::{
    CompletionCallback, Config, ConfigError, Dependency, DownloadError, DownloadResult,
    DownloadStatus, DownloadTask, FileProgress, FileProgressFn, ImageMeta, ImageResource,
    ImageStats, ModelImage, ModelInfo, ModelStats, ModelType, NoopQueueEmitter, ParsedModelUrl,
    ProgressCallback, ProgressReport, QueueEvent, QueueEventEmitterPort, RemoteClientPort,
    TaskUpdate, PROGRESS_UNCHANGED,
};

// Re-export the remote client
pub use cmm_civitai::{
    CivitaiClient, CivitaiConfig, CivitaiError, DefaultCivitaiClient, SearchFilters,
};

// Re-export download orchestration
pub use cmm_download::{
    BandwidthMonitor, BandwidthSample, DownloadJob, DownloadManager, ProgressThrottle,
    SharedTaskQueue, TaskQueue, WorkerDeps,
};

// Re-export storage maintenance
pub use cmm_storage::{
    category_dir, model_dir, sanitize, ExportOutcome, OrphanFile, ScanRecord, StorageError,
    StorageManager, StorageUsage,
};

// Re-export gallery emission
pub use cmm_gallery::{escape_html, render_model_card, write_model_card, GalleryError};
