//! Core domain for the cmm download engine.
//!
//! This crate holds the pure domain layer shared by every other workspace
//! crate: the `ModelInfo` value objects serialized into `metadata.json`,
//! the `DownloadTask` state machine, error and event types, the frozen
//! runtime configuration, and the port traits that decouple the download
//! orchestration from its collaborators (remote client, event sinks).
//!
//! No I/O happens here; implementations live in `cmm-civitai`,
//! `cmm-storage`, `cmm-gallery` and `cmm-download`.

pub mod domain;
pub mod download;
pub mod ports;
pub mod settings;

// Re-export commonly used types for convenience
pub use domain::{
    Dependency, ImageMeta, ImageResource, ImageStats, ModelImage, ModelInfo, ModelStats, ModelType,
};
pub use download::{
    DownloadError, DownloadResult, DownloadStatus, DownloadTask, FileProgress, ProgressReport,
    QueueEvent, TaskUpdate, PROGRESS_UNCHANGED,
};
pub use ports::{
    CompletionCallback, FileProgressFn, NoopQueueEmitter, ParsedModelUrl, ProgressCallback,
    QueueEventEmitterPort, RemoteClientPort,
};
pub use settings::{Config, ConfigError};
