//! Download orchestration.
//!
//! The pieces, bottom up:
//!
//! - [`BandwidthMonitor`] — sliding-window throughput sampling shared by
//!   all workers.
//! - [`TaskQueue`] — a pure state machine over pending URLs; commands
//!   produce events the caller emits after releasing its lock.
//!   [`SharedTaskQueue`] is the async wrapper doing exactly that.
//! - `worker` — the per-job pipeline (metadata, folder, model file,
//!   image fanout, metadata.json, gallery).
//! - [`DownloadManager`] — admission by URL, one spawned task per job,
//!   cancellation fan-out, bandwidth aggregation.

// Re-export core types for convenience
pub use cmm_core::{
    DownloadError, DownloadStatus, DownloadTask, ProgressReport, QueueEvent, TaskUpdate,
};

mod bandwidth;
mod progress;
mod queue;

pub use bandwidth::{BandwidthMonitor, BandwidthSample};
pub use progress::ProgressThrottle;
pub use queue::{SharedTaskQueue, TaskQueue};

mod manager;

pub use manager::{DownloadJob, DownloadManager, WorkerDeps};
