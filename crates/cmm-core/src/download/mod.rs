//! Download domain: task state machine, errors and events.

mod errors;
mod events;
mod task;

pub use errors::{DownloadError, DownloadResult};
pub use events::{FileProgress, ProgressReport, QueueEvent, PROGRESS_UNCHANGED};
pub use task::{DownloadStatus, DownloadTask, TaskUpdate};
