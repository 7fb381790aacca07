//! Queue and worker progress events.

use serde::{Deserialize, Serialize};

use super::task::DownloadTask;

/// Sentinel for "field unchanged" in [`ProgressReport`].
pub const PROGRESS_UNCHANGED: i32 = -1;

/// Event stream a queue observer subscribes to.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QueueEvent {
    /// The number of pending tasks changed (enqueue/dequeue/clear).
    QueueSizeChanged {
        /// Pending tasks after the change.
        size: usize,
    },

    /// A task's fields were mutated.
    TaskUpdated {
        /// Snapshot of the task after the mutation.
        task: DownloadTask,
    },

    /// Pending tasks were reordered; priorities have been refreshed.
    QueueReordered,
}

impl QueueEvent {
    /// Create a queue-size event.
    #[must_use]
    pub const fn size_changed(size: usize) -> Self {
        Self::QueueSizeChanged { size }
    }

    /// Create a task-updated event.
    #[must_use]
    pub const fn task_updated(task: DownloadTask) -> Self {
        Self::TaskUpdated { task }
    }

    /// Event name for wire protocols.
    #[must_use]
    pub const fn event_name(&self) -> &'static str {
        match self {
            Self::QueueSizeChanged { .. } => "queue:size_changed",
            Self::TaskUpdated { .. } => "queue:task_updated",
            Self::QueueReordered => "queue:reordered",
        }
    }
}

/// Progress report a worker pushes to its host.
///
/// Numeric fields use [`PROGRESS_UNCHANGED`] (`-1`) to mean "no change";
/// `bytes` carries the byte delta since the previous report and feeds the
/// bandwidth monitor.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressReport {
    pub message: String,
    pub model_progress: i32,
    pub image_progress: i32,
    pub status: String,
    pub bytes: u64,
}

impl ProgressReport {
    /// A log-style report with no progress change.
    #[must_use]
    pub fn message(message: impl Into<String>, status: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            model_progress: PROGRESS_UNCHANGED,
            image_progress: PROGRESS_UNCHANGED,
            status: status.into(),
            bytes: 0,
        }
    }

    /// A model-file progress report carrying a byte delta.
    #[must_use]
    pub fn model(progress: u8, bytes: u64) -> Self {
        Self {
            message: String::new(),
            model_progress: i32::from(progress),
            image_progress: PROGRESS_UNCHANGED,
            status: String::new(),
            bytes,
        }
    }

    /// An image fanout progress report.
    #[must_use]
    pub fn image(progress: u8) -> Self {
        Self {
            message: String::new(),
            model_progress: PROGRESS_UNCHANGED,
            image_progress: i32::from(progress),
            status: String::new(),
            bytes: 0,
        }
    }
}

/// Progress of a single streaming file download.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FileProgress {
    /// Percentage written so far, 0..=100. Monotone, final report is 100.
    pub percent: u8,
    /// Bytes written since the previous report.
    pub delta_bytes: u64,
    /// Total bytes expected, when the server told us.
    pub total_bytes: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_report_leaves_progress_unchanged() {
        let report = ProgressReport::message("starting", "info");
        assert_eq!(report.model_progress, PROGRESS_UNCHANGED);
        assert_eq!(report.image_progress, PROGRESS_UNCHANGED);
        assert_eq!(report.bytes, 0);
    }

    #[test]
    fn model_report_carries_bytes() {
        let report = ProgressReport::model(42, 8192);
        assert_eq!(report.model_progress, 42);
        assert_eq!(report.bytes, 8192);
        assert_eq!(report.image_progress, PROGRESS_UNCHANGED);
    }

    #[test]
    fn event_names_are_stable() {
        assert_eq!(
            QueueEvent::size_changed(3).event_name(),
            "queue:size_changed"
        );
        assert_eq!(QueueEvent::QueueReordered.event_name(), "queue:reordered");
    }
}
