//! Per-URL download task.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::ModelInfo;

/// Status of a download task.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DownloadStatus {
    /// Waiting in the queue.
    Queued,
    /// Currently being processed by a worker.
    Downloading,
    /// Pipeline finished successfully.
    Completed,
    /// Pipeline aborted with an error.
    Failed,
    /// Cancelled by the user before completion.
    Canceled,
}

impl DownloadStatus {
    /// String representation, matching the serialized form.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Downloading => "downloading",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Canceled => "canceled",
        }
    }

    /// Terminal statuses are absorbing: once entered, a task never leaves.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Canceled)
    }
}

/// A single URL's end-to-end download job.
///
/// Progress fields are monotonic and terminal statuses are absorbing;
/// both rules are enforced by [`DownloadTask::apply`], which is the only
/// mutation path the queue uses.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadTask {
    pub url: String,
    /// Ordinal position among pending tasks; lower runs first.
    pub priority: usize,
    pub status: DownloadStatus,
    /// Model binary progress, 0..=100.
    pub model_progress: u8,
    /// Preview image fanout progress, 0..=100.
    pub image_progress: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_info: Option<ModelInfo>,
}

impl DownloadTask {
    /// Create a fresh queued task.
    #[must_use]
    pub fn new(url: impl Into<String>, priority: usize) -> Self {
        Self {
            url: url.into(),
            priority,
            status: DownloadStatus::Queued,
            model_progress: 0,
            image_progress: 0,
            start_time: None,
            end_time: None,
            error_message: None,
            model_info: None,
        }
    }

    /// Whether the task has reached a terminal status.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Elapsed time: running span while in flight, final span when done.
    #[must_use]
    pub fn duration(&self) -> Option<Duration> {
        let start = self.start_time?;
        Some(self.end_time.unwrap_or_else(Utc::now) - start)
    }

    /// Mark the task as picked up by a worker.
    pub fn begin(&mut self) {
        self.status = DownloadStatus::Downloading;
        self.start_time = Some(Utc::now());
    }

    /// Apply a field update, returning whether anything changed.
    ///
    /// Terminal tasks ignore every update, and a terminal status cannot
    /// be set this way ([`DownloadTask::finish`] is the only entry into
    /// the terminal set, so `end_time` is stamped exactly once).
    /// Progress values only move forward; a stale lower value is dropped
    /// silently.
    pub fn apply(&mut self, update: TaskUpdate) -> bool {
        if self.is_terminal() {
            return false;
        }

        let mut changed = false;

        if let Some(status) = update.status {
            if !status.is_terminal() && status != self.status {
                self.status = status;
                changed = true;
            }
        }
        if let Some(progress) = update.model_progress {
            let progress = progress.min(100);
            if progress > self.model_progress {
                self.model_progress = progress;
                changed = true;
            }
        }
        if let Some(progress) = update.image_progress {
            let progress = progress.min(100);
            if progress > self.image_progress {
                self.image_progress = progress;
                changed = true;
            }
        }
        if let Some(message) = update.error_message {
            self.error_message = Some(message);
            changed = true;
        }
        if let Some(info) = update.model_info {
            self.model_info = Some(info);
            changed = true;
        }

        changed
    }

    /// Transition into a terminal status, stamping `end_time` exactly once.
    ///
    /// Returns `false` (and does nothing) when the task is already terminal.
    pub fn finish(
        &mut self,
        status: DownloadStatus,
        message: Option<String>,
        model_info: Option<ModelInfo>,
    ) -> bool {
        debug_assert!(status.is_terminal());
        if self.is_terminal() {
            return false;
        }

        self.status = status;
        self.end_time = Some(Utc::now());
        if status == DownloadStatus::Completed {
            self.model_progress = 100;
            self.image_progress = 100;
            self.model_info = model_info;
        } else {
            self.error_message = message;
        }
        true
    }
}

/// Partial update for a task; `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct TaskUpdate {
    pub status: Option<DownloadStatus>,
    pub model_progress: Option<u8>,
    pub image_progress: Option<u8>,
    pub error_message: Option<String>,
    pub model_info: Option<ModelInfo>,
}

impl TaskUpdate {
    /// Update only the model progress.
    #[must_use]
    pub fn model_progress(progress: u8) -> Self {
        Self {
            model_progress: Some(progress),
            ..Self::default()
        }
    }

    /// Update only the image progress.
    #[must_use]
    pub fn image_progress(progress: u8) -> Self {
        Self {
            image_progress: Some(progress),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_task_is_queued() {
        let task = DownloadTask::new("https://civitai.com/models/1", 0);
        assert_eq!(task.status, DownloadStatus::Queued);
        assert!(!task.is_terminal());
        assert!(task.start_time.is_none());
    }

    #[test]
    fn progress_never_regresses() {
        let mut task = DownloadTask::new("u", 0);
        task.begin();
        assert!(task.apply(TaskUpdate::model_progress(40)));
        assert!(!task.apply(TaskUpdate::model_progress(10)));
        assert_eq!(task.model_progress, 40);
    }

    #[test]
    fn progress_caps_at_100() {
        let mut task = DownloadTask::new("u", 0);
        task.begin();
        task.apply(TaskUpdate::model_progress(250));
        assert_eq!(task.model_progress, 100);
    }

    #[test]
    fn terminal_is_absorbing() {
        let mut task = DownloadTask::new("u", 0);
        task.begin();
        assert!(task.finish(DownloadStatus::Canceled, None, None));
        let first_end = task.end_time;

        assert!(!task.finish(DownloadStatus::Completed, None, None));
        assert!(!task.apply(TaskUpdate {
            status: Some(DownloadStatus::Downloading),
            ..TaskUpdate::default()
        }));
        assert_eq!(task.status, DownloadStatus::Canceled);
        assert_eq!(task.end_time, first_end);
    }

    #[test]
    fn completion_forces_full_progress() {
        let mut task = DownloadTask::new("u", 0);
        task.begin();
        task.apply(TaskUpdate::model_progress(80));
        task.finish(DownloadStatus::Completed, None, None);
        assert_eq!(task.model_progress, 100);
        assert_eq!(task.image_progress, 100);
        assert!(task.end_time.is_some());
    }

    #[test]
    fn failure_records_message() {
        let mut task = DownloadTask::new("u", 0);
        task.begin();
        task.finish(
            DownloadStatus::Failed,
            Some("Network error: timeout".to_string()),
            None,
        );
        assert_eq!(task.error_message.as_deref(), Some("Network error: timeout"));
    }
}
