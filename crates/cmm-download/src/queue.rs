//! Download queue management.
//!
//! [`TaskQueue`] is a pure state machine: no I/O, no locking, no event
//! transport. Commands record the events they produce; the caller drains
//! them with [`TaskQueue::take_events`] and delivers them after releasing
//! whatever lock guards the queue, so observer callbacks can re-enter
//! queue operations without deadlocking. [`SharedTaskQueue`] is that
//! caller for async hosts.
//!
//! # Invariants
//!
//! - Every URL ever added maps to exactly one task; the pending list
//!   contains a URL iff its task is `Queued`.
//! - A task's `priority` equals its index in the pending list, refreshed
//!   by every mutating operation.
//! - Terminal statuses are absorbing.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use cmm_core::{
    DownloadStatus, DownloadTask, ModelInfo, QueueEvent, QueueEventEmitterPort, TaskUpdate,
};

/// Pure queue state machine.
#[derive(Debug, Default)]
pub struct TaskQueue {
    /// Pending URLs in run order.
    pending: Vec<String>,
    /// Every task ever added, keyed by URL.
    tasks: HashMap<String, DownloadTask>,
    /// URL handed out by the last `next()`, until it completes.
    current: Option<String>,
    /// Events produced by commands since the last drain.
    events: Vec<QueueEvent>,
}

impl TaskQueue {
    /// Create an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of pending tasks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Whether no tasks are pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Look up a task by URL.
    #[must_use]
    pub fn get(&self, url: &str) -> Option<&DownloadTask> {
        self.tasks.get(url)
    }

    /// The URL currently being processed, if any.
    #[must_use]
    pub fn current(&self) -> Option<&str> {
        self.current.as_deref()
    }

    /// Snapshot of every known task.
    #[must_use]
    pub fn tasks(&self) -> Vec<DownloadTask> {
        self.tasks.values().cloned().collect()
    }

    /// Snapshot of pending tasks in run order.
    #[must_use]
    pub fn queued_tasks(&self) -> Vec<DownloadTask> {
        self.pending
            .iter()
            .filter_map(|url| self.tasks.get(url).cloned())
            .collect()
    }

    /// Drain the events produced since the last call.
    ///
    /// Deliver these to observers only after releasing the queue lock.
    #[must_use]
    pub fn take_events(&mut self) -> Vec<QueueEvent> {
        std::mem::take(&mut self.events)
    }

    /// Append a URL.
    ///
    /// Rejected when the URL is blank or already maps to a task that is
    /// queued or in flight. A terminal task's URL may be re-added; the old
    /// record is replaced by a fresh queued task.
    pub fn add(&mut self, url: &str) -> bool {
        let url = url.trim();
        if url.is_empty() {
            return false;
        }

        if let Some(existing) = self.tasks.get(url) {
            if !existing.is_terminal() {
                tracing::info!(url, "URL already in queue");
                return false;
            }
        }

        let task = DownloadTask::new(url, self.pending.len());
        self.pending.push(url.to_string());
        self.tasks.insert(url.to_string(), task.clone());

        self.events.push(QueueEvent::task_updated(task));
        self.events
            .push(QueueEvent::size_changed(self.pending.len()));
        true
    }

    /// Append several URLs; returns how many were accepted.
    pub fn add_many<I, S>(&mut self, urls: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        urls.into_iter()
            .filter(|url| self.add(url.as_ref()))
            .count()
    }

    /// Pop the head of the queue and mark it downloading.
    pub fn next(&mut self) -> Option<DownloadTask> {
        if self.pending.is_empty() {
            return None;
        }
        let url = self.pending.remove(0);
        self.refresh_priorities();

        let task = self.tasks.get_mut(&url)?;
        task.begin();
        let snapshot = task.clone();
        self.current = Some(url);

        self.events.push(QueueEvent::task_updated(snapshot.clone()));
        self.events
            .push(QueueEvent::size_changed(self.pending.len()));
        Some(snapshot)
    }

    /// Move a pending URL to `position` (clamped); no-op for non-pending
    /// URLs.
    pub fn move_to_position(&mut self, url: &str, position: isize) -> bool {
        let Some(index) = self.pending.iter().position(|u| u == url) else {
            return false;
        };

        let moved = self.pending.remove(index);
        let clamped = position.clamp(0, self.pending.len() as isize);
        #[allow(clippy::cast_sign_loss)]
        self.pending.insert(clamped as usize, moved);

        self.refresh_priorities();
        self.events.push(QueueEvent::QueueReordered);
        true
    }

    /// Apply a field update to a task.
    pub fn update(&mut self, url: &str, update: TaskUpdate) -> bool {
        let Some(task) = self.tasks.get_mut(url) else {
            return false;
        };
        if !task.apply(update) {
            return false;
        }
        let snapshot = task.clone();

        // A task that stopped being Queued must leave the pending list.
        if snapshot.status != DownloadStatus::Queued {
            if let Some(index) = self.pending.iter().position(|u| u == url) {
                self.pending.remove(index);
                self.refresh_priorities();
                self.events
                    .push(QueueEvent::size_changed(self.pending.len()));
            }
        }

        self.events.push(QueueEvent::task_updated(snapshot));
        true
    }

    /// Mark a task terminal: completed on success, failed otherwise.
    pub fn complete(
        &mut self,
        url: &str,
        success: bool,
        message: Option<String>,
        model_info: Option<ModelInfo>,
    ) -> bool {
        let Some(task) = self.tasks.get_mut(url) else {
            return false;
        };

        let status = if success {
            DownloadStatus::Completed
        } else {
            DownloadStatus::Failed
        };
        let message = message.or_else(|| (!success).then(|| "Download failed".to_string()));
        if !task.finish(status, message, model_info) {
            return false;
        }
        let snapshot = task.clone();

        if self.current.as_deref() == Some(url) {
            self.current = None;
        }
        self.events.push(QueueEvent::task_updated(snapshot));
        true
    }

    /// Cancel a task.
    ///
    /// Pending tasks are removed from the list; in-flight tasks are only
    /// marked (their worker observes its token and stops). Returns whether
    /// a transition happened.
    pub fn cancel(&mut self, url: &str) -> bool {
        let Some(task) = self.tasks.get_mut(url) else {
            return false;
        };
        if !task.finish(DownloadStatus::Canceled, None, None) {
            return false;
        }
        let snapshot = task.clone();

        if let Some(index) = self.pending.iter().position(|u| u == url) {
            self.pending.remove(index);
            self.refresh_priorities();
            self.events
                .push(QueueEvent::size_changed(self.pending.len()));
        }
        if self.current.as_deref() == Some(url) {
            self.current = None;
        }

        self.events.push(QueueEvent::task_updated(snapshot));
        true
    }

    /// Cancel every pending task and empty the list.
    pub fn clear(&mut self) {
        let pending = std::mem::take(&mut self.pending);
        for url in pending {
            if let Some(task) = self.tasks.get_mut(&url) {
                if task.finish(DownloadStatus::Canceled, None, None) {
                    self.events.push(QueueEvent::task_updated(task.clone()));
                }
            }
        }
        self.events.push(QueueEvent::size_changed(0));
    }

    /// Re-stamp every pending task's priority with its list index.
    fn refresh_priorities(&mut self) {
        for (index, url) in self.pending.iter().enumerate() {
            if let Some(task) = self.tasks.get_mut(url) {
                if task.priority != index {
                    task.priority = index;
                    self.events.push(QueueEvent::task_updated(task.clone()));
                }
            }
        }
    }
}

/// Async wrapper owning the queue lock and the event emitter.
///
/// Every method locks, mutates, drains the produced events, releases the
/// lock, and only then emits, so observers can call back into the queue.
pub struct SharedTaskQueue {
    inner: Mutex<TaskQueue>,
    emitter: Arc<dyn QueueEventEmitterPort>,
}

impl SharedTaskQueue {
    /// Create a shared queue delivering events to `emitter`.
    pub fn new(emitter: Arc<dyn QueueEventEmitterPort>) -> Self {
        Self {
            inner: Mutex::new(TaskQueue::new()),
            emitter,
        }
    }

    async fn run<T>(&self, op: impl FnOnce(&mut TaskQueue) -> T) -> T {
        let (result, events) = {
            let mut queue = self.inner.lock().await;
            let result = op(&mut queue);
            (result, queue.take_events())
        };
        for event in events {
            self.emitter.emit(event);
        }
        result
    }

    /// See [`TaskQueue::add`].
    pub async fn add(&self, url: &str) -> bool {
        self.run(|q| q.add(url)).await
    }

    /// See [`TaskQueue::add_many`].
    pub async fn add_many(&self, urls: &[String]) -> usize {
        self.run(|q| q.add_many(urls)).await
    }

    /// See [`TaskQueue::next`].
    pub async fn next(&self) -> Option<DownloadTask> {
        self.run(TaskQueue::next).await
    }

    /// See [`TaskQueue::move_to_position`].
    pub async fn move_to_position(&self, url: &str, position: isize) -> bool {
        self.run(|q| q.move_to_position(url, position)).await
    }

    /// See [`TaskQueue::update`].
    pub async fn update(&self, url: &str, update: TaskUpdate) -> bool {
        self.run(|q| q.update(url, update)).await
    }

    /// See [`TaskQueue::complete`].
    pub async fn complete(
        &self,
        url: &str,
        success: bool,
        message: Option<String>,
        model_info: Option<ModelInfo>,
    ) -> bool {
        self.run(|q| q.complete(url, success, message, model_info))
            .await
    }

    /// See [`TaskQueue::cancel`].
    pub async fn cancel(&self, url: &str) -> bool {
        self.run(|q| q.cancel(url)).await
    }

    /// See [`TaskQueue::clear`].
    pub async fn clear(&self) {
        self.run(TaskQueue::clear).await;
    }

    /// Number of pending tasks.
    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }

    /// Whether no tasks are pending.
    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.is_empty()
    }

    /// Snapshot of a task by URL.
    pub async fn get(&self, url: &str) -> Option<DownloadTask> {
        self.inner.lock().await.get(url).cloned()
    }

    /// Snapshot of every known task.
    pub async fn tasks(&self) -> Vec<DownloadTask> {
        self.inner.lock().await.tasks()
    }

    /// Snapshot of pending tasks in run order.
    pub async fn queued_tasks(&self) -> Vec<DownloadTask> {
        self.inner.lock().await.queued_tasks()
    }
}
