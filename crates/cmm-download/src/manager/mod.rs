//! Download manager.
//!
//! Admission control plus worker lifecycle: one spawned task per URL,
//! each with its own `CancellationToken`, all sharing the remote client
//! and the bandwidth monitor. The manager imposes no global concurrency
//! limit — the host decides how many jobs to start in parallel; image
//! fanout inside each job is bounded separately.

mod worker;

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use cmm_core::{
    CompletionCallback, Config, DownloadError, ProgressReport, RemoteClientPort, TaskUpdate,
};

use crate::bandwidth::{BandwidthMonitor, BandwidthSample};
use crate::queue::SharedTaskQueue;

pub use worker::{run_job, DownloadJob, WorkerDeps};

struct ActiveDownload {
    cancel: CancellationToken,
}

/// Orchestrates download workers.
pub struct DownloadManager {
    client: Arc<dyn RemoteClientPort>,
    config: Arc<Config>,
    bandwidth: Arc<BandwidthMonitor>,
    /// In-flight jobs keyed by URL.
    active: Mutex<HashMap<String, ActiveDownload>>,
}

impl DownloadManager {
    /// Create a manager over a remote client and frozen configuration.
    #[must_use]
    pub fn new(client: Arc<dyn RemoteClientPort>, config: Config) -> Arc<Self> {
        Arc::new(Self {
            client,
            config: Arc::new(config),
            bandwidth: Arc::new(BandwidthMonitor::new(60, 1)),
            active: Mutex::new(HashMap::new()),
        })
    }

    /// Start a download job for `url`.
    ///
    /// Returns `false` without side effects when an identical URL is
    /// already in flight. `on_progress` receives worker reports;
    /// `on_done` fires exactly once with `(success, message, model_info)`.
    pub async fn start_download(
        self: &Arc<Self>,
        url: &str,
        on_progress: impl Fn(ProgressReport) + Send + Sync + 'static,
        on_done: CompletionCallback,
    ) -> bool {
        let cancel = CancellationToken::new();
        {
            let mut active = self.active.lock().await;
            if active.contains_key(url) {
                tracing::warn!(url, "Download already in progress");
                return false;
            }
            active.insert(
                url.to_string(),
                ActiveDownload {
                    cancel: cancel.clone(),
                },
            );
        }

        tracing::info!(url, "Started download");

        let manager = Arc::clone(self);
        let url = url.to_string();
        tokio::spawn(async move {
            let deps = WorkerDeps {
                client: Arc::clone(&manager.client),
                config: Arc::clone(&manager.config),
                bandwidth: Arc::clone(&manager.bandwidth),
            };
            let job = DownloadJob {
                url: url.clone(),
                cancel,
                progress: Arc::new(on_progress),
            };

            let result = worker::run_job(&job, &deps).await;
            manager.active.lock().await.remove(&url);

            match result {
                Ok((info, message)) => {
                    tracing::info!(url = %url, "Download completed");
                    on_done(true, message, Some(info));
                }
                Err(DownloadError::Cancelled) => {
                    tracing::info!(url = %url, "Download cancelled");
                    on_done(false, DownloadError::Cancelled.to_string(), None);
                }
                Err(e) => {
                    tracing::error!(url = %url, error = %e, "Download failed");
                    on_done(false, e.to_string(), None);
                }
            }
        });

        true
    }

    /// Pull the next pending task off `queue` and run it.
    ///
    /// Worker progress reports are bridged into task updates (fields at
    /// `-1` are left untouched) and the completion lands back in the
    /// queue as the task's terminal state. Returns `false` when the
    /// queue is empty or admission refused the URL.
    pub async fn start_next(self: &Arc<Self>, queue: &Arc<SharedTaskQueue>) -> bool {
        let Some(task) = queue.next().await else {
            return false;
        };
        let url = task.url;

        let handle = tokio::runtime::Handle::current();
        let progress_queue = Arc::clone(queue);
        let progress_url = url.clone();
        let progress_handle = handle.clone();
        let done_queue = Arc::clone(queue);
        let done_url = url.clone();

        let started = self
            .start_download(
                &url,
                move |report| {
                    let update = TaskUpdate {
                        model_progress: u8::try_from(report.model_progress).ok(),
                        image_progress: u8::try_from(report.image_progress).ok(),
                        ..TaskUpdate::default()
                    };
                    if update.model_progress.is_none() && update.image_progress.is_none() {
                        return;
                    }
                    let queue = Arc::clone(&progress_queue);
                    let url = progress_url.clone();
                    progress_handle.spawn(async move {
                        queue.update(&url, update).await;
                    });
                },
                Box::new(move |success, message, info| {
                    handle.spawn(async move {
                        // A cancelled worker must terminate as Canceled,
                        // never Failed.
                        if !success && message == DownloadError::Cancelled.to_string() {
                            done_queue.cancel(&done_url).await;
                        } else {
                            done_queue
                                .complete(&done_url, success, Some(message), info)
                                .await;
                        }
                    });
                }),
            )
            .await;

        if !started {
            queue
                .complete(
                    &url,
                    false,
                    Some("Download already in progress".to_string()),
                    None,
                )
                .await;
        }
        started
    }

    /// Signal an in-flight download to stop.
    ///
    /// Returns whether an active job was found. The worker observes its
    /// token at the next checkpoint and terminates as cancelled.
    pub async fn cancel_download(&self, url: &str) -> bool {
        let active = self.active.lock().await;
        if let Some(job) = active.get(url) {
            job.cancel.cancel();
            tracing::info!(url, "Cancelled active download");
            true
        } else {
            false
        }
    }

    /// Signal every in-flight download to stop.
    pub async fn cancel_all(&self) {
        let active = self.active.lock().await;
        for job in active.values() {
            job.cancel.cancel();
        }
        tracing::info!(count = active.len(), "Cancelled all downloads");
    }

    /// Number of in-flight jobs.
    pub async fn active_count(&self) -> usize {
        self.active.lock().await.len()
    }

    /// Whether a URL is currently in flight.
    pub async fn is_active(&self, url: &str) -> bool {
        self.active.lock().await.contains_key(url)
    }

    /// Aggregated bandwidth history for graphing.
    pub fn bandwidth_stats(&self) -> Vec<BandwidthSample> {
        self.bandwidth.history()
    }

    /// The shared bandwidth monitor.
    #[must_use]
    pub fn bandwidth(&self) -> &Arc<BandwidthMonitor> {
        &self.bandwidth
    }

    /// Drop all bandwidth history.
    pub fn reset_bandwidth(&self) {
        self.bandwidth.reset();
    }
}
