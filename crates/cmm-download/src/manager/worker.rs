//! The per-job download pipeline.
//!
//! A worker operates on a value-typed job plus cloned Arc dependencies;
//! it never touches the manager's locks. All progress flows through the
//! job's progress callback, all terminal handling is the manager's.
//!
//! Pipeline: parse URL → fetch metadata → resolve folder → stream model
//! file → filter + fan out images → write `metadata.json` → emit gallery.
//! Writing `metadata.json` is the commit point: cancellation observed
//! after it is ignored, and a directory without one is invisible to the
//! storage scanner.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use cmm_core::{
    Config, DownloadError, FileProgressFn, ModelInfo, ProgressReport, RemoteClientPort,
};
use cmm_storage::{images_dir, resolve_model_dir, METADATA_FILE};

use crate::bandwidth::BandwidthMonitor;
use crate::progress::ProgressThrottle;

/// Dependencies shared by every worker.
#[derive(Clone)]
pub struct WorkerDeps {
    /// Remote service client.
    pub client: Arc<dyn RemoteClientPort>,
    /// Frozen engine configuration.
    pub config: Arc<Config>,
    /// Shared throughput tracker.
    pub bandwidth: Arc<BandwidthMonitor>,
}

/// One URL's download job.
pub struct DownloadJob {
    /// The model page URL.
    pub url: String,
    /// Cooperative cancellation token for this job.
    pub cancel: CancellationToken,
    /// Progress sink; receives messages and progress updates.
    pub progress: Arc<dyn Fn(ProgressReport) + Send + Sync>,
}

impl DownloadJob {
    fn log(&self, message: impl Into<String>, status: &str) {
        let message = message.into();
        tracing::info!(url = %self.url, status, "{message}");
        (self.progress)(ProgressReport::message(message, status));
    }
}

/// Run the pipeline to completion.
///
/// Returns the populated metadata and the success message. Any error is
/// the job's terminal error; `DownloadError::Cancelled` means the user
/// cancelled before the commit point (partially written files stay).
pub async fn run_job(
    job: &DownloadJob,
    deps: &WorkerDeps,
) -> Result<(ModelInfo, String), DownloadError> {
    job.log(format!("Processing URL: {}", job.url), "info");

    // Step 1: identify the model.
    let parsed = deps.client.parse_url(&job.url)?;

    // Step 2: remote metadata.
    let mut info = deps
        .client
        .fetch_model_info(
            parsed.model_id,
            parsed.version_id,
            deps.config.top_image_count,
        )
        .await?;

    // Step 3: target directory.
    let model_dir = resolve_model_dir(&deps.config.comfy_path, &info)?;

    // Step 4: the model binary.
    if deps.config.download_model && !info.download_url.is_empty() {
        job.log("Downloading model file...", "download");
        let path = download_model_file(job, deps, &info.download_url, &model_dir).await?;
        info.size = std::fs::metadata(&path).ok().map(|m| m.len());
        job.log("Model file downloaded successfully", "success");
    }

    // Steps 5-6: preview images.
    if deps.config.download_images && !info.images.is_empty() {
        if !deps.config.download_nsfw {
            let before = info.images.len();
            info.images.retain(|img| !img.nsfw);
            let filtered = before - info.images.len();
            if filtered > 0 {
                job.log(format!("Filtered out {filtered} NSFW images"), "info");
            }
        }

        if !info.images.is_empty() {
            job.log(
                format!("Downloading {} images...", info.images.len()),
                "download",
            );
            download_images(job, deps, &mut info.images, &model_dir).await?;

            if let Some(local) = info.images.first().and_then(|img| img.local_path.clone()) {
                info.thumbnail = local;
            }
        }
    }

    // Step 7: commit point.
    let now = chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
    info.download_date = now.clone();
    info.last_updated = now;
    info.path = model_dir.display().to_string();
    write_metadata(&model_dir, &info)?;

    // Step 8: gallery page; failures no longer fail the job.
    if deps.config.create_html {
        match cmm_gallery::write_model_card(&model_dir, &info) {
            Ok(card_path) => {
                job.log(format!("Created HTML summary: {}", card_path.display()), "success");
                if deps.config.auto_open_html {
                    if let Err(e) = open::that_detached(&card_path) {
                        tracing::warn!(
                            path = %card_path.display(),
                            error = %e,
                            "Could not open model card in browser"
                        );
                    }
                }
            }
            Err(e) => {
                tracing::warn!(url = %job.url, error = %e, "HTML summary generation failed");
            }
        }
    }

    let message = format!("Successfully downloaded {}", info.name);
    Ok((info, message))
}

/// Stream the model binary, feeding task progress and the bandwidth
/// monitor.
async fn download_model_file(
    job: &DownloadJob,
    deps: &WorkerDeps,
    url: &str,
    model_dir: &Path,
) -> Result<std::path::PathBuf, DownloadError> {
    let bandwidth = Arc::clone(&deps.bandwidth);
    let progress = Arc::clone(&job.progress);

    // The client reports every percent step; cap what subscribers see.
    // The throttle carries suppressed byte deltas into the next report,
    // and the terminal 100% report is always forced through.
    let throttle = std::sync::Mutex::new(ProgressThrottle::new(Duration::from_millis(100)));

    let on_progress: FileProgressFn = Box::new(move |file_progress| {
        bandwidth.add_data_point(file_progress.delta_bytes);
        let due = throttle
            .lock()
            .unwrap()
            .offer(file_progress.delta_bytes, file_progress.percent >= 100);
        if let Some(bytes) = due {
            progress(ProgressReport::model(file_progress.percent, bytes));
        }
    });

    deps.client
        .download_file(url, model_dir, on_progress, &job.cancel)
        .await
}

/// Fan out image downloads over a bounded worker pool.
///
/// Existing files are counted done without a request. Individual failures
/// are logged and never fail the job; progress advances monotonically as
/// `floor(done / total * 100)`. Cancellation is honoured before each
/// dispatch and after each completion.
async fn download_images(
    job: &DownloadJob,
    deps: &WorkerDeps,
    images: &mut [cmm_core::ModelImage],
    model_dir: &Path,
) -> Result<(), DownloadError> {
    let images_dir = images_dir(model_dir);
    std::fs::create_dir_all(&images_dir)
        .map_err(|e| DownloadError::layout(format!("{}: {e}", images_dir.display())))?;

    let total = images.len();
    let mut done = 0usize;
    let report = |done: usize| {
        #[allow(clippy::cast_possible_truncation)]
        let percent = (done * 100 / total) as u8;
        (job.progress)(ProgressReport::image(percent));
    };

    let semaphore = Arc::new(Semaphore::new(deps.config.download_threads));
    let mut join_set: JoinSet<(usize, Option<String>)> = JoinSet::new();
    let mut skipped: Vec<(usize, String)> = Vec::new();

    for (index, image) in images.iter().enumerate() {
        if job.cancel.is_cancelled() {
            join_set.abort_all();
            return Err(DownloadError::Cancelled);
        }

        let Some(file_name) = image.file_name() else {
            tracing::warn!(url = %image.url, "Image URL has no usable file name");
            done += 1;
            report(done);
            continue;
        };
        let dest = images_dir.join(file_name);

        if dest.exists() {
            tracing::debug!(path = %dest.display(), "Image already present");
            skipped.push((index, dest.display().to_string()));
            done += 1;
            report(done);
            continue;
        }

        let client = Arc::clone(&deps.client);
        let semaphore = Arc::clone(&semaphore);
        let cancel = job.cancel.clone();
        let url = image.url.clone();

        join_set.spawn(async move {
            let Ok(_permit) = semaphore.acquire().await else {
                return (index, None);
            };
            if cancel.is_cancelled() {
                return (index, None);
            }
            match client.download_image(&url, &dest).await {
                Ok(()) => (index, Some(dest.display().to_string())),
                Err(e) => {
                    tracing::error!(url = %url, error = %e, "Failed to download image");
                    (index, None)
                }
            }
        });
    }

    for (index, local_path) in skipped {
        images[index].local_path = Some(local_path);
    }

    while let Some(result) = join_set.join_next().await {
        if job.cancel.is_cancelled() {
            join_set.abort_all();
            return Err(DownloadError::Cancelled);
        }

        if let Ok((index, local_path)) = result {
            if let Some(local_path) = local_path {
                images[index].local_path = Some(local_path);
            }
        }
        done += 1;
        report(done);
    }

    Ok(())
}

/// Write the pretty-printed `metadata.json` — the commit point.
fn write_metadata(model_dir: &Path, info: &ModelInfo) -> Result<(), DownloadError> {
    let path = model_dir.join(METADATA_FILE);
    let json = serde_json::to_string_pretty(info)
        .map_err(|e| DownloadError::internal(format!("metadata serialization failed: {e}")))?;
    std::fs::write(&path, json).map_err(|e| {
        if e.kind() == std::io::ErrorKind::StorageFull {
            DownloadError::disk_full(path.display().to_string())
        } else {
            DownloadError::internal(format!("failed to write {}: {e}", path.display()))
        }
    })?;
    tracing::info!(path = %path.display(), "Wrote metadata");
    Ok(())
}
