//! Full pipeline runs against a scriptable fake remote.

mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;

use cmm::{Config, DownloadManager, ModelInfo, ProgressReport, PROGRESS_UNCHANGED};
use common::fixtures::{image, sample_model, FakeRemote};

fn test_config(root: &std::path::Path) -> Config {
    Config {
        comfy_path: root.to_path_buf(),
        ..Config::default()
    }
}

struct Completion {
    success: bool,
    message: String,
    info: Option<ModelInfo>,
}

/// Drive one URL through the manager and wait for its completion.
async fn run_to_completion(
    manager: &Arc<DownloadManager>,
    url: &str,
    progress: Arc<Mutex<Vec<ProgressReport>>>,
) -> Completion {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let progress_sink = Arc::clone(&progress);
    let started = manager
        .start_download(
            url,
            move |report| progress_sink.lock().unwrap().push(report),
            Box::new(move |success, message, info| {
                tx.send(Completion {
                    success,
                    message,
                    info,
                })
                .ok();
            }),
        )
        .await;
    assert!(started);

    tokio::time::timeout(Duration::from_secs(10), rx.recv())
        .await
        .expect("pipeline timed out")
        .expect("completion callback dropped")
}

#[tokio::test]
async fn successful_run_commits_metadata_and_gallery() {
    let root = tempfile::tempdir().unwrap();
    let mut info = sample_model(42, "Castle Style");
    info.images = vec![
        image("https://img.example/a.png", false, 9),
        image("https://img.example/b.png", false, 5),
    ];
    let manager = DownloadManager::new(FakeRemote::new(info), test_config(root.path()));

    let progress = Arc::new(Mutex::new(Vec::new()));
    let done = run_to_completion(&manager, "https://civitai.com/models/42", progress.clone()).await;

    assert!(done.success);
    assert_eq!(done.message, "Successfully downloaded Castle Style");

    let info = done.info.expect("completed jobs carry metadata");
    let model_dir = std::path::Path::new(&info.path);
    assert!(model_dir.ends_with("loras/SDXL 1.0/Castle_Style"));
    assert!(model_dir.join("metadata.json").exists());
    assert!(model_dir.join("model_card.html").exists());
    assert!(model_dir.join("model.safetensors").exists());
    assert_eq!(info.size, Some(256));

    // metadata.json parses back to the same model.
    let raw = std::fs::read_to_string(model_dir.join("metadata.json")).unwrap();
    let parsed: ModelInfo = serde_json::from_str(&raw).unwrap();
    assert_eq!(parsed.id, info.id);
    assert_eq!(parsed.name, info.name);
    assert_eq!(parsed.images.len(), 2);

    // Every image landed on disk and the thumbnail is the first one.
    for img in &parsed.images {
        let local = img.local_path.as_ref().expect("image downloaded");
        assert!(std::path::Path::new(local).exists());
    }
    assert_eq!(
        info.thumbnail,
        parsed.images[0].local_path.clone().unwrap()
    );

    // Model progress reports are monotone and end at 100.
    let model_progress: Vec<i32> = progress
        .lock()
        .unwrap()
        .iter()
        .map(|r| r.model_progress)
        .filter(|&p| p != PROGRESS_UNCHANGED)
        .collect();
    assert!(!model_progress.is_empty());
    assert_eq!(*model_progress.last().unwrap(), 100);
    for window in model_progress.windows(2) {
        assert!(window[1] >= window[0]);
    }
}

#[tokio::test]
async fn nsfw_images_are_filtered_when_disabled() {
    let root = tempfile::tempdir().unwrap();
    let mut info = sample_model(7, "Filtered");
    info.images = vec![
        image("https://img.example/1.png", false, 90),
        image("https://img.example/2.png", true, 80),
        image("https://img.example/3.png", false, 70),
        image("https://img.example/4.png", true, 60),
        image("https://img.example/5.png", false, 50),
        image("https://img.example/6.png", true, 40),
        image("https://img.example/7.png", false, 30),
        image("https://img.example/8.png", false, 20),
        image("https://img.example/9.png", false, 10),
    ];
    let manager = DownloadManager::new(FakeRemote::new(info), test_config(root.path()));

    let progress = Arc::new(Mutex::new(Vec::new()));
    let done = run_to_completion(&manager, "https://civitai.com/models/7", progress.clone()).await;

    assert!(done.success);
    let info = done.info.unwrap();
    assert_eq!(info.images.len(), 6);

    // Score order is preserved and every survivor was downloaded.
    let urls: Vec<&str> = info.images.iter().map(|i| i.url.as_str()).collect();
    assert_eq!(
        urls,
        vec![
            "https://img.example/1.png",
            "https://img.example/3.png",
            "https://img.example/5.png",
            "https://img.example/7.png",
            "https://img.example/8.png",
            "https://img.example/9.png",
        ]
    );
    for img in &info.images {
        assert!(img.local_path.is_some());
    }

    // Image progress advanced to 100 in monotone steps.
    let image_progress: Vec<i32> = progress
        .lock()
        .unwrap()
        .iter()
        .map(|r| r.image_progress)
        .filter(|&p| p != PROGRESS_UNCHANGED)
        .collect();
    assert_eq!(*image_progress.last().unwrap(), 100);
    for window in image_progress.windows(2) {
        assert!(window[1] >= window[0]);
    }
}

#[tokio::test]
async fn cancel_in_flight_leaves_no_metadata() {
    let root = tempfile::tempdir().unwrap();
    // A slow 100-chunk transfer so cancellation lands mid-stream.
    let remote = FakeRemote::builder(sample_model(3, "Huge Model"))
        .file_body(vec![0u8; 10_000])
        .chunk(100, Duration::from_millis(10))
        .build();
    let manager = DownloadManager::new(remote, test_config(root.path()));

    let progress = Arc::new(Mutex::new(Vec::new()));
    let (tx, mut rx) = mpsc::unbounded_channel();
    let progress_sink = Arc::clone(&progress);
    let url = "https://civitai.com/models/3";
    assert!(
        manager
            .start_download(
                url,
                move |report| progress_sink.lock().unwrap().push(report),
                Box::new(move |success, message, _| {
                    tx.send((success, message)).ok();
                }),
            )
            .await
    );

    // Wait for at least one model-progress report, then cancel.
    let saw_progress = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let has_progress = progress
                .lock()
                .unwrap()
                .iter()
                .any(|r| r.model_progress >= 1);
            if has_progress {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    assert!(saw_progress.is_ok());
    assert!(manager.cancel_download(url).await);

    let (success, message) = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(!success);
    assert_eq!(message, "Download cancelled");

    // The partial file may remain; the commit point was never reached.
    let model_dir = root.path().join("loras/SDXL 1.0/Huge_Model");
    assert!(!model_dir.join("metadata.json").exists());
    assert!(!model_dir.join("model_card.html").exists());
}

#[tokio::test]
async fn zero_images_still_completes() {
    let root = tempfile::tempdir().unwrap();
    let manager = DownloadManager::new(
        FakeRemote::new(sample_model(5, "No Previews")),
        test_config(root.path()),
    );

    let progress = Arc::new(Mutex::new(Vec::new()));
    let done = run_to_completion(&manager, "https://civitai.com/models/5", progress).await;

    assert!(done.success);
    let info = done.info.unwrap();
    assert!(info.images.is_empty());
    assert!(info.thumbnail.is_empty());
    assert!(std::path::Path::new(&info.path)
        .join("metadata.json")
        .exists());
}

#[tokio::test]
async fn single_image_failure_does_not_fail_the_job() {
    let root = tempfile::tempdir().unwrap();
    let mut info = sample_model(6, "Flaky Previews");
    info.images = vec![
        image("https://img.example/ok.png", false, 5),
        image("https://img.example/broken.png", false, 3),
    ];
    let remote = FakeRemote::builder(info)
        .failing_image("https://img.example/broken.png")
        .build();
    let manager = DownloadManager::new(remote, test_config(root.path()));

    let progress = Arc::new(Mutex::new(Vec::new()));
    let done = run_to_completion(&manager, "https://civitai.com/models/6", progress).await;

    assert!(done.success);
    let info = done.info.unwrap();
    assert!(info.images[0].local_path.is_some());
    assert!(info.images[1].local_path.is_none());
    // The thumbnail still points at the first successful image.
    assert_eq!(info.thumbnail, info.images[0].local_path.clone().unwrap());
}

#[tokio::test]
async fn model_download_can_be_disabled() {
    let root = tempfile::tempdir().unwrap();
    let config = Config {
        comfy_path: root.path().to_path_buf(),
        download_model: false,
        ..Config::default()
    };
    let manager = DownloadManager::new(FakeRemote::new(sample_model(8, "Meta Only")), config);

    let progress = Arc::new(Mutex::new(Vec::new()));
    let done = run_to_completion(&manager, "https://civitai.com/models/8", progress).await;

    assert!(done.success);
    let info = done.info.unwrap();
    assert!(info.size.is_none());
    let model_dir = std::path::Path::new(&info.path);
    assert!(!model_dir.join("model.safetensors").exists());
    assert!(model_dir.join("metadata.json").exists());
}

#[tokio::test]
async fn gallery_can_be_disabled() {
    let root = tempfile::tempdir().unwrap();
    let config = Config {
        comfy_path: root.path().to_path_buf(),
        create_html: false,
        ..Config::default()
    };
    let manager = DownloadManager::new(FakeRemote::new(sample_model(9, "No Card")), config);

    let progress = Arc::new(Mutex::new(Vec::new()));
    let done = run_to_completion(&manager, "https://civitai.com/models/9", progress).await;

    assert!(done.success);
    let model_dir = std::path::Path::new(&done.info.unwrap().path).to_path_buf();
    assert!(!model_dir.join("model_card.html").exists());
}

#[tokio::test]
async fn queue_driven_flow_lands_terminal_state_in_queue() {
    use cmm::{DownloadStatus, SharedTaskQueue};
    use common::RecordingEmitter;

    let root = tempfile::tempdir().unwrap();
    let mut info = sample_model(11, "Queued Model");
    info.images = vec![image("https://img.example/q.png", false, 1)];
    let manager = DownloadManager::new(FakeRemote::new(info), test_config(root.path()));

    let emitter = RecordingEmitter::new();
    let queue = Arc::new(SharedTaskQueue::new(Arc::new(emitter.clone())));
    queue.add("https://civitai.com/models/11").await;
    queue.add("https://civitai.com/models/12").await;

    assert!(manager.start_next(&queue).await);

    // Wait for the worker to finish and land the terminal state.
    tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            let task = queue.get("https://civitai.com/models/11").await.unwrap();
            if task.is_terminal() {
                break task;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("task never became terminal");

    let task = queue.get("https://civitai.com/models/11").await.unwrap();
    assert_eq!(task.status, DownloadStatus::Completed);
    assert_eq!(task.model_progress, 100);
    assert_eq!(task.image_progress, 100);
    let landed = task.model_info.expect("completion carries metadata");
    assert_eq!(landed.id, 11);

    // The second URL is untouched and first in line.
    let pending = queue.queued_tasks().await;
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].url, "https://civitai.com/models/12");
    assert_eq!(pending[0].priority, 0);
}

#[tokio::test]
async fn missing_storage_root_fails_the_job() {
    let config = Config {
        comfy_path: "/definitely/not/a/real/comfy/root".into(),
        ..Config::default()
    };
    let manager = DownloadManager::new(FakeRemote::new(sample_model(10, "Nowhere")), config);

    let progress = Arc::new(Mutex::new(Vec::new()));
    let done = run_to_completion(&manager, "https://civitai.com/models/10", progress).await;

    assert!(!done.success);
    assert!(done.message.contains("Layout error"));
    assert!(done.info.is_none());
}
