//! Task Engine Integration Tests

use async_trait::async_trait;
use media_tasks::downloader::ProgressHook;
use media_tasks::{
    CapabilityProber, DownloadEngine, DownloadOutcome, MediaTaskError, ParamValue, Parameters, ProcessLauncher,
    ProcessOutput, TaskEngine,
};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use vidforge_config::AppConfig;
use vidforge_types::{StatusRecord, TaskStatus};

#[derive(Default)]
struct RecordingDownload {
    requests: Mutex<Vec<(String, PathBuf)>>,
}

#[async_trait]
impl DownloadEngine for RecordingDownload {
    async fn download(&self, url: &str, dest_dir: &Path, _hook: &ProgressHook) -> media_tasks::Result<DownloadOutcome> {
        self.requests
            .lock()
            .unwrap()
            .push((url.to_string(), dest_dir.to_path_buf()));
        Ok(DownloadOutcome::default())
    }
}

#[derive(Default)]
struct RecordingLauncher {
    calls: Mutex<Vec<Vec<String>>>,
}

#[async_trait]
impl ProcessLauncher for RecordingLauncher {
    async fn run(&self, argv: &[String]) -> media_tasks::Result<ProcessOutput> {
        self.calls.lock().unwrap().push(argv.to_vec());
        Ok(ProcessOutput::default())
    }
}

struct Fixture {
    dir: TempDir,
    engine: TaskEngine,
    downloader: Arc<RecordingDownload>,
    launcher: Arc<RecordingLauncher>,
}

impl Fixture {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let config = AppConfig {
            media_root: dir.path().join("media"),
            custom_profiles_path: dir.path().join("custom_commands.json"),
            ..AppConfig::default()
        };
        let downloader = Arc::new(RecordingDownload::default());
        let launcher = Arc::new(RecordingLauncher::default());
        let engine = TaskEngine::with_components(
            config,
            Arc::new(CapabilityProber::fixed([])),
            downloader.clone(),
            launcher.clone(),
        );
        Self {
            dir,
            engine,
            downloader,
            launcher,
        }
    }

    fn media(&self, relative: &str) -> PathBuf {
        self.dir.path().join("media").join(relative)
    }

    async fn upload(&self, name: &str) {
        self.engine.library().ensure_folders().await.unwrap();
        tokio::fs::write(self.media("local_videos").join(name), b"fake video")
            .await
            .unwrap();
    }

    async fn wait_terminal(&self, task_id: &str) -> StatusRecord {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let record = self.engine.status(task_id);
                if record.is_terminal() {
                    return record;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("task did not finish")
    }

    fn last_call(&self) -> Vec<String> {
        self.launcher.calls.lock().unwrap().last().cloned().unwrap()
    }
}

fn params(pairs: &[(&str, ParamValue)]) -> Parameters {
    pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
}

#[tokio::test]
async fn test_download_rejects_bad_urls() {
    let fixture = Fixture::new();
    for url in ["", "ftp://example.com/v", "example.com/v", "https://", "https://exa mple.com"] {
        assert!(
            matches!(fixture.engine.submit_download(url), Err(MediaTaskError::InvalidUrl(_))),
            "accepted {url:?}"
        );
    }
}

#[tokio::test]
async fn test_download_targets_download_folder() {
    let fixture = Fixture::new();
    let task_id = fixture.engine.submit_download(" https://example.com/watch?v=abc ").unwrap();
    assert_eq!(fixture.wait_terminal(&task_id).await.status, TaskStatus::Complete);

    let requests = fixture.downloader.requests.lock().unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].0, "https://example.com/watch?v=abc");
    assert_eq!(requests[0].1, fixture.media("yt_videos"));
}

#[tokio::test]
async fn test_transcode_cleans_input_and_plans_output() {
    let fixture = Fixture::new();
    fixture.upload("My Clip (1).mp4").await;

    let task_id = fixture
        .engine
        .submit_transcode(
            "trim_copy",
            "local_videos/My Clip (1).mp4",
            params(&[("start", "00:00:01".into()), ("end", "00:00:03".into())]),
        )
        .await
        .unwrap();
    let record = fixture.wait_terminal(&task_id).await;
    assert_eq!(record.status, TaskStatus::Complete);

    let cleaned = fixture.media("local_videos/My_Clip_1.mp4");
    assert!(cleaned.exists());
    assert!(!fixture.media("local_videos/My Clip (1).mp4").exists());

    let argv = fixture.last_call();
    assert_eq!(argv[0], "ffmpeg");
    assert!(argv.contains(&cleaned.to_string_lossy().into_owned()));
    let output = PathBuf::from(argv.last().unwrap());
    assert_eq!(output.parent(), Some(fixture.media("download").as_path()));
    let name = output.file_name().unwrap().to_string_lossy().into_owned();
    assert!(name.starts_with("My_Clip_1_trim_copy_"), "{name}");
    assert!(name.ends_with(".mp4"));
    assert!(record.msg.unwrap_or_default().contains(&name));
}

#[tokio::test]
async fn test_transcode_audio_extension() {
    let fixture = Fixture::new();
    fixture.upload("talk.mkv").await;

    let task_id = fixture
        .engine
        .submit_transcode("extract_audio_wav", "local_videos/talk.mkv", Parameters::new())
        .await
        .unwrap();
    fixture.wait_terminal(&task_id).await;
    assert!(fixture.last_call().last().unwrap().ends_with(".wav"));
}

#[tokio::test]
async fn test_split_segments_gets_pattern() {
    let fixture = Fixture::new();
    fixture.upload("long.mp4").await;

    let task_id = fixture
        .engine
        .submit_transcode("split_segments", "local_videos/long.mp4", params(&[("duration", ParamValue::Int(30))]))
        .await
        .unwrap();
    fixture.wait_terminal(&task_id).await;

    let pattern = fixture.last_call().last().cloned().unwrap();
    assert!(pattern.ends_with("_%03d.mp4"), "{pattern}");
    assert!(pattern.contains("long_"));
}

#[tokio::test]
async fn test_reserved_parameters_cannot_be_overridden() {
    let fixture = Fixture::new();
    fixture.upload("a.mp4").await;

    let task_id = fixture
        .engine
        .submit_transcode(
            "remux_copy",
            "local_videos/a.mp4",
            params(&[("input", "/etc/passwd".into()), ("output", "/tmp/evil.mp4".into())]),
        )
        .await
        .unwrap();
    fixture.wait_terminal(&task_id).await;

    let argv = fixture.last_call();
    assert!(!argv.iter().any(|arg| arg == "/etc/passwd" || arg == "/tmp/evil.mp4"));
}

#[tokio::test]
async fn test_missing_parameter_leaves_no_trace() {
    let fixture = Fixture::new();
    fixture.upload("My Clip.mp4").await;

    let result = fixture
        .engine
        .submit_transcode("trim_reencode", "local_videos/My Clip.mp4", Parameters::new())
        .await;
    assert!(matches!(result, Err(MediaTaskError::MissingParameter { name, .. }) if name == "start"));
    assert!(fixture.media("local_videos/My Clip.mp4").exists());
    assert!(fixture.launcher.calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_transcode_lookup_errors() {
    let fixture = Fixture::new();
    fixture.upload("a.mp4").await;

    let unknown = fixture
        .engine
        .submit_transcode("nonexistent_key", "local_videos/a.mp4", Parameters::new())
        .await;
    assert!(matches!(unknown, Err(MediaTaskError::UnknownProfile(_))));

    let missing = fixture
        .engine
        .submit_transcode("remux_copy", "local_videos/none.mp4", Parameters::new())
        .await;
    assert!(matches!(missing, Err(MediaTaskError::InputNotFound(_))));

    let escape = fixture
        .engine
        .submit_transcode("remux_copy", "../custom_commands.json", Parameters::new())
        .await;
    assert!(matches!(escape, Err(MediaTaskError::InputNotFound(_))));
}

#[tokio::test]
async fn test_media_listing_and_delete() {
    let fixture = Fixture::new();
    fixture.upload("a.mp4").await;

    let files = fixture.engine.list_media(false).await.unwrap();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].path, "local_videos/a.mp4");

    assert!(fixture.engine.delete_media("local_videos/a.mp4").await.unwrap());
    assert!(fixture.engine.list_media(false).await.unwrap().is_empty());
}
