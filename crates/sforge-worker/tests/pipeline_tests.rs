//! End-to-end pipeline tests with stubbed media and storage backends and
//! a real (wiremock) callback receiver.

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use sforge_media::download::DownloadStrategy;
use sforge_media::governor::GovernorConfig;
use sforge_media::{
    AcquisitionConfig, MediaError, MediaResult, RateGovernor, SegmentRenderer, SegmentWindow,
    VideoInfo, VideoProber,
};
use sforge_models::{
    ErrorKind, JobRequest, JobStage, PlanTier, RenderProfile,
};
use sforge_storage::{ObjectStore, StorageError, StorageResult, UploadPolicy};
use sforge_worker::{
    PipelineContext, ShortsPipeline, WebhookClient, WebhookConfig, WorkerConfig,
};

const SOURCE_URL: &str = "https://youtube.com/watch?v=dQw4w9WgXcQ";

fn mp4_bytes() -> Vec<u8> {
    let mut bytes = vec![0x00, 0x00, 0x00, 0x20];
    bytes.extend_from_slice(b"ftypisom");
    bytes.extend_from_slice(&[0u8; 2048]);
    bytes
}

/// Strategy that "downloads" a valid-looking MP4.
struct StubStrategy;

#[async_trait]
impl DownloadStrategy for StubStrategy {
    fn name(&self) -> &'static str {
        "stub"
    }

    async fn fetch(&self, _url: &str, dest: &Path) -> MediaResult<()> {
        tokio::fs::write(dest, mp4_bytes()).await?;
        Ok(())
    }
}

/// Strategy that always fails with a fixed upstream message.
struct FailingStrategy(&'static str);

#[async_trait]
impl DownloadStrategy for FailingStrategy {
    fn name(&self) -> &'static str {
        "failing"
    }

    async fn fetch(&self, _url: &str, _dest: &Path) -> MediaResult<()> {
        Err(MediaError::download_failed(self.0))
    }
}

/// Prober reporting a fixed duration.
struct StubProber {
    duration: f64,
}

#[async_trait]
impl VideoProber for StubProber {
    async fn probe(&self, _path: &Path) -> MediaResult<VideoInfo> {
        Ok(VideoInfo {
            duration: self.duration,
            width: 1920,
            height: 1080,
            fps: 30.0,
            codec: "h264".to_string(),
            size: 2048,
            bitrate: 1_500_000,
            has_audio: true,
        })
    }
}

/// Renderer that writes stub clip/thumbnail files; can be told to fail
/// specific window indexes.
struct StubRenderer {
    fail_indexes: Vec<u32>,
}

impl StubRenderer {
    fn new() -> Self {
        Self {
            fail_indexes: Vec::new(),
        }
    }

    fn failing_on(indexes: Vec<u32>) -> Self {
        Self {
            fail_indexes: indexes,
        }
    }
}

#[async_trait]
impl SegmentRenderer for StubRenderer {
    async fn render_clip(
        &self,
        _input: &Path,
        output: &Path,
        window: &SegmentWindow,
        _profile: &RenderProfile,
    ) -> MediaResult<()> {
        if self.fail_indexes.contains(&window.index) {
            return Err(MediaError::ffmpeg_failed(
                "stub transcode refused",
                None,
                Some(1),
            ));
        }
        tokio::fs::write(output, mp4_bytes()).await?;
        Ok(())
    }

    async fn render_thumbnail(&self, _clip: &Path, output: &Path) -> MediaResult<()> {
        tokio::fs::write(output, b"\xFF\xD8\xFF\xE0 jpg").await?;
        Ok(())
    }
}

/// In-memory object store.
#[derive(Default)]
struct MemoryStore {
    keys: Mutex<Vec<String>>,
    fail_all: bool,
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn put_file(&self, _path: &Path, key: &str, _content_type: &str) -> StorageResult<String> {
        if self.fail_all {
            return Err(StorageError::upload_failed("bucket on fire"));
        }
        self.keys.lock().unwrap().push(key.to_string());
        Ok(format!("https://cdn.test/{}", key))
    }

    async fn delete(&self, _key: &str) -> StorageResult<()> {
        Ok(())
    }

    async fn exists(&self, _key: &str) -> StorageResult<bool> {
        Ok(false)
    }
}

struct TestHarness {
    pipeline: ShortsPipeline,
    server: MockServer,
    work_dir: tempfile::TempDir,
}

async fn harness(
    strategies: Vec<Arc<dyn DownloadStrategy>>,
    prober: StubProber,
    renderer: StubRenderer,
    store: MemoryStore,
) -> TestHarness {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let work_dir = tempfile::TempDir::new().unwrap();
    let config = WorkerConfig {
        work_dir: work_dir.path().to_path_buf(),
        job_timeout: Duration::from_secs(30),
        jitter_secs: 0.0,
        upload_retries: 1,
        upload_retry_base: Duration::from_millis(1),
        ..WorkerConfig::default()
    };

    let webhook = WebhookClient::new(WebhookConfig {
        schedule: vec![Duration::from_millis(1); 5],
        extended_delay: Duration::from_millis(2),
        request_timeout: Duration::from_secs(2),
    })
    .unwrap();

    let pipeline = ShortsPipeline::new(PipelineContext {
        config,
        governor: Arc::new(RateGovernor::new(GovernorConfig {
            max_requests: 100,
            window: Duration::from_secs(60),
            base_backoff: Duration::from_millis(1),
            bot_backoff_base: Duration::from_millis(1),
            max_cooldown: Duration::from_millis(10),
        })),
        acquisition: AcquisitionConfig {
            attempt_timeout: Duration::from_secs(5),
            admit_retries: 1,
            admit_wait_cap: Duration::from_millis(5),
            bot_strategy_delay: Duration::from_millis(1),
        },
        strategies,
        prober: Arc::new(prober),
        renderer: Arc::new(renderer),
        store: Arc::new(store),
        upload_policy: UploadPolicy::default(),
        webhook,
    });

    TestHarness {
        pipeline,
        server,
        work_dir,
    }
}

fn free_tier_request(callback: &str) -> JobRequest {
    JobRequest::new(SOURCE_URL, callback).with_tier(PlanTier::Free)
}

async fn callback_bodies(server: &MockServer) -> Vec<serde_json::Value> {
    server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .map(|r| serde_json::from_slice(&r.body).unwrap())
        .collect()
}

#[tokio::test]
async fn test_free_tier_job_completes_with_two_watermarked_shorts() {
    let h = harness(
        vec![Arc::new(StubStrategy)],
        StubProber { duration: 600.0 },
        StubRenderer::new(),
        MemoryStore::default(),
    )
    .await;

    let callback = format!("{}/hook", h.server.uri());
    let record = h.pipeline.run(free_tier_request(&callback)).await;

    assert_eq!(record.stage, JobStage::Completed);
    assert_eq!(record.platform, "youtube");
    assert!(record.error.is_none());

    // Free tier: exactly 2 shorts, each <= 60s, watermarked, with URLs
    assert_eq!(record.shorts.len(), 2);
    for short in &record.shorts {
        assert!(short.duration_secs <= 60.0);
        assert!(short.watermarked);
        assert!(short.is_uploaded());
        assert!(!short.url.as_deref().unwrap().is_empty());
        assert!(short.quality == "720p");
    }

    // Exactly one callback with the completed payload
    let bodies = callback_bodies(&h.server).await;
    assert_eq!(bodies.len(), 1);
    let body = &bodies[0];
    assert_eq!(body["status"], "completed");
    assert_eq!(body["shorts_results"].as_array().unwrap().len(), 2);
    assert_eq!(body["processing_id"], record.id.as_str());

    // Local artifacts are gone
    assert!(!h.work_dir.path().join(record.id.as_str()).exists());
}

#[tokio::test]
async fn test_too_short_source_fails_with_too_short_kind() {
    let h = harness(
        vec![Arc::new(StubStrategy)],
        StubProber { duration: 30.0 },
        StubRenderer::new(),
        MemoryStore::default(),
    )
    .await;

    let callback = format!("{}/hook", h.server.uri());
    let record = h.pipeline.run(free_tier_request(&callback)).await;

    assert_eq!(record.stage, JobStage::Failed);
    let error = record.error.as_ref().unwrap();
    assert_eq!(error.kind, ErrorKind::VideoTooShort);

    let bodies = callback_bodies(&h.server).await;
    assert_eq!(bodies.len(), 1);
    assert_eq!(bodies[0]["status"], "failed");
    assert_eq!(bodies[0]["error"]["category"], "video_too_short");
    assert_eq!(bodies[0]["error"]["retryable"], false);
}

#[tokio::test]
async fn test_unavailable_video_fails_permanently() {
    let h = harness(
        vec![
            Arc::new(FailingStrategy("ERROR: Video unavailable")),
            Arc::new(StubStrategy),
        ],
        StubProber { duration: 600.0 },
        StubRenderer::new(),
        MemoryStore::default(),
    )
    .await;

    let callback = format!("{}/hook", h.server.uri());
    let record = h.pipeline.run(free_tier_request(&callback)).await;

    assert_eq!(record.stage, JobStage::Failed);
    assert_eq!(
        record.error.as_ref().unwrap().kind,
        ErrorKind::VideoUnavailable
    );

    let bodies = callback_bodies(&h.server).await;
    assert_eq!(bodies[0]["error"]["category"], "video_unavailable");
    assert_eq!(bodies[0]["error"]["retryable"], false);
}

#[tokio::test]
async fn test_bot_detection_falls_back_to_next_strategy() {
    let h = harness(
        vec![
            Arc::new(FailingStrategy("Sign in to confirm you're not a bot")),
            Arc::new(StubStrategy),
        ],
        StubProber { duration: 600.0 },
        StubRenderer::new(),
        MemoryStore::default(),
    )
    .await;

    let callback = format!("{}/hook", h.server.uri());
    let record = h.pipeline.run(free_tier_request(&callback)).await;

    assert_eq!(record.stage, JobStage::Completed);
    assert_eq!(record.shorts.len(), 2);
}

#[tokio::test]
async fn test_single_render_failure_degrades_result_set() {
    let h = harness(
        vec![Arc::new(StubStrategy)],
        StubProber { duration: 185.0 },
        StubRenderer::failing_on(vec![1]),
        MemoryStore::default(),
    )
    .await;

    let callback = format!("{}/hook", h.server.uri());
    let request = JobRequest::new(SOURCE_URL, callback.as_str()).with_tier(PlanTier::Premium);
    let record = h.pipeline.run(request).await;

    // 185s / 60s = 3 windows; window 1 failed, the other two survive
    assert_eq!(record.stage, JobStage::Completed);
    assert_eq!(record.shorts.len(), 2);
    assert!(record.shorts.iter().all(|s| !s.watermarked));

    let bodies = callback_bodies(&h.server).await;
    assert_eq!(bodies[0]["shorts_results"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_total_upload_failure_fails_job() {
    let h = harness(
        vec![Arc::new(StubStrategy)],
        StubProber { duration: 600.0 },
        StubRenderer::new(),
        MemoryStore {
            fail_all: true,
            ..Default::default()
        },
    )
    .await;

    let callback = format!("{}/hook", h.server.uri());
    let record = h.pipeline.run(free_tier_request(&callback)).await;

    assert_eq!(record.stage, JobStage::Failed);
    assert_eq!(record.error.as_ref().unwrap().kind, ErrorKind::StorageError);

    let bodies = callback_bodies(&h.server).await;
    assert_eq!(bodies[0]["error"]["category"], "storage_error");
    assert_eq!(bodies[0]["error"]["retryable"], true);
}

#[tokio::test]
async fn test_spawn_is_decoupled_from_the_caller() {
    let h = harness(
        vec![Arc::new(StubStrategy)],
        StubProber { duration: 600.0 },
        StubRenderer::new(),
        MemoryStore::default(),
    )
    .await;

    let callback = format!("{}/hook", h.server.uri());
    let request = free_tier_request(&callback);
    let expected_id = request.processing_id.clone();

    // spawn returns immediately with the processing id
    let id = h.pipeline.spawn(request);
    assert_eq!(id, expected_id);

    // The callback eventually arrives without the caller waiting on run()
    for _ in 0..200 {
        if !callback_bodies(&h.server).await.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    let bodies = callback_bodies(&h.server).await;
    assert_eq!(bodies.len(), 1);
    assert_eq!(bodies[0]["processing_id"], id.as_str());
}
