//! Worker configuration.

use std::path::PathBuf;
use std::time::Duration;

use sforge_media::SegmentPolicy;

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Work directory for temporary files; each job gets a subdirectory
    /// named by its processing id.
    pub work_dir: PathBuf,
    /// Overall per-job timeout covering every stage.
    pub job_timeout: Duration,
    /// Maximum segment renders in flight within a single job.
    pub max_render_parallel: usize,
    /// Per-clip transcode timeout in seconds.
    pub render_timeout_secs: u64,
    /// Length of each produced short, seconds.
    pub segment_length_secs: f64,
    /// Skipped at the start of the source (intros).
    pub start_margin_secs: f64,
    /// Skipped at the end of the source (outros).
    pub end_margin_secs: f64,
    /// Maximum random shift applied to window starts.
    pub jitter_secs: f64,
    /// Upload retries per short beyond the first attempt.
    pub upload_retries: u32,
    /// Base delay for upload retry backoff.
    pub upload_retry_base: Duration,
    /// Watermark text burned into free-tier exports when the request
    /// carries none.
    pub watermark_text: String,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            work_dir: PathBuf::from("/tmp/shortforge"),
            job_timeout: Duration::from_secs(3600), // 1 hour
            max_render_parallel: 2,
            render_timeout_secs: 600,
            segment_length_secs: 60.0,
            start_margin_secs: 2.0,
            end_margin_secs: 2.0,
            jitter_secs: 1.5,
            upload_retries: 3,
            upload_retry_base: Duration::from_millis(500),
            watermark_text: "shortforge".to_string(),
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            work_dir: std::env::var("WORKER_WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.work_dir),
            job_timeout: Duration::from_secs(
                std::env::var("WORKER_JOB_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(3600),
            ),
            max_render_parallel: std::env::var("WORKER_MAX_RENDER_PARALLEL")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_render_parallel),
            render_timeout_secs: std::env::var("WORKER_RENDER_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.render_timeout_secs),
            segment_length_secs: std::env::var("WORKER_SEGMENT_LENGTH")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.segment_length_secs),
            start_margin_secs: std::env::var("WORKER_START_MARGIN")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.start_margin_secs),
            end_margin_secs: std::env::var("WORKER_END_MARGIN")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.end_margin_secs),
            jitter_secs: std::env::var("WORKER_SEGMENT_JITTER")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.jitter_secs),
            upload_retries: std::env::var("WORKER_UPLOAD_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.upload_retries),
            upload_retry_base: defaults.upload_retry_base,
            watermark_text: std::env::var("WORKER_WATERMARK_TEXT")
                .unwrap_or(defaults.watermark_text),
        }
    }

    /// Segment placement policy derived from this config.
    pub fn segment_policy(&self) -> SegmentPolicy {
        SegmentPolicy {
            segment_length_secs: self.segment_length_secs,
            start_margin_secs: self.start_margin_secs,
            end_margin_secs: self.end_margin_secs,
            jitter_secs: self.jitter_secs,
        }
    }
}
