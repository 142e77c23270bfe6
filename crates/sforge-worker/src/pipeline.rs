//! The shorts pipeline: one job record walked through
//! Accepted → Acquiring → Validating → Probing → Segmenting → Uploading →
//! Completed, with Failed reachable from every non-terminal stage.
//!
//! Each job runs as an independent task; the caller already got its
//! "accepted" response, so the eventual outcome travels only through the
//! webhook callback. The whole job body sits under one timeout, and
//! cleanup runs unconditionally on the way out.

use std::path::Path;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};

use sforge_media::{
    acquire_source, default_strategies, plan_windows, validate_artifact, AcquisitionConfig,
    FfmpegRenderer, FfprobeProber, RateGovernor, SegmentRenderer, SegmentWindow, VideoInfo,
    VideoProber,
};
use sforge_media::download::DownloadStrategy;
use sforge_media::governor::GovernorConfig;
use sforge_models::{
    classify, CallbackPayload, ErrorKind, JobError, JobId, JobRecord, JobRequest, JobStage,
    PlanLimits, RenderProfile, ShortClip,
};
use sforge_storage::{upload_short_once, ObjectStore, S3Store, StorageError, UploadPolicy};

use crate::cleanup::cleanup_job;
use crate::config::WorkerConfig;
use crate::error::WorkerResult;
use crate::logging::JobLogger;
use crate::retry::{retry_classified, RetryPolicy, RetryResult};
use crate::webhook::{WebhookClient, WebhookConfig};

/// Everything the pipeline needs, explicitly constructed and injected.
/// The governor is the only state shared across jobs.
pub struct PipelineContext {
    pub config: WorkerConfig,
    pub governor: Arc<RateGovernor>,
    pub acquisition: AcquisitionConfig,
    pub strategies: Vec<Arc<dyn DownloadStrategy>>,
    pub prober: Arc<dyn VideoProber>,
    pub renderer: Arc<dyn SegmentRenderer>,
    pub store: Arc<dyn ObjectStore>,
    pub upload_policy: UploadPolicy,
    pub webhook: WebhookClient,
}

/// The composed pipeline. Cheap to clone; jobs share the context.
#[derive(Clone)]
pub struct ShortsPipeline {
    ctx: Arc<PipelineContext>,
}

impl ShortsPipeline {
    pub fn new(ctx: PipelineContext) -> Self {
        Self { ctx: Arc::new(ctx) }
    }

    /// Wire up the production pipeline: yt-dlp strategy chain, ffprobe,
    /// ffmpeg renderer, S3 store from env.
    pub async fn production(config: WorkerConfig) -> WorkerResult<Self> {
        let store = S3Store::from_env().await?;
        let webhook = WebhookClient::new(WebhookConfig::default())?;
        let renderer = FfmpegRenderer::new(config.render_timeout_secs);

        Ok(Self::new(PipelineContext {
            governor: Arc::new(RateGovernor::new(GovernorConfig::default())),
            acquisition: AcquisitionConfig::default(),
            strategies: default_strategies(),
            prober: Arc::new(FfprobeProber),
            renderer: Arc::new(renderer),
            store: Arc::new(store),
            upload_policy: UploadPolicy::default(),
            webhook,
            config,
        }))
    }

    /// Start a job as an independent task and return immediately with its
    /// processing id. The result travels via the webhook callback only.
    pub fn spawn(&self, request: JobRequest) -> JobId {
        let id = request.processing_id.clone();
        let pipeline = self.clone();
        tokio::spawn(async move {
            pipeline.run(request).await;
        });
        id
    }

    /// Run one job to its terminal state: stage walk, exactly one
    /// callback, unconditional cleanup. Returns the final record.
    pub async fn run(&self, request: JobRequest) -> JobRecord {
        let mut record = JobRecord::new(&request);
        let logger = JobLogger::new(&record.id);
        logger.log_start(&format!("source {}", record.source_url));

        let work_dir = self.ctx.config.work_dir.join(record.id.as_str());

        let outcome = tokio::time::timeout(
            self.ctx.config.job_timeout,
            self.execute(&mut record, &request, &work_dir),
        )
        .await;

        match outcome {
            Ok(Ok(())) => {
                record.complete();
                logger.log_completion(&format!(
                    "{} short(s) delivered in {}s",
                    record.shorts.iter().filter(|s| s.is_uploaded()).count(),
                    record.elapsed_secs()
                ));
            }
            Ok(Err(job_error)) => {
                logger.log_error(&job_error.to_string());
                record.fail(job_error.kind, job_error.message);
            }
            Err(_) => {
                logger.log_error("job timed out");
                record.fail(
                    ErrorKind::NetworkTimeout,
                    format!(
                        "job timed out after {} seconds",
                        self.ctx.config.job_timeout.as_secs()
                    ),
                );
            }
        }

        // Exactly one callback per job, success or failure
        let payload = CallbackPayload::for_record(&record);
        let report = self.ctx.webhook.deliver(&record.callback_url, &payload).await;
        info!(
            job_id = %record.id,
            delivered = report.delivered,
            attempts = report.attempts,
            "Callback delivery finished"
        );

        // Cleanup runs no matter how the job ended
        if let Err(e) = cleanup_job(&self.ctx.config.work_dir, &record.id).await {
            logger.log_warning(&format!("cleanup failed: {}", e));
        }

        record
    }

    /// The stage walk. Any error short-circuits the remaining stages and
    /// flows into the failure-callback path in `run`.
    async fn execute(
        &self,
        record: &mut JobRecord,
        request: &JobRequest,
        work_dir: &Path,
    ) -> Result<(), JobError> {
        let ctx = &self.ctx;

        record.advance(JobStage::Acquiring);
        tokio::fs::create_dir_all(work_dir).await.map_err(|e| {
            JobError::new(
                ErrorKind::Unknown,
                format!("failed to create work directory: {}", e),
            )
        })?;

        let artifact = acquire_source(
            &record.source_url,
            &record.id,
            work_dir,
            &ctx.strategies,
            &ctx.governor,
            &ctx.acquisition,
        )
        .await
        .map_err(|e| JobError::new(e.last_kind, e.to_string()))?;
        record.platform = artifact.video.platform.to_string();

        record.advance(JobStage::Validating);
        validate_artifact(&artifact.path)
            .await
            .map_err(|e| JobError::new(ErrorKind::CorruptedDownload, e.to_string()))?;

        record.advance(JobStage::Probing);
        let probe = ctx
            .prober
            .probe(&artifact.path)
            .await
            .map_err(|e| JobError::new(classify(&e.to_string()), e.to_string()))?;
        enforce_policy(&probe, artifact.size_bytes, &record.limits)?;

        record.advance(JobStage::Segmenting);
        let windows = plan_windows(
            probe.duration,
            record.limits.max_shorts,
            &ctx.config.segment_policy(),
        );
        if windows.is_empty() {
            return Err(JobError::new(
                ErrorKind::VideoTooShort,
                format!(
                    "video too short to segment ({:.1}s < {:.0}s)",
                    probe.duration, ctx.config.segment_length_secs
                ),
            ));
        }

        let watermark_text = request
            .watermark_text
            .clone()
            .unwrap_or_else(|| ctx.config.watermark_text.clone());
        let profile = RenderProfile::for_limits(&record.limits, Some(watermark_text));

        record.shorts = self
            .render_windows(&record.id, &record.limits, &artifact.path, &windows, &profile, work_dir)
            .await?;

        record.advance(JobStage::Uploading);
        self.upload_shorts(record).await?;

        Ok(())
    }

    /// Render every window, in parallel up to the configured bound. A
    /// single window's failure is logged and skipped; only a full wipe
    /// fails the job.
    async fn render_windows(
        &self,
        job_id: &JobId,
        limits: &PlanLimits,
        input: &Path,
        windows: &[SegmentWindow],
        profile: &RenderProfile,
        work_dir: &Path,
    ) -> Result<Vec<ShortClip>, JobError> {
        let ctx = &self.ctx;
        let semaphore = Arc::new(Semaphore::new(ctx.config.max_render_parallel.max(1)));
        let quality = limits.quality_label();
        let mut set: JoinSet<Result<ShortClip, (u32, String)>> = JoinSet::new();

        for window in windows.iter().cloned() {
            let semaphore = Arc::clone(&semaphore);
            let renderer = Arc::clone(&ctx.renderer);
            let input = input.to_path_buf();
            let profile = profile.clone();
            let quality = quality.clone();
            let job_id = job_id.clone();
            let output = work_dir.join(format!("short_{:02}_{}.mp4", window.index + 1, quality));

            set.spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|_| (window.index, "render semaphore closed".to_string()))?;

                let mut short = ShortClip::new(
                    &job_id,
                    window.index,
                    window.start_secs,
                    window.duration_secs,
                    &output,
                    &quality,
                    profile.is_watermarked(),
                );

                renderer
                    .render_clip(&input, &output, &window, &profile)
                    .await
                    .map_err(|e| (window.index, e.to_string()))?;

                // Thumbnail is best effort
                let thumb = output.with_extension("jpg");
                match renderer.render_thumbnail(&output, &thumb).await {
                    Ok(()) => short.thumbnail_path = Some(thumb),
                    Err(e) => {
                        warn!(
                            job_id = %job_id,
                            index = window.index,
                            error = %e,
                            "Thumbnail render failed (non-fatal)"
                        );
                    }
                }

                short.size_bytes = tokio::fs::metadata(&output)
                    .await
                    .map(|m| m.len())
                    .unwrap_or(0);
                Ok(short)
            });
        }

        let mut rendered = Vec::new();
        let mut last_failure = String::new();
        let mut skipped = 0u32;

        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(Ok(short)) => rendered.push(short),
                Ok(Err((index, message))) => {
                    skipped += 1;
                    warn!(
                        job_id = %job_id,
                        index = index,
                        "Segment render failed, skipping window: {}",
                        message
                    );
                    last_failure = message;
                }
                Err(join_error) => {
                    skipped += 1;
                    last_failure = join_error.to_string();
                    warn!(job_id = %job_id, "Segment render task panicked: {}", last_failure);
                }
            }
        }

        if rendered.is_empty() {
            return Err(JobError::new(
                classify(&last_failure),
                format!(
                    "all {} segment renders failed; last error: {}",
                    windows.len(),
                    last_failure
                ),
            ));
        }

        if skipped > 0 {
            info!(
                job_id = %job_id,
                rendered = rendered.len(),
                skipped = skipped,
                "Partial segmentation result"
            );
        }

        rendered.sort_by_key(|s| s.index);
        Ok(rendered)
    }

    /// Upload every rendered short with per-item retry. A short that
    /// exhausts its retries is dropped from the result set; the job only
    /// fails when every short is lost.
    async fn upload_shorts(&self, record: &mut JobRecord) -> Result<(), JobError> {
        let ctx = &self.ctx;
        let job_id = record.id.clone();
        let total = record.shorts.len();
        let policy = RetryPolicy::new("short_upload")
            .with_max_retries(ctx.config.upload_retries)
            .with_base_delay(ctx.config.upload_retry_base);

        let mut uploaded = 0usize;

        for short in record.shorts.iter_mut() {
            let target: &ShortClip = short;
            let result = retry_classified(
                &policy,
                |e: &StorageError| e.is_retryable(),
                || upload_short_once(ctx.store.as_ref(), &ctx.upload_policy, &job_id, target),
            )
            .await;

            match result {
                RetryResult::Success(outcome) => {
                    short.mark_uploaded(outcome.key, outcome.url);
                    short.thumbnail_url = outcome.thumbnail_url;
                    uploaded += 1;
                }
                RetryResult::Failed { error, attempts } => {
                    warn!(
                        job_id = %job_id,
                        short_id = %short.id,
                        attempts = attempts,
                        "Short dropped after failed upload: {}",
                        error
                    );
                }
            }
        }

        if uploaded == 0 && total > 0 {
            return Err(JobError::new(
                ErrorKind::StorageError,
                format!("all {} shorts failed to upload", total),
            ));
        }

        Ok(())
    }
}

/// Tier policy gate at the probing stage. Violations are terminal, never
/// retried.
fn enforce_policy(
    probe: &VideoInfo,
    artifact_bytes: u64,
    limits: &PlanLimits,
) -> Result<(), JobError> {
    if probe.duration < limits.min_source_duration_secs {
        return Err(JobError::new(
            ErrorKind::VideoTooShort,
            format!(
                "video too short to segment ({:.1}s, minimum {:.0}s)",
                probe.duration, limits.min_source_duration_secs
            ),
        ));
    }

    if probe.duration > limits.max_source_duration_secs {
        return Err(JobError::new(
            ErrorKind::VideoTooLong,
            format!(
                "source exceeds maximum duration ({:.0}s > {:.0}s)",
                probe.duration, limits.max_source_duration_secs
            ),
        ));
    }

    let size = if artifact_bytes > 0 {
        artifact_bytes
    } else {
        probe.size
    };
    if size > limits.max_source_bytes {
        return Err(JobError::new(
            ErrorKind::FileTooLarge,
            format!(
                "source exceeds maximum size ({} > {} bytes)",
                size, limits.max_source_bytes
            ),
        ));
    }

    if probe.height > 0 && probe.height < limits.min_source_height {
        return Err(JobError::new(
            ErrorKind::FormatUnsupported,
            format!(
                "source resolution {}p is below the minimum {}p",
                probe.height, limits.min_source_height
            ),
        ));
    }

    Ok(())
}
