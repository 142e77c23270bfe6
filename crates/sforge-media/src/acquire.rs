//! Acquisition orchestrator.
//!
//! Obtains a validated local source file for a URL, tolerating an
//! unreliable and adversarial upstream. Strategies run strictly in order,
//! gated by the rate governor, with every failure classified and reported
//! back so the governor can escalate. At most one network attempt per
//! strategy is in flight per call.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use sforge_models::{extract_video_id, source_domain, ErrorKind, JobId, PlatformVideo};

use crate::download::DownloadStrategy;
use crate::governor::{Admission, RateGovernor};
use crate::validate::validate_artifact;

/// Orchestrator tuning knobs.
#[derive(Debug, Clone)]
pub struct AcquisitionConfig {
    /// Timeout for a single strategy attempt.
    pub attempt_timeout: Duration,
    /// How many times a denied admission is retried before the strategy
    /// is skipped.
    pub admit_retries: u32,
    /// Cap on the wait honored for a denied admission.
    pub admit_wait_cap: Duration,
    /// Base delay slept before the next strategy after a bot-detection
    /// failure; doubles per consecutive bot-detected attempt.
    pub bot_strategy_delay: Duration,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            attempt_timeout: Duration::from_secs(900),
            admit_retries: 3,
            admit_wait_cap: Duration::from_secs(30),
            bot_strategy_delay: Duration::from_secs(10),
        }
    }
}

/// One strategy attempt, kept for logging and the aggregated error.
#[derive(Debug, Clone)]
pub struct AttemptRecord {
    pub strategy: &'static str,
    pub attempt: u32,
    pub kind: ErrorKind,
    pub message: String,
}

/// All strategies exhausted (or an abort-worthy failure was hit). Carries
/// the classification of the last failure: callers use it to frame
/// user-facing messaging as "retry later" vs permanent.
#[derive(Debug)]
pub struct AcquisitionError {
    pub last_kind: ErrorKind,
    pub attempts: Vec<AttemptRecord>,
}

impl std::fmt::Display for AcquisitionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let last = self
            .attempts
            .last()
            .map(|a| a.message.as_str())
            .unwrap_or("no attempts made");
        write!(
            f,
            "acquisition failed after {} attempt(s) ({}): {}",
            self.attempts.len(),
            self.last_kind,
            last
        )
    }
}

impl std::error::Error for AcquisitionError {}

impl AcquisitionError {
    fn immediate(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            last_kind: kind,
            attempts: vec![AttemptRecord {
                strategy: "none",
                attempt: 0,
                kind,
                message: message.into(),
            }],
        }
    }
}

/// A downloaded and validated source file, owned by the job.
#[derive(Debug, Clone)]
pub struct SourceArtifact {
    pub path: PathBuf,
    pub size_bytes: u64,
    pub video: PlatformVideo,
}

/// Acquire a validated source file for `url` into `dest_dir`.
///
/// The URL must resolve to a supported platform's canonical video id;
/// otherwise the call fails immediately with `FormatUnsupported` and no
/// strategy is invoked. Strategies are then tried strictly in order until
/// one yields an artifact that passes validation.
pub async fn acquire_source(
    url: &str,
    job_id: &JobId,
    dest_dir: &Path,
    strategies: &[Arc<dyn DownloadStrategy>],
    governor: &RateGovernor,
    config: &AcquisitionConfig,
) -> Result<SourceArtifact, AcquisitionError> {
    let video = extract_video_id(url).map_err(|e| {
        AcquisitionError::immediate(
            ErrorKind::FormatUnsupported,
            format!("{} is not a supported platform video URL: {}", url, e),
        )
    })?;

    let domain = source_domain(url).unwrap_or_else(|| "unknown".to_string());
    let dest = dest_dir.join("source.mp4");
    let mut attempts: Vec<AttemptRecord> = Vec::new();
    let mut bot_hits: u32 = 0;

    'strategies: for strategy in strategies {
        let attempt_no = attempts.len() as u32 + 1;

        // Admission loop: honor denials up to a bounded number of waits,
        // then move on to the next strategy.
        let mut admitted = false;
        for admit_try in 0..=config.admit_retries {
            match governor.admit(&domain) {
                Admission::Allowed => {
                    admitted = true;
                    break;
                }
                Admission::Denied { retry_after } => {
                    if admit_try == config.admit_retries {
                        break;
                    }
                    let wait = retry_after.min(config.admit_wait_cap);
                    info!(
                        job_id = %job_id,
                        strategy = strategy.name(),
                        wait_ms = wait.as_millis() as u64,
                        "Admission denied, waiting before retry"
                    );
                    tokio::time::sleep(wait).await;
                }
            }
        }
        if !admitted {
            attempts.push(AttemptRecord {
                strategy: strategy.name(),
                attempt: attempt_no,
                kind: ErrorKind::RateLimited,
                message: "admission denied by rate governor".to_string(),
            });
            continue 'strategies;
        }

        info!(
            job_id = %job_id,
            strategy = strategy.name(),
            attempt = attempt_no,
            "Trying acquisition strategy"
        );

        let outcome =
            tokio::time::timeout(config.attempt_timeout, strategy.fetch(url, &dest)).await;

        let message = match outcome {
            Ok(Ok(())) => match validate_artifact(&dest).await {
                Ok(()) => {
                    governor.report_success();
                    let size_bytes = tokio::fs::metadata(&dest)
                        .await
                        .map(|m| m.len())
                        .unwrap_or(0);
                    info!(
                        job_id = %job_id,
                        strategy = strategy.name(),
                        size_bytes = size_bytes,
                        "Acquisition succeeded"
                    );
                    return Ok(SourceArtifact {
                        path: dest,
                        size_bytes,
                        video,
                    });
                }
                Err(validation_error) => {
                    // Never reuse a rejected artifact
                    let _ = tokio::fs::remove_file(&dest).await;
                    validation_error.to_string()
                }
            },
            Ok(Err(fetch_error)) => fetch_error.to_string(),
            Err(_) => format!(
                "attempt timed out after {} seconds",
                config.attempt_timeout.as_secs()
            ),
        };

        let kind = governor.report_failure(&message);
        warn!(
            job_id = %job_id,
            strategy = strategy.name(),
            kind = %kind,
            "Acquisition attempt failed: {}",
            message
        );
        attempts.push(AttemptRecord {
            strategy: strategy.name(),
            attempt: attempt_no,
            kind,
            message,
        });

        // Permanent failures make the remaining strategies pointless
        if kind.is_permanent_for_source() {
            return Err(AcquisitionError {
                last_kind: kind,
                attempts,
            });
        }

        // After a bot detection, pause before the next strategy instead of
        // hammering the host with a different fingerprint right away.
        if kind.escalates_backoff() {
            bot_hits += 1;
            let delay = config
                .bot_strategy_delay
                .saturating_mul(2u32.saturating_pow(bot_hits.saturating_sub(1).min(4)));
            info!(
                job_id = %job_id,
                delay_ms = delay.as_millis() as u64,
                "Bot detection hit, pausing before next strategy"
            );
            tokio::time::sleep(delay).await;
        }
    }

    let last_kind = attempts.last().map(|a| a.kind).unwrap_or(ErrorKind::Unknown);
    Err(AcquisitionError {
        last_kind,
        attempts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{MediaError, MediaResult};
    use crate::governor::GovernorConfig;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tempfile::TempDir;

    fn test_config() -> AcquisitionConfig {
        AcquisitionConfig {
            attempt_timeout: Duration::from_secs(5),
            admit_retries: 1,
            admit_wait_cap: Duration::from_millis(5),
            bot_strategy_delay: Duration::from_millis(1),
        }
    }

    fn permissive_governor() -> RateGovernor {
        RateGovernor::new(GovernorConfig {
            max_requests: 100,
            window: Duration::from_secs(60),
            base_backoff: Duration::from_millis(1),
            bot_backoff_base: Duration::from_millis(1),
            max_cooldown: Duration::from_millis(20),
        })
    }

    fn mp4_bytes() -> Vec<u8> {
        let mut bytes = vec![0x00, 0x00, 0x00, 0x20];
        bytes.extend_from_slice(b"ftypisom");
        bytes.extend_from_slice(&[0u8; 8]);
        bytes
    }

    struct FailingStrategy {
        name: &'static str,
        message: &'static str,
        calls: AtomicU32,
    }

    impl FailingStrategy {
        fn new(name: &'static str, message: &'static str) -> Self {
            Self {
                name,
                message,
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl DownloadStrategy for FailingStrategy {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn fetch(&self, _url: &str, _dest: &Path) -> MediaResult<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(MediaError::download_failed(self.message))
        }
    }

    struct WritingStrategy {
        calls: AtomicU32,
        bytes: Vec<u8>,
    }

    impl WritingStrategy {
        fn valid() -> Self {
            Self {
                calls: AtomicU32::new(0),
                bytes: mp4_bytes(),
            }
        }

        fn html() -> Self {
            Self {
                calls: AtomicU32::new(0),
                bytes: b"<!DOCTYPE html><html>verify you are not a bot</html>".to_vec(),
            }
        }
    }

    #[async_trait]
    impl DownloadStrategy for WritingStrategy {
        fn name(&self) -> &'static str {
            "writer"
        }

        async fn fetch(&self, _url: &str, dest: &Path) -> MediaResult<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::fs::write(dest, &self.bytes).await?;
            Ok(())
        }
    }

    const URL: &str = "https://youtube.com/watch?v=dQw4w9WgXcQ";

    #[tokio::test]
    async fn test_invalid_url_fails_without_invoking_strategies() {
        let dir = TempDir::new().unwrap();
        let strategy = Arc::new(FailingStrategy::new("never", "should not run"));
        let strategies: Vec<Arc<dyn DownloadStrategy>> = vec![strategy.clone()];
        let governor = permissive_governor();

        let err = acquire_source(
            "https://example.com/video.mp4",
            &JobId::from_string("job-1"),
            dir.path(),
            &strategies,
            &governor,
            &test_config(),
        )
        .await
        .unwrap_err();

        assert_eq!(err.last_kind, ErrorKind::FormatUnsupported);
        assert_eq!(strategy.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_fallback_after_bot_detection() {
        let dir = TempDir::new().unwrap();
        let first = Arc::new(FailingStrategy::new(
            "blocked",
            "Sign in to confirm you're not a bot",
        ));
        let second = Arc::new(WritingStrategy::valid());
        let strategies: Vec<Arc<dyn DownloadStrategy>> = vec![first.clone(), second.clone()];
        let governor = permissive_governor();

        let artifact = acquire_source(
            URL,
            &JobId::from_string("job-1"),
            dir.path(),
            &strategies,
            &governor,
            &test_config(),
        )
        .await
        .unwrap();

        assert_eq!(first.calls.load(Ordering::SeqCst), 1);
        assert_eq!(second.calls.load(Ordering::SeqCst), 1);
        assert_eq!(artifact.video.video_id, "dQw4w9WgXcQ");
        assert!(artifact.size_bytes > 0);
        // Success must fully reset the governor
        assert_eq!(governor.consecutive_failures(), 0);
    }

    #[tokio::test]
    async fn test_exhaustion_carries_last_classification() {
        let dir = TempDir::new().unwrap();
        let first = Arc::new(FailingStrategy::new("a", "connection timed out"));
        let second = Arc::new(FailingStrategy::new("b", "HTTP Error 429: Too Many Requests"));
        let strategies: Vec<Arc<dyn DownloadStrategy>> = vec![first, second];
        let governor = permissive_governor();

        let err = acquire_source(
            URL,
            &JobId::from_string("job-1"),
            dir.path(),
            &strategies,
            &governor,
            &test_config(),
        )
        .await
        .unwrap_err();

        assert_eq!(err.attempts.len(), 2);
        assert_eq!(err.attempts[0].kind, ErrorKind::NetworkTimeout);
        assert_eq!(err.last_kind, ErrorKind::RateLimited);
    }

    #[tokio::test]
    async fn test_permanent_failure_aborts_chain() {
        let dir = TempDir::new().unwrap();
        let first = Arc::new(FailingStrategy::new("a", "Video unavailable"));
        let second = Arc::new(FailingStrategy::new("b", "should never run"));
        let strategies: Vec<Arc<dyn DownloadStrategy>> = vec![first.clone(), second.clone()];
        let governor = permissive_governor();

        let err = acquire_source(
            URL,
            &JobId::from_string("job-1"),
            dir.path(),
            &strategies,
            &governor,
            &test_config(),
        )
        .await
        .unwrap_err();

        assert_eq!(err.last_kind, ErrorKind::VideoUnavailable);
        assert_eq!(second.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_rejected_artifact_is_deleted_and_chain_continues() {
        let dir = TempDir::new().unwrap();
        let first = Arc::new(WritingStrategy::html());
        let second = Arc::new(WritingStrategy::valid());
        let strategies: Vec<Arc<dyn DownloadStrategy>> = vec![first.clone(), second.clone()];
        let governor = permissive_governor();

        let artifact = acquire_source(
            URL,
            &JobId::from_string("job-1"),
            dir.path(),
            &strategies,
            &governor,
            &test_config(),
        )
        .await
        .unwrap();

        assert_eq!(first.calls.load(Ordering::SeqCst), 1);
        assert_eq!(second.calls.load(Ordering::SeqCst), 1);
        assert!(artifact.path.exists());
    }
}
