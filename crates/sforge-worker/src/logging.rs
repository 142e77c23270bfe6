//! Structured job logging utilities.

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use sforge_models::{JobId, JobStage};

/// Initialize the tracing subscriber from `RUST_LOG`, defaulting to info
/// for the workspace crates. Safe to call more than once.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("sforge=info,warn"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// Job logger for consistent lifecycle logging.
#[derive(Debug, Clone)]
pub struct JobLogger {
    job_id: String,
}

impl JobLogger {
    pub fn new(job_id: &JobId) -> Self {
        Self {
            job_id: job_id.to_string(),
        }
    }

    /// Log the start of job processing.
    pub fn log_start(&self, message: &str) {
        info!(job_id = %self.job_id, "Job started: {}", message);
    }

    /// Log a stage transition.
    pub fn log_stage(&self, stage: JobStage) {
        info!(job_id = %self.job_id, stage = stage.as_str(), "Job stage");
    }

    /// Log a warning during job execution.
    pub fn log_warning(&self, message: &str) {
        warn!(job_id = %self.job_id, "Job warning: {}", message);
    }

    /// Log an error during job execution.
    pub fn log_error(&self, message: &str) {
        error!(job_id = %self.job_id, "Job error: {}", message);
    }

    /// Log the completion of job processing.
    pub fn log_completion(&self, message: &str) {
        info!(job_id = %self.job_id, "Job completed: {}", message);
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_logger_creation() {
        let job_id = JobId::from_string("job-123");
        let logger = JobLogger::new(&job_id);
        assert_eq!(logger.job_id(), "job-123");
    }

    #[test]
    fn test_init_tracing_is_idempotent() {
        init_tracing();
        init_tracing();
    }
}
