//! Worker error types.

use thiserror::Error;

use sforge_models::{classify, ErrorKind};

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Job failed: {0}")]
    JobFailed(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Callback delivery failed: {0}")]
    CallbackFailed(String),

    #[error("Storage error: {0}")]
    Storage(#[from] sforge_storage::StorageError),

    #[error("Media error: {0}")]
    Media(#[from] sforge_media::MediaError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl WorkerError {
    pub fn job_failed(msg: impl Into<String>) -> Self {
        Self::JobFailed(msg.into())
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    /// Classified kind of this error for reporting.
    pub fn kind(&self) -> ErrorKind {
        match self {
            WorkerError::Storage(_) => ErrorKind::StorageError,
            other => classify(&other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_error_kind() {
        let err = WorkerError::Storage(sforge_storage::StorageError::upload_failed("boom"));
        assert_eq!(err.kind(), ErrorKind::StorageError);
    }

    #[test]
    fn test_classified_kind_from_message() {
        let err = WorkerError::job_failed("connection timed out while fetching");
        assert_eq!(err.kind(), ErrorKind::NetworkTimeout);

        let err = WorkerError::job_failed("nothing recognizable");
        assert_eq!(err.kind(), ErrorKind::Unknown);
    }
}
