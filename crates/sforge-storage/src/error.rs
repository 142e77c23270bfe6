//! Storage error types.

use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Failed to configure storage client: {0}")]
    ConfigError(String),

    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("Presign failed: {0}")]
    PresignFailed(String),

    #[error("Duplicate key: {0}")]
    DuplicateKey(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("AWS SDK error: {0}")]
    AwsSdk(String),
}

impl StorageError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn not_found(key: impl Into<String>) -> Self {
        Self::NotFound(key.into())
    }

    pub fn upload_failed(msg: impl Into<String>) -> Self {
        let msg = msg.into();
        if is_duplicate_key_message(&msg) {
            Self::DuplicateKey(msg)
        } else {
            Self::UploadFailed(msg)
        }
    }

    pub fn delete_failed(msg: impl Into<String>) -> Self {
        Self::DeleteFailed(msg.into())
    }

    /// Whether the error identifies a key collision that a disambiguated
    /// key can resolve.
    pub fn is_duplicate_key(&self) -> bool {
        matches!(self, Self::DuplicateKey(_))
    }

    /// Whether retrying the same request later can reasonably succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::UploadFailed(_) | Self::AwsSdk(_) | Self::Io(_))
    }
}

/// Provider wording differs; match the usual duplicate/precondition forms.
fn is_duplicate_key_message(msg: &str) -> bool {
    let msg = msg.to_lowercase();
    msg.contains("already exists") || msg.contains("preconditionfailed") || msg.contains("duplicate")
}
