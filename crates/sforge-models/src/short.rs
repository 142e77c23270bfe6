//! Produced short (segment) records.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::job::JobId;

/// One produced clip, created by the segmentation engine and enriched by
/// the delivery pipeline. Referenced by identifier through the rest of the
/// pipeline, never duplicated.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ShortClip {
    /// Identifier derived from the job id and window index.
    pub id: String,
    /// Zero-based window index.
    pub index: u32,
    /// Start offset into the source, seconds.
    pub start_secs: f64,
    /// Clip duration, seconds.
    pub duration_secs: f64,
    /// Local file path of the rendered clip.
    pub local_path: PathBuf,
    /// Local path of the companion thumbnail, when one was extracted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_path: Option<PathBuf>,
    /// Quality tier label ("720p", "1080p").
    pub quality: String,
    /// Whether a watermark was burned in.
    pub watermarked: bool,
    /// Rendered file size in bytes.
    pub size_bytes: u64,
    /// Object storage key, set after upload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_key: Option<String>,
    /// Public or signed URL, set after upload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Thumbnail URL, set after upload when the thumbnail made it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
}

impl ShortClip {
    /// Create a freshly rendered short.
    pub fn new(
        job_id: &JobId,
        index: u32,
        start_secs: f64,
        duration_secs: f64,
        local_path: impl AsRef<Path>,
        quality: impl Into<String>,
        watermarked: bool,
    ) -> Self {
        Self {
            id: format!("{}-s{:02}", job_id, index + 1),
            index,
            start_secs,
            duration_secs,
            local_path: local_path.as_ref().to_path_buf(),
            thumbnail_path: None,
            quality: quality.into(),
            watermarked,
            size_bytes: 0,
            storage_key: None,
            url: None,
            thumbnail_url: None,
        }
    }

    pub fn with_thumbnail(mut self, path: impl AsRef<Path>) -> Self {
        self.thumbnail_path = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn with_size(mut self, bytes: u64) -> Self {
        self.size_bytes = bytes;
        self
    }

    /// Record the upload outcome.
    pub fn mark_uploaded(&mut self, key: impl Into<String>, url: impl Into<String>) {
        self.storage_key = Some(key.into());
        self.url = Some(url.into());
    }

    /// Whether this short has been delivered to object storage.
    pub fn is_uploaded(&self) -> bool {
        self.storage_key.is_some() && self.url.is_some()
    }

    /// Output filename stem used for storage keys.
    pub fn file_name(&self) -> String {
        self.local_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| format!("{}.mp4", self.id))
    }

    pub fn local_path(&self) -> &Path {
        &self.local_path
    }
}
