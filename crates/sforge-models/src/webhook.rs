//! Webhook callback payload types.
//!
//! Exactly one callback is posted per job. The payload carries the caller
//! correlation id, a terminal status and either the produced shorts or an
//! error descriptor whose category comes from the shared taxonomy.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error_kind::ErrorKind;
use crate::job::JobRecord;
use crate::short::ShortClip;

/// Terminal job status as reported to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum CallbackStatus {
    Completed,
    Failed,
}

/// One delivered short, as seen by the caller.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ShortResult {
    pub short_id: String,
    pub index: u32,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    pub start_secs: f64,
    pub duration_secs: f64,
    pub quality: String,
    pub watermarked: bool,
    pub size_bytes: u64,
}

impl ShortResult {
    /// Build from an uploaded short. Returns `None` for shorts that were
    /// dropped before delivery (no storage URL).
    pub fn from_short(short: &ShortClip) -> Option<Self> {
        let url = short.url.clone()?;
        Some(Self {
            short_id: short.id.clone(),
            index: short.index,
            url,
            thumbnail_url: short.thumbnail_url.clone(),
            start_secs: short.start_secs,
            duration_secs: short.duration_secs,
            quality: short.quality.clone(),
            watermarked: short.watermarked,
            size_bytes: short.size_bytes,
        })
    }
}

/// Error descriptor in failure callbacks.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ErrorDescriptor {
    /// Classified category from the shared taxonomy.
    pub category: ErrorKind,
    /// Human-readable detail.
    pub message: String,
    /// Whether retrying the same URL later can reasonably succeed.
    pub retryable: bool,
}

/// The callback body.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CallbackPayload {
    /// Caller correlation id.
    pub processing_id: String,
    pub status: CallbackStatus,
    pub timestamp: DateTime<Utc>,
    /// Delivered shorts; empty on failure.
    #[serde(default)]
    pub shorts_results: Vec<ShortResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDescriptor>,
}

impl CallbackPayload {
    /// Success payload from a completed record.
    pub fn completed(record: &JobRecord) -> Self {
        Self {
            processing_id: record.id.to_string(),
            status: CallbackStatus::Completed,
            timestamp: Utc::now(),
            shorts_results: record
                .shorts
                .iter()
                .filter_map(ShortResult::from_short)
                .collect(),
            error: None,
        }
    }

    /// Failure payload from a failed record.
    pub fn failed(record: &JobRecord) -> Self {
        let error = record.error.as_ref().map(|e| ErrorDescriptor {
            category: e.kind,
            message: e.message.clone(),
            retryable: e.kind.is_retryable(),
        });
        Self {
            processing_id: record.id.to_string(),
            status: CallbackStatus::Failed,
            timestamp: Utc::now(),
            shorts_results: Vec::new(),
            error,
        }
    }

    /// Build the right payload for a terminal record.
    pub fn for_record(record: &JobRecord) -> Self {
        match record.error {
            None => Self::completed(record),
            Some(_) => Self::failed(record),
        }
    }
}
