//! Job records and the processing state machine.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error_kind::ErrorKind;
use crate::plan::{PlanLimits, PlanTier};
use crate::short::ShortClip;

/// Unique processing identifier for a job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string (caller-supplied correlation id).
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Processing stage. Stages only move forward; `Completed` and `Failed`
/// are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStage {
    /// Request accepted, no network I/O yet
    #[default]
    Accepted,
    /// Downloading the source through the strategy chain
    Acquiring,
    /// Checking the downloaded artifact
    Validating,
    /// Probing metadata and enforcing tier policy
    Probing,
    /// Cutting and transcoding windows
    Segmenting,
    /// Uploading shorts to object storage
    Uploading,
    /// All done, results delivered
    Completed,
    /// Terminal failure
    Failed,
}

impl JobStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStage::Accepted => "accepted",
            JobStage::Acquiring => "acquiring",
            JobStage::Validating => "validating",
            JobStage::Probing => "probing",
            JobStage::Segmenting => "segmenting",
            JobStage::Uploading => "uploading",
            JobStage::Completed => "completed",
            JobStage::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStage::Completed | JobStage::Failed)
    }

    /// Position in the forward progression. `Failed` sorts last so a
    /// terminal record can never be advanced back into a live stage.
    fn rank(&self) -> u8 {
        match self {
            JobStage::Accepted => 0,
            JobStage::Acquiring => 1,
            JobStage::Validating => 2,
            JobStage::Probing => 3,
            JobStage::Segmenting => 4,
            JobStage::Uploading => 5,
            JobStage::Completed => 6,
            JobStage::Failed => 7,
        }
    }
}

impl fmt::Display for JobStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Terminal error attached to a failed job.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct JobError {
    /// Classified failure category.
    pub kind: ErrorKind,
    /// Human-readable detail.
    pub message: String,
}

impl JobError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for JobError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// Incoming job request, as handed over by the transport layer.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct JobRequest {
    /// Caller correlation id; generated when absent.
    #[serde(default)]
    pub processing_id: JobId,
    /// Remote video URL.
    pub source_url: String,
    /// Subscription tier.
    #[serde(default)]
    pub tier: PlanTier,
    /// Quota override; derived from the tier when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limits: Option<PlanLimits>,
    /// Where the result callback is posted.
    pub callback_url: String,
    /// Watermark text for tiers that burn one in.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub watermark_text: Option<String>,
}

impl JobRequest {
    pub fn new(source_url: impl Into<String>, callback_url: impl Into<String>) -> Self {
        Self {
            processing_id: JobId::new(),
            source_url: source_url.into(),
            tier: PlanTier::default(),
            limits: None,
            callback_url: callback_url.into(),
            watermark_text: None,
        }
    }

    pub fn with_tier(mut self, tier: PlanTier) -> Self {
        self.tier = tier;
        self
    }

    pub fn with_processing_id(mut self, id: JobId) -> Self {
        self.processing_id = id;
        self
    }

    pub fn with_watermark_text(mut self, text: impl Into<String>) -> Self {
        self.watermark_text = Some(text.into());
        self
    }

    /// Effective limits for this request.
    pub fn effective_limits(&self) -> PlanLimits {
        self.limits
            .clone()
            .unwrap_or_else(|| PlanLimits::for_tier(self.tier))
    }
}

/// The aggregate state threaded through the pipeline.
///
/// Owned exclusively by the processing task for its lifetime; stages mutate
/// it strictly in sequence.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct JobRecord {
    /// Processing identifier, unique per request.
    pub id: JobId,
    /// Remote video URL.
    pub source_url: String,
    /// Platform tag ("youtube", "vimeo", ...).
    pub platform: String,
    /// Subscription tier.
    pub tier: PlanTier,
    /// Quota limits in effect.
    pub limits: PlanLimits,
    /// Callback URL for result delivery.
    pub callback_url: String,
    /// Current lifecycle stage.
    pub stage: JobStage,
    /// When processing started.
    pub started_at: DateTime<Utc>,
    /// Produced shorts, enriched as the pipeline progresses.
    #[serde(default)]
    pub shorts: Vec<ShortClip>,
    /// Terminal error, set exactly once on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JobError>,
}

impl JobRecord {
    /// Create a record in the `Accepted` stage.
    pub fn new(request: &JobRequest) -> Self {
        Self {
            id: request.processing_id.clone(),
            source_url: request.source_url.clone(),
            platform: String::new(),
            tier: request.tier,
            limits: request.effective_limits(),
            callback_url: request.callback_url.clone(),
            stage: JobStage::Accepted,
            started_at: Utc::now(),
            shorts: Vec::new(),
            error: None,
        }
    }

    /// Advance to a later stage. Transitions never regress: requests to
    /// move backwards or out of a terminal stage are ignored.
    pub fn advance(&mut self, stage: JobStage) {
        if self.stage.is_terminal() {
            return;
        }
        if stage.rank() > self.stage.rank() {
            self.stage = stage;
        }
    }

    /// Mark the job failed with a classified error. Terminal.
    pub fn fail(&mut self, kind: ErrorKind, message: impl Into<String>) {
        if self.stage.is_terminal() {
            return;
        }
        self.stage = JobStage::Failed;
        self.error = Some(JobError::new(kind, message));
    }

    /// Mark the job completed. Terminal.
    pub fn complete(&mut self) {
        if self.stage.is_terminal() {
            return;
        }
        self.stage = JobStage::Completed;
    }

    pub fn is_terminal(&self) -> bool {
        self.stage.is_terminal()
    }

    /// Seconds elapsed since the job was accepted.
    pub fn elapsed_secs(&self) -> i64 {
        (Utc::now() - self.started_at).num_seconds()
    }
}
