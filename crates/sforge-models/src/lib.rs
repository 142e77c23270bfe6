//! Shared data models for the Shortforge pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Job records and the processing state machine
//! - The error-kind taxonomy and message classifier
//! - Plan tiers and per-tier quota limits
//! - Encoding configuration and render profiles
//! - Produced short records and webhook payloads

pub mod encoding;
pub mod error_kind;
pub mod job;
pub mod plan;
pub mod short;
pub mod utils;
pub mod webhook;

// Re-export common types
pub use encoding::{EncodingConfig, RenderProfile};
pub use error_kind::{classify, ErrorKind};
pub use job::{JobError, JobId, JobRecord, JobRequest, JobStage};
pub use plan::{format_bytes, PlanLimits, PlanTier};
pub use short::ShortClip;
pub use utils::{extract_video_id, source_domain, PlatformVideo, VideoUrlError};
pub use webhook::{CallbackPayload, CallbackStatus, ErrorDescriptor, ShortResult};
