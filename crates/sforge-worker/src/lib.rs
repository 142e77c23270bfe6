//! Job lifecycle and delivery for Shortforge.
//!
//! Composes the acquisition, segmentation and delivery stages into one
//! pipeline. Each accepted job runs as an independent task; its result is
//! communicated solely through the webhook callback.

pub mod cleanup;
pub mod config;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod retry;
pub mod webhook;

pub use cleanup::cleanup_job;
pub use config::WorkerConfig;
pub use error::{WorkerError, WorkerResult};
pub use logging::{init_tracing, JobLogger};
pub use pipeline::{PipelineContext, ShortsPipeline};
pub use retry::{retry_classified, RetryPolicy, RetryResult};
pub use webhook::{DeliveryReport, WebhookClient, WebhookConfig};
