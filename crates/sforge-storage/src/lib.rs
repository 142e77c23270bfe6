//! S3-compatible object storage for Shortforge.
//!
//! Provides the `ObjectStore` seam, the production S3 client and the
//! per-short upload routine with its duplicate-key discipline.

pub mod client;
pub mod error;
pub mod upload;

pub use client::{ObjectStore, S3Config, S3Store};
pub use error::{StorageError, StorageResult};
pub use upload::{disambiguate_key, short_key, upload_short_once, UploadOutcome, UploadPolicy};
