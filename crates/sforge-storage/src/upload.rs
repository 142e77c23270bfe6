//! Per-short upload routine.
//!
//! Uploads the clip video first, then its thumbnail as best effort: a
//! missing thumbnail degrades the result, it never fails the short. A
//! duplicate-key collision is retried exactly once under a disambiguated
//! key; every other error propagates to the caller's retry policy.

use rand::Rng;
use tracing::{info, warn};

use sforge_models::{JobId, ShortClip};

use crate::client::ObjectStore;
use crate::error::StorageResult;

/// Upload key layout and limits.
#[derive(Debug, Clone)]
pub struct UploadPolicy {
    /// Key prefix ahead of the job id ("jobs" -> jobs/<id>/<file>).
    pub key_prefix: String,
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self {
            key_prefix: "jobs".to_string(),
        }
    }
}

/// What one successful upload produced.
#[derive(Debug, Clone)]
pub struct UploadOutcome {
    pub key: String,
    pub url: String,
    pub thumbnail_url: Option<String>,
}

/// Storage key for a short's video object.
pub fn short_key(prefix: &str, job_id: &JobId, file_name: &str) -> String {
    format!("{}/{}/{}", prefix, job_id, file_name)
}

/// Derive a collision-free variant of a key by inserting a short random
/// suffix before the extension.
pub fn disambiguate_key(key: &str) -> String {
    let mut rng = rand::rng();
    let suffix: u32 = rng.random_range(0x1000..=0xFFFF);
    match key.rsplit_once('.') {
        Some((stem, ext)) => format!("{}-{:04x}.{}", stem, suffix, ext),
        None => format!("{}-{:04x}", key, suffix),
    }
}

fn thumbnail_key(video_key: &str) -> String {
    match video_key.rsplit_once('.') {
        Some((stem, _)) => format!("{}.jpg", stem),
        None => format!("{}.jpg", video_key),
    }
}

fn content_type_for(file_name: &str) -> &'static str {
    if file_name.ends_with(".mp4") {
        "video/mp4"
    } else if file_name.ends_with(".webm") {
        "video/webm"
    } else if file_name.ends_with(".jpg") || file_name.ends_with(".jpeg") {
        "image/jpeg"
    } else {
        "application/octet-stream"
    }
}

/// Upload one short: video object, then best-effort thumbnail.
///
/// This is a single attempt; transient-error retries are the caller's
/// responsibility. Only the duplicate-key case is resolved here, with one
/// immediate retry under a disambiguated key.
pub async fn upload_short_once(
    store: &dyn ObjectStore,
    policy: &UploadPolicy,
    job_id: &JobId,
    short: &ShortClip,
) -> StorageResult<UploadOutcome> {
    let file_name = short.file_name();
    let key = short_key(&policy.key_prefix, job_id, &file_name);
    let content_type = content_type_for(&file_name);

    let (key, url) = match store.put_file(short.local_path(), &key, content_type).await {
        Ok(url) => (key, url),
        Err(e) if e.is_duplicate_key() => {
            let retry_key = disambiguate_key(&key);
            warn!(
                short_id = %short.id,
                key = %key,
                retry_key = %retry_key,
                "Duplicate storage key, retrying once under disambiguated key"
            );
            let url = store
                .put_file(short.local_path(), &retry_key, content_type)
                .await?;
            (retry_key, url)
        }
        Err(e) => return Err(e),
    };

    // Thumbnail is best effort; a failure degrades the short, not the job
    let thumbnail_url = match &short.thumbnail_path {
        Some(thumb_path) if thumb_path.exists() => {
            let thumb_key = thumbnail_key(&key);
            match store.put_file(thumb_path, &thumb_key, "image/jpeg").await {
                Ok(url) => Some(url),
                Err(e) => {
                    warn!(
                        short_id = %short.id,
                        error = %e,
                        "Thumbnail upload failed (non-fatal)"
                    );
                    None
                }
            }
        }
        _ => None,
    };

    info!(short_id = %short.id, key = %key, "Uploaded short");
    Ok(UploadOutcome {
        key,
        url,
        thumbnail_url,
    })
}
