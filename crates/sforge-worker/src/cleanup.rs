//! Job-scoped temporary file cleanup.
//!
//! Removes everything under the work directory whose name carries the
//! processing id: the job's own subdirectory plus any stray files left by
//! a crashed stage. Idempotent; missing files are not errors. A
//! time-based sweep outside the core backstops anything this misses.

use std::path::Path;
use tracing::{debug, warn};

use sforge_models::JobId;

use crate::error::WorkerResult;

/// Remove all local artifacts belonging to `job_id`.
///
/// Returns the number of entries removed. Calling it again for the same
/// job is a no-op.
pub async fn cleanup_job(work_dir: &Path, job_id: &JobId) -> WorkerResult<u32> {
    let mut removed = 0u32;

    // The job's own directory
    let job_dir = work_dir.join(job_id.as_str());
    if job_dir.exists() {
        match tokio::fs::remove_dir_all(&job_dir).await {
            Ok(()) => {
                debug!(job_id = %job_id, dir = %job_dir.display(), "Removed job directory");
                removed += 1;
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                warn!(job_id = %job_id, error = %e, "Failed to remove job directory");
            }
        }
    }

    // Stray files named after the job id
    let mut entries = match tokio::fs::read_dir(work_dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(removed),
        Err(e) => return Err(e.into()),
    };

    loop {
        let entry = match entries.next_entry().await {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(e) => {
                warn!(error = %e, "Failed reading work dir entry during cleanup");
                break;
            }
        };
        let name = entry.file_name().to_string_lossy().to_string();
        if !name.contains(job_id.as_str()) {
            continue;
        }
        let path = entry.path();
        let result = if path.is_dir() {
            tokio::fs::remove_dir_all(&path).await
        } else {
            tokio::fs::remove_file(&path).await
        };
        match result {
            Ok(()) => {
                debug!(job_id = %job_id, path = %path.display(), "Removed stray artifact");
                removed += 1;
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                warn!(job_id = %job_id, path = %path.display(), error = %e, "Cleanup failed for entry");
            }
        }
    }

    Ok(removed)
}
