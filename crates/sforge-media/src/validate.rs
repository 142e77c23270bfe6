//! Downloaded artifact validation.
//!
//! A blocked upstream frequently answers with an HTML error or bot-check
//! page saved under a .mp4 name. The validator rejects those disguised
//! artifacts before any expensive processing starts: size check first,
//! text sniff for small files, then a container signature check on the
//! leading bytes. Callers must delete a rejected artifact before retrying
//! a different strategy.

use std::path::Path;
use tracing::debug;

use crate::error::{MediaError, MediaResult};

/// Files below this size are suspicious enough to sniff as text.
const SMALL_FILE_THRESHOLD: u64 = 256 * 1024;

/// How many leading bytes are read for the signature check.
const SIGNATURE_PROBE_LEN: usize = 16;

/// Phrases that identify an error/bot-check page saved as a video file.
const SUSPICIOUS_PHRASES: &[&str] = &[
    "<!doctype html",
    "<html",
    "<head>",
    "captcha",
    "unusual traffic",
    "not a bot",
    "access denied",
    "error 403",
    "error 404",
];

/// Validate a downloaded artifact.
///
/// Checks, in order:
/// 1. the file exists and is non-empty;
/// 2. small files are sniffed for markup/bot-detection phrases;
/// 3. the leading bytes carry a known container signature.
///
/// A missing signature is a hard failure, not a warning.
pub async fn validate_artifact(path: impl AsRef<Path>) -> MediaResult<()> {
    let path = path.as_ref();

    let metadata = tokio::fs::metadata(path)
        .await
        .map_err(|_| MediaError::FileNotFound(path.to_path_buf()))?;

    if metadata.len() == 0 {
        return Err(MediaError::invalid_video("downloaded file is empty"));
    }

    if metadata.len() < SMALL_FILE_THRESHOLD {
        let bytes = tokio::fs::read(path).await?;
        let text = String::from_utf8_lossy(&bytes).to_lowercase();
        if let Some(phrase) = SUSPICIOUS_PHRASES.iter().find(|p| text.contains(*p)) {
            debug!(
                path = %path.display(),
                phrase = phrase,
                "Small artifact looks like an error page"
            );
            return Err(MediaError::invalid_video(format!(
                "artifact looks like an html page (matched \"{}\")",
                phrase
            )));
        }
        return check_signature(path, &bytes);
    }

    let mut head = vec![0u8; SIGNATURE_PROBE_LEN];
    let read = read_head(path, &mut head).await?;
    head.truncate(read);
    check_signature(path, &head)
}

async fn read_head(path: &Path, buf: &mut [u8]) -> MediaResult<usize> {
    use tokio::io::AsyncReadExt;
    let mut file = tokio::fs::File::open(path).await?;
    let mut read = 0;
    while read < buf.len() {
        let n = file.read(&mut buf[read..]).await?;
        if n == 0 {
            break;
        }
        read += n;
    }
    Ok(read)
}

fn check_signature(path: &Path, head: &[u8]) -> MediaResult<()> {
    if has_container_signature(head) {
        Ok(())
    } else {
        debug!(path = %path.display(), "No known container signature in leading bytes");
        Err(MediaError::invalid_video(
            "unrecognized container signature in downloaded file",
        ))
    }
}

/// Check the leading bytes for a known media container signature.
///
/// Recognized: ISO base media (ftyp/moov/mdat box at offset 4),
/// Matroska/WebM (EBML magic), RIFF/AVI, Ogg, FLV.
fn has_container_signature(head: &[u8]) -> bool {
    // ISO BMFF: 4-byte box size then box type
    if head.len() >= 8 {
        let box_type = &head[4..8];
        if box_type == b"ftyp" || box_type == b"moov" || box_type == b"mdat" {
            return true;
        }
    }

    if head.len() >= 4 {
        // Matroska / WebM EBML magic
        if head[..4] == [0x1A, 0x45, 0xDF, 0xA3] {
            return true;
        }
        // RIFF (AVI)
        if &head[..4] == b"RIFF" {
            return true;
        }
        // Ogg
        if &head[..4] == b"OggS" {
            return true;
        }
    }

    // FLV
    if head.len() >= 3 && &head[..3] == b"FLV" {
        return true;
    }

    false
}
