//! URL parsing and platform canonicalization.
//!
//! The pipeline only accepts URLs that resolve to a supported platform's
//! canonical video identifier; anything else is rejected up front without
//! touching the network.

use thiserror::Error;
use url::Url;

/// Errors that can occur during video URL canonicalization.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VideoUrlError {
    #[error("URL is not a supported platform")]
    UnsupportedPlatform,
    #[error("Video ID not found in URL")]
    VideoIdNotFound,
    #[error("Video ID has invalid format")]
    InvalidVideoId,
}

/// A canonicalized platform video reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformVideo {
    /// Platform tag ("youtube", "vimeo").
    pub platform: &'static str,
    /// Canonical video identifier on that platform.
    pub video_id: String,
}

/// Extract a platform canonical video identifier from a URL.
///
/// Supported shapes:
/// - youtube.com/watch?v=ID, youtu.be/ID, youtube.com/embed/ID,
///   youtube.com/v/ID, youtube.com/shorts/ID
/// - vimeo.com/NUMERIC_ID
pub fn extract_video_id(url: &str) -> Result<PlatformVideo, VideoUrlError> {
    let url = url.trim();
    let lowered = url.to_ascii_lowercase();

    if lowered.contains("youtube.com") || lowered.contains("youtu.be") {
        return extract_youtube(url).map(|video_id| PlatformVideo {
            platform: "youtube",
            video_id,
        });
    }

    if lowered.contains("vimeo.com") {
        return extract_vimeo(url).map(|video_id| PlatformVideo {
            platform: "vimeo",
            video_id,
        });
    }

    Err(VideoUrlError::UnsupportedPlatform)
}

/// Host name used as the rate-governor domain key.
pub fn source_domain(url: &str) -> Option<String> {
    Url::parse(url.trim())
        .ok()
        .and_then(|u| u.host_str().map(|h| h.trim_start_matches("www.").to_string()))
}

fn extract_youtube(url: &str) -> Result<String, VideoUrlError> {
    // Try different extraction strategies in order of preference
    let candidates = [
        extract_after(url, "?v="),
        extract_after(url, "&v="),
        extract_after(url, "youtu.be/"),
        extract_after(url, "/embed/"),
        extract_after(url, "/shorts/"),
        extract_after(url, "/v/"),
    ];

    for candidate in candidates.into_iter().flatten() {
        return validate_youtube_id(candidate);
    }

    Err(VideoUrlError::VideoIdNotFound)
}

fn extract_vimeo(url: &str) -> Result<String, VideoUrlError> {
    let parsed = Url::parse(url).map_err(|_| VideoUrlError::VideoIdNotFound)?;
    let id = parsed
        .path_segments()
        .and_then(|mut segments| segments.find(|s| !s.is_empty()))
        .ok_or(VideoUrlError::VideoIdNotFound)?;

    if id.is_empty() {
        return Err(VideoUrlError::VideoIdNotFound);
    }
    if !id.chars().all(|c| c.is_ascii_digit()) {
        return Err(VideoUrlError::InvalidVideoId);
    }
    Ok(id.to_string())
}

/// Extract the first ID segment after a marker, stopping at delimiters.
fn extract_after(url: &str, marker: &str) -> Option<String> {
    let pos = url.find(marker)?;
    let start = pos + marker.len();
    if start >= url.len() {
        return None;
    }
    let remaining = &url[start..];
    let delimiters = ['&', '#', '?', '/'];
    let end = remaining
        .find(|c| delimiters.contains(&c))
        .unwrap_or(remaining.len());
    let id = remaining[..end].trim();
    if id.is_empty() {
        None
    } else {
        Some(id.to_string())
    }
}

/// YouTube video IDs are exactly 11 chars of [A-Za-z0-9_-].
fn validate_youtube_id(id: String) -> Result<String, VideoUrlError> {
    if id.len() != 11 {
        return Err(VideoUrlError::InvalidVideoId);
    }
    if !id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(VideoUrlError::InvalidVideoId);
    }
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_youtube_formats() {
        for url in [
            "https://youtube.com/watch?v=dQw4w9WgXcQ",
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
            "https://youtu.be/dQw4w9WgXcQ",
            "https://youtube.com/embed/dQw4w9WgXcQ",
            "https://youtube.com/v/dQw4w9WgXcQ",
            "https://youtube.com/shorts/dQw4w9WgXcQ",
            "https://youtube.com/watch?v=dQw4w9WgXcQ&list=PLxyz",
            "https://youtu.be/dQw4w9WgXcQ?t=30",
            "  https://youtube.com/watch?v=dQw4w9WgXcQ  ",
        ] {
            let video = extract_video_id(url).unwrap();
            assert_eq!(video.platform, "youtube");
            assert_eq!(video.video_id, "dQw4w9WgXcQ", "url: {}", url);
        }
    }

    #[test]
    fn test_extract_vimeo() {
        let video = extract_video_id("https://vimeo.com/123456789").unwrap();
        assert_eq!(video.platform, "vimeo");
        assert_eq!(video.video_id, "123456789");

        assert_eq!(
            extract_video_id("https://vimeo.com/channels"),
            Err(VideoUrlError::InvalidVideoId)
        );
    }

    #[test]
    fn test_unsupported_platform() {
        assert_eq!(
            extract_video_id("https://example.com/video.mp4"),
            Err(VideoUrlError::UnsupportedPlatform)
        );
        assert_eq!(
            extract_video_id("https://dailymotion.com/video/x123"),
            Err(VideoUrlError::UnsupportedPlatform)
        );
    }

    #[test]
    fn test_invalid_youtube_ids() {
        assert_eq!(
            extract_video_id("https://youtube.com/watch?v=abc123"), // too short
            Err(VideoUrlError::InvalidVideoId)
        );
        assert_eq!(
            extract_video_id("https://youtube.com/watch?v=abc123def!!"),
            Err(VideoUrlError::InvalidVideoId)
        );
        assert_eq!(
            extract_video_id("https://youtube.com/watch"),
            Err(VideoUrlError::VideoIdNotFound)
        );
        assert_eq!(
            extract_video_id("https://youtu.be/"),
            Err(VideoUrlError::VideoIdNotFound)
        );
    }

    #[test]
    fn test_source_domain() {
        assert_eq!(
            source_domain("https://www.youtube.com/watch?v=abc").as_deref(),
            Some("youtube.com")
        );
        assert_eq!(
            source_domain("https://youtu.be/abc").as_deref(),
            Some("youtu.be")
        );
        assert_eq!(source_domain("not a url"), None);
    }
}
