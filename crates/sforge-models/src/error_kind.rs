//! Error taxonomy shared by the whole pipeline.
//!
//! Upstream failures arrive as opaque text (yt-dlp stderr, HTTP client
//! errors, SDK messages). `classify` maps that text onto a stable kind via
//! an ordered substring table, so the rate governor, the acquisition
//! orchestrator and the webhook payload all speak the same language.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Stable failure categories, ordered by classification priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Upstream recognized the request as automated and blocked it
    BotDetection,
    /// Explicit throttling (HTTP 429 and friends)
    RateLimited,
    /// Video is gone, private or was removed
    VideoUnavailable,
    /// Video requires an age-verified session
    AgeRestricted,
    /// Video is not served in this region
    RegionBlocked,
    /// Timeout or connectivity failure
    NetworkTimeout,
    /// URL or media format the pipeline cannot handle
    FormatUnsupported,
    /// Object storage failure
    StorageError,
    /// Source exceeds the tier size quota
    FileTooLarge,
    /// Download produced something that is not a playable file
    CorruptedDownload,
    /// Source shorter than one segment
    VideoTooShort,
    /// Source exceeds the tier duration quota
    VideoTooLong,
    /// Nothing matched
    Unknown,
}

/// Ordered classification table. First match wins; patterns are matched
/// case-insensitively against the whole error text.
const CLASSIFY_TABLE: &[(ErrorKind, &[&str])] = &[
    (
        ErrorKind::BotDetection,
        &[
            "confirm you're not a bot",
            "confirm you are not a bot",
            "not a bot",
            "captcha",
            "unusual traffic",
            "automated requests",
            "bot check",
            "suspicious activity",
        ],
    ),
    (
        ErrorKind::RateLimited,
        &[
            "429",
            "too many requests",
            "rate limit",
            "rate-limited",
            "quota exceeded",
        ],
    ),
    (
        ErrorKind::VideoUnavailable,
        &[
            "video unavailable",
            "video is unavailable",
            "private video",
            "video is private",
            "has been removed",
            "no longer available",
            "does not exist",
        ],
    ),
    (
        ErrorKind::AgeRestricted,
        &[
            "age-restricted",
            "age restricted",
            "confirm your age",
            "age verification",
        ],
    ),
    (
        ErrorKind::RegionBlocked,
        &[
            "not available in your country",
            "blocked in your country",
            "not available in your region",
            "geo-restricted",
        ],
    ),
    (
        ErrorKind::NetworkTimeout,
        &[
            "timed out",
            "timeout",
            "connection reset",
            "connection refused",
            "network is unreachable",
            "temporary failure in name resolution",
        ],
    ),
    (
        ErrorKind::FormatUnsupported,
        &[
            "unsupported url",
            "no video formats",
            "requested format is not available",
            "unsupported format",
            "is not a supported platform",
        ],
    ),
    (
        ErrorKind::StorageError,
        &[
            "nosuchbucket",
            "nosuchkey",
            "access denied",
            "slowdown",
            "storage",
        ],
    ),
    (
        ErrorKind::FileTooLarge,
        &["file too large", "exceeds maximum size", "too large"],
    ),
    (
        ErrorKind::CorruptedDownload,
        &[
            "corrupt",
            "malformed",
            "invalid data found",
            "unexpected eof",
            "premature end",
            "looks like an html page",
            "unrecognized container",
        ],
    ),
    (ErrorKind::VideoTooShort, &["too short"]),
    (
        ErrorKind::VideoTooLong,
        &["too long", "exceeds maximum duration"],
    ),
];

/// Classify an opaque error message into a stable kind.
///
/// Pure and deterministic: the same input always yields the same kind, and
/// a message matching multiple table rows yields the first listed kind.
pub fn classify(message: &str) -> ErrorKind {
    let haystack = message.to_lowercase();
    for (kind, patterns) in CLASSIFY_TABLE {
        if patterns.iter().any(|p| haystack.contains(p)) {
            return *kind;
        }
    }
    ErrorKind::Unknown
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::BotDetection => "bot_detection",
            ErrorKind::RateLimited => "rate_limited",
            ErrorKind::VideoUnavailable => "video_unavailable",
            ErrorKind::AgeRestricted => "age_restricted",
            ErrorKind::RegionBlocked => "region_blocked",
            ErrorKind::NetworkTimeout => "network_timeout",
            ErrorKind::FormatUnsupported => "format_unsupported",
            ErrorKind::StorageError => "storage_error",
            ErrorKind::FileTooLarge => "file_too_large",
            ErrorKind::CorruptedDownload => "corrupted_download",
            ErrorKind::VideoTooShort => "video_too_short",
            ErrorKind::VideoTooLong => "video_too_long",
            ErrorKind::Unknown => "unknown",
        }
    }

    /// Whether retrying the same operation later can reasonably succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorKind::BotDetection
                | ErrorKind::RateLimited
                | ErrorKind::NetworkTimeout
                | ErrorKind::StorageError
        )
    }

    /// Whether the failure is permanent for this source URL.
    ///
    /// Retrying won't help: the video itself is inaccessible or violates
    /// policy, so the job should fail immediately and report as-is.
    pub fn is_permanent_for_source(&self) -> bool {
        matches!(
            self,
            ErrorKind::VideoUnavailable
                | ErrorKind::AgeRestricted
                | ErrorKind::RegionBlocked
                | ErrorKind::FormatUnsupported
                | ErrorKind::FileTooLarge
                | ErrorKind::VideoTooShort
                | ErrorKind::VideoTooLong
        )
    }

    /// Whether this failure should escalate the governor's global backoff.
    pub fn escalates_backoff(&self) -> bool {
        matches!(self, ErrorKind::BotDetection)
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_table_entries() {
        assert_eq!(
            classify("ERROR: Sign in to confirm you're not a bot"),
            ErrorKind::BotDetection
        );
        assert_eq!(
            classify("HTTP Error 429: Too Many Requests"),
            ErrorKind::RateLimited
        );
        assert_eq!(classify("Video unavailable"), ErrorKind::VideoUnavailable);
        assert_eq!(
            classify("Sign in to confirm your age"),
            ErrorKind::AgeRestricted
        );
        assert_eq!(
            classify("The uploader has not made this video available in your country"),
            ErrorKind::RegionBlocked
        );
        assert_eq!(classify("connection timed out"), ErrorKind::NetworkTimeout);
        assert_eq!(
            classify("Unsupported URL: https://example.com/clip"),
            ErrorKind::FormatUnsupported
        );
        assert_eq!(classify("NoSuchBucket"), ErrorKind::StorageError);
        assert_eq!(
            classify("source exceeds maximum size for plan"),
            ErrorKind::FileTooLarge
        );
        assert_eq!(
            classify("Invalid data found when processing input"),
            ErrorKind::CorruptedDownload
        );
        assert_eq!(
            classify("video too short to segment"),
            ErrorKind::VideoTooShort
        );
        assert_eq!(
            classify("source exceeds maximum duration"),
            ErrorKind::VideoTooLong
        );
    }

    #[test]
    fn test_classify_is_case_insensitive() {
        assert_eq!(classify("CAPTCHA required"), ErrorKind::BotDetection);
        assert_eq!(classify("Rate Limit reached"), ErrorKind::RateLimited);
    }

    #[test]
    fn test_classify_unmatched_is_unknown() {
        assert_eq!(classify("something completely different"), ErrorKind::Unknown);
        assert_eq!(classify(""), ErrorKind::Unknown);
    }

    #[test]
    fn test_classify_order_stable() {
        // Matches both the bot-detection and rate-limited rows; the first
        // listed kind must win.
        assert_eq!(
            classify("captcha triggered by rate limit"),
            ErrorKind::BotDetection
        );
        // Matches unavailable before corrupted.
        assert_eq!(
            classify("video unavailable: corrupt manifest"),
            ErrorKind::VideoUnavailable
        );
    }

    #[test]
    fn test_age_restriction_does_not_hit_bot_row() {
        // "confirm your age" must not be swallowed by "confirm you're not a bot".
        assert_eq!(
            classify("Sign in to confirm your age. This video may be inappropriate."),
            ErrorKind::AgeRestricted
        );
    }

    #[test]
    fn test_retryable_split() {
        assert!(ErrorKind::BotDetection.is_retryable());
        assert!(ErrorKind::RateLimited.is_retryable());
        assert!(ErrorKind::NetworkTimeout.is_retryable());
        assert!(!ErrorKind::VideoUnavailable.is_retryable());
        assert!(!ErrorKind::AgeRestricted.is_retryable());

        assert!(ErrorKind::VideoUnavailable.is_permanent_for_source());
        assert!(ErrorKind::RegionBlocked.is_permanent_for_source());
        assert!(!ErrorKind::BotDetection.is_permanent_for_source());
    }

    #[test]
    fn test_serde_snake_case() {
        let json = serde_json::to_string(&ErrorKind::BotDetection).unwrap();
        assert_eq!(json, "\"bot_detection\"");
        let kind: ErrorKind = serde_json::from_str("\"video_too_short\"").unwrap();
        assert_eq!(kind, ErrorKind::VideoTooShort);
    }
}
