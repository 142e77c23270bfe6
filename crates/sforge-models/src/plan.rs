//! Plan tiers and per-tier quota limits.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Source size quotas in bytes for each plan tier.
pub const FREE_MAX_SOURCE_BYTES: u64 = 2 * 1024 * 1024 * 1024; // 2 GB
pub const PREMIUM_MAX_SOURCE_BYTES: u64 = 8 * 1024 * 1024 * 1024; // 8 GB

/// Subscription tier enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "lowercase")]
pub enum PlanTier {
    #[default]
    Free,
    Premium,
}

impl PlanTier {
    /// Parse from string (case-insensitive, unknown falls back to free).
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "premium" => PlanTier::Premium,
            _ => PlanTier::Free,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PlanTier::Free => "free",
            PlanTier::Premium => "premium",
        }
    }
}

impl std::fmt::Display for PlanTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Quota and quality limits applied to a job.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PlanLimits {
    /// Maximum number of shorts produced per job.
    pub max_shorts: u32,
    /// Maximum source duration in seconds.
    pub max_source_duration_secs: f64,
    /// Minimum source duration in seconds (shorter sources cannot be segmented).
    pub min_source_duration_secs: f64,
    /// Maximum source file size in bytes.
    pub max_source_bytes: u64,
    /// Minimum source height in pixels.
    pub min_source_height: u32,
    /// Output height in pixels (720 for free, 1080 for premium).
    pub target_height: u32,
    /// Output video bitrate (FFmpeg syntax, e.g. "2500k").
    pub video_bitrate: String,
    /// Whether exports carry a burned-in watermark.
    pub watermark: bool,
}

impl Default for PlanLimits {
    fn default() -> Self {
        Self::for_tier(PlanTier::Free)
    }
}

impl PlanLimits {
    /// Create limits for a specific plan tier.
    pub fn for_tier(tier: PlanTier) -> Self {
        match tier {
            PlanTier::Free => Self {
                max_shorts: 2,
                max_source_duration_secs: 1800.0, // 30 minutes
                min_source_duration_secs: 15.0,
                max_source_bytes: FREE_MAX_SOURCE_BYTES,
                min_source_height: 360,
                target_height: 720,
                video_bitrate: "2500k".to_string(),
                watermark: true,
            },
            PlanTier::Premium => Self {
                max_shorts: 10,
                max_source_duration_secs: 7200.0, // 2 hours
                min_source_duration_secs: 15.0,
                max_source_bytes: PREMIUM_MAX_SOURCE_BYTES,
                min_source_height: 360,
                target_height: 1080,
                video_bitrate: "6000k".to_string(),
                watermark: false,
            },
        }
    }

    /// Output quality label for this tier ("720p", "1080p").
    pub fn quality_label(&self) -> String {
        format!("{}p", self.target_height)
    }
}

/// Format bytes as human-readable string (KB, MB, GB).
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_parse() {
        assert_eq!(PlanTier::parse("free"), PlanTier::Free);
        assert_eq!(PlanTier::parse("premium"), PlanTier::Premium);
        assert_eq!(PlanTier::parse("PREMIUM"), PlanTier::Premium);
        assert_eq!(PlanTier::parse("enterprise"), PlanTier::Free); // Default
    }

    #[test]
    fn test_tier_limits() {
        let free = PlanLimits::for_tier(PlanTier::Free);
        assert_eq!(free.max_shorts, 2);
        assert_eq!(free.target_height, 720);
        assert!(free.watermark);

        let premium = PlanLimits::for_tier(PlanTier::Premium);
        assert_eq!(premium.max_shorts, 10);
        assert_eq!(premium.target_height, 1080);
        assert!(!premium.watermark);
        assert!(premium.max_source_bytes > free.max_source_bytes);
    }

    #[test]
    fn test_quality_label() {
        assert_eq!(PlanLimits::for_tier(PlanTier::Free).quality_label(), "720p");
        assert_eq!(
            PlanLimits::for_tier(PlanTier::Premium).quality_label(),
            "1080p"
        );
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(500), "500 B");
        assert_eq!(format_bytes(1024), "1.00 KB");
        assert_eq!(format_bytes(1024 * 1024), "1.00 MB");
        assert_eq!(format_bytes(3 * 1024 * 1024 * 1024 / 2), "1.50 GB");
    }
}
