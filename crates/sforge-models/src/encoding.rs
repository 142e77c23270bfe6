//! Video encoding configuration and per-tier render profiles.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::plan::PlanLimits;

/// Default video codec (H.264)
pub const DEFAULT_VIDEO_CODEC: &str = "libx264";
/// Default audio codec
pub const DEFAULT_AUDIO_CODEC: &str = "aac";
/// Default encoding preset
pub const DEFAULT_PRESET: &str = "fast";
/// Default CRF (Constant Rate Factor)
pub const DEFAULT_CRF: u8 = 21;
/// Default audio bitrate
pub const DEFAULT_AUDIO_BITRATE: &str = "128k";

/// Thumbnail generation settings
pub const THUMBNAIL_SCALE_WIDTH: u32 = 480;
/// Offset into a segment window where the thumbnail frame is taken.
pub const THUMBNAIL_OFFSET_SECS: f64 = 1.0;

/// Video encoding configuration.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct EncodingConfig {
    /// Video codec (e.g., "libx264")
    #[serde(default = "default_video_codec")]
    pub codec: String,

    /// Encoding preset (e.g., "fast", "medium", "slow")
    #[serde(default = "default_preset")]
    pub preset: String,

    /// Constant Rate Factor (quality, 0-51, lower is better)
    #[serde(default = "default_crf")]
    pub crf: u8,

    /// Audio codec
    #[serde(default = "default_audio_codec")]
    pub audio_codec: String,

    /// Audio bitrate
    #[serde(default = "default_audio_bitrate")]
    pub audio_bitrate: String,
}

fn default_video_codec() -> String {
    DEFAULT_VIDEO_CODEC.to_string()
}
fn default_preset() -> String {
    DEFAULT_PRESET.to_string()
}
fn default_crf() -> u8 {
    DEFAULT_CRF
}
fn default_audio_codec() -> String {
    DEFAULT_AUDIO_CODEC.to_string()
}
fn default_audio_bitrate() -> String {
    DEFAULT_AUDIO_BITRATE.to_string()
}

impl Default for EncodingConfig {
    fn default() -> Self {
        Self {
            codec: DEFAULT_VIDEO_CODEC.to_string(),
            preset: DEFAULT_PRESET.to_string(),
            crf: DEFAULT_CRF,
            audio_codec: DEFAULT_AUDIO_CODEC.to_string(),
            audio_bitrate: DEFAULT_AUDIO_BITRATE.to_string(),
        }
    }
}

impl EncodingConfig {
    /// Convert to FFmpeg output arguments.
    pub fn to_ffmpeg_args(&self) -> Vec<String> {
        vec![
            "-c:v".to_string(),
            self.codec.clone(),
            "-preset".to_string(),
            self.preset.clone(),
            "-crf".to_string(),
            self.crf.to_string(),
            "-c:a".to_string(),
            self.audio_codec.clone(),
            "-b:a".to_string(),
            self.audio_bitrate.clone(),
        ]
    }
}

/// Everything the renderer needs to produce one output clip.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RenderProfile {
    /// Output height in pixels; width follows the aspect ratio.
    pub target_height: u32,
    /// Output video bitrate cap (FFmpeg syntax).
    pub video_bitrate: String,
    /// Codec/quality settings.
    pub encoding: EncodingConfig,
    /// Burned-in watermark text, when the tier requires one.
    pub watermark_text: Option<String>,
}

impl RenderProfile {
    /// Build a render profile from tier limits.
    ///
    /// `watermark_text` is only applied when the tier carries a watermark.
    pub fn for_limits(limits: &PlanLimits, watermark_text: Option<String>) -> Self {
        Self {
            target_height: limits.target_height,
            video_bitrate: limits.video_bitrate.clone(),
            encoding: EncodingConfig::default(),
            watermark_text: if limits.watermark { watermark_text } else { None },
        }
    }

    pub fn is_watermarked(&self) -> bool {
        self.watermark_text.is_some()
    }
}
