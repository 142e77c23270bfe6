//! Segmentation engine: window planning and clip rendering.
//!
//! The planner computes non-overlapping fixed-length windows over the
//! source duration; the renderer transcodes one window into an output clip
//! plus a companion thumbnail. Rendering goes through a trait so the
//! pipeline can be exercised without FFmpeg.

use async_trait::async_trait;
use rand::Rng;
use std::path::Path;
use tracing::info;

use sforge_models::RenderProfile;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::MediaResult;
use crate::thumbnail::generate_thumbnail;
use crate::watermark::compose_video_filter;

/// Window placement policy.
#[derive(Debug, Clone)]
pub struct SegmentPolicy {
    /// Length of each produced short, seconds.
    pub segment_length_secs: f64,
    /// Skipped at the start of the source (intros).
    pub start_margin_secs: f64,
    /// Skipped at the end of the source (outros).
    pub end_margin_secs: f64,
    /// Maximum random shift applied to each window start. The effective
    /// jitter is bounded by half the inter-window gap, so windows never
    /// overlap or leave the usable range.
    pub jitter_secs: f64,
}

impl Default for SegmentPolicy {
    fn default() -> Self {
        Self {
            segment_length_secs: 60.0,
            start_margin_secs: 2.0,
            end_margin_secs: 2.0,
            jitter_secs: 1.5,
        }
    }
}

/// One planned cut window.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentWindow {
    pub index: u32,
    pub start_secs: f64,
    pub duration_secs: f64,
}

impl SegmentWindow {
    pub fn end_secs(&self) -> f64 {
        self.start_secs + self.duration_secs
    }
}

/// Compute cut windows for a source of `duration` seconds.
///
/// `n = min(max_shorts, floor(duration / segment_length))`; an empty plan
/// means the source is too short to segment. A single window is centered
/// in the usable range; multiple windows are spaced evenly with bounded
/// jitter. Margins are relaxed to the full duration when the usable range
/// cannot hold the planned windows.
pub fn plan_windows(duration: f64, max_shorts: u32, policy: &SegmentPolicy) -> Vec<SegmentWindow> {
    let seg = policy.segment_length_secs;
    if seg <= 0.0 || duration < seg || max_shorts == 0 {
        return Vec::new();
    }

    let mut n = (max_shorts as u64).min(((duration + 1e-9) / seg) as u64) as u32;

    let mut usable_start = policy.start_margin_secs;
    let mut usable_len = duration - policy.start_margin_secs - policy.end_margin_secs;

    // Source shorter than two margins plus one segment: use it all
    if usable_len < seg {
        usable_start = 0.0;
        usable_len = duration;
    }

    // The trimmed range may hold fewer windows than the raw duration
    n = n.min(((usable_len + 1e-9) / seg) as u32).max(1);

    if n == 1 {
        return vec![SegmentWindow {
            index: 0,
            start_secs: usable_start + (usable_len - seg) / 2.0,
            duration_secs: seg,
        }];
    }

    let gap = (usable_len - n as f64 * seg) / (n as f64 - 1.0);
    let max_jitter = policy.jitter_secs.min(gap / 2.0).max(0.0);
    let mut rng = rand::rng();

    (0..n)
        .map(|i| {
            let base = usable_start + i as f64 * (seg + gap);
            let jitter = if max_jitter > 0.0 {
                rng.random_range(-max_jitter..=max_jitter)
            } else {
                0.0
            };
            let start = (base + jitter)
                .max(usable_start)
                .min(usable_start + usable_len - seg);
            SegmentWindow {
                index: i,
                start_secs: start,
                duration_secs: seg,
            }
        })
        .collect()
}

/// Transcoding seam: renders one window into a clip and extracts its
/// thumbnail. The production implementation shells out to FFmpeg.
#[async_trait]
pub trait SegmentRenderer: Send + Sync {
    async fn render_clip(
        &self,
        input: &Path,
        output: &Path,
        window: &SegmentWindow,
        profile: &RenderProfile,
    ) -> MediaResult<()>;

    async fn render_thumbnail(&self, clip: &Path, output: &Path) -> MediaResult<()>;
}

/// FFmpeg-backed renderer.
pub struct FfmpegRenderer {
    /// Per-clip transcode timeout in seconds.
    timeout_secs: u64,
}

impl FfmpegRenderer {
    pub fn new(timeout_secs: u64) -> Self {
        Self { timeout_secs }
    }
}

impl Default for FfmpegRenderer {
    fn default() -> Self {
        Self::new(600)
    }
}

#[async_trait]
impl SegmentRenderer for FfmpegRenderer {
    async fn render_clip(
        &self,
        input: &Path,
        output: &Path,
        window: &SegmentWindow,
        profile: &RenderProfile,
    ) -> MediaResult<()> {
        info!(
            input = %input.display(),
            output = %output.display(),
            start = window.start_secs,
            duration = window.duration_secs,
            height = profile.target_height,
            watermark = profile.is_watermarked(),
            "Rendering segment"
        );

        let base_filter = format!("scale=-2:{}", profile.target_height);
        let filter = compose_video_filter(&base_filter, profile.watermark_text.as_deref());

        let cmd = FfmpegCommand::new(input, output)
            .seek(window.start_secs)
            .duration(window.duration_secs)
            .video_filter(filter)
            .video_codec(&profile.encoding.codec)
            .preset(&profile.encoding.preset)
            .crf(profile.encoding.crf)
            .video_bitrate(&profile.video_bitrate)
            .audio_codec(&profile.encoding.audio_codec)
            .audio_bitrate(&profile.encoding.audio_bitrate)
            .faststart();

        FfmpegRunner::new().with_timeout(self.timeout_secs).run(&cmd).await
    }

    async fn render_thumbnail(&self, clip: &Path, output: &Path) -> MediaResult<()> {
        generate_thumbnail(clip, output).await
    }
}
