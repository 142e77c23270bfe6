//! Burned-in watermark for free-tier exports.
//!
//! The watermark is caller-supplied text drawn in the bottom-right corner
//! with a translucent backing box, rendered with FFmpeg's drawtext filter.

/// Pixel offset from the bottom-right corner.
const WATERMARK_MARGIN: u32 = 20;

/// Text opacity.
const WATERMARK_OPACITY: f32 = 0.7;

/// Escape a string for use inside a drawtext `text=` expression.
///
/// Backslash first, then the characters drawtext treats specially.
fn escape_drawtext(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace('\'', "\\'")
        .replace(':', "\\:")
        .replace('%', "\\%")
}

/// Build a drawtext filter for the given watermark text.
pub fn build_drawtext_filter(text: &str) -> String {
    format!(
        "drawtext=text='{}':x=w-tw-{m}:y=h-th-{m}:fontsize=28:fontcolor=white@{op:.1}:box=1:boxcolor=black@0.3:boxborderw=8",
        escape_drawtext(text),
        m = WATERMARK_MARGIN,
        op = WATERMARK_OPACITY,
    )
}

/// Compose a video filter chain from a base filter and an optional
/// watermark text.
pub fn compose_video_filter(base: &str, watermark_text: Option<&str>) -> String {
    match watermark_text {
        Some(text) if !text.is_empty() => format!("{},{}", base, build_drawtext_filter(text)),
        _ => base.to_string(),
    }
}
