//! Thumbnail generation.

use std::path::Path;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::MediaResult;
use sforge_models::encoding::{THUMBNAIL_OFFSET_SECS, THUMBNAIL_SCALE_WIDTH};

/// Generate a thumbnail from a rendered clip.
///
/// The frame is taken from a fixed offset inside the clip, so it always
/// falls within the segment window.
pub async fn generate_thumbnail(
    video_path: impl AsRef<Path>,
    output_path: impl AsRef<Path>,
) -> MediaResult<()> {
    let video_path = video_path.as_ref();
    let output_path = output_path.as_ref();

    let filter = format!("scale={}:-2", THUMBNAIL_SCALE_WIDTH);

    let cmd = FfmpegCommand::new(video_path, output_path)
        .seek(THUMBNAIL_OFFSET_SECS)
        .single_frame()
        .video_filter(&filter)
        .log_level("error");

    FfmpegRunner::new().run(&cmd).await
}
