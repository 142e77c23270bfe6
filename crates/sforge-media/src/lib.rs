//! Media acquisition, validation and segmentation.
//!
//! This crate owns everything that touches media bytes or the remote host:
//! the download strategy chain and its rate governor, the artifact
//! validator, the ffprobe metadata probe, and the segmentation engine that
//! turns one source file into N rendered shorts.

pub mod acquire;
pub mod command;
pub mod download;
pub mod error;
pub mod governor;
pub mod probe;
pub mod segment;
pub mod thumbnail;
pub mod validate;
pub mod watermark;

pub use acquire::{acquire_source, AcquisitionConfig, AcquisitionError, AttemptRecord, SourceArtifact};
pub use command::{check_ffmpeg, check_ffprobe, check_ytdlp, FfmpegCommand, FfmpegRunner};
pub use download::{default_strategies, DownloadStrategy, HttpStrategy, YtDlpStrategy};
pub use error::{MediaError, MediaResult};
pub use governor::{Admission, GovernorConfig, RateGovernor};
pub use probe::{FfprobeProber, VideoInfo, VideoProber};
pub use segment::{plan_windows, FfmpegRenderer, SegmentPolicy, SegmentRenderer, SegmentWindow};
pub use validate::validate_artifact;
