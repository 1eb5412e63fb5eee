//! FFmpeg CLI wrapper for turning generated frames into video.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building
//! - Progress parsing from `-progress pipe:2`
//! - PNG frame I/O for reference images and frame dumps
//! - The [`FrameEncoder`] seam used by the worker, with an FFmpeg implementation

pub mod command;
pub mod encoder;
pub mod error;
pub mod frames;
pub mod fs_utils;
pub mod probe;
pub mod progress;

pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use encoder::{FfmpegFrameEncoder, FrameEncoder, PIXEL_FORMAT, VIDEO_CODEC};
pub use error::{MediaError, MediaResult};
pub use frames::{frame_path, load_frame, write_png, write_sequence, FRAME_PATTERN};
pub use fs_utils::{remove_dir_if_exists, remove_file_if_exists};
pub use probe::{probe_video, VideoInfo};
pub use progress::FfmpegProgress;
