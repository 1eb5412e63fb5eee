//! Frame sequence to video encoding.
//!
//! Frames are dumped as a numbered PNG sequence into a private temporary
//! directory next to the output file, then FFmpeg reads the sequence back at
//! the requested frame rate. The temporary directory is removed whether or
//! not the encode succeeds.

use std::path::Path;

use async_trait::async_trait;
use tracing::{debug, error, info, warn};
use vgen_models::FrameSequence;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::frames::{frame_path, write_sequence, FRAME_PATTERN};

/// H.264 encoder used for every output.
pub const VIDEO_CODEC: &str = "libx264";
/// 4:2:0 chroma for broad player compatibility.
pub const PIXEL_FORMAT: &str = "yuv420p";

/// Serializes decoded frames into a single video file.
#[async_trait]
pub trait FrameEncoder: Send + Sync {
    /// Encode `frames` into `output` at `fps`, replacing any existing file.
    async fn encode(&self, frames: FrameSequence, output: &Path, fps: u32) -> MediaResult<()>;
}

/// [`FrameEncoder`] backed by the FFmpeg CLI.
#[derive(Debug, Clone, Default)]
pub struct FfmpegFrameEncoder {
    runner: FfmpegRunner,
}

impl FfmpegFrameEncoder {
    pub fn new(runner: FfmpegRunner) -> Self {
        Self { runner }
    }

    async fn encode_inner(&self, frames: FrameSequence, output: &Path, fps: u32) -> MediaResult<()> {
        if frames.is_empty() {
            return Err(MediaError::EmptySequence);
        }

        let parent = output
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let frames_dir = tempfile::Builder::new()
            .prefix("frames-")
            .tempdir_in(parent)?;

        let total = frames.len();
        let dump_dir = frames_dir.path().to_path_buf();
        let written = tokio::task::spawn_blocking(move || write_sequence(&frames, &dump_dir))
            .await
            .map_err(std::io::Error::other)??;
        debug!("Wrote {} frames to {}", written, frames_dir.path().display());

        let first = frame_path(frames_dir.path(), 0);
        if !first.exists() {
            return Err(MediaError::FramesMissing(first));
        }

        let cmd = FfmpegCommand::new(frames_dir.path().join(FRAME_PATTERN), output)
            .input_framerate(fps)
            .video_codec(VIDEO_CODEC)
            .pixel_format(PIXEL_FORMAT);

        self.runner
            .run_with_progress(&cmd, move |progress| {
                debug!(
                    frame = progress.frame,
                    "Encoding {:.0}%",
                    progress.frame_percentage(total as u64)
                );
            })
            .await?;

        if let Err(e) = frames_dir.close() {
            warn!("Failed to remove temporary frames: {}", e);
        }

        Ok(())
    }
}

#[async_trait]
impl FrameEncoder for FfmpegFrameEncoder {
    async fn encode(&self, frames: FrameSequence, output: &Path, fps: u32) -> MediaResult<()> {
        let count = frames.len();

        match self.encode_inner(frames, output, fps).await {
            Ok(()) => {
                info!(
                    "Encoded {} frames at {} fps to {}",
                    count,
                    fps,
                    output.display()
                );
                Ok(())
            }
            Err(e) => {
                error!("Failed to encode {}: {}", output.display(), e);
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::probe_video;
    use tempfile::TempDir;
    use vgen_models::{Frame, FrameLayout};

    fn gradient_frames(count: usize, width: u32, height: u32) -> FrameSequence {
        (0..count)
            .map(|i| {
                let level = i as f32 / count.max(1) as f32;
                let plane = (width * height) as usize;
                let mut data = vec![level; plane];
                data.extend(vec![1.0 - level; plane]);
                data.extend(vec![0.5; plane]);
                Frame::new(width, height, 3, FrameLayout::ChannelsFirst, data).unwrap()
            })
            .collect()
    }

    #[tokio::test]
    async fn test_empty_sequence_is_rejected() {
        let dir = TempDir::new().unwrap();
        let err = FfmpegFrameEncoder::default()
            .encode(Vec::new(), &dir.path().join("out.mp4"), 24)
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::EmptySequence));
    }

    #[tokio::test]
    async fn test_missing_output_dir_fails_before_ffmpeg() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("missing").join("out.mp4");

        let err = FfmpegFrameEncoder::default()
            .encode(gradient_frames(1, 16, 16), &output, 24)
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::Io(_)));
    }

    #[tokio::test]
    #[ignore = "requires ffmpeg"]
    async fn test_encode_frame_counts() {
        for count in [1usize, 24, 53] {
            let dir = TempDir::new().unwrap();
            let output = dir.path().join("out.mp4");

            FfmpegFrameEncoder::default()
                .encode(gradient_frames(count, 64, 48), &output, 24)
                .await
                .unwrap();

            let info = probe_video(&output).await.unwrap();
            assert_eq!(info.frame_count, count as u64);
            assert!((info.fps - 24.0).abs() < 0.01);
            assert_eq!((info.width, info.height), (64, 48));

            // only the video remains, the frame dump is gone
            let entries: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
            assert_eq!(entries.len(), 1);
        }
    }

    #[tokio::test]
    #[ignore = "requires ffmpeg"]
    async fn test_encode_overwrites_existing_output() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("out.mp4");
        std::fs::write(&output, b"stale").unwrap();

        FfmpegFrameEncoder::default()
            .encode(gradient_frames(4, 32, 32), &output, 12)
            .await
            .unwrap();

        let info = probe_video(&output).await.unwrap();
        assert_eq!(info.frame_count, 4);
    }
}
