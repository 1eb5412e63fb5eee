//! PNG I/O for decoded frames.

use std::path::{Path, PathBuf};

use image::{ImageFormat, RgbImage};
use tracing::debug;
use vgen_models::Frame;

use crate::error::{MediaError, MediaResult};

/// File name pattern of the numbered frame dump, as understood by FFmpeg.
pub const FRAME_PATTERN: &str = "frame_%04d.png";

/// Path of frame `index` inside `dir`, matching [`FRAME_PATTERN`].
pub fn frame_path(dir: &Path, index: usize) -> PathBuf {
    dir.join(format!("frame_{:04}.png", index))
}

/// Write a frame as an 8-bit RGB PNG.
pub fn write_png(frame: &Frame, path: &Path) -> MediaResult<()> {
    let image = RgbImage::from_raw(frame.width(), frame.height(), frame.to_rgb8())
        .ok_or_else(|| MediaError::InvalidVideo("frame buffer does not match its size".into()))?;
    image.save_with_format(path, ImageFormat::Png)?;
    Ok(())
}

/// Load an image file as a normalised RGB frame.
pub fn load_frame(path: &Path) -> MediaResult<Frame> {
    if !path.exists() {
        return Err(MediaError::FileNotFound(path.to_path_buf()));
    }

    let image = image::open(path)?.to_rgb8();
    let frame = Frame::from_rgb8(image.width(), image.height(), image.as_raw())?;
    debug!(
        "Loaded {}x{} frame from {}",
        frame.width(),
        frame.height(),
        path.display()
    );
    Ok(frame)
}

/// Dump frames as a numbered PNG sequence in `dir`.
///
/// Returns the number of files written. Stops at the first failure.
pub fn write_sequence(frames: &[Frame], dir: &Path) -> MediaResult<usize> {
    for (index, frame) in frames.iter().enumerate() {
        let path = frame_path(dir, index);
        write_png(frame, &path).map_err(|e| MediaError::frame_write(index, &path, e.to_string()))?;
    }
    Ok(frames.len())
}
