//! Decoded frames as produced by the model backend.
//!
//! Pixels are normalised `f32` in `[0, 1]`. Backends may hand frames back
//! channel-first or channel-last, with 1, 3 or 4 channels.

use serde::{Deserialize, Serialize};

use crate::error::{FrameError, FrameResult};

/// Memory layout of a frame's pixel buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FrameLayout {
    /// `[channel][row][col]`
    ChannelsFirst,
    /// `[row][col][channel]`
    #[default]
    ChannelsLast,
}

#[derive(Debug, Deserialize)]
struct RawFrame {
    width: u32,
    height: u32,
    channels: u8,
    #[serde(default)]
    layout: FrameLayout,
    data: Vec<f32>,
}

/// A single decoded frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawFrame")]
pub struct Frame {
    width: u32,
    height: u32,
    channels: u8,
    layout: FrameLayout,
    data: Vec<f32>,
}

/// Ordered frames of one video.
pub type FrameSequence = Vec<Frame>;

impl TryFrom<RawFrame> for Frame {
    type Error = FrameError;

    fn try_from(raw: RawFrame) -> FrameResult<Self> {
        Frame::new(raw.width, raw.height, raw.channels, raw.layout, raw.data)
    }
}

impl Frame {
    pub fn new(
        width: u32,
        height: u32,
        channels: u8,
        layout: FrameLayout,
        data: Vec<f32>,
    ) -> FrameResult<Self> {
        if width == 0 || height == 0 {
            return Err(FrameError::Empty);
        }
        if !matches!(channels, 1 | 3 | 4) {
            return Err(FrameError::UnsupportedChannels(channels));
        }

        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|n| n.checked_mul(channels as usize))
            .ok_or(FrameError::TooLarge {
                width,
                height,
                channels,
            })?;
        if data.len() != expected {
            return Err(FrameError::BufferSize {
                width,
                height,
                channels,
                expected,
                actual: data.len(),
            });
        }

        Ok(Self {
            width,
            height,
            channels,
            layout,
            data,
        })
    }

    /// Build a normalised channel-last RGB frame from 8-bit RGB pixels.
    pub fn from_rgb8(width: u32, height: u32, pixels: &[u8]) -> FrameResult<Self> {
        let data = pixels.iter().map(|&p| p as f32 / 255.0).collect();
        Self::new(width, height, 3, FrameLayout::ChannelsLast, data)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    pub fn layout(&self) -> FrameLayout {
        self.layout
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Convert to 8-bit, channel-last RGB.
    ///
    /// Values are scaled by 255, clamped and truncated. Alpha is dropped and
    /// single-channel frames are replicated into all three channels.
    pub fn to_rgb8(&self) -> Vec<u8> {
        let pixels = self.width as usize * self.height as usize;
        let mut out = Vec::with_capacity(pixels.saturating_mul(3));

        for pixel in 0..pixels {
            for c in 0..3 {
                let source_channel = if self.channels == 1 { 0 } else { c };
                out.push(to_u8(self.value(pixel, source_channel)));
            }
        }

        out
    }

    fn value(&self, pixel: usize, channel: usize) -> f32 {
        let index = match self.layout {
            FrameLayout::ChannelsLast => pixel * self.channels as usize + channel,
            FrameLayout::ChannelsFirst => {
                channel * (self.width as usize * self.height as usize) + pixel
            }
        };
        self.data[index]
    }
}

fn to_u8(value: f32) -> u8 {
    (value * 255.0).clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_mismatched_buffer() {
        let err = Frame::new(2, 2, 3, FrameLayout::ChannelsLast, vec![0.0; 11]).unwrap_err();
        assert!(matches!(err, FrameError::BufferSize { expected: 12, actual: 11, .. }));
    }

    #[test]
    fn test_rejects_overflowing_dimensions() {
        let err = Frame::new(u32::MAX, u32::MAX, 3, FrameLayout::ChannelsLast, vec![0.0]).unwrap_err();
        assert!(matches!(err, FrameError::TooLarge { channels: 3, .. }));
    }

    #[test]
    fn test_oversized_frame_fails_to_deserialize() {
        let raw = r#"{"width":4294967295,"height":4294967295,"channels":3,"data":[0.0]}"#;
        let err = serde_json::from_str::<Frame>(raw).unwrap_err();
        assert!(err.to_string().contains("too large"));
    }

    #[test]
    fn test_rejects_two_channels() {
        let err = Frame::new(1, 1, 2, FrameLayout::ChannelsLast, vec![0.0; 2]).unwrap_err();
        assert!(matches!(err, FrameError::UnsupportedChannels(2)));
    }

    #[test]
    fn test_channels_first_is_transposed() {
        // 2x1 image: R plane, G plane, B plane
        let frame = Frame::new(
            2,
            1,
            3,
            FrameLayout::ChannelsFirst,
            vec![1.0, 0.0, 0.0, 1.0, 0.5, 0.5],
        )
        .unwrap();

        assert_eq!(frame.to_rgb8(), vec![255, 0, 127, 0, 255, 127]);
    }

    #[test]
    fn test_alpha_is_dropped() {
        let frame = Frame::new(1, 1, 4, FrameLayout::ChannelsLast, vec![1.0, 0.0, 1.0, 0.25])
            .unwrap();
        assert_eq!(frame.to_rgb8(), vec![255, 0, 255]);
    }

    #[test]
    fn test_grayscale_is_expanded() {
        let frame = Frame::new(1, 1, 1, FrameLayout::ChannelsFirst, vec![1.0]).unwrap();
        assert_eq!(frame.to_rgb8(), vec![255, 255, 255]);
    }

    #[test]
    fn test_out_of_range_values_are_clamped() {
        let frame = Frame::new(1, 1, 3, FrameLayout::ChannelsLast, vec![-0.5, 1.5, f32::NAN])
            .unwrap();
        assert_eq!(frame.to_rgb8(), vec![0, 255, 0]);
    }

    #[test]
    fn test_rgb8_round_trip() {
        let pixels = vec![0, 255, 0, 255, 255, 0];
        let frame = Frame::from_rgb8(2, 1, &pixels).unwrap();
        assert_eq!(frame.to_rgb8(), pixels);
        assert!((frame.data()[1] - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_deserialize_validates_shape() {
        let ok: Frame = serde_json::from_value(serde_json::json!({
            "width": 1, "height": 1, "channels": 3,
            "layout": "channels_first", "data": [0.0, 0.5, 1.0]
        }))
        .unwrap();
        assert_eq!(ok.layout(), FrameLayout::ChannelsFirst);

        let bad = serde_json::from_value::<Frame>(serde_json::json!({
            "width": 2, "height": 1, "channels": 3, "data": [0.0]
        }));
        assert!(bad.is_err());
    }
}
