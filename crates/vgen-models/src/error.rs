//! Error types for payload validation and frame construction.

use thiserror::Error;

/// Result type for request resolution.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Errors raised while turning an untrusted job payload into typed values.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Job payload has no `input` object")]
    MissingInput,

    #[error("Invalid delivery fields: {0}")]
    Delivery(serde_json::Error),

    #[error("Invalid generation parameters: {0}")]
    Params(serde_json::Error),

    #[error("Parameters out of range: {0}")]
    OutOfRange(#[from] validator::ValidationErrors),

    #[error("Invalid field `{field}`: {message}")]
    InvalidField { field: String, message: String },
}

impl ValidationError {
    pub fn invalid_field(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidField {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Result type for frame construction.
pub type FrameResult<T> = Result<T, FrameError>;

/// A decoded frame whose shape does not match its pixel buffer.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("Unsupported channel count: {0} (expected 1, 3 or 4)")]
    UnsupportedChannels(u8),

    #[error("Frame buffer has {actual} values, expected {expected} for {width}x{height}x{channels}")]
    BufferSize {
        width: u32,
        height: u32,
        channels: u8,
        expected: usize,
        actual: usize,
    },

    #[error("Frame of {width}x{height}x{channels} is too large")]
    TooLarge { width: u32, height: u32, channels: u8 },

    #[error("Frame has zero width or height")]
    Empty,
}
