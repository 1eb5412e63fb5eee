//! Delivery error types.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for upload and notification operations.
pub type DeliveryResult<T> = Result<T, DeliveryError>;

/// Errors that can occur while uploading artifacts or posting webhooks.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("Invalid delivery configuration: {0}")]
    Config(String),

    #[error("upload server returned HTTP {status}: {body}")]
    UploadFailed { status: u16, body: String },

    #[error("Upload response did not contain a URL")]
    EmptyUploadResponse,

    #[error("Webhook {url} returned HTTP {status}")]
    NotifyFailed { url: String, status: u16 },

    #[error("Artifact not found: {0}")]
    FileNotFound(PathBuf),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl DeliveryError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Whether the remote end answered with an error status.
    pub fn is_http_status(&self) -> bool {
        matches!(
            self,
            DeliveryError::UploadFailed { .. } | DeliveryError::NotifyFailed { .. }
        )
    }
}
