//! Backend error types.

use thiserror::Error;

pub type BackendResult<T> = Result<T, BackendError>;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Inference service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("{operation} failed with status {status}: {body}")]
    RequestFailed {
        operation: &'static str,
        status: u16,
        body: String,
    },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Model error: {0}")]
    Model(String),

    #[error("Invalid backend configuration: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl BackendError {
    pub fn model(message: impl Into<String>) -> Self {
        Self::Model(message.into())
    }

    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::InvalidResponse(message.into())
    }
}
