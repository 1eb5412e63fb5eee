//! Worker error types.

use std::fmt;

use thiserror::Error;
use vgen_delivery::DeliveryError;
use vgen_media::MediaError;
use vgen_models::ValidationError;

pub type JobResult<T> = Result<T, JobError>;

/// Underlying cause of a generation stage failure.
pub type GenerationCause = Box<dyn std::error::Error + Send + Sync>;

/// The ten generation stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    ImageInit,
    ImageEncode,
    ImageSample,
    ImageDecode,
    VideoInit,
    VideoEncode,
    VideoVision,
    VideoCompose,
    VideoSample,
    VideoDecode,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::ImageInit => "image_init",
            Stage::ImageEncode => "image_encode",
            Stage::ImageSample => "image_sample",
            Stage::ImageDecode => "image_decode",
            Stage::VideoInit => "video_init",
            Stage::VideoEncode => "video_encode",
            Stage::VideoVision => "video_vision",
            Stage::VideoCompose => "video_compose",
            Stage::VideoSample => "video_sample",
            Stage::VideoDecode => "video_decode",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything that can fail a job.
///
/// The `Display` form is what callers see after `FAILED: ` in the job result.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("Malformed job payload: {0}")]
    MalformedPayload(#[source] serde_json::Error),

    #[error("Invalid job input: {0}")]
    Validation(#[from] ValidationError),

    #[error("Generation failed at {stage}: {source}")]
    Generation {
        stage: Stage,
        #[source]
        source: GenerationCause,
    },

    #[error("Encoding failed: {0}")]
    Encode(#[source] MediaError),

    #[error("Upload failed: {0}")]
    Upload(#[source] DeliveryError),

    #[error("Notification failed: {0}")]
    Notify(#[source] DeliveryError),

    #[error("Workspace error: {0}")]
    Workspace(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl JobError {
    pub fn generation(stage: Stage, source: impl Into<GenerationCause>) -> Self {
        Self::Generation {
            stage,
            source: source.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Stage that failed, for generation errors.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            JobError::Generation { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// Failure category, recorded as the `kind` label of `vgen_jobs_total`.
    pub fn kind(&self) -> &'static str {
        match self {
            JobError::MalformedPayload(_) | JobError::Validation(_) => "validation",
            JobError::Generation { .. } => "generation",
            JobError::Encode(_) => "encode",
            JobError::Upload(_) => "upload",
            JobError::Notify(_) => "notify",
            JobError::Workspace(_) => "workspace",
            JobError::Config(_) => "config",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_names() {
        assert_eq!(Stage::ImageInit.to_string(), "image_init");
        assert_eq!(Stage::VideoSample.to_string(), "video_sample");
    }

    #[test]
    fn test_generation_error_message() {
        let err = JobError::generation(Stage::VideoSample, "CUDA out of memory");
        assert_eq!(
            err.to_string(),
            "Generation failed at video_sample: CUDA out of memory"
        );
        assert_eq!(err.stage(), Some(Stage::VideoSample));
        assert_eq!(err.kind(), "generation");
    }

    #[test]
    fn test_classifiers() {
        let err = JobError::from(ValidationError::MissingInput);
        assert_eq!(err.kind(), "validation");
        assert!(err.stage().is_none());

        let err = JobError::Upload(DeliveryError::UploadFailed {
            status: 500,
            body: "boom".into(),
        });
        assert_eq!(err.kind(), "upload");
        assert_eq!(
            err.to_string(),
            "Upload failed: upload server returned HTTP 500: boom"
        );
    }
}
