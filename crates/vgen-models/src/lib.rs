//! Shared data models for the VGen worker.
//!
//! This crate provides:
//! - Generation request parsing, defaults and seed resolution
//! - Delivery metadata (webhooks, Discord routing) extraction
//! - The `{jobId, result, status}` outcome shape
//! - Decoded frame representation shared by the backend and the encoder

pub mod delivery;
pub mod error;
pub mod frame;
pub mod job;
pub mod request;
pub mod seed;

// Re-export common types
pub use delivery::{peek_job_id, DeliveryFields, DeliveryMetadata, DiscordTarget, DELIVERY_KEYS};
pub use error::{FrameError, FrameResult, ValidationError, ValidationResult};
pub use frame::{Frame, FrameLayout, FrameSequence};
pub use job::{JobOutcome, JobStatus, NotificationPayload};
pub use request::{
    input_object, payload_schema, CropMode, GenerationParams, GenerationRequest, JobParameters,
    JobPayload, SamplerChoice,
};
pub use seed::{resolve_seed, resolve_seed_at, UNPINNED_SEED};
