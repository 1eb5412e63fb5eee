//! Single-job text-to-image-to-video worker.
//!
//! This crate provides:
//! - Worker configuration from the environment
//! - The two-stage generation pipeline over a [`vgen_backend::GenerationBackend`]
//! - The job handler: validation, generation, upload, notification, cleanup

pub mod config;
pub mod error;
pub mod handler;
pub mod logging;
pub mod metrics;
pub mod pipeline;
pub mod workspace;

pub use config::{WorkerConfig, DEFAULT_OUTPUT_PREFIX};
pub use error::{GenerationCause, JobError, JobResult, Stage};
pub use handler::{JobContext, JobHandler};
pub use logging::JobLogger;
pub use pipeline::Pipeline;
pub use workspace::JobWorkspace;
