//! Generation backend facade.
//!
//! The worker drives the image and video models only through
//! [`GenerationBackend`]. [`RemoteBackend`] implements it against an
//! inference server that keeps both model contexts resident on the GPU.

pub mod backend;
pub mod client;
pub mod error;
pub mod types;

pub use backend::GenerationBackend;
pub use client::{BackendConfig, RemoteBackend};
pub use error::{BackendError, BackendResult};
pub use types::{
    Conditioning, ImageToVideo, Latent, ModelKind, SamplerSettings, SamplingModel,
    VideoConditioning, VisionEmbedding,
};
