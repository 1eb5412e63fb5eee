//! The capability interface the pipeline drives.

use async_trait::async_trait;
use vgen_models::{CropMode, Frame, FrameSequence};

use crate::error::BackendResult;
use crate::types::{
    Conditioning, ImageToVideo, Latent, ModelKind, SamplerSettings, SamplingModel,
    VideoConditioning, VisionEmbedding,
};

/// Inference-only facade over the image and video model contexts.
///
/// Implementations hold both models for the lifetime of the process and are
/// shared read-only between sequential jobs. Callers must not run two jobs
/// against the same backend concurrently. There are no training or weight
/// mutation affordances: [`patch_sampling_shift`](Self::patch_sampling_shift)
/// returns a patched copy and leaves the loaded model untouched.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Empty latent for a `width`x`height` image batch.
    async fn empty_latent(
        &self,
        model: ModelKind,
        width: u32,
        height: u32,
        batch_size: u32,
    ) -> BackendResult<Latent>;

    async fn encode_text(&self, model: ModelKind, prompt: &str) -> BackendResult<Conditioning>;

    /// Conditioning of the same shape as `conditioning` with all values zeroed.
    async fn zero_conditioning(&self, conditioning: &Conditioning) -> BackendResult<Conditioning>;

    /// Vision embedding of `image` for video conditioning.
    async fn encode_image_for_conditioning(
        &self,
        image: &Frame,
        crop: CropMode,
    ) -> BackendResult<VisionEmbedding>;

    async fn patch_sampling_shift(&self, model: ModelKind, shift: f32)
        -> BackendResult<SamplingModel>;

    /// Compose the video conditioning pair and an empty latent for
    /// `request.length` frames starting from `request.start_image`.
    async fn image_to_video(&self, request: ImageToVideo) -> BackendResult<VideoConditioning>;

    async fn sample(
        &self,
        model: &SamplingModel,
        settings: &SamplerSettings,
        positive: &Conditioning,
        negative: &Conditioning,
        latent: &Latent,
    ) -> BackendResult<Latent>;

    /// Decode a latent into frames with the model's VAE.
    async fn decode(&self, model: ModelKind, latent: &Latent) -> BackendResult<FrameSequence>;
}
