//! Handle and request types exchanged with a generation backend.
//!
//! Intermediate tensors (conditionings, latents, embeddings) never leave the
//! backend. The worker only holds opaque handles to them and passes them back
//! into later calls.

use serde::{Deserialize, Serialize};
use std::fmt;
use vgen_models::{Frame, SamplerChoice};

/// One of the two model contexts loaded by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    /// Text-to-image model producing the reference frame
    Image,
    /// Image-to-video model producing the clip
    Video,
}

impl ModelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelKind::Image => "image",
            ModelKind::Video => "video",
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

macro_rules! opaque_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn id(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

opaque_handle!(
    /// Text conditioning produced by a model's text encoder.
    Conditioning
);

opaque_handle!(
    /// Latent tensor, either empty or sampled.
    Latent
);

opaque_handle!(
    /// Vision-encoder embedding of the reference image.
    VisionEmbedding
);

/// Model used by a sampling call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SamplingModel {
    /// The loaded model as-is
    Base { model: ModelKind },
    /// A copy of the loaded model with a patched sampling shift
    Patched { model: ModelKind, handle: String },
}

impl SamplingModel {
    pub fn base(model: ModelKind) -> Self {
        Self::Base { model }
    }

    pub fn kind(&self) -> ModelKind {
        match self {
            SamplingModel::Base { model } | SamplingModel::Patched { model, .. } => *model,
        }
    }
}

/// Sampler parameters for one sampling call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplerSettings {
    pub seed: u64,
    pub steps: u32,
    pub cfg: f32,
    pub sampler_name: String,
    pub scheduler: String,
}

impl SamplerSettings {
    pub fn new(seed: u64, steps: u32, cfg: f32, choice: &SamplerChoice) -> Self {
        Self {
            seed,
            steps,
            cfg,
            sampler_name: choice.sampler_name.clone(),
            scheduler: choice.scheduler.clone(),
        }
    }
}

/// Inputs for composing image-to-video conditioning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageToVideo {
    pub positive: Conditioning,
    pub negative: Conditioning,
    pub width: u32,
    pub height: u32,
    /// Number of output frames
    pub length: u32,
    pub batch_size: u32,
    pub start_image: Frame,
    pub vision: VisionEmbedding,
}

/// Conditioning pair and empty video latent produced by [`ImageToVideo`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoConditioning {
    pub positive: Conditioning,
    pub negative: Conditioning,
    pub latent: Latent,
}
