//! Two-stage generation pipeline.
//!
//! The image stage turns the prompt into a single reference frame and
//! persists it. The video stage reloads that frame, derives a vision
//! embedding from it and samples a frame sequence conditioned on text, image
//! and embedding. Both stages sample with the same resolved seed. The stages
//! run strictly in order and nothing is retried; the first failure aborts
//! the job with the failing [`Stage`].

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use vgen_backend::{GenerationBackend, ImageToVideo, ModelKind, SamplerSettings, SamplingModel};
use vgen_media::{load_frame, write_png, FrameEncoder};
use vgen_models::{Frame, FrameSequence, GenerationRequest};

use crate::error::{GenerationCause, JobError, JobResult, Stage};
use crate::logging::JobLogger;
use crate::metrics;

/// Drives the backend through both stages and encodes the result.
#[derive(Clone)]
pub struct Pipeline {
    backend: Arc<dyn GenerationBackend>,
    encoder: Arc<dyn FrameEncoder>,
}

impl Pipeline {
    pub fn new(backend: Arc<dyn GenerationBackend>, encoder: Arc<dyn FrameEncoder>) -> Self {
        Self { backend, encoder }
    }

    /// Run both stages and write the video to `output`.
    pub async fn run(
        &self,
        request: &GenerationRequest,
        reference_path: &Path,
        output: &Path,
        logger: &JobLogger,
    ) -> JobResult<()> {
        self.generate_reference(request, reference_path, logger).await?;
        let frames = self.generate_frames(request, reference_path, logger).await?;

        logger.log_progress(&format!(
            "encoding {} frames at {} fps",
            frames.len(),
            request.fps
        ));
        let started = Instant::now();
        let encoded = self.encoder.encode(frames, output, request.fps).await;
        metrics::record_stage_duration("encode", started.elapsed().as_secs_f64());

        encoded.map_err(JobError::Encode)
    }

    /// Image stage: prompt to reference frame on disk.
    pub async fn generate_reference(
        &self,
        request: &GenerationRequest,
        reference_path: &Path,
        logger: &JobLogger,
    ) -> JobResult<()> {
        let backend = &self.backend;

        logger.log_stage(Stage::ImageInit);
        let latent = run_stage(Stage::ImageInit, async {
            backend
                .empty_latent(
                    ModelKind::Image,
                    request.width,
                    request.height,
                    request.batch_size,
                )
                .await
        })
        .await?;

        logger.log_stage(Stage::ImageEncode);
        let (positive, negative) = run_stage(Stage::ImageEncode, async {
            let positive = backend
                .encode_text(ModelKind::Image, &request.positive_prompt)
                .await?;
            let negative = backend.zero_conditioning(&positive).await?;
            Ok::<_, GenerationCause>((positive, negative))
        })
        .await?;

        logger.log_stage(Stage::ImageSample);
        let settings = SamplerSettings::new(
            request.seed,
            request.steps,
            request.cfg_scale,
            &request.image_sampler,
        );
        let sampled = run_stage(Stage::ImageSample, async {
            backend
                .sample(
                    &SamplingModel::base(ModelKind::Image),
                    &settings,
                    &positive,
                    &negative,
                    &latent,
                )
                .await
        })
        .await?;

        logger.log_stage(Stage::ImageDecode);
        let path = reference_path.to_path_buf();
        run_stage(Stage::ImageDecode, async {
            let frames = backend.decode(ModelKind::Image, &sampled).await?;
            // batch may hold several images, the first one is the reference
            let reference = frames
                .into_iter()
                .next()
                .ok_or("image decode returned no frames")?;
            persist_frame(reference, path).await?;
            Ok::<_, GenerationCause>(())
        })
        .await?;

        logger.log_progress(&format!(
            "reference frame saved to {}",
            reference_path.display()
        ));
        Ok(())
    }

    /// Video stage: reference frame on disk to decoded frame sequence.
    pub async fn generate_frames(
        &self,
        request: &GenerationRequest,
        reference_path: &Path,
        logger: &JobLogger,
    ) -> JobResult<FrameSequence> {
        let backend = &self.backend;

        logger.log_stage(Stage::VideoInit);
        let path = reference_path.to_path_buf();
        let (reference, model) = run_stage(Stage::VideoInit, async {
            let reference = reload_frame(path).await?;
            let model = backend
                .patch_sampling_shift(ModelKind::Video, request.shift)
                .await?;
            Ok::<_, GenerationCause>((reference, model))
        })
        .await?;

        logger.log_stage(Stage::VideoEncode);
        let (positive, negative) = run_stage(Stage::VideoEncode, async {
            let positive = backend
                .encode_text(ModelKind::Video, &request.positive_prompt)
                .await?;
            let negative = backend
                .encode_text(ModelKind::Video, &request.negative_prompt)
                .await?;
            Ok::<_, GenerationCause>((positive, negative))
        })
        .await?;

        logger.log_stage(Stage::VideoVision);
        let vision = run_stage(Stage::VideoVision, async {
            backend
                .encode_image_for_conditioning(&reference, request.crop)
                .await
        })
        .await?;

        logger.log_stage(Stage::VideoCompose);
        let conditioning = run_stage(Stage::VideoCompose, async {
            backend
                .image_to_video(ImageToVideo {
                    positive,
                    negative,
                    width: request.width,
                    height: request.height,
                    length: request.frame_count,
                    batch_size: request.batch_size,
                    start_image: reference,
                    vision,
                })
                .await
        })
        .await?;

        logger.log_stage(Stage::VideoSample);
        let settings = SamplerSettings::new(
            request.seed,
            request.steps,
            request.cfg_scale,
            &request.video_sampler,
        );
        let sampled = run_stage(Stage::VideoSample, async {
            backend
                .sample(
                    &model,
                    &settings,
                    &conditioning.positive,
                    &conditioning.negative,
                    &conditioning.latent,
                )
                .await
        })
        .await?;

        logger.log_stage(Stage::VideoDecode);
        let frames = run_stage(Stage::VideoDecode, async {
            let frames = backend.decode(ModelKind::Video, &sampled).await?;
            if frames.is_empty() {
                return Err(GenerationCause::from("video decode returned no frames"));
            }
            Ok::<_, GenerationCause>(frames)
        })
        .await?;

        logger.log_progress(&format!("decoded {} video frames", frames.len()));
        Ok(frames)
    }
}

/// Await one stage, record its duration and tag any failure with `stage`.
async fn run_stage<T, E, Fut>(stage: Stage, fut: Fut) -> JobResult<T>
where
    Fut: Future<Output = Result<T, E>>,
    E: Into<GenerationCause>,
{
    let started = Instant::now();
    let result = fut.await;
    metrics::record_stage_duration(stage.as_str(), started.elapsed().as_secs_f64());

    result.map_err(|e| JobError::generation(stage, e))
}

async fn persist_frame(frame: Frame, path: PathBuf) -> Result<(), GenerationCause> {
    tokio::task::spawn_blocking(move || write_png(&frame, &path)).await??;
    Ok(())
}

async fn reload_frame(path: PathBuf) -> Result<Frame, GenerationCause> {
    Ok(tokio::task::spawn_blocking(move || load_frame(&path)).await??)
}
