//! HTTP client for an out-of-process inference server.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, warn};
use url::Url;
use vgen_models::{CropMode, Frame, FrameSequence};

use crate::backend::GenerationBackend;
use crate::error::{BackendError, BackendResult};
use crate::types::{
    Conditioning, ImageToVideo, Latent, ModelKind, SamplerSettings, SamplingModel,
    VideoConditioning, VisionEmbedding,
};

const DEFAULT_BACKEND_URL: &str = "http://127.0.0.1:8188";

/// Configuration for [`RemoteBackend`].
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// Base URL of the inference server
    pub base_url: String,
    /// Per-request timeout; `None` waits as long as sampling takes
    pub timeout: Option<Duration>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BACKEND_URL.to_string(),
            timeout: None,
        }
    }
}

impl BackendConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            base_url: std::env::var("VGEN_BACKEND_URL")
                .unwrap_or_else(|_| DEFAULT_BACKEND_URL.to_string()),
            timeout: std::env::var("VGEN_BACKEND_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs),
        }
    }

    /// Parse a base URL, keeping any path prefix for endpoint joins.
    pub fn parse_base_url(raw: &str) -> BackendResult<Url> {
        let mut url =
            Url::parse(raw).map_err(|e| BackendError::Config(format!("{}: {}", raw, e)))?;
        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }
        Ok(url)
    }
}

#[derive(Debug, Deserialize)]
struct HandleResponse {
    handle: String,
}

#[derive(Debug, Deserialize)]
struct FramesResponse {
    frames: FrameSequence,
}

/// Error body the inference server sends when the model itself fails.
#[derive(Debug, Deserialize)]
struct ModelErrorResponse {
    error: String,
}

#[derive(Debug, Deserialize)]
struct HealthResponse {
    status: String,
}

/// [`GenerationBackend`] that forwards every call to an inference server
/// holding both model contexts.
///
/// Handles returned by the server are opaque identifiers that stay valid for
/// the duration of a job.
pub struct RemoteBackend {
    http: Client,
    base_url: Url,
}

impl RemoteBackend {
    /// Create a new remote backend.
    pub fn new(config: BackendConfig) -> BackendResult<Self> {
        let base_url = BackendConfig::parse_base_url(&config.base_url)?;

        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().map_err(BackendError::Network)?;

        Ok(Self { http, base_url })
    }

    /// Create from environment variables.
    pub fn from_env() -> BackendResult<Self> {
        Self::new(BackendConfig::from_env())
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Check that the inference server is up with both models loaded.
    pub async fn health_check(&self) -> BackendResult<bool> {
        let url = self.endpoint("health")?;

        match self.http.get(url).send().await {
            Ok(response) if response.status().is_success() => {
                let health: HealthResponse = response.json().await?;
                Ok(health.status == "healthy" || health.status == "ok")
            }
            Ok(response) => {
                warn!("Inference service health check failed: {}", response.status());
                Ok(false)
            }
            Err(e) => {
                warn!("Inference service health check error: {}", e);
                Ok(false)
            }
        }
    }

    fn endpoint(&self, path: &str) -> BackendResult<Url> {
        self.base_url
            .join(path)
            .map_err(|e| BackendError::Config(format!("{}: {}", path, e)))
    }

    async fn call<B, T>(&self, operation: &'static str, path: &str, body: &B) -> BackendResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.endpoint(path)?;
        debug!(operation, "Calling inference service at {}", url);

        let response = self.http.post(url).json(body).send().await.map_err(|e| {
            if e.is_connect() {
                BackendError::ServiceUnavailable(e.to_string())
            } else {
                BackendError::Network(e)
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            if let Ok(model_error) = serde_json::from_str::<ModelErrorResponse>(&body) {
                warn!(operation, status = status.as_u16(), "Model error: {}", model_error.error);
                return Err(BackendError::model(model_error.error));
            }
            return Err(BackendError::RequestFailed {
                operation,
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes)
            .map_err(|e| BackendError::invalid_response(format!("{}: {}", operation, e)))
    }
}

#[async_trait]
impl GenerationBackend for RemoteBackend {
    async fn empty_latent(
        &self,
        model: ModelKind,
        width: u32,
        height: u32,
        batch_size: u32,
    ) -> BackendResult<Latent> {
        let body = json!({
            "model": model,
            "width": width,
            "height": height,
            "batch_size": batch_size,
        });
        let response: HandleResponse = self.call("empty_latent", "v1/latents/empty", &body).await?;
        Ok(Latent::new(response.handle))
    }

    async fn encode_text(&self, model: ModelKind, prompt: &str) -> BackendResult<Conditioning> {
        let body = json!({ "model": model, "prompt": prompt });
        let response: HandleResponse = self.call("encode_text", "v1/text/encode", &body).await?;
        Ok(Conditioning::new(response.handle))
    }

    async fn zero_conditioning(&self, conditioning: &Conditioning) -> BackendResult<Conditioning> {
        let body = json!({ "conditioning": conditioning });
        let response: HandleResponse = self
            .call("zero_conditioning", "v1/conditioning/zero", &body)
            .await?;
        Ok(Conditioning::new(response.handle))
    }

    async fn encode_image_for_conditioning(
        &self,
        image: &Frame,
        crop: CropMode,
    ) -> BackendResult<VisionEmbedding> {
        let body = json!({ "image": image, "crop": crop });
        let response: HandleResponse = self
            .call("encode_image_for_conditioning", "v1/vision/encode", &body)
            .await?;
        Ok(VisionEmbedding::new(response.handle))
    }

    async fn patch_sampling_shift(
        &self,
        model: ModelKind,
        shift: f32,
    ) -> BackendResult<SamplingModel> {
        let body = json!({ "model": model, "shift": shift });
        let response: HandleResponse = self
            .call("patch_sampling_shift", "v1/models/shift", &body)
            .await?;
        Ok(SamplingModel::Patched {
            model,
            handle: response.handle,
        })
    }

    async fn image_to_video(&self, request: ImageToVideo) -> BackendResult<VideoConditioning> {
        self.call("image_to_video", "v1/image-to-video", &request).await
    }

    async fn sample(
        &self,
        model: &SamplingModel,
        settings: &SamplerSettings,
        positive: &Conditioning,
        negative: &Conditioning,
        latent: &Latent,
    ) -> BackendResult<Latent> {
        let body = json!({
            "model": model,
            "settings": settings,
            "positive": positive,
            "negative": negative,
            "latent": latent,
        });
        let response: HandleResponse = self.call("sample", "v1/sample", &body).await?;
        Ok(Latent::new(response.handle))
    }

    async fn decode(&self, model: ModelKind, latent: &Latent) -> BackendResult<FrameSequence> {
        let body = json!({ "model": model, "latent": latent });
        let response: FramesResponse = self.call("decode", "v1/decode", &body).await?;
        if response.frames.is_empty() {
            return Err(BackendError::invalid_response("decode returned no frames"));
        }
        Ok(response.frames)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn backend_for(server: &MockServer) -> RemoteBackend {
        RemoteBackend::new(BackendConfig {
            base_url: server.uri(),
            timeout: Some(Duration::from_secs(5)),
        })
        .unwrap()
    }

    #[test]
    fn test_config_defaults() {
        let config = BackendConfig::default();
        assert_eq!(config.base_url, "http://127.0.0.1:8188");
        assert!(config.timeout.is_none());

        let backend = RemoteBackend::new(config).unwrap();
        assert_eq!(backend.base_url().as_str(), "http://127.0.0.1:8188/");
    }

    #[test]
    fn test_base_url_keeps_prefix() {
        let url = BackendConfig::parse_base_url("http://gpu-host:9000/inference").unwrap();
        assert_eq!(
            url.join("v1/sample").unwrap().as_str(),
            "http://gpu-host:9000/inference/v1/sample"
        );
        assert!(BackendConfig::parse_base_url("not a url").is_err());
    }

    #[tokio::test]
    async fn test_encode_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/text/encode"))
            .and(body_partial_json(json!({"model": "video", "prompt": "a fox"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"handle": "cond-1"})))
            .expect(1)
            .mount(&server)
            .await;

        let backend = backend_for(&server).await;
        let cond = backend.encode_text(ModelKind::Video, "a fox").await.unwrap();
        assert_eq!(cond.id(), "cond-1");
    }

    #[tokio::test]
    async fn test_sample_forwards_settings() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/sample"))
            .and(body_partial_json(json!({
                "model": {"type": "patched", "model": "video", "handle": "m-1"},
                "settings": {"seed": 77, "steps": 4, "sampler_name": "lcm", "scheduler": "beta"},
                "positive": "pos",
                "negative": "neg",
                "latent": "lat-0"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"handle": "lat-1"})))
            .expect(1)
            .mount(&server)
            .await;

        let backend = backend_for(&server).await;
        let settings = SamplerSettings {
            seed: 77,
            steps: 4,
            cfg: 1.0,
            sampler_name: "lcm".into(),
            scheduler: "beta".into(),
        };
        let model = SamplingModel::Patched {
            model: ModelKind::Video,
            handle: "m-1".into(),
        };

        let latent = backend
            .sample(
                &model,
                &settings,
                &Conditioning::new("pos"),
                &Conditioning::new("neg"),
                &Latent::new("lat-0"),
            )
            .await
            .unwrap();
        assert_eq!(latent.id(), "lat-1");
    }

    #[tokio::test]
    async fn test_decode_returns_frames() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/decode"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "frames": [
                    {"width": 1, "height": 1, "channels": 3, "data": [0.0, 0.5, 1.0]},
                    {"width": 1, "height": 1, "channels": 3, "data": [1.0, 0.5, 0.0]}
                ]
            })))
            .mount(&server)
            .await;

        let backend = backend_for(&server).await;
        let frames = backend
            .decode(ModelKind::Image, &Latent::new("lat-1"))
            .await
            .unwrap();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].to_rgb8(), vec![0, 127, 255]);
    }

    #[tokio::test]
    async fn test_decode_rejects_malformed_frames() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/decode"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "frames": [{"width": 2, "height": 2, "channels": 3, "data": [0.0]}]
            })))
            .mount(&server)
            .await;

        let backend = backend_for(&server).await;
        let err = backend
            .decode(ModelKind::Video, &Latent::new("lat-1"))
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_server_error_carries_operation() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/sample"))
            .respond_with(ResponseTemplate::new(500).set_body_string("CUDA out of memory"))
            .mount(&server)
            .await;

        let backend = backend_for(&server).await;
        let err = backend
            .sample(
                &SamplingModel::base(ModelKind::Image),
                &SamplerSettings::new(
                    1,
                    4,
                    1.0,
                    &vgen_models::SamplerChoice {
                        sampler_name: "dpmpp_sde_gpu".into(),
                        scheduler: "beta".into(),
                    },
                ),
                &Conditioning::new("p"),
                &Conditioning::new("n"),
                &Latent::new("l"),
            )
            .await
            .unwrap_err();

        match err {
            BackendError::RequestFailed {
                operation,
                status,
                body,
            } => {
                assert_eq!(operation, "sample");
                assert_eq!(status, 500);
                assert!(body.contains("out of memory"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_structured_model_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/text/encode"))
            .respond_with(
                ResponseTemplate::new(500).set_body_json(json!({"error": "CUDA out of memory"})),
            )
            .mount(&server)
            .await;

        let backend = backend_for(&server).await;
        let err = backend
            .encode_text(ModelKind::Video, "a fox")
            .await
            .unwrap_err();

        assert!(matches!(err, BackendError::Model(ref msg) if msg == "CUDA out of memory"));
        assert_eq!(err.to_string(), "Model error: CUDA out of memory");
    }

    #[tokio::test]
    async fn test_health_check() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "ok"})))
            .mount(&server)
            .await;

        let backend = backend_for(&server).await;
        assert!(backend.health_check().await.unwrap());
    }
}
