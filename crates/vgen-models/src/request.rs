//! Generation request resolution.
//!
//! The wire form ([`GenerationParams`]) mirrors the job payload keys and
//! carries the defaults applied to omitted fields. [`GenerationRequest`] is
//! the validated, seed-resolved value both pipeline stages read from.

use std::fmt;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use validator::Validate;

use crate::delivery::DeliveryFields;
use crate::error::{ValidationError, ValidationResult};
use crate::seed::resolve_seed_at;

/// Crop policy applied before the reference image is vision-encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum CropMode {
    /// Center-crop to the encoder's square input
    #[default]
    Center,
    /// Resize without cropping
    None,
}

impl CropMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            CropMode::Center => "center",
            CropMode::None => "none",
        }
    }
}

impl fmt::Display for CropMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Generation parameters as they appear under `input`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Validate)]
pub struct GenerationParams {
    #[validate(length(min = 1))]
    pub positive_prompt: String,

    /// Only used by the video stage
    #[serde(default)]
    pub negative_prompt: String,

    #[serde(default)]
    pub crop: CropMode,

    #[serde(default = "default_width")]
    #[validate(range(min = 16, max = 4096))]
    pub width: u32,

    #[serde(default = "default_height")]
    #[validate(range(min = 16, max = 4096))]
    pub height: u32,

    /// Number of video frames
    #[serde(rename = "length", default = "default_frame_count")]
    #[validate(range(min = 1, max = 1024))]
    pub frame_count: u32,

    #[serde(default = "default_batch_size")]
    #[validate(range(min = 1, max = 16))]
    pub batch_size: u32,

    /// Model-sampling shift applied to the video model
    #[serde(default = "default_shift")]
    #[validate(range(min = 0.0, max = 100.0))]
    pub shift: f32,

    #[serde(rename = "cfg", default = "default_cfg_scale")]
    #[validate(range(min = 0.0, max = 100.0))]
    pub cfg_scale: f32,

    /// Video-stage sampler
    #[serde(default = "default_sampler_name")]
    #[validate(length(min = 1))]
    pub sampler_name: String,

    /// Video-stage scheduler
    #[serde(default = "default_scheduler")]
    #[validate(length(min = 1))]
    pub scheduler: String,

    /// Image-stage sampler
    #[serde(rename = "flux_sampler_name", default = "default_image_sampler_name")]
    #[validate(length(min = 1))]
    pub image_sampler_name: String,

    /// Image-stage scheduler
    #[serde(rename = "flux_scheduler", default = "default_scheduler")]
    #[validate(length(min = 1))]
    pub image_scheduler: String,

    #[serde(default = "default_steps")]
    #[validate(range(min = 1, max = 200))]
    pub steps: u32,

    /// 0 asks for a time-derived seed
    #[serde(default)]
    pub seed: u64,

    #[serde(default = "default_fps")]
    #[validate(range(min = 1, max = 120))]
    pub fps: u32,
}

fn default_width() -> u32 {
    1280
}
fn default_height() -> u32 {
    530
}
fn default_frame_count() -> u32 {
    53
}
fn default_batch_size() -> u32 {
    1
}
fn default_shift() -> f32 {
    8.0
}
fn default_cfg_scale() -> f32 {
    1.0
}
fn default_sampler_name() -> String {
    "lcm".to_string()
}
fn default_image_sampler_name() -> String {
    "dpmpp_sde_gpu".to_string()
}
fn default_scheduler() -> String {
    "beta".to_string()
}
fn default_steps() -> u32 {
    4
}
fn default_fps() -> u32 {
    24
}

/// Sampler choice for one stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SamplerChoice {
    pub sampler_name: String,
    pub scheduler: String,
}

/// Validated generation request with a resolved, non-zero seed.
///
/// Built once per job and shared read-only by both stages.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationRequest {
    pub positive_prompt: String,
    pub negative_prompt: String,
    pub crop: CropMode,
    pub width: u32,
    pub height: u32,
    pub frame_count: u32,
    pub batch_size: u32,
    pub shift: f32,
    pub cfg_scale: f32,
    pub video_sampler: SamplerChoice,
    pub image_sampler: SamplerChoice,
    pub steps: u32,
    pub seed: u64,
    pub fps: u32,
}

impl GenerationRequest {
    /// Build a request from the generation keys left in `input` once the
    /// delivery fields have been stripped.
    pub fn from_input(input: &Map<String, Value>) -> ValidationResult<Self> {
        Self::from_input_at(input, Utc::now())
    }

    pub fn from_input_at(input: &Map<String, Value>, now: DateTime<Utc>) -> ValidationResult<Self> {
        let params: GenerationParams =
            serde_json::from_value(Value::Object(input.clone())).map_err(ValidationError::Params)?;
        Self::from_params_at(params, now)
    }

    pub fn from_params_at(params: GenerationParams, now: DateTime<Utc>) -> ValidationResult<Self> {
        params.validate()?;

        Ok(Self {
            positive_prompt: params.positive_prompt,
            negative_prompt: params.negative_prompt,
            crop: params.crop,
            width: params.width,
            height: params.height,
            frame_count: params.frame_count,
            batch_size: params.batch_size,
            shift: params.shift,
            cfg_scale: params.cfg_scale,
            video_sampler: SamplerChoice {
                sampler_name: params.sampler_name,
                scheduler: params.scheduler,
            },
            image_sampler: SamplerChoice {
                sampler_name: params.image_sampler_name,
                scheduler: params.image_scheduler,
            },
            steps: params.steps,
            seed: resolve_seed_at(params.seed, now),
            fps: params.fps,
        })
    }
}

/// Borrow the `input` object of a raw job payload.
pub fn input_object(payload: &mut Value) -> ValidationResult<&mut Map<String, Value>> {
    payload
        .get_mut("input")
        .and_then(Value::as_object_mut)
        .ok_or(ValidationError::MissingInput)
}

/// Full `input` object as accepted by the worker.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct JobParameters {
    #[serde(flatten)]
    pub generation: GenerationParams,
    #[serde(flatten)]
    pub delivery: DeliveryFields,
}

/// Invocation payload: `{"input": {...}}`.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct JobPayload {
    pub input: JobParameters,
}

/// JSON schema of the invocation payload.
pub fn payload_schema() -> schemars::schema::RootSchema {
    schemars::schema_for!(JobPayload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn input(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 8, 30, 0).unwrap()
    }

    #[test]
    fn test_defaults_fill_omitted_fields() {
        let request = GenerationRequest::from_input_at(
            &input(json!({"positive_prompt": "a fox", "seed": 7})),
            fixed_now(),
        )
        .unwrap();

        assert_eq!(request.negative_prompt, "");
        assert_eq!(request.crop, CropMode::Center);
        assert_eq!((request.width, request.height), (1280, 530));
        assert_eq!(request.frame_count, 53);
        assert_eq!(request.batch_size, 1);
        assert_eq!(request.steps, 4);
        assert_eq!(request.fps, 24);
        assert_eq!(request.video_sampler.sampler_name, "lcm");
        assert_eq!(request.image_sampler.sampler_name, "dpmpp_sde_gpu");
        assert_eq!(request.image_sampler.scheduler, "beta");
        assert_eq!(request.seed, 7);
    }

    #[test]
    fn test_wire_names_map_to_fields() {
        let request = GenerationRequest::from_input_at(
            &input(json!({
                "positive_prompt": "a fox",
                "negative_prompt": "blurry",
                "crop": "none",
                "width": 512,
                "height": 512,
                "length": 16,
                "batch_size": 2,
                "shift": 5.0,
                "cfg": 3.5,
                "sampler_name": "euler",
                "scheduler": "simple",
                "flux_sampler_name": "dpmpp_2m",
                "flux_scheduler": "karras",
                "steps": 8,
                "seed": 1234,
                "fps": 16
            })),
            fixed_now(),
        )
        .unwrap();

        assert_eq!(request.crop, CropMode::None);
        assert_eq!(request.frame_count, 16);
        assert_eq!(request.batch_size, 2);
        assert!((request.cfg_scale - 3.5).abs() < f32::EPSILON);
        assert_eq!(
            request.video_sampler,
            SamplerChoice {
                sampler_name: "euler".into(),
                scheduler: "simple".into()
            }
        );
        assert_eq!(
            request.image_sampler,
            SamplerChoice {
                sampler_name: "dpmpp_2m".into(),
                scheduler: "karras".into()
            }
        );
        assert_eq!(request.seed, 1234);
    }

    #[test]
    fn test_zero_seed_is_resolved() {
        let request = GenerationRequest::from_input_at(
            &input(json!({"positive_prompt": "a fox", "seed": 0})),
            fixed_now(),
        )
        .unwrap();
        assert_ne!(request.seed, 0);
        assert_eq!(request.seed, resolve_seed_at(0, fixed_now()));
    }

    #[test]
    fn test_max_seed_accepted() {
        let request = GenerationRequest::from_input_at(
            &input(json!({"positive_prompt": "a fox", "seed": u64::MAX})),
            fixed_now(),
        )
        .unwrap();
        assert_eq!(request.seed, u64::MAX);
    }

    #[test]
    fn test_missing_prompt_is_rejected() {
        let err = GenerationRequest::from_input_at(&input(json!({"width": 512})), fixed_now())
            .unwrap_err();
        assert!(matches!(err, ValidationError::Params(_)));
        assert!(err.to_string().contains("positive_prompt"));
    }

    #[test]
    fn test_wrong_type_is_rejected() {
        let err = GenerationRequest::from_input_at(
            &input(json!({"positive_prompt": "a fox", "width": "wide"})),
            fixed_now(),
        )
        .unwrap_err();
        assert!(matches!(err, ValidationError::Params(_)));
    }

    #[test]
    fn test_out_of_range_is_rejected() {
        let err = GenerationRequest::from_input_at(
            &input(json!({"positive_prompt": "a fox", "fps": 0})),
            fixed_now(),
        )
        .unwrap_err();
        assert!(matches!(err, ValidationError::OutOfRange(_)));
    }

    #[test]
    fn test_empty_prompt_is_rejected() {
        let err = GenerationRequest::from_input_at(
            &input(json!({"positive_prompt": ""})),
            fixed_now(),
        )
        .unwrap_err();
        assert!(matches!(err, ValidationError::OutOfRange(_)));
    }

    #[test]
    fn test_input_object_requires_input_key() {
        let mut payload = json!({"positive_prompt": "a fox"});
        assert!(matches!(
            input_object(&mut payload),
            Err(ValidationError::MissingInput)
        ));

        let mut payload = json!({"input": "not an object"});
        assert!(input_object(&mut payload).is_err());

        let mut payload = json!({"input": {"positive_prompt": "a fox"}});
        assert_eq!(input_object(&mut payload).unwrap().len(), 1);
    }

    #[test]
    fn test_payload_schema_lists_wire_keys() {
        let schema = serde_json::to_value(payload_schema()).unwrap();
        let text = schema.to_string();
        assert!(text.contains("flux_sampler_name"));
        assert!(text.contains("notify_uri"));
        assert!(text.contains("length"));
    }
}
