//! Worker configuration.

use std::path::PathBuf;
use std::time::Duration;

use validator::Validate;
use vgen_delivery::DEFAULT_UPLOAD_URL;
use vgen_models::DiscordTarget;

/// File name prefix of generated videos, followed by `-<seed>.mp4`.
pub const DEFAULT_OUTPUT_PREFIX: &str = "flux-krea-blaze-wan2.2-i2v-rapid";

/// Worker configuration.
#[derive(Debug, Clone, Validate)]
pub struct WorkerConfig {
    /// Parent directory of per-job workspaces
    pub work_dir: PathBuf,
    /// Multipart upload endpoint
    #[validate(url)]
    pub upload_url: String,
    /// Upload request timeout
    pub upload_timeout: Option<Duration>,
    /// Webhook request timeout
    pub notify_timeout: Option<Duration>,
    /// Kill FFmpeg after this long
    pub ffmpeg_timeout: Option<Duration>,
    /// Platform webhook notified for every job
    #[validate(url)]
    pub platform_notify_uri: Option<String>,
    pub platform_notify_token: Option<String>,
    /// Discord routing used when a job does not name its own
    pub discord_defaults: DiscordTarget,
    #[validate(length(min = 1, max = 128), custom(function = "validate_file_prefix"))]
    pub output_prefix: String,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            work_dir: PathBuf::from("/tmp/vgen"),
            upload_url: DEFAULT_UPLOAD_URL.to_string(),
            upload_timeout: Some(Duration::from_secs(300)),
            notify_timeout: Some(Duration::from_secs(30)),
            ffmpeg_timeout: None,
            platform_notify_uri: None,
            platform_notify_token: None,
            discord_defaults: DiscordTarget::default(),
            output_prefix: DEFAULT_OUTPUT_PREFIX.to_string(),
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    ///
    /// Timeouts are in seconds; `0` disables the timeout.
    pub fn from_env() -> Self {
        Self {
            work_dir: std::env::var("WORKER_WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("/tmp/vgen")),
            upload_url: std::env::var("WORKER_UPLOAD_URL")
                .unwrap_or_else(|_| DEFAULT_UPLOAD_URL.to_string()),
            upload_timeout: env_timeout("WORKER_UPLOAD_TIMEOUT_SECS", 300),
            notify_timeout: env_timeout("WORKER_NOTIFY_TIMEOUT_SECS", 30),
            ffmpeg_timeout: env_timeout("WORKER_FFMPEG_TIMEOUT_SECS", 0),
            platform_notify_uri: env_value("WORKER_NOTIFY_URI"),
            platform_notify_token: env_value("WORKER_NOTIFY_TOKEN"),
            discord_defaults: DiscordTarget {
                id: env_value("WORKER_DISCORD_ID"),
                channel: env_value("WORKER_DISCORD_CHANNEL"),
                token: env_value("WORKER_DISCORD_TOKEN"),
            },
            output_prefix: std::env::var("WORKER_OUTPUT_PREFIX")
                .unwrap_or_else(|_| DEFAULT_OUTPUT_PREFIX.to_string()),
        }
    }
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn env_timeout(name: &str, default_secs: u64) -> Option<Duration> {
    let secs = std::env::var(name)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default_secs);
    (secs > 0).then(|| Duration::from_secs(secs))
}

fn validate_file_prefix(prefix: &str) -> Result<(), validator::ValidationError> {
    let valid = prefix
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if valid && !prefix.starts_with('.') {
        Ok(())
    } else {
        Err(validator::ValidationError::new("file_prefix"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = WorkerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.upload_url, "https://upload.tost.ai/api/v1");
        assert!(config.ffmpeg_timeout.is_none());
    }

    #[test]
    fn test_rejects_bad_urls() {
        let config = WorkerConfig {
            upload_url: "not a url".into(),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = WorkerConfig {
            platform_notify_uri: Some("hooks.example.com".into()),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_output_prefix_must_be_a_plain_name() {
        for bad in ["", "../escape", "a/b", ".hidden"] {
            let config = WorkerConfig {
                output_prefix: bad.into(),
                ..Default::default()
            };
            assert!(config.validate().is_err(), "{bad:?} should be rejected");
        }
    }
}
