//! Delivery metadata carried alongside generation parameters.
//!
//! Callers historically signalled "use the platform default" by sending a
//! field's own name as its value (`"notify_uri": "notify_uri"`). That form is
//! still accepted on the wire, but it is normalised to `None` here so nothing
//! downstream compares against sentinel strings.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use url::Url;

use crate::error::{ValidationError, ValidationResult};

/// Keys stripped from `input` before it is read as generation parameters.
pub const DELIVERY_KEYS: [&str; 6] = [
    "notify_uri",
    "notify_token",
    "discord_id",
    "discord_channel",
    "discord_token",
    "job_id",
];

/// Delivery fields as they appear under `input`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DeliveryFields {
    pub job_id: String,
    /// Caller webhook; omitted, empty or `"notify_uri"` means none
    #[serde(default)]
    pub notify_uri: Option<String>,
    #[serde(default)]
    pub notify_token: Option<String>,
    #[serde(default)]
    pub discord_id: Option<String>,
    #[serde(default)]
    pub discord_channel: Option<String>,
    #[serde(default)]
    pub discord_token: Option<String>,
}

/// Discord routing for a job. Also used for the process-wide defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscordTarget {
    pub id: Option<String>,
    pub channel: Option<String>,
    pub token: Option<String>,
}

/// Resolved delivery metadata for one job.
#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryMetadata {
    pub job_id: String,
    /// Caller-supplied webhook, `None` when only the platform is notified
    pub notify_uri: Option<Url>,
    pub notify_token: Option<String>,
    pub discord: DiscordTarget,
}

impl DeliveryMetadata {
    /// Remove the delivery keys from `input` and resolve them.
    ///
    /// The keys are removed even when resolution fails, so the remainder can
    /// always be read as generation parameters.
    pub fn extract(
        input: &mut Map<String, Value>,
        discord_defaults: &DiscordTarget,
    ) -> ValidationResult<Self> {
        let mut taken = Map::new();
        for key in DELIVERY_KEYS {
            if let Some(value) = input.remove(key) {
                taken.insert(key.to_string(), value);
            }
        }

        let fields: DeliveryFields =
            serde_json::from_value(Value::Object(taken)).map_err(ValidationError::Delivery)?;
        fields.resolve(discord_defaults)
    }

    /// Caller webhook and its token, if one was supplied.
    pub fn caller_webhook(&self) -> Option<(&Url, Option<&str>)> {
        self.notify_uri
            .as_ref()
            .map(|uri| (uri, self.notify_token.as_deref()))
    }
}

impl DeliveryFields {
    pub fn resolve(self, discord_defaults: &DiscordTarget) -> ValidationResult<DeliveryMetadata> {
        if self.job_id.trim().is_empty() {
            return Err(ValidationError::invalid_field("job_id", "must not be empty"));
        }

        let notify_uri = explicit(self.notify_uri, "notify_uri")
            .map(|raw| parse_webhook_url(&raw))
            .transpose()?;

        Ok(DeliveryMetadata {
            job_id: self.job_id,
            notify_uri,
            notify_token: explicit(self.notify_token, "notify_token"),
            discord: DiscordTarget {
                id: explicit(self.discord_id, "discord_id")
                    .or_else(|| discord_defaults.id.clone()),
                channel: explicit(self.discord_channel, "discord_channel")
                    .or_else(|| discord_defaults.channel.clone()),
                token: explicit(self.discord_token, "discord_token")
                    .or_else(|| discord_defaults.token.clone()),
            },
        })
    }
}

/// Read the job id without consuming anything, for error reporting before
/// the payload has been resolved.
pub fn peek_job_id(input: &Map<String, Value>) -> Option<String> {
    input
        .get("job_id")
        .and_then(Value::as_str)
        .filter(|id| !id.trim().is_empty())
        .map(str::to_string)
}

/// Drop empty values and the legacy "use default" sentinel.
fn explicit(value: Option<String>, sentinel: &str) -> Option<String> {
    value.filter(|v| !v.is_empty() && v != sentinel)
}

fn parse_webhook_url(raw: &str) -> ValidationResult<Url> {
    let url = Url::parse(raw)
        .map_err(|e| ValidationError::invalid_field("notify_uri", e.to_string()))?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ValidationError::invalid_field(
            "notify_uri",
            format!("unsupported scheme `{}`", other),
        )),
    }
}
