//! Job status webhooks.
//!
//! Every outcome is posted to the platform webhook. When the caller supplied
//! its own `notify_uri`, the same payload is posted there too.

use std::time::Duration;

use reqwest::header::AUTHORIZATION;
use reqwest::Client;
use tracing::{debug, warn};
use url::Url;
use vgen_models::NotificationPayload;

use crate::error::{DeliveryError, DeliveryResult};

/// A webhook endpoint and the value of its `Authorization` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookTarget {
    pub url: Url,
    pub token: Option<String>,
}

impl WebhookTarget {
    pub fn new(url: Url, token: Option<String>) -> Self {
        Self { url, token }
    }

    /// Parse a target from configuration strings.
    pub fn parse(url: &str, token: Option<String>) -> DeliveryResult<Self> {
        let url = Url::parse(url)
            .map_err(|e| DeliveryError::config(format!("webhook URL {}: {}", url, e)))?;
        Ok(Self { url, token })
    }
}

/// How each webhook answered one notification.
#[derive(Debug, Default)]
pub struct NotifyReport {
    /// Targets that answered with a 2xx status
    pub accepted: Vec<Url>,
    /// Targets that answered with an error status
    pub rejected: Vec<DeliveryError>,
    /// Targets that could not be reached
    pub unreachable: Vec<DeliveryError>,
}

impl NotifyReport {
    pub fn delivered(&self) -> usize {
        self.accepted.len()
    }

    pub fn is_clean(&self) -> bool {
        self.rejected.is_empty() && self.unreachable.is_empty()
    }

    /// First error from a target that could not be reached.
    pub fn into_transport_error(self) -> Option<DeliveryError> {
        self.unreachable.into_iter().next()
    }
}

/// Posts [`NotificationPayload`]s to the platform and caller webhooks.
#[derive(Clone)]
pub struct Notifier {
    http: Client,
    platform: Option<WebhookTarget>,
}

impl Notifier {
    pub fn new(platform: Option<WebhookTarget>, timeout: Option<Duration>) -> DeliveryResult<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            http: builder.build()?,
            platform,
        })
    }

    pub fn platform(&self) -> Option<&WebhookTarget> {
        self.platform.as_ref()
    }

    /// Post `payload` to the platform webhook and, if given, the caller's.
    ///
    /// Every target is attempted regardless of how the others answered.
    /// Targets listed in `skip` are left out.
    pub async fn notify(
        &self,
        payload: &NotificationPayload,
        caller: Option<&WebhookTarget>,
        skip: &[Url],
    ) -> NotifyReport {
        let mut report = NotifyReport::default();

        if self.platform.is_none() {
            warn!("No platform webhook configured, skipping platform notification");
        }

        let targets = self.platform.iter().chain(caller);
        for target in targets {
            if skip.contains(&target.url) {
                debug!(url = %target.url, "Webhook already notified for this job, skipping");
                continue;
            }

            match self.post(target, payload).await {
                Ok(()) => report.accepted.push(target.url.clone()),
                Err(e) if e.is_http_status() => report.rejected.push(e),
                Err(e) => report.unreachable.push(e),
            }
        }

        report
    }

    async fn post(&self, target: &WebhookTarget, payload: &NotificationPayload) -> DeliveryResult<()> {
        let mut request = self.http.post(target.url.clone()).json(payload);
        if let Some(token) = &target.token {
            request = request.header(AUTHORIZATION, token);
        }

        let response = request.send().await.map_err(|e| {
            warn!(url = %target.url, error = %e, "Webhook request failed");
            DeliveryError::Http(e)
        })?;

        let status = response.status();
        if !status.is_success() {
            warn!(url = %target.url, status = status.as_u16(), "Webhook rejected notification");
            return Err(DeliveryError::NotifyFailed {
                url: target.url.to_string(),
                status: status.as_u16(),
            });
        }

        debug!(url = %target.url, status = %payload.status, "Webhook notified");
        Ok(())
    }
}
