//! Job outcome returned to the invoker and posted to webhooks.

use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Terminal status of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum JobStatus {
    /// Video generated, uploaded and announced
    Done,
    /// Any stage failed
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Done => "DONE",
            JobStatus::Failed => "FAILED",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `{jobId, result, status}` object.
///
/// The same shape is returned to the runtime and posted to every webhook.
/// `job_id` is `None` only when the payload was rejected before a job id
/// could be read from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct JobOutcome {
    pub job_id: Option<String>,
    pub result: String,
    pub status: JobStatus,
}

/// Body posted to notification endpoints.
pub type NotificationPayload = JobOutcome;

impl JobOutcome {
    /// Successful job: `result` carries the public URL of the video.
    pub fn done(job_id: impl Into<String>, result_url: impl Into<String>) -> Self {
        Self {
            job_id: Some(job_id.into()),
            result: result_url.into(),
            status: JobStatus::Done,
        }
    }

    /// Failed job: `result` is `FAILED: <message>`.
    pub fn failed(job_id: Option<String>, message: impl fmt::Display) -> Self {
        Self {
            job_id,
            result: format!("FAILED: {}", message),
            status: JobStatus::Failed,
        }
    }

    pub fn is_done(&self) -> bool {
        self.status == JobStatus::Done
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_done_serializes_camel_case() {
        let outcome = JobOutcome::done("abc", "https://files.example/v.mp4");
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "jobId": "abc",
                "result": "https://files.example/v.mp4",
                "status": "DONE"
            })
        );
    }

    #[test]
    fn test_failed_prefixes_message() {
        let outcome = JobOutcome::failed(Some("abc".into()), "sampler exploded");
        assert_eq!(outcome.result, "FAILED: sampler exploded");
        assert_eq!(outcome.status, JobStatus::Failed);
        assert!(!outcome.is_done());
    }

    #[test]
    fn test_failed_without_job_id_serializes_null() {
        let outcome = JobOutcome::failed(None, "no input");
        let json = serde_json::to_value(&outcome).unwrap();
        assert!(json["jobId"].is_null());
        assert_eq!(json["status"], "FAILED");
    }
}
