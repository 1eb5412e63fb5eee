//! Job metrics.
//!
//! Recorded through the `metrics` facade. The worker runs one job per
//! process, so no exporter is installed here; an embedding runtime can
//! install its own recorder.

use metrics::{counter, histogram};

/// Metric names as constants for consistency.
pub mod names {
    pub const JOBS_TOTAL: &str = "vgen_jobs_total";
    pub const STAGE_DURATION_SECONDS: &str = "vgen_stage_duration_seconds";
    pub const JOB_DURATION_SECONDS: &str = "vgen_job_duration_seconds";
    pub const STAGE_FAILURES_TOTAL: &str = "vgen_stage_failures_total";
}

/// Record a finished job by outcome status and, for failures, error kind.
pub fn record_job(status: &str, failure_kind: Option<&str>, duration_secs: f64) {
    let labels = [
        ("status", status.to_string()),
        ("kind", failure_kind.unwrap_or("none").to_string()),
    ];
    counter!(names::JOBS_TOTAL, &labels).increment(1);

    let status_labels = [("status", status.to_string())];
    histogram!(names::JOB_DURATION_SECONDS, &status_labels).record(duration_secs);
}

/// Record which generation stage a failed job stopped at.
pub fn record_stage_failure(stage: &str) {
    let labels = [("stage", stage.to_string())];
    counter!(names::STAGE_FAILURES_TOTAL, &labels).increment(1);
}

/// Record how long one pipeline stage took.
pub fn record_stage_duration(stage: &str, duration_secs: f64) {
    let labels = [("stage", stage.to_string())];
    histogram!(names::STAGE_DURATION_SECONDS, &labels).record(duration_secs);
}
