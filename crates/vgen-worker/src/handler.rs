//! Job handler.
//!
//! [`JobHandler::handle`] is the single entry point for a job. It never
//! returns an error: every failure becomes a `FAILED` [`JobOutcome`], the
//! webhooks are told about it on a best-effort basis, and the job's files are
//! removed on every exit path.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, warn, Instrument};
use url::Url;
use validator::Validate;
use vgen_backend::GenerationBackend;
use vgen_delivery::{Notifier, UploadClient, WebhookTarget};
use vgen_media::{remove_file_if_exists, FrameEncoder};
use vgen_models::{input_object, peek_job_id, DeliveryMetadata, GenerationRequest, JobOutcome};

use crate::config::WorkerConfig;
use crate::error::{JobError, JobResult};
use crate::logging::JobLogger;
use crate::metrics;
use crate::pipeline::Pipeline;
use crate::workspace::JobWorkspace;

const OPERATION: &str = "generate_video";

/// State gathered while a job runs, needed to report failures and clean up.
///
/// Every field starts unset and is filled in as soon as it is known, so the
/// failure path can use whatever the job got as far as.
#[derive(Debug, Default)]
pub struct JobContext {
    pub job_id: Option<String>,
    pub delivery: Option<DeliveryMetadata>,
    pub workspace: Option<JobWorkspace>,
    pub artifact: Option<PathBuf>,
    /// Webhooks that accepted a DONE notification for this job
    pub notified: Vec<Url>,
}

impl JobContext {
    /// Caller webhook from the job's delivery fields, if any.
    pub fn caller_target(&self) -> Option<WebhookTarget> {
        self.delivery
            .as_ref()
            .and_then(DeliveryMetadata::caller_webhook)
            .map(|(url, token)| WebhookTarget::new(url.clone(), token.map(str::to_string)))
    }

    /// Delete the artifact and the job workspace.
    ///
    /// Safe to call when nothing was created and safe to call twice.
    pub async fn cleanup(&mut self) {
        if let Some(artifact) = self.artifact.take() {
            match remove_file_if_exists(&artifact).await {
                Ok(true) => debug!("Removed artifact {}", artifact.display()),
                Ok(false) => {}
                Err(e) => warn!("Failed to remove artifact {}: {}", artifact.display(), e),
            }
        }

        if let Some(workspace) = self.workspace.take() {
            if let Err(e) = workspace.remove().await {
                warn!(
                    "Failed to remove workspace {}: {}",
                    workspace.root().display(),
                    e
                );
            }
        }
    }
}

/// Runs one job at a time against a shared backend.
pub struct JobHandler {
    config: WorkerConfig,
    pipeline: Pipeline,
    uploader: UploadClient,
    notifier: Notifier,
    // the backend holds one set of model contexts
    running: Mutex<()>,
}

impl JobHandler {
    pub fn new(
        config: WorkerConfig,
        backend: Arc<dyn GenerationBackend>,
        encoder: Arc<dyn FrameEncoder>,
    ) -> JobResult<Self> {
        config
            .validate()
            .map_err(|e| JobError::config(e.to_string()))?;

        let uploader = UploadClient::new(&config.upload_url, config.upload_timeout)
            .map_err(|e| JobError::config(e.to_string()))?;

        let platform = config
            .platform_notify_uri
            .as_deref()
            .map(|uri| WebhookTarget::parse(uri, config.platform_notify_token.clone()))
            .transpose()
            .map_err(|e| JobError::config(e.to_string()))?;
        if platform.is_none() {
            warn!("WORKER_NOTIFY_URI is not set, jobs will only notify caller webhooks");
        }
        let notifier = Notifier::new(platform, config.notify_timeout)
            .map_err(|e| JobError::config(e.to_string()))?;

        Ok(Self {
            config,
            pipeline: Pipeline::new(backend, encoder),
            uploader,
            notifier,
            running: Mutex::new(()),
        })
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Handle a raw JSON job payload.
    pub async fn handle_json(&self, raw: &str) -> JobOutcome {
        match serde_json::from_str(raw) {
            Ok(payload) => self.handle(payload).await,
            Err(e) => {
                let _running = self.running.lock().await;
                self.finish(
                    Err(JobError::MalformedPayload(e)),
                    JobContext::default(),
                    Instant::now(),
                )
                .await
            }
        }
    }

    /// Handle a job payload of the form `{"input": {...}}`.
    pub async fn handle(&self, payload: Value) -> JobOutcome {
        let _running = self.running.lock().await;
        let started = Instant::now();
        let mut ctx = JobContext::default();

        let result = self.run(payload, &mut ctx).await;
        self.finish(result, ctx, started).await
    }

    async fn run(&self, mut payload: Value, ctx: &mut JobContext) -> JobResult<String> {
        let input = input_object(&mut payload)?;

        // best effort, so a job that fails validation can still be reported
        ctx.job_id = peek_job_id(input);

        let delivery = DeliveryMetadata::extract(input, &self.config.discord_defaults)?;
        ctx.job_id = Some(delivery.job_id.clone());
        ctx.delivery = Some(delivery);

        let request = GenerationRequest::from_input(input)?;

        let logger = JobLogger::new(ctx.job_id.as_deref(), OPERATION);
        let span = logger.create_span();
        self.execute(&request, ctx, &logger).instrument(span).await
    }

    async fn execute(
        &self,
        request: &GenerationRequest,
        ctx: &mut JobContext,
        logger: &JobLogger,
    ) -> JobResult<String> {
        logger.log_start(&format!(
            "{}x{}, {} frames, seed {}",
            request.width, request.height, request.frame_count, request.seed
        ));

        let workspace = JobWorkspace::create(&self.config.work_dir, logger.job_id()).await?;
        let reference = workspace.reference_image_path();
        let output = workspace.output_path(&self.config.output_prefix, request.seed);
        ctx.workspace = Some(workspace);
        // registered before encoding so a partial file is removed too
        ctx.artifact = Some(output.clone());

        self.pipeline.run(request, &reference, &output, logger).await?;

        logger.log_progress("uploading video");
        let url = self
            .uploader
            .upload(&output)
            .await
            .map_err(JobError::Upload)?;

        let done = JobOutcome::done(logger.job_id(), url.clone());
        let caller = ctx.caller_target();
        let report = self.notifier.notify(&done, caller.as_ref(), &[]).await;
        ctx.notified = report.accepted.clone();

        // the video is already uploaded, a receiver's error status does not undo that
        for rejected in &report.rejected {
            logger.log_warning(&format!("completion notification rejected: {}", rejected));
        }
        if let Some(e) = report.into_transport_error() {
            return Err(JobError::Notify(e));
        }

        logger.log_completion(&url);
        Ok(url)
    }

    async fn finish(
        &self,
        result: JobResult<String>,
        mut ctx: JobContext,
        started: Instant,
    ) -> JobOutcome {
        let (outcome, failure_kind) = match result {
            Ok(url) => (
                JobOutcome::done(ctx.job_id.clone().unwrap_or_default(), url),
                None,
            ),
            Err(e) => {
                let logger = JobLogger::new(ctx.job_id.as_deref(), OPERATION);
                logger.log_error(&e.to_string());
                if let Some(stage) = e.stage() {
                    metrics::record_stage_failure(stage.as_str());
                }

                let outcome = JobOutcome::failed(ctx.job_id.clone(), &e);
                let caller = ctx.caller_target();
                let report = self
                    .notifier
                    .notify(&outcome, caller.as_ref(), &ctx.notified)
                    .await;
                for notify_err in report.rejected.iter().chain(&report.unreachable) {
                    logger.log_warning(&format!(
                        "failure notification not delivered: {}",
                        notify_err
                    ));
                }
                (outcome, Some(e.kind()))
            }
        };

        ctx.cleanup().await;
        metrics::record_job(
            outcome.status.as_str(),
            failure_kind,
            started.elapsed().as_secs_f64(),
        );

        outcome
    }
}
