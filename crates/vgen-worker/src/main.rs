//! Worker binary: runs one job and prints its outcome.
//!
//! Usage: `vgen-worker [PAYLOAD_FILE]` reads the job payload from the file or
//! from stdin. `vgen-worker --schema` prints the payload JSON schema.

use std::process::ExitCode;
use std::sync::Arc;

use tokio::io::AsyncReadExt;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use vgen_backend::RemoteBackend;
use vgen_media::{FfmpegFrameEncoder, FfmpegRunner};
use vgen_worker::{JobHandler, WorkerConfig};

#[tokio::main]
async fn main() -> ExitCode {
    let mut args = std::env::args().skip(1);
    let arg = args.next();

    if arg.as_deref() == Some("--schema") {
        return match serde_json::to_string_pretty(&vgen_models::payload_schema()) {
            Ok(schema) => {
                println!("{}", schema);
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("failed to render schema: {}", e);
                ExitCode::FAILURE
            }
        };
    }

    // Install rustls crypto provider (required for TLS/HTTPS)
    let tls_installed = rustls::crypto::ring::default_provider()
        .install_default()
        .is_ok();

    // Load environment variables
    dotenvy::dotenv().ok();

    init_tracing();

    if !tls_installed {
        warn!("rustls crypto provider was already installed");
    }

    info!("Starting vgen-worker");

    let config = WorkerConfig::from_env();
    info!(
        work_dir = %config.work_dir.display(),
        upload_url = %config.upload_url,
        platform_webhook = config.platform_notify_uri.is_some(),
        "Worker config loaded"
    );

    let backend = match RemoteBackend::from_env() {
        Ok(b) => b,
        Err(e) => {
            error!("Failed to create inference backend: {}", e);
            return ExitCode::from(2);
        }
    };
    info!("Using inference service at {}", backend.base_url());

    let encoder = FfmpegFrameEncoder::new(FfmpegRunner::new().with_timeout(config.ffmpeg_timeout));

    let handler = match JobHandler::new(config, Arc::new(backend), Arc::new(encoder)) {
        Ok(h) => h,
        Err(e) => {
            error!("Failed to create job handler: {}", e);
            return ExitCode::from(2);
        }
    };

    let raw = match read_payload(arg.as_deref()).await {
        Ok(raw) => raw,
        Err(e) => {
            error!("Failed to read job payload: {}", e);
            return ExitCode::from(2);
        }
    };

    let outcome = handler.handle_json(&raw).await;

    match serde_json::to_string(&outcome) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            error!("Failed to serialize job outcome: {}", e);
            return ExitCode::FAILURE;
        }
    }

    if outcome.is_done() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

/// Initialize tracing with colored output for dev, JSON for production.
///
/// Logs go to stderr; stdout carries only the job outcome.
fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("vgen_worker=info,vgen_media=info,vgen_backend=info,vgen_delivery=info,warn")
    });

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
}

async fn read_payload(path: Option<&str>) -> std::io::Result<String> {
    match path {
        Some(path) => tokio::fs::read_to_string(path).await,
        None => {
            let mut raw = String::new();
            tokio::io::stdin().read_to_string(&mut raw).await?;
            Ok(raw)
        }
    }
}
