use std::path::Path;
use std::process::Command;

use vgen_backend::RemoteBackend;
use vgen_worker::WorkerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("failed to install rustls crypto provider"))?;
    dotenvy::dotenv().ok();

    let config = WorkerConfig::from_env();

    println!(
        "worker-selfcheck: starting with work_dir={}",
        config.work_dir.display()
    );
    ensure_config(&config)?;
    ensure_workdir(&config.work_dir).await?;
    ensure_ffmpeg()?;
    ensure_backend().await?;

    if config.platform_notify_uri.is_none() {
        println!("worker-selfcheck: warning: WORKER_NOTIFY_URI is not set");
    }

    println!("worker-selfcheck: ok");
    Ok(())
}

fn ensure_config(config: &WorkerConfig) -> anyhow::Result<()> {
    use validator::Validate;

    config
        .validate()
        .map_err(|e| anyhow::anyhow!("invalid worker config: {}", e))
}

async fn ensure_workdir<P: AsRef<Path>>(path: P) -> anyhow::Result<()> {
    let path = path.as_ref();
    tokio::fs::create_dir_all(path).await?;

    let probe = path.join(".selfcheck");
    tokio::fs::write(&probe, b"ok").await?;
    tokio::fs::remove_file(&probe).await?;
    Ok(())
}

fn ensure_ffmpeg() -> anyhow::Result<()> {
    for tool in ["ffmpeg", "ffprobe"] {
        let output = Command::new(tool)
            .arg("-version")
            .output()
            .map_err(|e| anyhow::anyhow!("{} not available: {}", tool, e))?;

        if !output.status.success() {
            return Err(anyhow::anyhow!(
                "{} -version failed: {:?}",
                tool,
                output.status
            ));
        }
    }
    Ok(())
}

async fn ensure_backend() -> anyhow::Result<()> {
    let backend = RemoteBackend::from_env()?;
    if !backend.health_check().await? {
        return Err(anyhow::anyhow!(
            "inference service at {} is not healthy",
            backend.base_url()
        ));
    }
    Ok(())
}
