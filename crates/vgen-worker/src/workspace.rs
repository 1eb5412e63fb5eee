//! Per-job scratch directory.
//!
//! Every job gets its own directory under the configured work dir, so the
//! reference image, the frame dump and the output video never collide with
//! another job's files.

use std::path::{Path, PathBuf};

use tracing::debug;
use uuid::Uuid;
use vgen_media::{remove_dir_if_exists, MediaResult};

use crate::error::JobResult;

const REFERENCE_IMAGE: &str = "reference.png";
const MAX_ID_CHARS: usize = 64;

/// Scratch directory owned by one job.
#[derive(Debug)]
pub struct JobWorkspace {
    root: PathBuf,
}

impl JobWorkspace {
    /// Create `work_dir/job-<id>-<suffix>`.
    pub async fn create(work_dir: &Path, job_id: &str) -> JobResult<Self> {
        let suffix = Uuid::new_v4().simple().to_string();
        let root = work_dir.join(format!("job-{}-{}", sanitize_id(job_id), &suffix[..8]));

        tokio::fs::create_dir_all(&root).await?;
        debug!("Created job workspace {}", root.display());

        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Where the image stage persists its reference frame.
    pub fn reference_image_path(&self) -> PathBuf {
        self.root.join(REFERENCE_IMAGE)
    }

    /// Output video path, named after the resolved seed.
    pub fn output_path(&self, prefix: &str, seed: u64) -> PathBuf {
        self.root.join(format!("{}-{}.mp4", prefix, seed))
    }

    /// Remove the directory and anything left in it.
    pub async fn remove(&self) -> MediaResult<bool> {
        remove_dir_if_exists(&self.root).await
    }
}

fn sanitize_id(job_id: &str) -> String {
    let cleaned: String = job_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .take(MAX_ID_CHARS)
        .collect();

    if cleaned.is_empty() {
        "anon".to_string()
    } else {
        cleaned
    }
}
