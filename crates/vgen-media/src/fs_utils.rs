//! Filesystem helpers for job artifacts.

use std::io::ErrorKind;
use std::path::Path;
use tokio::fs;

use crate::error::MediaResult;

/// Delete a file, treating "already gone" as success.
///
/// Returns `true` when a file was actually removed.
pub async fn remove_file_if_exists(path: impl AsRef<Path>) -> MediaResult<bool> {
    let path = path.as_ref();

    match fs::remove_file(path).await {
        Ok(()) => {
            tracing::debug!("Removed {}", path.display());
            Ok(true)
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// Recursively delete a directory, treating "already gone" as success.
pub async fn remove_dir_if_exists(path: impl AsRef<Path>) -> MediaResult<bool> {
    let path = path.as_ref();

    match fs::remove_dir_all(path).await {
        Ok(()) => {
            tracing::debug!("Removed directory {}", path.display());
            Ok(true)
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}
