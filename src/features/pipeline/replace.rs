//! Swapping a finished stage output into place
//!
//! The media tool may still hold the file it just wrote for a moment after
//! exiting, especially on Windows. Instead of sleeping a fixed time, the swap
//! is retried with exponential backoff until a deadline.

use std::path::Path;
use std::time::{Duration, Instant};

use super::PipelineError;
use crate::features::settings::ReplaceSettings;

/// Move `src` over `dest`
///
/// Tries a plain rename first. If that fails while `dest` exists, `dest` is
/// deleted and the rename repeated. Failures are retried until
/// `max_wait_ms` has passed, then reported as `FileLocked`.
pub async fn replace_file(
    src: &Path,
    dest: &Path,
    policy: &ReplaceSettings,
) -> Result<(), PipelineError> {
    let started = Instant::now();
    let max_wait = Duration::from_millis(policy.max_wait_ms);
    let mut delay = Duration::from_millis(policy.initial_delay_ms.max(1));

    loop {
        let error = match try_replace(src, dest).await {
            Ok(()) => return Ok(()),
            Err(e) => e,
        };

        // Nothing to retry for if the stage output is gone
        if !tokio::fs::try_exists(src).await.unwrap_or(false) {
            return Err(PipelineError::Io(error));
        }

        let waited = started.elapsed();
        if waited + delay > max_wait {
            tracing::warn!("Giving up replacing {:?} after {:?}: {}", dest, waited, error);
            return Err(PipelineError::FileLocked {
                path: dest.to_path_buf(),
                waited,
            });
        }

        tracing::debug!("Replacing {:?} failed ({}), retrying in {:?}", dest, error, delay);
        tokio::time::sleep(delay).await;
        delay *= 2;
    }
}

async fn try_replace(src: &Path, dest: &Path) -> std::io::Result<()> {
    match tokio::fs::rename(src, dest).await {
        Ok(()) => Ok(()),
        Err(e) if tokio::fs::try_exists(dest).await.unwrap_or(false) => {
            tracing::debug!("Rename onto {:?} failed ({}), removing it first", dest, e);
            tokio::fs::remove_file(dest).await?;
            tokio::fs::rename(src, dest).await
        }
        Err(e) => Err(e),
    }
}

/// Copy `src` to a stage file and swap it into `dest`
pub async fn copy_into_place(
    src: &Path,
    temp: &Path,
    dest: &Path,
    policy: &ReplaceSettings,
) -> Result<u64, PipelineError> {
    let copied = match tokio::fs::copy(src, temp).await {
        Ok(copied) => copied,
        Err(e) => {
            discard(temp).await;
            return Err(e.into());
        }
    };
    if let Err(e) = replace_file(temp, dest, policy).await {
        discard(temp).await;
        return Err(e);
    }
    Ok(copied)
}

/// Remove a leftover stage file
pub async fn discard(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => tracing::debug!("Removed stage file {:?}", path),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!("Failed to remove stage file {:?}: {}", path, e),
    }
}
