//! Sample asset fetcher.
//!
//! `ensure_local` is idempotent: a path that already exists is a no-op.
//! Downloads stream chunk-by-chunk into a sibling `.part` file which is
//! renamed into place only once complete, so an interrupted fetch never
//! leaves a truncated asset that later runs would mistake for a good one.
//! The `.part` sibling is removed when the download fails partway.
//!
//! Any network, HTTP, or filesystem failure here is a fatal [`Fetch`] error,
//! surfaced unmodified — retries are a caller decision, not this layer's.
//!
//! [`Fetch`]: crate::error::PipelineError::Fetch

use std::io::Write;
use std::path::Path;

use tracing::info;

use crate::error::{PipelineError, Result};

/// Download `url` to `path` unless `path` already exists.
///
/// Returns `true` when a download happened.
pub async fn ensure_local(url: &str, path: &Path) -> Result<bool> {
    if path.exists() {
        info!(path = %path.display(), "Asset already present — skipping fetch");
        return Ok(false);
    }

    info!(url, path = %path.display(), "Downloading sample asset");

    let response = reqwest::get(url)
        .await
        .and_then(|r| r.error_for_status())
        .map_err(|e| PipelineError::Fetch(format!("{url}: {e}")))?;

    let part_path = path.with_extension("part");
    let mut file = std::fs::File::create(&part_path)
        .map_err(|e| PipelineError::Fetch(format!("{}: {e}", part_path.display())))?;

    // A failure mid-stream must not strand the partial file: later runs key
    // idempotency off the final path, so a stale sibling would only rot.
    let bytes_written = match stream_body(response, &mut file, url, &part_path).await {
        Ok(n) => n,
        Err(e) => {
            drop(file);
            let _ = std::fs::remove_file(&part_path);
            return Err(e);
        }
    };
    drop(file);

    std::fs::rename(&part_path, path)
        .map_err(|e| PipelineError::Fetch(format!("{}: {e}", path.display())))?;

    info!(path = %path.display(), bytes = bytes_written, "Asset downloaded");
    Ok(true)
}

async fn stream_body(
    mut response: reqwest::Response,
    file: &mut std::fs::File,
    url: &str,
    part_path: &Path,
) -> Result<u64> {
    let mut bytes_written = 0u64;
    while let Some(chunk) = response
        .chunk()
        .await
        .map_err(|e| PipelineError::Fetch(format!("{url}: {e}")))?
    {
        file.write_all(&chunk)
            .map_err(|e| PipelineError::Fetch(format!("{}: {e}", part_path.display())))?;
        bytes_written += chunk.len() as u64;
    }
    file.flush()
        .map_err(|e| PipelineError::Fetch(format!("{}: {e}", part_path.display())))?;
    Ok(bytes_written)
}
