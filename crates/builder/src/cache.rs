use std::path::Path;
use std::time::{Duration, SystemTime};

use crate::error::BuilderError;

const MAX_CACHE_AGE: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// Remove every subdirectory of `srcdest/<target_repo>` whose `.timestamp`
/// marker is missing or older than 30 days. Run at the start of every build
/// on the same builder, so a directory a concurrent build is using is never
/// touched — this sweep only ever runs while holding the builder's
/// try-acquire mutex.
pub async fn sweep_source_cache(srcdest_root: &Path, now: SystemTime) -> Result<(), BuilderError> {
    let mut entries = match tokio::fs::read_dir(srcdest_root).await {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(err) => return Err(err.into()),
    };

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if !entry.file_type().await?.is_dir() {
            continue;
        }

        if is_stale(&path, now).await {
            tracing::debug!(path = %path.display(), "pruning stale source cache entry");
            tokio::fs::remove_dir_all(&path).await?;
        }
    }

    Ok(())
}

async fn is_stale(dir: &Path, now: SystemTime) -> bool {
    let timestamp_file = dir.join(".timestamp");
    let metadata = match tokio::fs::metadata(&timestamp_file).await {
        Ok(metadata) => metadata,
        Err(_) => return true,
    };
    let modified = match metadata.modified() {
        Ok(modified) => modified,
        Err(_) => return true,
    };
    now.duration_since(modified).unwrap_or(Duration::ZERO) > MAX_CACHE_AGE
}
