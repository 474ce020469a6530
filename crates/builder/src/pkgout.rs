use std::path::{Path, PathBuf};

use crate::error::BuilderError;

/// Recursively clear `pkgout` and recreate it empty.
pub async fn clear_and_recreate(pkgout: &Path) -> Result<(), BuilderError> {
    clear(pkgout).await?;
    tokio::fs::create_dir_all(pkgout).await?;
    Ok(())
}

/// Clear `pkgout` without recreating it — used on the way out of a build so
/// the next build's `clear_and_recreate` starts from a clean slate.
pub async fn clear(pkgout: &Path) -> Result<(), BuilderError> {
    match tokio::fs::remove_dir_all(pkgout).await {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err.into()),
    }
}

/// Create a zero-byte placeholder for each filename the database component
/// reports as already present in the target repo, so the build tooling
/// skips re-producing them.
pub async fn create_filler_files(pkgout: &Path, filenames: &[String]) -> Result<(), BuilderError> {
    for name in filenames {
        tokio::fs::File::create(pkgout.join(name)).await?;
    }
    Ok(())
}

/// Every file directly inside `pkgout` with size > 0 — filters out the
/// filler placeholders created in [`create_filler_files`].
pub async fn real_output_files(pkgout: &Path) -> Result<Vec<PathBuf>, BuilderError> {
    let mut files = Vec::new();
    let mut entries = match tokio::fs::read_dir(pkgout).await {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(files),
        Err(err) => return Err(err.into()),
    };

    while let Some(entry) = entries.next_entry().await? {
        let metadata = entry.metadata().await?;
        if metadata.is_file() && metadata.len() > 0 {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn filler_files_are_excluded_from_real_output() {
        let dir = tempfile::tempdir().unwrap();
        create_filler_files(dir.path(), &["already-built.pkg.tar.zst".to_string()])
            .await
            .unwrap();
        tokio::fs::write(dir.path().join("fresh.pkg.tar.zst"), b"data").await.unwrap();

        let real = real_output_files(dir.path()).await.unwrap();
        assert_eq!(real, vec![dir.path().join("fresh.pkg.tar.zst")]);
    }

    #[tokio::test]
    async fn clear_and_recreate_leaves_an_empty_directory() {
        let parent = tempfile::tempdir().unwrap();
        let pkgout = parent.path().join("pkgout");
        tokio::fs::create_dir_all(&pkgout).await.unwrap();
        tokio::fs::write(pkgout.join("leftover"), b"x").await.unwrap();

        clear_and_recreate(&pkgout).await.unwrap();
        let remaining = real_output_files(&pkgout).await.unwrap();
        assert!(remaining.is_empty());
    }

    #[tokio::test]
    async fn clear_on_missing_directory_is_a_no_op() {
        let parent = tempfile::tempdir().unwrap();
        let pkgout = parent.path().join("does-not-exist");
        clear(&pkgout).await.unwrap();
    }
}
