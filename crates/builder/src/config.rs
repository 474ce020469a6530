use std::path::PathBuf;

/// Per-node configuration the builder agent needs outside of what arrives
/// in a `BuildPackageParams` call — host paths, the image to run, and the
/// exit-code sentinels the classifier checks against.
#[derive(Debug, Clone)]
pub struct BuilderConfig {
    pub hostname: String,
    pub builder_image: String,
    pub build_timeout_secs: u64,
    pub ci_code_skip: i64,
    pub shared_path: PathBuf,
    pub pkgbuilds_path: PathBuf,
}

impl BuilderConfig {
    pub fn srcdest_path(&self, target_repo: &str) -> PathBuf {
        self.shared_path.join("srcdest").join(target_repo)
    }

    pub fn pkgout_path(&self) -> PathBuf {
        self.shared_path.join("pkgout")
    }
}
