use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use repoforge_protocol::rpc::SshInfo;
use tokio::process::Command;

use crate::error::BuilderError;

/// Recursively uploads a build's output directory to the database host's
/// landing zone. Modeled as a trait, keeping the SSH wire protocol itself
/// opaque, rather than pulling in an SSH client library no example in the
/// retrieval pack depends on; the production implementation shells out to
/// the system's own `scp`, which already handles host-key checking and
/// auth the same way an operator's manual upload would.
#[async_trait]
pub trait UploadClient: Send + Sync {
    /// Upload every entry under `local_dir` into `landing_zone` on
    /// `ssh.host`. Returns the buffered client stderr/debug output so the
    /// caller can dump it on failure — never to the build log on success.
    async fn upload_dir(
        &self,
        local_dir: &Path,
        ssh: &SshInfo,
        landing_zone: &str,
    ) -> Result<String, BuilderError>;
}

/// Shells out to `scp -r` with a key-based session, keeping the upload
/// path free of an SSH crate dependency.
pub struct ScpUploadClient {
    identity_file: Option<String>,
}

impl ScpUploadClient {
    pub fn new(identity_file: Option<String>) -> Self {
        Self { identity_file }
    }
}

#[async_trait]
impl UploadClient for ScpUploadClient {
    async fn upload_dir(
        &self,
        local_dir: &Path,
        ssh: &SshInfo,
        landing_zone: &str,
    ) -> Result<String, BuilderError> {
        let mut cmd = Command::new("scp");
        cmd.arg("-r")
            .arg("-P")
            .arg(ssh.port.to_string())
            .arg("-o")
            .arg("BatchMode=yes");
        if let Some(identity) = &self.identity_file {
            cmd.arg("-i").arg(identity);
        }
        cmd.arg(local_dir)
            .arg(format!("{}@{}:{}", ssh.user, ssh.host, landing_zone));

        let output = cmd.output().await?;
        let debug_log = String::from_utf8_lossy(&output.stderr).into_owned();
        if !output.status.success() {
            return Err(BuilderError::Transient(format!(
                "scp exited with {:?}: {debug_log}",
                output.status.code()
            )));
        }
        Ok(debug_log)
    }
}

/// In-memory `UploadClient` for builder-agent tests: records every call and
/// can be scripted to fail.
pub struct FakeUploadClient {
    calls: Mutex<Vec<String>>,
    should_fail: Mutex<bool>,
}

impl FakeUploadClient {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            should_fail: Mutex::new(false),
        }
    }

    pub fn set_should_fail(&self, fail: bool) {
        *self.should_fail.lock().unwrap() = fail;
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl Default for FakeUploadClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UploadClient for FakeUploadClient {
    async fn upload_dir(
        &self,
        local_dir: &Path,
        ssh: &SshInfo,
        landing_zone: &str,
    ) -> Result<String, BuilderError> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("{}@{}:{landing_zone}", ssh.user, ssh.host));
        if *self.should_fail.lock().unwrap() {
            return Err(BuilderError::Transient("fake upload failure".to_string()));
        }
        let _ = local_dir;
        Ok(String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ssh() -> SshInfo {
        SshInfo {
            host: "db.example".to_string(),
            port: 22,
            user: "builder".to_string(),
        }
    }

    #[tokio::test]
    async fn fake_upload_records_call() {
        let client = FakeUploadClient::new();
        client
            .upload_dir(Path::new("/tmp/pkgout"), &ssh(), "/landing")
            .await
            .unwrap();
        assert_eq!(client.calls(), vec!["builder@db.example:/landing".to_string()]);
    }

    #[tokio::test]
    async fn fake_upload_can_be_scripted_to_fail() {
        let client = FakeUploadClient::new();
        client.set_should_fail(true);
        let result = client.upload_dir(Path::new("/tmp/pkgout"), &ssh(), "/landing").await;
        assert!(result.is_err());
    }
}
