//! Parameter/return DTOs for the Coordinator, Builder and Database RPC
//! surfaces. These are plain wire structs; the actual request/reply
//! transport lives in `repoforge-bus`.

use serde::{Deserialize, Serialize};

use crate::job::{BuildClass, SavableJob};

/// One package descriptor inside an `AddJobsToQueue` batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageSubmission {
    pub pkgbase: String,
    pub build_class: BuildClass,
    #[serde(default)]
    pub pkgnames: Vec<String>,
    #[serde(default)]
    pub dependencies: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddJobsToQueueParams {
    pub target_repo: String,
    pub source_repo: String,
    pub arch: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit: Option<String>,
    pub packages: Vec<PackageSubmission>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutoRepoRemoveParams {
    pub arch: String,
    pub repo: String,
    pub pkgbases: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobExistsParams {
    pub pkgbase: String,
    pub timestamp: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueEntryStatus {
    Active,
    Queued,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueStatusEntry {
    pub status: QueueEntryStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node: Option<String>,
    pub build_class: BuildClass,
    pub job_data: SavableJob,
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub live_log_url: Option<String>,
}

/// A builder node as seen by `GetAvailableNodes`/the presence subsystem.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerNode {
    pub id: String,
    /// Stable identifier with any per-process suffix stripped.
    pub pure_name: String,
    pub service: String,
    pub present: bool,
    pub build_class: u8,
    pub version: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtraRepo {
    pub name: String,
    pub servers: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetRepoWire {
    pub name: String,
    #[serde(default)]
    pub extra_repos: Vec<ExtraRepo>,
    #[serde(default)]
    pub extra_keyrings: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SshInfo {
    pub host: String,
    pub port: u16,
    pub user: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseUploadInfo {
    pub ssh: SshInfo,
    pub landing_zone: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadInfo {
    pub database: DatabaseUploadInfo,
}

/// Parameters the coordinator sends to `builder.BuildPackage`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildPackageParams {
    pub job: SavableJob,
    pub timestamp: i64,
    pub target_repo: TargetRepoWire,
    pub upload_info: UploadInfo,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddToDbParams {
    pub pkgbase: String,
    pub target_repo: String,
    pub source_repo: String,
    pub arch: String,
    pub pkgfiles: Vec<String>,
    pub builder_image: String,
    pub timestamp: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuccessResult {
    pub success: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateDestFillerFilesParams {
    pub target_repo: String,
    pub arch: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutoRepoRemoveDbParams {
    pub pkgbases: Vec<String>,
    pub arch: String,
    pub repo: String,
    pub builder_image: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchUploadInfoResult {
    pub database: DatabaseUploadInfo,
}
