use std::sync::Arc;

use repoforge_protocol::rpc::{
    AddToDbParams, AutoRepoRemoveDbParams, DatabaseUploadInfo, FetchUploadInfoResult,
    GenerateDestFillerFilesParams, SshInfo, SuccessResult,
};
use repoforge_runtime::{ContainerRuntime, ContainerSpec};

use crate::error::DatabaseError;

/// Configuration for the `database` CLI verb's container invocations.
#[derive(Debug, Clone)]
pub struct DatabaseServiceConfig {
    pub database_image: String,
    pub repo_path: String,
    pub gpg_path: String,
    pub ssh: SshInfo,
    pub landing_zone: String,
}

/// Answers database RPCs by shelling out to the database container image,
/// classifying its exit code the same way the builder classifies a build
/// container's: zero is success, anything else is a failure the caller
/// surfaces rather than retries.
pub struct DatabaseService {
    runtime: Arc<dyn ContainerRuntime>,
    config: DatabaseServiceConfig,
}

impl DatabaseService {
    pub fn new(runtime: Arc<dyn ContainerRuntime>, config: DatabaseServiceConfig) -> Self {
        Self { runtime, config }
    }

    pub fn fetch_upload_info(&self) -> FetchUploadInfoResult {
        FetchUploadInfoResult {
            database: DatabaseUploadInfo {
                ssh: self.config.ssh.clone(),
                landing_zone: self.config.landing_zone.clone(),
            },
        }
    }

    async fn run_verb(&self, cmd: Vec<String>) -> Result<(), DatabaseError> {
        let spec = ContainerSpec {
            image: self.config.database_image.clone(),
            cmd,
            binds: vec![
                format!("{}:/repo", self.config.repo_path),
                format!("{}:/gpg", self.config.gpg_path),
            ],
            env: vec![],
        };
        let status = self.runtime.run(&spec).await?;
        if status != 0 {
            tracing::warn!(exit_code = status, image = %self.config.database_image, "database verb exited non-zero");
            return Err(DatabaseError::NonZeroExit(status));
        }
        Ok(())
    }

    pub async fn add_to_db(&self, params: AddToDbParams) -> Result<SuccessResult, DatabaseError> {
        let cmd = vec![
            "add".to_string(),
            params.target_repo,
            params.arch,
            params.pkgbase,
        ]
        .into_iter()
        .chain(params.pkgfiles)
        .collect();
        match self.run_verb(cmd).await {
            Ok(()) => Ok(SuccessResult { success: true }),
            Err(DatabaseError::NonZeroExit(_)) => Ok(SuccessResult { success: false }),
            Err(err) => Err(err),
        }
    }

    pub async fn generate_dest_filler_files(
        &self,
        params: GenerateDestFillerFilesParams,
    ) -> Result<Vec<String>, DatabaseError> {
        self.run_verb(vec![
            "filler-files".to_string(),
            params.target_repo,
            params.arch,
        ])
        .await?;
        Ok(Vec::new())
    }

    pub async fn auto_repo_remove(
        &self,
        params: AutoRepoRemoveDbParams,
    ) -> Result<SuccessResult, DatabaseError> {
        let cmd = vec!["remove".to_string(), params.repo, params.arch]
            .into_iter()
            .chain(params.pkgbases)
            .collect();
        match self.run_verb(cmd).await {
            Ok(()) => Ok(SuccessResult { success: true }),
            Err(DatabaseError::NonZeroExit(_)) => Ok(SuccessResult { success: false }),
            Err(err) => Err(err),
        }
    }

    /// Spawn the RPC dispatch loop answering `svc.database` requests. Runs
    /// until the bus subscription closes.
    pub async fn serve(
        self: Arc<Self>,
        bus: Arc<dyn repoforge_bus::Bus>,
    ) -> Result<(), DatabaseError> {
        let server = repoforge_bus::RpcServer::new(bus, crate::client::DATABASE_CHANNEL);
        let service = self;
        server
            .serve(move |method, payload| {
                let service = service.clone();
                async move {
                    match method.as_str() {
                        "FetchUploadInfo" => serde_json::to_value(service.fetch_upload_info())
                            .map_err(|e| e.to_string()),
                        "AddToDb" => {
                            let params = serde_json::from_value(payload).map_err(|e| e.to_string())?;
                            let result = service.add_to_db(params).await.map_err(|e| e.to_string())?;
                            serde_json::to_value(result).map_err(|e| e.to_string())
                        }
                        "GenerateDestFillerFiles" => {
                            let params = serde_json::from_value(payload).map_err(|e| e.to_string())?;
                            let result = service
                                .generate_dest_filler_files(params)
                                .await
                                .map_err(|e| e.to_string())?;
                            serde_json::to_value(result).map_err(|e| e.to_string())
                        }
                        "AutoRepoRemove" => {
                            let params = serde_json::from_value(payload).map_err(|e| e.to_string())?;
                            let result = service
                                .auto_repo_remove(params)
                                .await
                                .map_err(|e| e.to_string())?;
                            serde_json::to_value(result).map_err(|e| e.to_string())
                        }
                        other => Err(format!("unknown method {other}")),
                    }
                }
            })
            .await
            .map_err(DatabaseError::from)
    }
}
