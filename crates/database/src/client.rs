use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use repoforge_bus::{Bus, RpcClient};
use repoforge_protocol::rpc::{
    AddToDbParams, AutoRepoRemoveDbParams, FetchUploadInfoResult, GenerateDestFillerFilesParams,
    SuccessResult,
};

use crate::error::DatabaseError;

/// Inbound channel the database component listens on for RPC requests.
pub const DATABASE_CHANNEL: &str = "svc.database";

const CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// The four operations the coordinator and builder agent need from the
/// database component. Out of scope to implement fully here; this is the
/// consumer-side contract.
#[async_trait]
pub trait DatabaseClient: Send + Sync {
    async fn fetch_upload_info(&self) -> Result<FetchUploadInfoResult, DatabaseError>;

    async fn add_to_db(&self, params: AddToDbParams) -> Result<SuccessResult, DatabaseError>;

    async fn generate_dest_filler_files(
        &self,
        params: GenerateDestFillerFilesParams,
    ) -> Result<Vec<String>, DatabaseError>;

    async fn auto_repo_remove(
        &self,
        params: AutoRepoRemoveDbParams,
    ) -> Result<SuccessResult, DatabaseError>;
}

/// `DatabaseClient` over the bus, calling the database component's RPC
/// endpoint.
pub struct BusDatabaseClient {
    rpc: RpcClient,
}

impl BusDatabaseClient {
    pub fn new(bus: Arc<dyn Bus>) -> Self {
        Self {
            rpc: RpcClient::new(bus, DATABASE_CHANNEL),
        }
    }
}

#[async_trait]
impl DatabaseClient for BusDatabaseClient {
    async fn fetch_upload_info(&self) -> Result<FetchUploadInfoResult, DatabaseError> {
        Ok(self
            .rpc
            .call("FetchUploadInfo", &(), CALL_TIMEOUT)
            .await?)
    }

    async fn add_to_db(&self, params: AddToDbParams) -> Result<SuccessResult, DatabaseError> {
        Ok(self.rpc.call("AddToDb", &params, CALL_TIMEOUT).await?)
    }

    async fn generate_dest_filler_files(
        &self,
        params: GenerateDestFillerFilesParams,
    ) -> Result<Vec<String>, DatabaseError> {
        Ok(self
            .rpc
            .call("GenerateDestFillerFiles", &params, CALL_TIMEOUT)
            .await?)
    }

    async fn auto_repo_remove(
        &self,
        params: AutoRepoRemoveDbParams,
    ) -> Result<SuccessResult, DatabaseError> {
        Ok(self
            .rpc
            .call("AutoRepoRemove", &params, CALL_TIMEOUT)
            .await?)
    }
}
