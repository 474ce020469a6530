use std::sync::Arc;
use std::time::Duration;

use repoforge_bus::{Bus, RpcClient};
use repoforge_protocol::rpc::{
    AddJobsToQueueParams, AutoRepoRemoveParams, BrokerNode, JobExistsParams, QueueStatusEntry,
};

use crate::error::CoordinatorError;
use crate::service::COORDINATOR_CHANNEL;

const CALL_TIMEOUT: Duration = Duration::from_secs(10);

/// Talks to the running `schedule` process's RPC surface. Used by the `web`
/// and `auto-repo-remove` CLI verbs, which run as separate processes from
/// the coordinator itself.
#[derive(Clone)]
pub struct CoordinatorRpc {
    bus: Arc<dyn Bus>,
}

impl CoordinatorRpc {
    pub fn new(bus: Arc<dyn Bus>) -> Self {
        Self { bus }
    }

    fn client(&self) -> RpcClient {
        RpcClient::new(self.bus.clone(), COORDINATOR_CHANNEL)
    }

    pub async fn add_jobs_to_queue(&self, params: &AddJobsToQueueParams) -> Result<(), CoordinatorError> {
        self.client()
            .call::<_, ()>("AddJobsToQueue", params, CALL_TIMEOUT)
            .await
            .map_err(Into::into)
    }

    pub async fn auto_repo_remove(&self, params: &AutoRepoRemoveParams) -> Result<(), CoordinatorError> {
        self.client()
            .call::<_, ()>("AutoRepoRemove", params, CALL_TIMEOUT)
            .await
            .map_err(Into::into)
    }

    pub async fn job_exists(&self, pkgbase: &str, timestamp: i64) -> Result<bool, CoordinatorError> {
        self.client()
            .call(
                "JobExists",
                &JobExistsParams { pkgbase: pkgbase.to_string(), timestamp },
                CALL_TIMEOUT,
            )
            .await
            .map_err(Into::into)
    }

    pub async fn get_queue(&self) -> Result<Vec<QueueStatusEntry>, CoordinatorError> {
        self.client()
            .call("GetQueue", &(), CALL_TIMEOUT)
            .await
            .map_err(Into::into)
    }

    pub async fn get_available_nodes(&self) -> Result<Vec<BrokerNode>, CoordinatorError> {
        self.client()
            .call("GetAvailableNodes", &(), CALL_TIMEOUT)
            .await
            .map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinator::Coordinator;
    use crate::nodes::FakeNodePresence;
    use repoforge_bus::FakeBus;
    use repoforge_database::DatabaseError;
    use repoforge_protocol::rpc::{
        AddToDbParams, AutoRepoRemoveDbParams, FetchUploadInfoResult, GenerateDestFillerFilesParams,
        SuccessResult,
    };
    use repoforge_protocol::JobKey;
    use repoforge_registry::{DeploymentNotifier, DeploymentOutcome, RepoRegistry};

    struct StubDatabase;

    #[async_trait::async_trait]
    impl repoforge_database::DatabaseClient for StubDatabase {
        async fn fetch_upload_info(&self) -> Result<FetchUploadInfoResult, DatabaseError> {
            unimplemented!()
        }
        async fn add_to_db(&self, _params: AddToDbParams) -> Result<SuccessResult, DatabaseError> {
            unimplemented!()
        }
        async fn generate_dest_filler_files(
            &self,
            _params: GenerateDestFillerFilesParams,
        ) -> Result<Vec<String>, DatabaseError> {
            unimplemented!()
        }
        async fn auto_repo_remove(
            &self,
            _params: AutoRepoRemoveDbParams,
        ) -> Result<SuccessResult, DatabaseError> {
            Ok(SuccessResult { success: true })
        }
    }

    struct NullDeployment;

    #[async_trait::async_trait]
    impl DeploymentNotifier for NullDeployment {
        async fn notify_deployment(
            &self,
            _key: &JobKey,
            _outcome: DeploymentOutcome,
        ) -> Result<(), repoforge_registry::RegistryError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn get_queue_round_trips_empty() {
        let bus: Arc<dyn Bus> = Arc::new(FakeBus::new());
        let coordinator = Arc::new(Coordinator::new(
            bus.clone(),
            Arc::new(RepoRegistry::default()),
            Arc::new(FakeNodePresence::new(Vec::new())),
            Arc::new(StubDatabase),
            Arc::new(NullDeployment),
            1,
            None,
            "registry.example/builder:latest".to_string(),
        ));
        tokio::spawn(crate::service::serve(coordinator, bus.clone()));

        let client = CoordinatorRpc::new(bus);
        let queue = client.get_queue().await.unwrap();
        assert!(queue.is_empty());
    }
}
