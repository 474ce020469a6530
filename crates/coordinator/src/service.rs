use std::sync::Arc;

use repoforge_bus::{Bus, RpcServer};
use repoforge_protocol::rpc::{AddJobsToQueueParams, AutoRepoRemoveParams, JobExistsParams};
use serde_json::Value;

use crate::coordinator::Coordinator;
use crate::error::CoordinatorError;

/// Inbound channel the running `schedule` process listens on. The `web` and
/// `auto-repo-remove` CLI verbs are separate processes and reach the
/// coordinator only through this RPC surface.
pub const COORDINATOR_CHANNEL: &str = "svc.coordinator";

/// Serve `AddJobsToQueue`/`AutoRepoRemove`/`JobExists`/`GetQueue`/
/// `GetAvailableNodes` over the bus until the subscription closes.
pub async fn serve(coordinator: Arc<Coordinator>, bus: Arc<dyn Bus>) -> Result<(), CoordinatorError> {
    let server = RpcServer::new(bus, COORDINATOR_CHANNEL);
    server
        .serve(move |method, payload| {
            let coordinator = coordinator.clone();
            async move { dispatch(&coordinator, &method, payload).await }
        })
        .await
        .map_err(|err| CoordinatorError::Upstream(err.to_string()))
}

async fn dispatch(coordinator: &Arc<Coordinator>, method: &str, payload: Value) -> Result<Value, String> {
    match method {
        "AddJobsToQueue" => {
            let params: AddJobsToQueueParams =
                serde_json::from_value(payload).map_err(|err| err.to_string())?;
            coordinator
                .add_jobs_to_queue(params)
                .await
                .map_err(|err| err.to_string())?;
            Ok(Value::Null)
        }
        "AutoRepoRemove" => {
            let params: AutoRepoRemoveParams =
                serde_json::from_value(payload).map_err(|err| err.to_string())?;
            coordinator
                .auto_repo_remove(params)
                .await
                .map_err(|err| err.to_string())?;
            Ok(Value::Null)
        }
        "JobExists" => {
            let params: JobExistsParams = serde_json::from_value(payload).map_err(|err| err.to_string())?;
            let exists = coordinator.job_exists(&params.pkgbase, params.timestamp).await;
            serde_json::to_value(exists).map_err(|err| err.to_string())
        }
        "GetQueue" => {
            let queue = coordinator.get_queue().await;
            serde_json::to_value(queue).map_err(|err| err.to_string())
        }
        "GetAvailableNodes" => {
            let nodes = coordinator.get_available_nodes().await;
            serde_json::to_value(nodes).map_err(|err| err.to_string())
        }
        other => Err(format!("unknown coordinator method: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use repoforge_bus::{FakeBus, RpcClient};
    use repoforge_database::DatabaseError;
    use repoforge_protocol::rpc::{
        AddToDbParams, AutoRepoRemoveDbParams, FetchUploadInfoResult, GenerateDestFillerFilesParams,
        SuccessResult,
    };
    use repoforge_registry::{DeploymentOutcome, DeploymentNotifier, RepoRegistry};
    use repoforge_protocol::JobKey;
    use std::time::Duration;

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
    async fn job_exists_round_trips_through_rpc() {
        let bus: Arc<dyn Bus> = Arc::new(FakeBus::new());
        let coordinator = Arc::new(Coordinator::new(
            bus.clone(),
            Arc::new(RepoRegistry::default()),
            Arc::new(crate::nodes::FakeNodePresence::new(Vec::new())),
            Arc::new(StubDatabase),
            Arc::new(NullDeployment),
            1,
            None,
            "registry.example/builder:latest".to_string(),
        ));
        tokio::spawn(serve(coordinator, bus.clone()));

        let client = RpcClient::new(bus, COORDINATOR_CHANNEL);
        let exists: bool = client
            .call("JobExists", &JobExistsParams { pkgbase: "foo".to_string(), timestamp: 1 }, Duration::from_secs(2))
            .await
            .unwrap();
        assert!(!exists);
    }
}
