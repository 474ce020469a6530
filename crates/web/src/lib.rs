//! The log HTTP endpoint and queue/metrics read routes, run by the `web`
//! CLI verb as a process separate from the long-running coordinator.

pub mod config;
pub mod error;
pub mod logs;
pub mod metrics;
pub mod queue;
pub mod router;
pub mod state;

pub use config::WebConfig;
pub use error::WebError;
pub use state::AppState;

use std::sync::Arc;

use repoforge_bus::Bus;
use repoforge_coordinator::CoordinatorRpc;

/// Build the app state and router from config, install the Prometheus
/// recorder, and serve until the listener is dropped.
pub async fn serve(config: WebConfig, bus: Arc<dyn Bus>) -> std::io::Result<()> {
    let prometheus = metrics::install_recorder();
    let coordinator = CoordinatorRpc::new(bus.clone());
    let state = AppState::new(bus, coordinator, prometheus);
    let app = router::router(state, config.static_dir.clone());

    tracing::info!(addr = %config.bind_addr, "web endpoint listening");
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    axum::serve(listener, app).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use repoforge_bus::FakeBus;
    use repoforge_coordinator::{Coordinator, FakeNodePresence};
    use repoforge_database::{DatabaseClient, DatabaseError};
    use repoforge_protocol::rpc::{
        AddToDbParams, AutoRepoRemoveDbParams, FetchUploadInfoResult, GenerateDestFillerFilesParams,
        SuccessResult,
    };
    use repoforge_protocol::JobKey;
    use repoforge_registry::{DeploymentNotifier, DeploymentOutcome, RegistryError, RepoRegistry};
    use metrics_exporter_prometheus::PrometheusBuilder;
    use tower::ServiceExt;

    struct StubDatabase;

    #[async_trait::async_trait]
    impl DatabaseClient for StubDatabase {
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
        async fn notify_deployment(&self, _key: &JobKey, _outcome: DeploymentOutcome) -> Result<(), RegistryError> {
            Ok(())
        }
    }

    /// Spins up a real `Coordinator` behind a `svc.coordinator` server on
    /// the given bus, so `CoordinatorRpc` calls resolve instead of timing
    /// out against an unanswered channel.
    fn test_state() -> AppState {
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
        tokio::spawn(repoforge_coordinator::serve(coordinator, bus.clone()));
        // A per-test local recorder, not the process-global one `install_recorder`
        // sets up in `serve` — installing the global recorder more than once
        // per process panics, and no test here asserts on recorded values.
        let prometheus = PrometheusBuilder::new().build_recorder().handle();
        AppState::new(bus.clone(), CoordinatorRpc::new(bus), prometheus)
    }

    #[tokio::test]
    async fn invalid_pkgbase_is_bad_request() {
        let app = router::router(test_state(), None);
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/logs/bad%2Fbase/123")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn missing_job_is_not_found() {
        let app = router::router(test_state(), None);
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/logs/my-pkg/123")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn queue_packages_is_empty_initially() {
        let app = router::router(test_state(), None);
        let response = app
            .oneshot(Request::builder().uri("/api/queue/packages").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"[]");
    }
}
