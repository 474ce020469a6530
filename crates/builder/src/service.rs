use std::sync::Arc;

use repoforge_bus::{Bus, RpcServer};
use repoforge_protocol::rpc::BuildPackageParams;
use repoforge_protocol::{BuildStatus, BuildStatusReturn};
use serde_json::Value;

use crate::agent::BuilderAgent;
use crate::error::BuilderError;

/// Inbound channel a builder node listens on for `BuildPackage`/
/// `CancelBuild`, keyed by the node's id (coordinator's `BuilderRpc` dials
/// the same name via `svc.builder.<node_id>`).
pub fn channel_for(node_id: &str) -> String {
    format!("svc.builder.{node_id}")
}

/// Serve `BuildPackage`/`CancelBuild` until the subscription closes.
pub async fn serve(agent: Arc<BuilderAgent>, bus: Arc<dyn Bus>, node_id: &str) -> Result<(), BuilderError> {
    let server = RpcServer::new(bus, channel_for(node_id));
    server
        .serve(move |method, payload| {
            let agent = agent.clone();
            async move { dispatch(&agent, &method, payload).await }
        })
        .await
        .map_err(BuilderError::from)
}

async fn dispatch(agent: &Arc<BuilderAgent>, method: &str, payload: Value) -> Result<Value, String> {
    match method {
        "BuildPackage" => {
            let params: BuildPackageParams = serde_json::from_value(payload).map_err(|err| err.to_string())?;
            let status = match agent.build_package(params).await {
                Ok(status) => status,
                Err(BuilderError::Busy) => {
                    // A coordinator bug: it must never dispatch a second
                    // build while this node is marked busy. Normalize to a
                    // wire status rather than propagating a raw error, per
                    // the builder's "never return a bare Result" rule.
                    tracing::error!("received BuildPackage while already busy");
                    BuildStatusReturn::new(BuildStatus::Failed)
                }
                Err(err) => {
                    tracing::warn!(error = %err, "build_package failed");
                    BuildStatusReturn::new(BuildStatus::Failed)
                }
            };
            serde_json::to_value(status).map_err(|err| err.to_string())
        }
        "CancelBuild" => {
            agent.cancel_build().await;
            Ok(Value::Null)
        }
        other => Err(format!("unknown builder method: {other}")),
    }
}
