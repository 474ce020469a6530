use std::sync::Arc;
use std::time::Duration;

use repoforge_bus::{Bus, RpcClient};
use repoforge_protocol::rpc::BuildPackageParams;
use repoforge_protocol::BuildStatusReturn;

use crate::error::CoordinatorError;

/// A per-build RPC may block for as long as the container runs; there is no
/// coordinator-side timeout beyond this generous ceiling, since the actual
/// per-build deadline is enforced inside the container (exit 124).
const BUILD_TIMEOUT: Duration = Duration::from_secs(6 * 60 * 60);
const CANCEL_TIMEOUT: Duration = Duration::from_secs(10);

fn builder_channel(node_id: &str) -> String {
    format!("svc.builder.{node_id}")
}

/// Talks to a specific builder node's RPC endpoint. Cheap to clone (just an
/// `Arc<dyn Bus>` clone) so completion-handler tasks can own one.
#[derive(Clone)]
pub struct BuilderRpc {
    bus: Arc<dyn Bus>,
}

impl BuilderRpc {
    pub fn new(bus: Arc<dyn Bus>) -> Self {
        Self { bus }
    }

    pub async fn build_package(
        &self,
        node_id: &str,
        params: &BuildPackageParams,
    ) -> Result<BuildStatusReturn, CoordinatorError> {
        let rpc = RpcClient::new(self.bus.clone(), builder_channel(node_id));
        rpc.call("BuildPackage", params, BUILD_TIMEOUT)
            .await
            .map_err(Into::into)
    }

    /// Best-effort: callers never propagate failures from this, since a
    /// cancel racing a build that already finished is not an error.
    pub async fn cancel_build(&self, node_id: &str) {
        let rpc = RpcClient::new(self.bus.clone(), builder_channel(node_id));
        if let Err(err) = rpc.call::<_, ()>("CancelBuild", &(), CANCEL_TIMEOUT).await {
            tracing::debug!(node = %node_id, error = %err, "cancel_build best-effort call failed");
        }
    }
}
