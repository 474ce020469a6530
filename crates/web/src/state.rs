use std::sync::Arc;

use metrics_exporter_prometheus::PrometheusHandle;
use repoforge_bus::Bus;
use repoforge_coordinator::CoordinatorRpc;

/// Shared state for every route. Cheap to clone: every field is an `Arc` or
/// a handle that is itself internally reference-counted.
#[derive(Clone)]
pub struct AppState {
    pub bus: Arc<dyn Bus>,
    pub coordinator: CoordinatorRpc,
    pub prometheus: PrometheusHandle,
}

impl AppState {
    pub fn new(bus: Arc<dyn Bus>, coordinator: CoordinatorRpc, prometheus: PrometheusHandle) -> Self {
        Self { bus, coordinator, prometheus }
    }
}
