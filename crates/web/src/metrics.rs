use axum::extract::State;
use axum::response::IntoResponse;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::state::AppState;

/// Install the process-global Prometheus recorder. Must be called exactly
/// once per process before any `metrics::counter!`/`gauge!` call; the
/// returned handle is cheap to clone into `AppState`.
pub fn install_recorder() -> PrometheusHandle {
    PrometheusBuilder::new()
        .install_recorder()
        .expect("installing the global metrics recorder twice in one process")
}

/// `GET /metrics` — passthrough of the process's Prometheus registry.
/// Registration of individual counters/gauges happens where they are
/// recorded (`repoforge_coordinator::metrics`); this route only renders.
pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    state.prometheus.render()
}
