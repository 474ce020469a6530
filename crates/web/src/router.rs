use axum::routing::get;
use axum::Router;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::state::AppState;
use crate::{logs, metrics, queue};

/// Build the full route table. `state.static_dir` (if set) is mounted as a
/// fallback under `/`, after the API routes so a path collision always
/// favors the API.
pub fn router(state: AppState, static_dir: Option<std::path::PathBuf>) -> Router {
    let mut app = Router::new()
        .route("/api/logs/:pkgbase/:ts", get(logs::by_timestamp))
        .route("/api/logs/:pkgbase", get(logs::by_default))
        .route("/api/queue/stats", get(queue::stats))
        .route("/api/queue/packages", get(queue::packages))
        .route("/api/queue/metrics", get(queue::metrics))
        .route("/metrics", get(metrics::metrics))
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    if let Some(dir) = static_dir {
        app = app.fallback_service(ServeDir::new(dir));
    }
    app
}
