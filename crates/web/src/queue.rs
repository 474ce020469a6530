use axum::extract::State;
use axum::Json;
use repoforge_protocol::rpc::{BrokerNode, QueueEntryStatus, QueueStatusEntry};
use serde::Serialize;

use crate::error::WebError;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct QueueStats {
    pub queued: usize,
    pub active: usize,
    pub nodes_total: usize,
    pub nodes_busy: usize,
}

fn stats_from(queue: &[QueueStatusEntry], nodes: &[BrokerNode]) -> QueueStats {
    let active = queue.iter().filter(|e| e.status == QueueEntryStatus::Active).count();
    QueueStats {
        active,
        queued: queue.len() - active,
        nodes_total: nodes.len(),
        nodes_busy: nodes.iter().filter(|n| n.present).count().min(active),
    }
}

/// `GET /api/queue/stats` — aggregate counts, not the full job list.
pub async fn stats(State(state): State<AppState>) -> Result<Json<QueueStats>, WebError> {
    let queue = state.coordinator.get_queue().await?;
    let nodes = state.coordinator.get_available_nodes().await?;
    Ok(Json(stats_from(&queue, &nodes)))
}

/// `GET /api/queue/packages` — the full queue as reported by the coordinator.
pub async fn packages(State(state): State<AppState>) -> Result<Json<Vec<QueueStatusEntry>>, WebError> {
    Ok(Json(state.coordinator.get_queue().await?))
}

#[derive(Debug, Serialize)]
pub struct QueueMetrics {
    pub queue_depth: usize,
    pub busy_nodes: usize,
}

/// `GET /api/queue/metrics` — the same two gauges `repoforge_coordinator`
/// records under `queue_depth`/`busy_nodes`, as plain JSON rather than the
/// Prometheus text format `/metrics` returns.
pub async fn metrics(State(state): State<AppState>) -> Result<Json<QueueMetrics>, WebError> {
    let queue = state.coordinator.get_queue().await?;
    let nodes = state.coordinator.get_available_nodes().await?;
    let stats = stats_from(&queue, &nodes);
    Ok(Json(QueueMetrics { queue_depth: stats.queued + stats.active, busy_nodes: stats.nodes_busy }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use repoforge_protocol::{BuildClass, PkgBase, SavableJob};
    use std::collections::BTreeSet;

    fn entry(status: QueueEntryStatus) -> QueueStatusEntry {
        QueueStatusEntry {
            status,
            node: None,
            build_class: BuildClass::small(),
            job_data: SavableJob {
                pkgbase: PkgBase::try_from("foo".to_string()).unwrap(),
                target_repo: "chaotic-aur".to_string(),
                source_repo: "chaotic-aur/packages".to_string(),
                arch: "x86_64".to_string(),
                build_class: BuildClass::small(),
                pkgnames: BTreeSet::new(),
                dependencies: BTreeSet::new(),
                commit: None,
            },
            timestamp: 1,
            live_log_url: None,
        }
    }

    #[test]
    fn stats_splits_active_from_queued() {
        let queue = vec![entry(QueueEntryStatus::Active), entry(QueueEntryStatus::Queued)];
        let nodes = vec![];
        let stats = stats_from(&queue, &nodes);
        assert_eq!(stats.active, 1);
        assert_eq!(stats.queued, 1);
    }
}
