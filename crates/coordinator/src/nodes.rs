use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use repoforge_bus::Bus;
use repoforge_protocol::rpc::BrokerNode;
use tokio::sync::Mutex as AsyncMutex;

/// Source of builder presence data. The real implementation tracks
/// heartbeats published by each builder agent on the bus; tests substitute
/// a fixed roster via [`FakeNodePresence`].
#[async_trait]
pub trait NodePresence: Send + Sync {
    async fn available_nodes(&self) -> Vec<BrokerNode>;
}

pub struct FakeNodePresence {
    nodes: std::sync::Mutex<Vec<BrokerNode>>,
}

impl FakeNodePresence {
    pub fn new(nodes: Vec<BrokerNode>) -> Self {
        Self {
            nodes: std::sync::Mutex::new(nodes),
        }
    }

    pub fn set_nodes(&self, nodes: Vec<BrokerNode>) {
        *self.nodes.lock().unwrap() = nodes;
    }
}

#[async_trait]
impl NodePresence for FakeNodePresence {
    async fn available_nodes(&self) -> Vec<BrokerNode> {
        self.nodes.lock().unwrap().clone()
    }
}

/// Channel builder agents announce themselves on. Presence is tracked as a
/// standing heartbeat subscription rather than a key scan, since the `Bus`
/// trait offers publish/subscribe but no key enumeration.
pub const PRESENCE_CHANNEL: &str = "presence.announce";

/// How long a node is considered present after its last announcement.
/// Builders re-announce at roughly a third of this so one or two dropped
/// heartbeats don't flap a node's presence.
const PRESENCE_TTL: Duration = Duration::from_secs(90);

/// How often a builder agent re-publishes its `BrokerNode` announcement.
pub const ANNOUNCE_INTERVAL: Duration = Duration::from_secs(30);

/// Presence tracked from live `BrokerNode` announcements on
/// [`PRESENCE_CHANNEL`]. A node missing for longer than [`PRESENCE_TTL`] is
/// dropped from `available_nodes()` without an explicit "goodbye" message.
pub struct BusNodePresence {
    nodes: AsyncMutex<HashMap<String, (BrokerNode, Instant)>>,
}

impl BusNodePresence {
    /// Subscribe to the presence channel and spawn the listener loop,
    /// returning once the subscription is live so no announcement published
    /// after this call can be missed.
    pub async fn spawn(bus: Arc<dyn Bus>) -> Result<Arc<Self>, repoforge_bus::BusError> {
        let mut sub = bus.subscribe(PRESENCE_CHANNEL).await?;
        let presence = Arc::new(Self {
            nodes: AsyncMutex::new(HashMap::new()),
        });
        let presence_for_task = presence.clone();
        tokio::spawn(async move {
            while let Some(raw) = sub.recv().await {
                let node: BrokerNode = match serde_json::from_slice(&raw) {
                    Ok(node) => node,
                    Err(err) => {
                        tracing::warn!(error = %err, "dropping malformed presence announcement");
                        continue;
                    }
                };
                presence_for_task
                    .nodes
                    .lock()
                    .await
                    .insert(node.id.clone(), (node, Instant::now()));
            }
        });
        Ok(presence)
    }
}

#[async_trait]
impl NodePresence for BusNodePresence {
    async fn available_nodes(&self) -> Vec<BrokerNode> {
        let now = Instant::now();
        self.nodes
            .lock()
            .await
            .values()
            .filter(|(_, seen)| now.saturating_duration_since(*seen) < PRESENCE_TTL)
            .map(|(node, _)| node.clone())
            .collect()
    }
}

/// Publish this node's `BrokerNode` announcement immediately, then every
/// [`ANNOUNCE_INTERVAL`] thereafter, until the returned handle is dropped or
/// aborted. Runs on the builder agent side of the presence protocol.
pub fn spawn_announcer(bus: Arc<dyn Bus>, node: BrokerNode) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(ANNOUNCE_INTERVAL);
        loop {
            interval.tick().await;
            match serde_json::to_vec(&node) {
                Ok(body) => {
                    if let Err(err) = bus.publish(PRESENCE_CHANNEL, &body).await {
                        tracing::warn!(error = %err, "presence announcement failed");
                    }
                }
                Err(err) => tracing::error!(error = %err, "failed to serialize presence announcement"),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use repoforge_bus::FakeBus;

    fn node(id: &str) -> BrokerNode {
        BrokerNode {
            id: id.to_string(),
            pure_name: id.to_string(),
            service: "builder".to_string(),
            present: true,
            build_class: 0,
            version: 1,
        }
    }

    #[tokio::test]
    async fn announced_node_becomes_available() {
        let bus: Arc<dyn Bus> = Arc::new(FakeBus::new());
        let presence = BusNodePresence::spawn(bus.clone()).await.unwrap();

        let body = serde_json::to_vec(&node("builder-1")).unwrap();
        bus.publish(PRESENCE_CHANNEL, &body).await.unwrap();
        // Give the spawned listener a tick to process the message.
        tokio::time::sleep(Duration::from_millis(20)).await;

        let nodes = presence.available_nodes().await;
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].id, "builder-1");
    }

    #[tokio::test]
    async fn unseen_nodes_report_empty() {
        let bus: Arc<dyn Bus> = Arc::new(FakeBus::new());
        let presence = BusNodePresence::spawn(bus).await.unwrap();
        assert!(presence.available_nodes().await.is_empty());
    }
}
