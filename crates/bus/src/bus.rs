use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::BusError;

/// A live subscription to a pub/sub channel. Dropping it stops delivery.
pub struct BusSubscription {
    rx: mpsc::Receiver<Vec<u8>>,
}

impl BusSubscription {
    pub fn new(rx: mpsc::Receiver<Vec<u8>>) -> Self {
        Self { rx }
    }

    pub async fn recv(&mut self) -> Option<Vec<u8>> {
        self.rx.recv().await
    }

    pub async fn recv_timeout(&mut self, timeout: Duration) -> Result<Option<Vec<u8>>, BusError> {
        match tokio::time::timeout(timeout, self.rx.recv()).await {
            Ok(msg) => Ok(msg),
            Err(_) => Err(BusError::Timeout(timeout)),
        }
    }
}

/// The message bus: a pub/sub + key-value store used for transport between
/// coordinator/builders, log fan-out and queue persistence. Redis-shaped
/// by design; this trait is the seam that lets the coordinator and builder
/// agent run against an in-memory fake in tests.
#[async_trait]
pub trait Bus: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, BusError>;

    async fn set_ex(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), BusError>;

    async fn del(&self, key: &str) -> Result<(), BusError>;

    async fn publish(&self, channel: &str, payload: &[u8]) -> Result<(), BusError>;

    /// Append `key_payload` to `key` (creating it if absent), reset `key`'s
    /// TTL, and publish `channel_payload` on `channel` — all in one round
    /// trip, so a subscriber that subscribes before reading `key` can never
    /// observe a gap between the stored prefix and live messages. The two
    /// payloads differ: the channel carries a 3-byte `"LOG"` tag the stored
    /// key does not.
    async fn append_publish_expire(
        &self,
        key: &str,
        key_payload: &[u8],
        channel: &str,
        channel_payload: &[u8],
        ttl: Duration,
    ) -> Result<(), BusError>;

    async fn subscribe(&self, channel: &str) -> Result<BusSubscription, BusError>;
}
