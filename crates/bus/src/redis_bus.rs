use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use tokio::sync::mpsc;

use crate::bus::{Bus, BusSubscription};
use crate::error::BusError;

/// Redis-backed bus. Key/value traffic goes over a multiplexed
/// `ConnectionManager` (auto-reconnecting); each `subscribe` spins up its own
/// dedicated pub/sub connection, since Redis pub/sub connections cannot also
/// issue regular commands.
#[derive(Clone)]
pub struct RedisBus {
    client: redis::Client,
    conn: ConnectionManager,
}

impl RedisBus {
    pub async fn connect(url: &str) -> Result<Self, BusError> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client.clone()).await?;
        Ok(Self { client, conn })
    }
}

#[async_trait]
impl Bus for RedisBus {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, BusError> {
        let mut conn = self.conn.clone();
        let value: Option<Vec<u8>> = conn.get(key).await?;
        Ok(value)
    }

    async fn set_ex(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), BusError> {
        let mut conn = self.conn.clone();
        let secs = ttl.as_secs().max(1);
        let _: () = conn.set_ex(key, value, secs).await?;
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<(), BusError> {
        let mut conn = self.conn.clone();
        let _: () = conn.del(key).await?;
        Ok(())
    }

    async fn publish(&self, channel: &str, payload: &[u8]) -> Result<(), BusError> {
        let mut conn = self.conn.clone();
        let _: () = conn.publish(channel, payload).await?;
        Ok(())
    }

    async fn append_publish_expire(
        &self,
        key: &str,
        key_payload: &[u8],
        channel: &str,
        channel_payload: &[u8],
        ttl: Duration,
    ) -> Result<(), BusError> {
        let mut conn = self.conn.clone();
        let secs = ttl.as_secs().max(1) as i64;
        let _: () = redis::pipe()
            .atomic()
            .cmd("APPEND")
            .arg(key)
            .arg(key_payload)
            .ignore()
            .cmd("EXPIRE")
            .arg(key)
            .arg(secs)
            .ignore()
            .cmd("PUBLISH")
            .arg(channel)
            .arg(channel_payload)
            .ignore()
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn subscribe(&self, channel: &str) -> Result<BusSubscription, BusError> {
        let mut pubsub = self.client.get_async_pubsub().await?;
        pubsub.subscribe(channel).await?;

        let (tx, rx) = mpsc::channel(256);
        let channel_owned = channel.to_string();
        tokio::spawn(async move {
            use futures_util::StreamExt;
            let mut stream = pubsub.on_message();
            while let Some(msg) = stream.next().await {
                let payload: Vec<u8> = match msg.get_payload_bytes() {
                    bytes => bytes.to_vec(),
                };
                if tx.send(payload).await.is_err() {
                    break;
                }
            }
            tracing::debug!(channel = %channel_owned, "bus subscription ended");
        });

        Ok(BusSubscription::new(rx))
    }
}
