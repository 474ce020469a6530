use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{broadcast, mpsc};

use crate::bus::{Bus, BusSubscription};
use crate::error::BusError;

/// An in-process bus for tests: a `Mutex<HashMap>` for keys and a
/// `broadcast` channel per pub/sub channel. No TTL enforcement — tests don't
/// run long enough to care, and the 7-day TTL is a production-only concern.
pub struct FakeBus {
    kv: Mutex<HashMap<String, Vec<u8>>>,
    channels: Mutex<HashMap<String, broadcast::Sender<Vec<u8>>>>,
}

impl FakeBus {
    pub fn new() -> Self {
        Self {
            kv: Mutex::new(HashMap::new()),
            channels: Mutex::new(HashMap::new()),
        }
    }

    fn channel_sender(&self, channel: &str) -> broadcast::Sender<Vec<u8>> {
        let mut channels = self.channels.lock().unwrap();
        channels
            .entry(channel.to_string())
            .or_insert_with(|| broadcast::channel(1024).0)
            .clone()
    }
}

impl Default for FakeBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Bus for FakeBus {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, BusError> {
        Ok(self.kv.lock().unwrap().get(key).cloned())
    }

    async fn set_ex(&self, key: &str, value: &[u8], _ttl: Duration) -> Result<(), BusError> {
        self.kv
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_vec());
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<(), BusError> {
        self.kv.lock().unwrap().remove(key);
        Ok(())
    }

    async fn publish(&self, channel: &str, payload: &[u8]) -> Result<(), BusError> {
        let _ = self.channel_sender(channel).send(payload.to_vec());
        Ok(())
    }

    async fn append_publish_expire(
        &self,
        key: &str,
        key_payload: &[u8],
        channel: &str,
        channel_payload: &[u8],
        _ttl: Duration,
    ) -> Result<(), BusError> {
        {
            let mut kv = self.kv.lock().unwrap();
            kv.entry(key.to_string())
                .or_insert_with(Vec::new)
                .extend_from_slice(key_payload);
        }
        let _ = self.channel_sender(channel).send(channel_payload.to_vec());
        Ok(())
    }

    async fn subscribe(&self, channel: &str) -> Result<BusSubscription, BusError> {
        let mut rx = self.channel_sender(channel).subscribe();
        let (tx, out_rx) = mpsc::channel(256);
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(msg) => {
                        if tx.send(msg).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
        Ok(BusSubscription::new(out_rx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribe_then_append_sees_no_gap() {
        let bus = FakeBus::new();
        let mut sub = bus.subscribe("chan").await.unwrap();
        bus.append_publish_expire("key", b"hello", "chan", b"LOGhello", Duration::from_secs(60))
            .await
            .unwrap();
        let msg = sub.recv().await.unwrap();
        assert_eq!(msg, b"LOGhello");
        assert_eq!(bus.get("key").await.unwrap().unwrap(), b"hello");
    }

    #[tokio::test]
    async fn append_accumulates() {
        let bus = FakeBus::new();
        bus.append_publish_expire("key", b"foo", "chan", b"LOGfoo", Duration::from_secs(60))
            .await
            .unwrap();
        bus.append_publish_expire("key", b"bar", "chan", b"LOGbar", Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(bus.get("key").await.unwrap().unwrap(), b"foobar");
    }
}
