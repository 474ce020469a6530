use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::bus::Bus;
use crate::error::BusError;

/// Envelope carried on a service's inbound channel. `reply_to` names a
/// channel the caller has already subscribed to before publishing this
/// request, mirroring the log stream's subscribe-before-read guarantee so a
/// fast responder can never answer into a void.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcRequest {
    pub id: Uuid,
    pub method: String,
    pub reply_to: String,
    pub payload: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcErrorWire {
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcResponse {
    pub id: Uuid,
    pub result: Result<serde_json::Value, RpcErrorWire>,
}

/// Calls methods on a remote service reachable over a single inbound
/// channel (the coordinator, a builder node, or the database component).
pub struct RpcClient {
    bus: Arc<dyn Bus>,
    service_channel: String,
}

impl RpcClient {
    pub fn new(bus: Arc<dyn Bus>, service_channel: impl Into<String>) -> Self {
        Self {
            bus,
            service_channel: service_channel.into(),
        }
    }

    /// Issue `method(req)` and await the typed response, or [`BusError::Timeout`]
    /// if nothing arrives in time. Subscribes to a fresh, per-call reply
    /// channel before publishing the request, so the reply can never be
    /// published before anyone is listening for it.
    pub async fn call<Req, Resp>(
        &self,
        method: &str,
        req: &Req,
        timeout: Duration,
    ) -> Result<Resp, BusError>
    where
        Req: Serialize,
        Resp: DeserializeOwned,
    {
        let id = Uuid::new_v4();
        let reply_to = format!("rpc-reply.{id}");

        let mut sub = self.bus.subscribe(&reply_to).await?;

        let request = RpcRequest {
            id,
            method: method.to_string(),
            reply_to: reply_to.clone(),
            payload: serde_json::to_value(req)?,
        };
        let body = serde_json::to_vec(&request)?;
        self.bus.publish(&self.service_channel, &body).await?;

        loop {
            let raw = sub
                .recv_timeout(timeout)
                .await?
                .ok_or(BusError::SubscriptionClosed)?;
            let response: RpcResponse = serde_json::from_slice(&raw)?;
            if response.id != id {
                continue;
            }
            return match response.result {
                Ok(value) => Ok(serde_json::from_value(value)?),
                Err(err) => Err(BusError::Rpc(err.message)),
            };
        }
    }
}

/// Dispatch loop for a service answering requests on a single inbound
/// channel. A handler receives the decoded method name and raw JSON payload
/// and returns a JSON result or an error message; the server takes care of
/// matching replies back to callers.
pub struct RpcServer {
    bus: Arc<dyn Bus>,
    inbound_channel: String,
}

impl RpcServer {
    pub fn new(bus: Arc<dyn Bus>, inbound_channel: impl Into<String>) -> Self {
        Self {
            bus,
            inbound_channel: inbound_channel.into(),
        }
    }

    /// Run the dispatch loop until the inbound subscription closes (which
    /// only happens if the underlying bus connection is dropped). `handler`
    /// is invoked for every request on its own spawned task, so a long-running
    /// call (a build that runs for hours) never blocks this loop from picking
    /// up the next inbound request on the same channel — e.g. a `CancelBuild`
    /// queued behind an in-flight `BuildPackage`.
    pub async fn serve<F, Fut>(&self, handler: F) -> Result<(), BusError>
    where
        F: Fn(String, serde_json::Value) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<serde_json::Value, String>> + Send + 'static,
    {
        let mut sub = self.bus.subscribe(&self.inbound_channel).await?;
        let handler = Arc::new(handler);
        while let Some(raw) = sub.recv().await {
            let request: RpcRequest = match serde_json::from_slice(&raw) {
                Ok(req) => req,
                Err(err) => {
                    tracing::warn!(error = %err, "dropping malformed rpc request");
                    continue;
                }
            };
            let bus = self.bus.clone();
            let handler = handler.clone();
            tokio::spawn(async move {
                let result = handler(request.method.clone(), request.payload).await;
                let response = RpcResponse {
                    id: request.id,
                    result: result.map_err(|message| RpcErrorWire { message }),
                };
                let body = match serde_json::to_vec(&response) {
                    Ok(body) => body,
                    Err(err) => {
                        tracing::warn!(error = %err, "failed to encode rpc response");
                        return;
                    }
                };
                if let Err(err) = bus.publish(&request.reply_to, &body).await {
                    tracing::warn!(error = %err, method = %request.id, "failed to publish rpc reply");
                }
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake_bus::FakeBus;
    use serde::{Deserialize, Serialize};

    #[derive(Serialize, Deserialize)]
    struct Ping {
        n: i32,
    }

    #[derive(Serialize, Deserialize, PartialEq, Debug)]
    struct Pong {
        n: i32,
    }

    #[tokio::test]
    async fn call_round_trips_through_server() {
        let bus: Arc<dyn Bus> = Arc::new(FakeBus::new());
        let server = RpcServer::new(bus.clone(), "svc.coordinator");
        tokio::spawn(async move {
            server
                .serve(|method, payload| async move {
                    assert_eq!(method, "ping");
                    let ping: Ping = serde_json::from_value(payload).map_err(|e| e.to_string())?;
                    serde_json::to_value(Pong { n: ping.n + 1 }).map_err(|e| e.to_string())
                })
                .await
                .unwrap();
        });

        let client = RpcClient::new(bus.clone(), "svc.coordinator");
        let resp: Pong = client
            .call("ping", &Ping { n: 41 }, Duration::from_secs(2))
            .await
            .unwrap();
        assert_eq!(resp, Pong { n: 42 });
    }

    #[tokio::test]
    async fn call_times_out_with_no_server() {
        let bus: Arc<dyn Bus> = Arc::new(FakeBus::new());
        let client = RpcClient::new(bus, "svc.nobody");
        let result: Result<Pong, BusError> = client
            .call("ping", &Ping { n: 1 }, Duration::from_millis(50))
            .await;
        assert!(matches!(result, Err(BusError::Timeout(_))));
    }
}
