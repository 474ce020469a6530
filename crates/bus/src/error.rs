use thiserror::Error;

#[derive(Debug, Error)]
pub enum BusError {
    #[error("bus transport error: {0}")]
    Transport(String),
    #[error("bus subscription closed")]
    SubscriptionClosed,
    #[error("rpc call timed out after {0:?}")]
    Timeout(std::time::Duration),
    #[error("rpc error: {0}")]
    Rpc(String),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl From<redis::RedisError> for BusError {
    fn from(err: redis::RedisError) -> Self {
        BusError::Transport(err.to_string())
    }
}
