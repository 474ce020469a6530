//! Pub/sub + key-value transport between the coordinator, builder agents,
//! the database component and the web endpoint. Production traffic runs
//! over Redis (`redis_bus`); tests run against an in-memory `FakeBus`
//! implementing the same `Bus` trait.

pub mod bus;
pub mod error;
pub mod fake_bus;
pub mod log;
pub mod redis_bus;
pub mod rpc;

pub use bus::{Bus, BusSubscription};
pub use error::BusError;
pub use fake_bus::FakeBus;
pub use log::{BuildLog, LogEvent};
pub use redis_bus::RedisBus;
pub use rpc::{RpcClient, RpcErrorWire, RpcRequest, RpcResponse, RpcServer};
