//! The scheduler + worker dispatch control plane: job admission,
//! the dependency-aware assignment algorithm, completion handling,
//! persistence/restart and cooperative shutdown.

pub mod builder_rpc;
pub mod client;
pub mod coordinator;
pub mod error;
pub mod graph;
pub mod metrics;
pub mod nodes;
pub mod persistence;
pub mod queue;
pub mod service;

pub use builder_rpc::BuilderRpc;
pub use client::CoordinatorRpc;
pub use coordinator::Coordinator;
pub use error::CoordinatorError;
pub use graph::{GraphJob, JobGraph};
pub use nodes::{
    spawn_announcer, BusNodePresence, FakeNodePresence, NodePresence, ANNOUNCE_INTERVAL, PRESENCE_CHANNEL,
};
pub use queue::{CoordinatorState, TrackedJob};
pub use service::{serve, COORDINATOR_CHANNEL};
