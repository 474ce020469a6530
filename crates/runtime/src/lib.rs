//! Container lifecycle operations for the builder agent and database
//! component, abstracted behind `ContainerRuntime` so both can be tested
//! without a real Docker/Podman daemon.

pub mod bollard_runtime;
pub mod engine;
pub mod error;
pub mod fake;
pub mod scheduled_pull;

pub use bollard_runtime::BollardRuntime;
pub use engine::{ContainerHandle, ContainerRuntime, ContainerSpec, EngineKind, LineSink};
pub use error::RuntimeError;
pub use fake::FakeRuntime;
pub use scheduled_pull::ScheduledPull;
