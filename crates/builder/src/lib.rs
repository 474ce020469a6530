//! The builder agent: the per-node process that actually runs
//! `BuildPackage`/`CancelBuild`, shelling out to a container runtime and a
//! package-upload client under a single try-acquire slot.

pub mod agent;
pub mod cache;
pub mod config;
pub mod error;
pub mod pkgout;
pub mod service;
pub mod upload;

pub use agent::BuilderAgent;
pub use config::BuilderConfig;
pub use error::BuilderError;
pub use service::{channel_for, serve};
pub use upload::{FakeUploadClient, ScpUploadClient, UploadClient};
