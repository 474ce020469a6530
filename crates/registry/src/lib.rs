//! Source/target repo lookups and the commit-status / deployment notifier
//! contracts. Pure configuration plus small HTTP calls — no bus, no
//! container runtime.

pub mod error;
pub mod notifier;
pub mod repo;

pub use error::RegistryError;
pub use notifier::{
    CommitStatusNotifier, DeploymentNotifier, DeploymentOutcome, NotifyState, NullDeploymentNotifier,
    NullNotifier, TelegramNotifier,
};
pub use repo::{Platform, RepoEntry, RepoRegistry, TargetRepoRendering};
