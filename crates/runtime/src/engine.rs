use std::sync::Arc;

use async_trait::async_trait;

use crate::error::RuntimeError;

/// Which container engine a builder talks to. Podman is treated as a
/// Docker-API-compatible backend reached over the same `bollard` client, with
/// a handful of option differences called out below.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineKind {
    Docker,
    Podman,
}

/// Opaque handle to a created container. Callers never inspect the id
/// themselves; it only exists to be threaded back into `start`/`kill`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerHandle {
    pub id: String,
}

/// Everything needed to create a container for one build or one `Run`
/// invocation.
#[derive(Debug, Clone)]
pub struct ContainerSpec {
    pub image: String,
    pub cmd: Vec<String>,
    /// `host:container` or `host:container:opts` bind-mount strings.
    pub binds: Vec<String>,
    /// `K=V` environment entries.
    pub env: Vec<String>,
}

/// Callback invoked once per chunk of interleaved stdout/stderr output while
/// a container runs.
pub type LineSink = Arc<dyn Fn(&[u8]) + Send + Sync>;

/// The container operations a build step needs, factored out of
/// `BollardRuntime` so the builder agent can be tested against a fake.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Pull `name` from its registry. Synchronized under an exclusive mutex
    /// by the caller (see [`crate::scheduled_pull::ScheduledPull`]) so two
    /// pulls of the same image never race.
    async fn pull_image(&self, name: &str) -> Result<(), RuntimeError>;

    /// Return `name` if present locally, else pull it first.
    async fn get_image(&self, name: &str) -> Result<String, RuntimeError>;

    async fn create(&self, spec: &ContainerSpec) -> Result<ContainerHandle, RuntimeError>;

    /// Attach output, start the container, and wait for it to terminate,
    /// forwarding every chunk of output to `line_sink` as it arrives.
    /// Returns the container's exit status code.
    async fn start(
        &self,
        handle: &ContainerHandle,
        line_sink: LineSink,
    ) -> Result<i64, RuntimeError>;

    /// Force-remove a container, regardless of whether it is still running.
    async fn kill(&self, handle: &ContainerHandle) -> Result<(), RuntimeError>;

    /// Convenience wrapper for a non-cancellable one-shot invocation: create,
    /// start, wait, discard the handle. Used by the database component.
    async fn run(&self, spec: &ContainerSpec) -> Result<i64, RuntimeError> {
        let handle = self.create(spec).await?;
        let sink: LineSink = Arc::new(|_bytes| {});
        self.start(&handle, sink).await
    }
}
