use thiserror::Error;

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("bus error: {0}")]
    Bus(#[from] repoforge_bus::BusError),
    #[error("container runtime error: {0}")]
    Runtime(#[from] repoforge_runtime::RuntimeError),
    #[error("database operation failed with exit code {0}")]
    NonZeroExit(i64),
}
