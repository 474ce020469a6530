use thiserror::Error;

/// Builder-facing error kinds. Never crosses the RPC boundary directly —
/// `BuilderAgent::build_package` always normalizes these into a
/// [`repoforge_protocol::BuildStatusReturn`] before returning.
#[derive(Debug, Error)]
pub enum BuilderError {
    /// A second `BuildPackage` call arrived while one was already in
    /// flight — the try-acquire mutex's busy signal, and evidence of a
    /// coordinator bug.
    #[error("a build is already in progress on this node")]
    Busy,
    #[error("cancelled")]
    Cancelled,
    #[error("transient failure: {0}")]
    Transient(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<repoforge_runtime::RuntimeError> for BuilderError {
    fn from(err: repoforge_runtime::RuntimeError) -> Self {
        BuilderError::Transient(err.to_string())
    }
}

impl From<repoforge_bus::BusError> for BuilderError {
    fn from(err: repoforge_bus::BusError) -> Self {
        BuilderError::Transient(err.to_string())
    }
}

impl From<repoforge_database::DatabaseError> for BuilderError {
    fn from(err: repoforge_database::DatabaseError) -> Self {
        BuilderError::Transient(err.to_string())
    }
}
