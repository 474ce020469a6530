use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("upstream call failed: {0}")]
    Upstream(String),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl From<repoforge_bus::BusError> for CoordinatorError {
    fn from(err: repoforge_bus::BusError) -> Self {
        CoordinatorError::Upstream(err.to_string())
    }
}

impl From<repoforge_database::DatabaseError> for CoordinatorError {
    fn from(err: repoforge_database::DatabaseError) -> Self {
        CoordinatorError::Upstream(err.to_string())
    }
}
