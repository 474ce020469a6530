use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("container engine error: {0}")]
    Engine(String),
    #[error("container {0} not found")]
    NotFound(String),
    #[error("container wait timed out")]
    Timeout,
}

impl From<bollard::errors::Error> for RuntimeError {
    fn from(err: bollard::errors::Error) -> Self {
        RuntimeError::Engine(err.to_string())
    }
}
