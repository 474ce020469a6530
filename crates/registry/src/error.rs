use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("unknown source repo {0:?}")]
    NotFound(String),
    #[error("unknown target repo {0:?}")]
    TargetNotFound(String),
    #[error("notifier transport error: {0}")]
    Notify(String),
}
