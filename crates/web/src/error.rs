use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Errors surfaced at the HTTP boundary. Each variant maps to the status
/// code the log endpoint and queue routes are expected to return.
#[derive(Debug, Error)]
pub enum WebError {
    #[error("invalid request: {0}")]
    BadRequest(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("upstream call failed: {0}")]
    Upstream(String),
}

impl From<repoforge_coordinator::CoordinatorError> for WebError {
    fn from(err: repoforge_coordinator::CoordinatorError) -> Self {
        WebError::Upstream(err.to_string())
    }
}

impl From<repoforge_bus::BusError> for WebError {
    fn from(err: repoforge_bus::BusError) -> Self {
        WebError::Upstream(err.to_string())
    }
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        let status = match self {
            WebError::BadRequest(_) => StatusCode::BAD_REQUEST,
            WebError::NotFound(_) => StatusCode::NOT_FOUND,
            WebError::Upstream(_) => StatusCode::BAD_GATEWAY,
        };
        (status, self.to_string()).into_response()
    }
}
