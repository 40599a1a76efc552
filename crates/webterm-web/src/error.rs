//! HTTP-facing error mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use webterm_relay::RelayError;

#[derive(Debug, Error)]
pub enum WebError {
    #[error("authentication required: {0}")]
    Unauthorized(&'static str),
    #[error("host '{0}' not found")]
    HostNotFound(String),
    #[error("host has no usable credential configured")]
    NoCredential,
    #[error("{0}")]
    Upstream(RelayError),
}

impl WebError {
    /// Fold a relay-core error into the web taxonomy for `host_id`.
    pub fn from_relay(err: RelayError, host_id: &str) -> Self {
        match err {
            RelayError::NotFound { .. } => WebError::HostNotFound(host_id.to_string()),
            RelayError::NoAuthMethod => WebError::NoCredential,
            other => WebError::Upstream(other),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            WebError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            WebError::HostNotFound(_) => StatusCode::NOT_FOUND,
            WebError::NoCredential => StatusCode::UNPROCESSABLE_ENTITY,
            // The host refused us or never answered.
            WebError::Upstream(err) if err.is_transport() => StatusCode::BAD_GATEWAY,
            WebError::Upstream(RelayError::Auth(_)) => StatusCode::BAD_GATEWAY,
            WebError::Upstream(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn into_http_response(self) -> Response {
        (self.status(), self.to_string()).into_response()
    }
}
