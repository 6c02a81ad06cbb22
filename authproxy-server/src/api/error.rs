use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use authproxy_core::BrokerError;

/// Errors surfaced by the HTTP handlers.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Poll found no session, or the poll timed out.
    #[error("Session not found")]
    NotFound,

    /// Missing or malformed request parameter.
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Broker(#[from] BrokerError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::NotFound => (StatusCode::UNAUTHORIZED, self.to_string()).into_response(),
            Self::BadRequest(_) => (StatusCode::BAD_REQUEST, self.to_string()).into_response(),
            Self::Broker(BrokerError::InvalidSessionId { .. }) => {
                (StatusCode::BAD_REQUEST, self.to_string()).into_response()
            }
            Self::Broker(BrokerError::Unavailable) => {
                tracing::error!(error = %self, "Broker unavailable");
                (StatusCode::SERVICE_UNAVAILABLE, self.to_string()).into_response()
            }
            Self::Broker(_) => {
                tracing::error!(error = %self, "Broker internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal error").into_response()
            }
        }
    }
}
