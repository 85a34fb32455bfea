//! HTTP error responses.
//!
//! Every failure leaves the server as `{"error": "<message>"}` with a status
//! derived from the error kind. Messages never carry upstream or internal
//! detail; that goes to the log instead.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use cover_extraction::ProxyError;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed or missing request input
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("too many requests")]
    RateLimited,

    #[error(transparent)]
    Proxy(#[from] ProxyError),

    /// Anything unexpected; the detail is logged, not returned
    #[error("internal server error")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::Proxy(e) => match e {
                ProxyError::MissingUrl
                | ProxyError::InvalidUrl
                | ProxyError::DisallowedScheme(_)
                | ProxyError::Blocked(_)
                | ProxyError::NotAnImage { .. } => StatusCode::BAD_REQUEST,
                ProxyError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
                ProxyError::UpstreamStatus(_) => StatusCode::BAD_GATEWAY,
                ProxyError::Fetch(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            match &self {
                Self::Proxy(ProxyError::Fetch(source)) => {
                    tracing::error!(error = %source, "Proxy request failed");
                }
                Self::Internal(detail) => {
                    tracing::error!(error = %detail, "Internal error");
                }
                other => tracing::error!(error = %other, "Request failed"),
            }
        } else {
            tracing::debug!(status = %status, error = %self, "Request rejected");
        }

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
