//! HTTP error envelope

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use coedit_core::Error;
use serde_json::json;

/// Message returned for any unknown or missing session id
pub const INVALID_SESSION: &str = "Invalid session ID";

/// Errors surfaced by the request handlers
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Core(#[from] Error),

    #[error("{0}")]
    BadRequest(String),
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Core(Error::SessionNotFound(_)) => StatusCode::BAD_REQUEST,
            ApiError::Core(Error::Timeout(_)) => StatusCode::GATEWAY_TIMEOUT,
            ApiError::Core(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> String {
        match self {
            ApiError::Core(Error::SessionNotFound(_)) => INVALID_SESSION.to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        } else {
            tracing::debug!(error = %self, "Request rejected");
        }

        let body = json!({
            "status": "error",
            "message": self.message(),
        });
        (status, Json(body)).into_response()
    }
}
