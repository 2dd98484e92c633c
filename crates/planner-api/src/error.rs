use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

/// Seconds a client should wait before retrying after a storage failure
const RETRY_AFTER_SECS: u32 = 1;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Invalid request: {0}")]
    BadRequest(String),
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
    #[error("Internal server error: {0}")]
    Internal(String),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

impl AppError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }
}

impl From<planner_core::Error> for AppError {
    fn from(err: planner_core::Error) -> Self {
        if err.is_client_error() {
            Self::BadRequest(err.to_string())
        } else if matches!(err, planner_core::Error::Cancelled) {
            tracing::warn!("Request abandoned before the push finished");
            Self::Unavailable(err.to_string())
        } else if err.is_retryable() {
            tracing::error!(error = %err, "Storage failure");
            Self::Unavailable(err.to_string())
        } else {
            tracing::error!(error = %err, "Internal failure");
            Self::Internal(err.to_string())
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let retryable = matches!(self, Self::Unavailable(_));
        let body = ErrorBody {
            error: self.to_string(),
        };
        let mut response = (status, Json(body)).into_response();
        if retryable {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(RETRY_AFTER_SECS));
        }
        response
    }
}
