// src/api/error.rs
// HTTP-layer error projection. Mirrors this codebase's `AuthError` pattern:
// match each variant to a `(StatusCode, message)` pair and render JSON.

use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::error;

use crate::error::ScanError;

#[derive(Debug)]
pub enum ApiError {
    Validation(String),
    Access(String),
    Capacity(String),
    NotFound(String),
    RateLimited { retry_after_secs: u64 },
    Internal(String),
}

impl From<ScanError> for ApiError {
    fn from(e: ScanError) -> Self {
        match e {
            ScanError::Validation(m) => ApiError::Validation(m),
            ScanError::Access(m) => ApiError::Access(m),
            ScanError::Capacity(m) => ApiError::Capacity(m),
            ScanError::Timeout(m) => ApiError::Internal(format!("timeout: {m}")),
            ScanError::Internal(m) => ApiError::Internal(m),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message, retry_after) = match &self {
            ApiError::Validation(m) => (StatusCode::BAD_REQUEST, m.clone(), None),
            ApiError::Access(m) => (StatusCode::FORBIDDEN, m.clone(), None),
            ApiError::Capacity(m) => (StatusCode::PAYLOAD_TOO_LARGE, m.clone(), None),
            ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone(), None),
            ApiError::RateLimited { retry_after_secs } => (
                StatusCode::TOO_MANY_REQUESTS,
                "rate limit exceeded".to_string(),
                Some(*retry_after_secs),
            ),
            ApiError::Internal(m) => {
                error!(error = %m, "internal error surfaced to client");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal error".to_string(),
                    None,
                )
            }
        };

        let mut response = (status, Json(json!({ "error": message }))).into_response();
        if let Some(secs) = retry_after {
            if let Ok(value) = HeaderValue::from_str(&secs.to_string()) {
                response.headers_mut().insert("Retry-After", value);
            }
        }
        response
    }
}
