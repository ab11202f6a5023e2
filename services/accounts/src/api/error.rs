//! API error types and helpers.
//!
//! # Purpose and responsibility
//! Keeps error bodies uniform across accounts endpoints and maps store,
//! authentication and resolution failures onto HTTP statuses.
//!
//! # Security considerations
//! - Internal errors are logged server-side and answered generically.
//! - Authentication failures never say which check failed.
use crate::api::types::ErrorResponse;
use crate::store::StoreError;
use axum::Json;
use axum::http::StatusCode;
use axum::response::IntoResponse;

/// Structured API error returned by handlers.
///
/// # Example
/// ```rust
/// use accounts::api::error::api_not_found;
/// use axum::http::StatusCode;
///
/// let err = api_not_found("user not found");
/// assert_eq!(err.status, StatusCode::NOT_FOUND);
/// ```
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub body: ErrorResponse,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        (self.status, Json(self.body)).into_response()
    }
}

fn api_error(status: StatusCode, code: &str, message: &str) -> ApiError {
    ApiError {
        status,
        body: ErrorResponse {
            code: code.to_string(),
            message: message.to_string(),
            request_id: None,
        },
    }
}

pub fn api_not_found(message: &str) -> ApiError {
    api_error(StatusCode::NOT_FOUND, "not_found", message)
}

/// Build a 409 Conflict error with a caller-provided code.
pub fn api_conflict(code: &str, message: &str) -> ApiError {
    api_error(StatusCode::CONFLICT, code, message)
}

/// Build a 500 from a store error, logging the details.
pub fn api_internal(message: &str, err: &StoreError) -> ApiError {
    tracing::error!(error = ?err, "accounts storage error");
    api_internal_message(message)
}

pub fn api_internal_message(message: &str) -> ApiError {
    api_error(StatusCode::INTERNAL_SERVER_ERROR, "internal", message)
}

pub fn api_unauthorized(message: &str) -> ApiError {
    api_error(StatusCode::UNAUTHORIZED, "unauthorized", message)
}

pub fn api_forbidden(message: &str) -> ApiError {
    api_error(StatusCode::FORBIDDEN, "forbidden", message)
}

pub fn api_validation_error(message: &str) -> ApiError {
    api_error(StatusCode::BAD_REQUEST, "validation_error", message)
}

/// Map a store failure for a single named entity.
pub(crate) fn store_error(entity: &str, err: StoreError) -> ApiError {
    match err {
        StoreError::NotFound(_) => api_not_found(&format!("{entity} not found")),
        StoreError::Conflict(_) => {
            api_conflict("already_exists", &format!("{entity} already exists"))
        }
        err => api_internal(&format!("failed to access {entity}"), &err),
    }
}
