//! Accounts HTTP API module.
//!
//! # Purpose
//! Exposes route handler modules plus helpers shared by handlers: password
//! hashing off the async runtime and request validation.
pub mod addresses;
pub mod error;
pub mod openapi;
pub mod system;
pub mod tokens;
pub mod types;
pub mod users;

use crate::api::error::{ApiError, api_internal_message, api_validation_error};
use std::time::{SystemTime, UNIX_EPOCH};

/// Current unix time in seconds.
pub fn now_unix() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs() as i64)
        .unwrap_or_default()
}

/// Argon2 is CPU bound; run it on the blocking pool.
pub(crate) async fn hash_password(password: String) -> Result<String, ApiError> {
    tokio::task::spawn_blocking(move || massok_authz::hash_password(&password))
        .await
        .map_err(|err| {
            tracing::error!(error = %err, "password hashing task failed");
            api_internal_message("failed to hash password")
        })?
        .map_err(|err| {
            tracing::error!(error = %err, "password hashing failed");
            api_internal_message("failed to hash password")
        })
}

pub(crate) async fn verify_password(
    password: String,
    stored_hash: String,
) -> Result<bool, ApiError> {
    tokio::task::spawn_blocking(move || massok_authz::verify_password(&password, &stored_hash))
        .await
        .map_err(|err| {
            tracing::error!(error = %err, "password verification task failed");
            api_internal_message("failed to verify password")
        })?
        .map_err(|err| {
            tracing::error!(error = %err, "stored password hash unreadable");
            api_internal_message("failed to verify password")
        })
}

pub(crate) fn validate_email(email: &str) -> Result<(), ApiError> {
    let trimmed = email.trim();
    match trimmed.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(()),
        _ => Err(api_validation_error("email is invalid")),
    }
}

pub(crate) fn require_non_empty(field: &str, value: &str) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        return Err(api_validation_error(&format!("{field} must not be empty")));
    }
    Ok(())
}
