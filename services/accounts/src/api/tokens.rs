//! Login and refresh endpoints.
//!
//! # Key invariants
//! - Both endpoints rotate the caller's session key for its client address,
//!   so the refresh token returned previously to that client stops working.
//! - Refresh is terminal: an invalid, replayed or unbound refresh token is a
//!   401, never an anonymous fallthrough.
//! - Credential failures answer the same message whether the email or the
//!   password was wrong.
use crate::api::error::{
    ApiError, api_internal, api_internal_message, api_unauthorized, api_validation_error,
};
use crate::api::types::{LoginRequest, TokenResponse};
use crate::api::verify_password;
use crate::app::AppState;
use crate::store::StoreError;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use axum::{Extension, Json};
use massok_authz::{AuthzError, ClientId, PrincipalId, SessionSecret, extract_bearer};

#[utoipa::path(
    post,
    path = "/v1/auth/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Token pair issued", body = TokenResponse),
        (status = 400, description = "Client address unavailable", body = crate::api::types::ErrorResponse),
        (status = 401, description = "Invalid credentials", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn login(
    State(state): State<AppState>,
    Extension(client): Extension<ClientId>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    let record = match state.store.find_user_by_email(&body.email).await {
        Ok(record) => record,
        Err(StoreError::NotFound(_)) => return Err(api_unauthorized("invalid credentials")),
        Err(err) => return Err(api_internal("failed to load user", &err)),
    };
    if !verify_password(body.password, record.password_hash).await? {
        tracing::info!(user_id = %record.user.id, client = %client, "login rejected");
        return Err(api_unauthorized("invalid credentials"));
    }

    let principal = PrincipalId::new(record.user.id);
    let secret = state
        .sessions
        .create_or_rotate(&principal, &client)
        .await
        .map_err(session_error)?;
    tracing::info!(principal = %principal, client = %client, "login succeeded");
    issue(&state, &principal, &secret)
}

#[utoipa::path(
    post,
    path = "/v1/auth/refresh",
    tag = "auth",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Token pair rotated", body = TokenResponse),
        (status = 401, description = "Refresh token rejected", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn refresh(
    State(state): State<AppState>,
    Extension(client): Extension<ClientId>,
    headers: HeaderMap,
) -> Result<Json<TokenResponse>, ApiError> {
    let token = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(extract_bearer)
        .ok_or_else(|| api_unauthorized("missing bearer token"))?;

    let (context, secret) = match state.authenticator.redeem_refresh(token, &client).await {
        Ok(redeemed) => redeemed,
        Err(err) if err.is_authentication_failure() => {
            tracing::info!(error = %err, client = %client, "refresh rejected");
            return Err(api_unauthorized("invalid refresh token"));
        }
        Err(err) => return Err(session_error(err)),
    };
    issue(&state, &context.principal_id, &secret)
}

fn issue(
    state: &AppState,
    principal: &PrincipalId,
    secret: &SessionSecret,
) -> Result<Json<TokenResponse>, ApiError> {
    let pair = state.tokens.issue_pair(principal, secret).map_err(|err| {
        tracing::error!(error = %err, principal = %principal, "token issuance failed");
        api_internal_message("failed to issue tokens")
    })?;
    Ok(Json(pair.into()))
}

fn session_error(err: AuthzError) -> ApiError {
    match err {
        AuthzError::MissingClient => api_validation_error("client address unavailable"),
        err => {
            tracing::error!(error = %err, "session key store failed");
            api_internal_message("session store unavailable")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn missing_client_is_a_bad_request() {
        let err = session_error(AuthzError::MissingClient);
        assert_eq!(err.status, StatusCode::BAD_REQUEST);

        let err = session_error(AuthzError::SessionStore(anyhow::anyhow!("down")));
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!err.body.message.contains("down"));
    }
}
