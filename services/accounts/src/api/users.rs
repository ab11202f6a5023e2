//! User API handlers.
//!
//! Listing and creating users are checked against the root resource, which
//! only a global admin passes. Per-user operations are checked against the
//! user's ACL; role changes additionally need `user.roles.update` on root.
use crate::api::error::{ApiError, api_internal_message, api_validation_error, store_error};
use crate::api::types::{UserCreateRequest, UserListResponse, UserPatchRequest};
use crate::api::{hash_password, now_unix, require_non_empty, validate_email};
use crate::app::AppState;
use crate::auth::guard::{authorize_root, authorize_target, require_principal};
use crate::model::{USER_RESOURCE, User, UserPatch, UserRecord, actions};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::{Extension, Json};
use massok_authz::{Identity, PrincipalId, Roles, USER_SELF, validate_role};

#[utoipa::path(
    get,
    path = "/v1/users",
    tag = "users",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "List users", body = UserListResponse),
        (status = 401, description = "Unauthenticated", body = crate::api::types::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn list_users(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> Result<Json<UserListResponse>, ApiError> {
    let principal = require_principal(&identity)?;
    authorize_root(&state, principal, actions::USER_LIST).await?;
    let items = state
        .store
        .list_users()
        .await
        .map_err(|err| store_error("users", err))?;
    Ok(Json(UserListResponse { items }))
}

#[utoipa::path(
    post,
    path = "/v1/users",
    tag = "users",
    security(("bearer" = [])),
    request_body = UserCreateRequest,
    responses(
        (status = 201, description = "User created", body = User),
        (status = 400, description = "Invalid user", body = crate::api::types::ErrorResponse),
        (status = 409, description = "Email already registered", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn create_user(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(body): Json<UserCreateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let principal = require_principal(&identity)?;
    authorize_root(&state, principal, actions::USER_CREATE).await?;

    validate_email(&body.email)?;
    require_non_empty("password", &body.password)?;
    let mut roles = match body.roles {
        Some(roles) => Roles::from(roles),
        None => Roles::from([USER_SELF]),
    };
    roles
        .validate()
        .map_err(|err| api_validation_error(&err.to_string()))?;
    roles.dedupe();

    let password_hash = hash_password(body.password).await?;
    let now = now_unix();
    let user = User {
        id: uuid::Uuid::new_v4().to_string(),
        email: body.email.trim().to_string(),
        first_name: body.first_name,
        last_name: body.last_name,
        roles,
        phone: body.phone,
        can_sms: body.can_sms,
        birthday: body.birthday,
        created_at: now,
        updated_at: now,
        created_by: principal.principal_id.to_string(),
        updated_by: principal.principal_id.to_string(),
    };
    let user = state
        .store
        .create_user(UserRecord {
            user,
            password_hash,
        })
        .await
        .map_err(|err| store_error("user", err))?;
    tracing::info!(user_id = %user.id, created_by = %principal.principal_id, "user created");
    Ok((StatusCode::CREATED, Json(user)))
}

#[utoipa::path(
    get,
    path = "/v1/users/{user_id}",
    tag = "users",
    security(("bearer" = [])),
    params(("user_id" = String, Path, description = "User identifier")),
    responses(
        (status = 200, description = "User", body = User),
        (status = 403, description = "Forbidden", body = crate::api::types::ErrorResponse),
        (status = 404, description = "User not found", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn get_user(
    Path(user_id): Path<String>,
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> Result<Json<User>, ApiError> {
    let principal = require_principal(&identity)?;
    authorize_target(&state, principal, USER_RESOURCE, &user_id, actions::USER_READ).await?;
    let record = state
        .store
        .get_user(&user_id)
        .await
        .map_err(|err| store_error("user", err))?;
    Ok(Json(record.user))
}

#[utoipa::path(
    patch,
    path = "/v1/users/{user_id}",
    tag = "users",
    security(("bearer" = [])),
    params(("user_id" = String, Path, description = "User identifier")),
    request_body = UserPatchRequest,
    responses(
        (status = 200, description = "User updated", body = User),
        (status = 400, description = "Invalid change", body = crate::api::types::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::api::types::ErrorResponse),
        (status = 404, description = "User not found", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn patch_user(
    Path(user_id): Path<String>,
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(patch): Json<UserPatchRequest>,
) -> Result<Json<User>, ApiError> {
    let principal = require_principal(&identity)?;
    authorize_target(&state, principal, USER_RESOURCE, &user_id, actions::USER_UPDATE).await?;
    if patch.changes_roles() {
        authorize_root(&state, principal, actions::USER_ROLES_UPDATE).await?;
    }

    let email = match patch.email {
        Some(email) => {
            validate_email(&email)?;
            Some(email.trim().to_string())
        }
        None => None,
    };
    for role in &patch.add_roles {
        validate_role(role).map_err(|err| api_validation_error(&err.to_string()))?;
    }
    let password_hash = match patch.password {
        Some(password) => {
            require_non_empty("password", &password)?;
            Some(hash_password(password).await?)
        }
        None => None,
    };
    let password_changed = password_hash.is_some();
    let changes = UserPatch {
        email,
        password_hash,
        first_name: patch.first_name,
        last_name: patch.last_name,
        add_roles: patch.add_roles,
        remove_roles: patch.remove_roles,
        phone: patch.phone,
        can_sms: patch.can_sms,
        birthday: patch.birthday,
        updated_at: now_unix(),
        updated_by: principal.principal_id.to_string(),
    };

    let user = state
        .store
        .patch_user(&user_id, changes)
        .await
        .map_err(|err| store_error("user", err))?;
    if password_changed {
        revoke_sessions(&state, &user.id).await?;
    }
    Ok(Json(user))
}

#[utoipa::path(
    delete,
    path = "/v1/users/{user_id}",
    tag = "users",
    security(("bearer" = [])),
    params(("user_id" = String, Path, description = "User identifier")),
    responses(
        (status = 204, description = "User deleted"),
        (status = 403, description = "Forbidden", body = crate::api::types::ErrorResponse),
        (status = 404, description = "User not found", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn delete_user(
    Path(user_id): Path<String>,
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> Result<StatusCode, ApiError> {
    let principal = require_principal(&identity)?;
    authorize_target(&state, principal, USER_RESOURCE, &user_id, actions::USER_DELETE).await?;
    state
        .store
        .delete_user(&user_id)
        .await
        .map_err(|err| store_error("user", err))?;
    revoke_sessions(&state, &user_id).await?;
    tracing::info!(user_id = %user_id, deleted_by = %principal.principal_id, "user deleted");
    Ok(StatusCode::NO_CONTENT)
}

async fn revoke_sessions(state: &AppState, user_id: &str) -> Result<(), ApiError> {
    let revoked = state
        .sessions
        .revoke_all(&PrincipalId::new(user_id))
        .await
        .map_err(|err| {
            tracing::error!(error = %err, user_id, "session revocation failed");
            api_internal_message("failed to revoke sessions")
        })?;
    tracing::info!(user_id, revoked, "session keys revoked");
    Ok(())
}
