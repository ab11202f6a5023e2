//! Address API handlers.
//!
//! Addresses have no ACL; reading one walks to the owning user, so whoever
//! may read addresses of that user may read it.
use crate::api::error::{ApiError, store_error};
use crate::api::types::AddressCreateRequest;
use crate::api::{now_unix, require_non_empty};
use crate::app::AppState;
use crate::auth::guard::{authorize_target, require_principal};
use crate::model::{ADDRESS_RESOURCE, Address, USER_RESOURCE, actions};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::{Extension, Json};
use massok_authz::Identity;

#[utoipa::path(
    post,
    path = "/v1/users/{user_id}/addresses",
    tag = "addresses",
    security(("bearer" = [])),
    params(("user_id" = String, Path, description = "Owning user")),
    request_body = AddressCreateRequest,
    responses(
        (status = 201, description = "Address created", body = Address),
        (status = 403, description = "Forbidden", body = crate::api::types::ErrorResponse),
        (status = 404, description = "User not found", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn create_address(
    Path(user_id): Path<String>,
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(body): Json<AddressCreateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let principal = require_principal(&identity)?;
    authorize_target(&state, principal, USER_RESOURCE, &user_id, actions::ADDRESS_CREATE).await?;

    require_non_empty("line1", &body.line1)?;
    require_non_empty("city", &body.city)?;
    require_non_empty("country", &body.country)?;
    let address = Address {
        id: uuid::Uuid::new_v4().to_string(),
        user_id,
        line1: body.line1,
        line2: body.line2,
        city: body.city,
        postal_code: body.postal_code,
        country: body.country,
        created_at: now_unix(),
        created_by: principal.principal_id.to_string(),
    };
    let address = state
        .store
        .create_address(address)
        .await
        .map_err(|err| store_error("user", err))?;
    Ok((StatusCode::CREATED, Json(address)))
}

#[utoipa::path(
    get,
    path = "/v1/addresses/{address_id}",
    tag = "addresses",
    security(("bearer" = [])),
    params(("address_id" = String, Path, description = "Address identifier")),
    responses(
        (status = 200, description = "Address", body = Address),
        (status = 403, description = "Forbidden", body = crate::api::types::ErrorResponse),
        (status = 404, description = "Address or owner not found", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn get_address(
    Path(address_id): Path<String>,
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> Result<Json<Address>, ApiError> {
    let principal = require_principal(&identity)?;
    authorize_target(
        &state,
        principal,
        ADDRESS_RESOURCE,
        &address_id,
        actions::ADDRESS_READ,
    )
    .await?;
    let address = state
        .store
        .get_address(&address_id)
        .await
        .map_err(|err| store_error("address", err))?;
    Ok(Json(address))
}
