//! OpenAPI schema aggregation for the accounts API.
use crate::api::types::{
    AddressCreateRequest, ErrorResponse, HealthStatus, LoginRequest, TokenResponse,
    UserCreateRequest, UserListResponse, UserPatchRequest,
};
use crate::api::{addresses, system, tokens, users};
use crate::model::{Address, User};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "massok-accounts",
        version = "v1",
        description = "massok accounts HTTP API"
    ),
    paths(
        system::system_health,
        tokens::login,
        tokens::refresh,
        users::list_users,
        users::create_user,
        users::get_user,
        users::patch_user,
        users::delete_user,
        addresses::create_address,
        addresses::get_address
    ),
    components(schemas(
        HealthStatus,
        ErrorResponse,
        LoginRequest,
        TokenResponse,
        User,
        UserCreateRequest,
        UserPatchRequest,
        UserListResponse,
        Address,
        AddressCreateRequest
    )),
    modifiers(&BearerAuth),
    tags(
        (name = "system", description = "Health and discovery"),
        (name = "auth", description = "Login and token refresh"),
        (name = "users", description = "User management"),
        (name = "addresses", description = "User addresses")
    )
)]
pub struct ApiDoc;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_routes_and_bearer_scheme() {
        let doc = ApiDoc::openapi();
        for path in [
            "/v1/auth/login",
            "/v1/auth/refresh",
            "/v1/users",
            "/v1/users/{user_id}",
            "/v1/users/{user_id}/addresses",
            "/v1/addresses/{address_id}",
            "/v1/system/health",
        ] {
            assert!(doc.paths.paths.contains_key(path), "{path}");
        }
        let schemes = doc
            .components
            .as_ref()
            .map(|components| components.security_schemes.contains_key("bearer"));
        assert_eq!(schemes, Some(true));
    }
}
