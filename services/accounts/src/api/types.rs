//! HTTP API request/response types.
use crate::model::User;
use massok_authz::TokenPair;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct HealthStatus {
    pub status: String,
    pub backend: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
    pub request_id: Option<String>,
}

#[derive(Deserialize, ToSchema, Clone)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

impl std::fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginRequest")
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

/// Access/refresh pair; expiries are unix seconds.
#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct TokenResponse {
    pub access_token: String,
    pub access_token_expiry: i64,
    pub refresh_token: String,
    pub refresh_token_expiry: i64,
    pub token_type: String,
}

impl From<TokenPair> for TokenResponse {
    fn from(pair: TokenPair) -> Self {
        Self {
            access_token: pair.access.token,
            access_token_expiry: pair.access.expires_at,
            refresh_token: pair.refresh.token,
            refresh_token_expiry: pair.refresh.expires_at,
            token_type: "Bearer".to_string(),
        }
    }
}

#[derive(Deserialize, ToSchema, Clone)]
pub struct UserCreateRequest {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    /// Defaults to the self role when omitted.
    pub roles: Option<Vec<String>>,
    pub phone: Option<String>,
    pub can_sms: Option<bool>,
    pub birthday: Option<String>,
}

impl std::fmt::Debug for UserCreateRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserCreateRequest")
            .field("email", &self.email)
            .field("roles", &self.roles)
            .finish_non_exhaustive()
    }
}

#[derive(Deserialize, ToSchema, Clone, Default)]
pub struct UserPatchRequest {
    pub email: Option<String>,
    pub password: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    #[serde(default)]
    pub add_roles: Vec<String>,
    #[serde(default)]
    pub remove_roles: Vec<String>,
    pub phone: Option<String>,
    pub can_sms: Option<bool>,
    pub birthday: Option<String>,
}

impl UserPatchRequest {
    pub fn changes_roles(&self) -> bool {
        !self.add_roles.is_empty() || !self.remove_roles.is_empty()
    }
}

impl std::fmt::Debug for UserPatchRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserPatchRequest")
            .field("email", &self.email)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("add_roles", &self.add_roles)
            .field("remove_roles", &self.remove_roles)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UserListResponse {
    pub items: Vec<User>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct AddressCreateRequest {
    pub line1: String,
    pub line2: Option<String>,
    pub city: String,
    pub postal_code: String,
    pub country: String,
}
