//! Postal addresses owned by a user.
//!
//! Addresses carry no ACL of their own; access is decided by walking to the
//! owning user.
use super::USER_RESOURCE;
use massok_authz::{HasParent, ParentRef, Resource};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub const ADDRESS_RESOURCE: &str = "address";

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, PartialEq)]
pub struct Address {
    pub id: String,
    pub user_id: String,
    pub line1: String,
    pub line2: Option<String>,
    pub city: String,
    pub postal_code: String,
    pub country: String,
    pub created_at: i64,
    pub created_by: String,
}

impl HasParent for Address {
    fn parent(&self) -> ParentRef {
        ParentRef::new(USER_RESOURCE, self.user_id.clone())
    }
}

impl Resource for Address {
    fn resource_type(&self) -> &str {
        ADDRESS_RESOURCE
    }

    fn resource_id(&self) -> &str {
        &self.id
    }

    fn as_parent(&self) -> Option<&dyn HasParent> {
        Some(self)
    }
}
