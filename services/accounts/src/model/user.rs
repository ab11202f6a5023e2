//! User records and their access-control list.
use massok_authz::{Ace, Acl, AppScope, HasAcl, Resource, RoleType, Roles, resource_role};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub const USER_RESOURCE: &str = "user";

/// Action names checked by the accounts API.
pub mod actions {
    pub const USER_LIST: &str = "user.list";
    pub const USER_CREATE: &str = "user.create";
    pub const USER_READ: &str = "user.read";
    pub const USER_UPDATE: &str = "user.update";
    pub const USER_DELETE: &str = "user.delete";
    pub const USER_ROLES_UPDATE: &str = "user.roles.update";
    pub const ADDRESS_CREATE: &str = "address.create";
    pub const ADDRESS_READ: &str = "address.read";

    /// Granted to the user's own resource role.
    pub const SELF_SERVICE: [&str; 4] = [USER_READ, USER_UPDATE, ADDRESS_CREATE, ADDRESS_READ];
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, PartialEq)]
pub struct User {
    pub id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    #[schema(value_type = Vec<String>)]
    pub roles: Roles,
    pub phone: Option<String>,
    pub can_sms: Option<bool>,
    /// ISO-8601 calendar date.
    pub birthday: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
    pub created_by: String,
    pub updated_by: String,
}

impl HasAcl for User {
    fn acl(&self) -> Acl {
        vec![Ace::new(
            [resource_role(AppScope::Users, RoleType::User, &self.id)],
            actions::SELF_SERVICE,
        )]
    }
}

impl Resource for User {
    fn resource_type(&self) -> &str {
        USER_RESOURCE
    }

    fn resource_id(&self) -> &str {
        &self.id
    }

    fn as_acl(&self) -> Option<&dyn HasAcl> {
        Some(self)
    }
}

/// A user as stored, including the credential never returned by the API.
#[derive(Clone)]
pub struct UserRecord {
    pub user: User,
    /// Argon2 PHC string.
    pub password_hash: String,
}

impl std::fmt::Debug for UserRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserRecord")
            .field("user", &self.user)
            .finish_non_exhaustive()
    }
}

/// Field-level changes to a stored user, applied atomically by the store.
///
/// Only fields that are `Some` (or listed role edits) change, so concurrent
/// patches touching different fields do not overwrite each other.
#[derive(Clone, Default)]
pub struct UserPatch {
    pub email: Option<String>,
    /// Argon2 PHC string replacing the current hash.
    pub password_hash: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub add_roles: Vec<String>,
    pub remove_roles: Vec<String>,
    pub phone: Option<String>,
    pub can_sms: Option<bool>,
    pub birthday: Option<String>,
    pub updated_at: i64,
    pub updated_by: String,
}

impl UserPatch {
    pub fn apply(self, record: &mut UserRecord) {
        let user = &mut record.user;
        if let Some(email) = self.email {
            user.email = email;
        }
        if let Some(password_hash) = self.password_hash {
            record.password_hash = password_hash;
        }
        if let Some(first_name) = self.first_name {
            user.first_name = first_name;
        }
        if let Some(last_name) = self.last_name {
            user.last_name = last_name;
        }
        if self.phone.is_some() {
            user.phone = self.phone;
        }
        if self.can_sms.is_some() {
            user.can_sms = self.can_sms;
        }
        if self.birthday.is_some() {
            user.birthday = self.birthday;
        }
        for role in self.add_roles {
            user.roles.push(role);
        }
        user.roles.dedupe();
        for role in &self.remove_roles {
            user.roles.remove_role(role);
        }
        user.updated_at = self.updated_at;
        user.updated_by = self.updated_by;
    }
}

impl std::fmt::Debug for UserPatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserPatch")
            .field("email", &self.email)
            .field("add_roles", &self.add_roles)
            .field("remove_roles", &self.remove_roles)
            .field("updated_by", &self.updated_by)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
pub(crate) fn sample_user(id: &str) -> User {
    User {
        id: id.to_string(),
        email: format!("{id}@example.com"),
        first_name: "Ada".to_string(),
        last_name: "Lovelace".to_string(),
        roles: Roles::from([massok_authz::USER_SELF]),
        phone: None,
        can_sms: None,
        birthday: None,
        created_at: 0,
        updated_at: 0,
        created_by: String::new(),
        updated_by: String::new(),
    }
}
