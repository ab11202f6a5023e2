//! Hierarchical role strings.
//!
//! # Purpose
//! Roles have the shape `<scope>.<type>[.<resourceID>]`. The two-part form is
//! global (`global.admin`), the three-part form is scoped to one resource
//! (`users.user.7f3c...`). Scope and type come from closed allow-lists
//! ([`AppScope`], [`RoleType`]); extend them by adding variants.
//!
//! # Key invariants
//! - A role validates only with exactly two or three non-empty segments.
//! - [`GLOBAL_ADMIN`] allows every action on every resource.
//! - [`USER_SELF`] is stored verbatim and resolved to the acting principal
//!   at evaluation time ([`resolve_self`]), never at storage time.
//!
//! # Examples
//! ```rust
//! use massok_authz::{AppScope, RoleType, generate_roles, validate_role};
//!
//! let roles = generate_roles(AppScope::Users, RoleType::User, &["u-1", "u-2"]).unwrap();
//! assert_eq!(roles, vec!["users.user.u-1", "users.user.u-2"]);
//! assert!(validate_role("global.admin").is_ok());
//! assert!(validate_role("global").is_err());
//! ```
use crate::{AuthzError, AuthzResult, PrincipalId};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::HashSet;

/// Universal role; short-circuits every access check to allow.
pub const GLOBAL_ADMIN: &str = "global.admin";
/// Self template; its resource segment becomes the acting principal's id.
pub const USER_SELF: &str = "users.user.self";

const SELF_SEGMENT: &str = "self";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppScope {
    Global,
    Users,
}

impl AppScope {
    pub fn as_str(self) -> &'static str {
        match self {
            AppScope::Global => "global",
            AppScope::Users => "users",
        }
    }
}

impl std::fmt::Display for AppScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AppScope {
    type Err = AuthzError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "global" => Ok(AppScope::Global),
            "users" => Ok(AppScope::Users),
            _ => Err(AuthzError::InvalidScope(value.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleType {
    Admin,
    User,
}

impl RoleType {
    pub fn as_str(self) -> &'static str {
        match self {
            RoleType::Admin => "admin",
            RoleType::User => "user",
        }
    }
}

impl std::fmt::Display for RoleType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RoleType {
    type Err = AuthzError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "admin" => Ok(RoleType::Admin),
            "user" => Ok(RoleType::User),
            _ => Err(AuthzError::InvalidRoleType(value.to_string())),
        }
    }
}

/// Validate a single role string.
///
/// # Errors
/// - [`AuthzError::MisconfiguredRole`] when the role is not two or three
///   non-empty dot-separated segments.
/// - [`AuthzError::InvalidScope`] / [`AuthzError::InvalidRoleType`] when a
///   segment is outside its allow-list.
pub fn validate_role(role: &str) -> AuthzResult<()> {
    let parts: Vec<&str> = role.split('.').collect();
    if !(2..=3).contains(&parts.len()) || parts.iter().any(|part| part.is_empty()) {
        return Err(AuthzError::MisconfiguredRole(role.to_string()));
    }
    parts[0].parse::<AppScope>()?;
    parts[1].parse::<RoleType>()?;
    Ok(())
}

/// Generate roles for a scope and type.
///
/// Global scope yields the single two-part role and ignores `resource_ids`.
/// Any other scope yields one three-part role per id and requires at least
/// one id. Every generated role is validated before it is returned.
pub fn generate_roles<S: AsRef<str>>(
    scope: AppScope,
    role_type: RoleType,
    resource_ids: &[S],
) -> AuthzResult<Vec<String>> {
    if scope == AppScope::Global {
        let role = format!("{scope}.{role_type}");
        validate_role(&role)?;
        return Ok(vec![role]);
    }

    if resource_ids.is_empty() {
        return Err(AuthzError::MissingResourceIds(scope.to_string()));
    }

    resource_ids
        .iter()
        .map(|id| {
            let role = resource_role(scope, role_type, id.as_ref());
            validate_role(&role)?;
            Ok(role)
        })
        .collect()
}

/// Render the resource-scoped role used inside a resource's ACL, for example
/// `users.user.<owner id>`. Not validated; ACL builders control the inputs.
pub fn resource_role(scope: AppScope, role_type: RoleType, resource_id: &str) -> String {
    format!("{scope}.{role_type}.{resource_id}")
}

/// Substitute the acting principal into the self template.
///
/// Any role other than [`USER_SELF`] is returned unchanged.
pub fn resolve_self<'a>(role: &'a str, principal_id: &PrincipalId) -> Cow<'a, str> {
    if role != USER_SELF {
        return Cow::Borrowed(role);
    }
    match role.rsplit_once('.') {
        Some((prefix, SELF_SEGMENT)) => Cow::Owned(format!("{prefix}.{principal_id}")),
        _ => Cow::Borrowed(role),
    }
}

/// Ordered role list held by a principal or an ACE.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Roles(Vec<String>);

impl Roles {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Generate roles for the scope/type and append them.
    ///
    /// Nothing is appended when generation fails.
    pub fn add<S: AsRef<str>>(
        &mut self,
        scope: AppScope,
        role_type: RoleType,
        resource_ids: &[S],
    ) -> AuthzResult<()> {
        let generated = generate_roles(scope, role_type, resource_ids)?;
        self.0.extend(generated);
        Ok(())
    }

    pub fn push(&mut self, role: impl Into<String>) {
        self.0.push(role.into());
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.0.iter().any(|current| current == role)
    }

    /// Remove the first occurrence of `role`; returns whether one was removed.
    pub fn remove_role(&mut self, role: &str) -> bool {
        match self.0.iter().position(|current| current == role) {
            Some(index) => {
                self.0.remove(index);
                true
            }
            None => false,
        }
    }

    /// Stable de-duplication; the first occurrence of each role wins.
    pub fn dedupe(&mut self) {
        let mut seen = HashSet::with_capacity(self.0.len());
        self.0.retain(|role| seen.insert(role.clone()));
    }

    /// Validate every role, reporting the first failure.
    pub fn validate(&self) -> AuthzResult<()> {
        self.0.iter().try_for_each(|role| validate_role(role))
    }

    pub fn is_global_admin(&self) -> bool {
        self.has_role(GLOBAL_ADMIN)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }
}

impl From<Vec<String>> for Roles {
    fn from(value: Vec<String>) -> Self {
        Self(value)
    }
}

impl<const N: usize> From<[&str; N]> for Roles {
    fn from(value: [&str; N]) -> Self {
        Self(value.iter().map(|role| role.to_string()).collect())
    }
}

impl FromIterator<String> for Roles {
    fn from_iter<T: IntoIterator<Item = String>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a Roles {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
