//! massok authentication and authorization core.
//!
//! # Purpose
//! Centralizes the role model, per-client session keys, access/refresh token
//! issuance and validation, request authentication, and the resource ACL
//! resolver used by massok services.
//!
//! # How it fits
//! Services mint token pairs at login and refresh, authenticate each request
//! into a typed [`Identity`], then ask [`AccessResolver`] whether that
//! identity may perform an action on the target resource. Persistence stays
//! outside the crate behind [`ResourceRepository`], [`PrincipalRepository`]
//! and [`SessionKeyStore`].
//!
//! # Key invariants
//! - Tokens are EdDSA/Ed25519 only, with separate key sets for access and
//!   refresh tokens.
//! - Refresh tokens are single-use per client: each refresh rotates the
//!   client's session key and the old hash stops verifying.
//! - Authentication fails open to anonymous; authorization fails closed and
//!   never turns a system error into a denial.
//!
//! # Examples
//! ```rust
//! use massok_authz::{AppScope, RoleType, Roles};
//!
//! let mut roles = Roles::new();
//! roles.add(AppScope::Users, RoleType::User, &["u-1"]).unwrap();
//! assert!(roles.has_role("users.user.u-1"));
//! ```
//!
//! # Common pitfalls
//! - Sharing one key pair between access and refresh tokens; [`KeyRing::new`]
//!   rejects it.
//! - Treating `Err` from [`AccessResolver::access_allowed`] as "deny"; it is a
//!   system failure and should surface as one.

mod acl;
mod errors;
mod identity;
mod keys;
mod password;
mod principal;
mod role;
mod session;
mod token;
mod types;

pub use acl::{
    AccessResolver, Ace, Acl, DEFAULT_MAX_PARENT_HOPS, HasAcl, HasParent, ParentRef, Resource,
    ResourceRepository, acl_grants,
};
pub use errors::{AccessError, AuthzError, AuthzResult, RepositoryError};
pub use identity::{Authenticator, Identity, PrincipalContext, extract_bearer};
pub use keys::{generate_signing_key, generate_token_keys, signing_key_from_hex_seed};
pub use password::{hash_password, verify_password};
pub use principal::{Principal, PrincipalRepository};
pub use role::{
    AppScope, GLOBAL_ADMIN, RoleType, Roles, USER_SELF, generate_roles, resolve_self,
    resource_role, validate_role,
};
pub use session::{
    MemorySessionKeyStore, SessionKeyHash, SessionKeyStore, SessionSecret, hash_secret,
};
pub use token::{
    ACCESS_TOKEN_TTL, DEFAULT_ISSUER, IssuedToken, KeyRing, KeySet, REFRESH_TOKEN_TTL, SigningKey,
    TokenClaims, TokenIssuer, TokenKeys, TokenPair, TokenType, TokenValidator,
};
pub use types::{ClientId, PrincipalId};
