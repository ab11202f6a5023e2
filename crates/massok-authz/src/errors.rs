use crate::TokenType;
use jsonwebtoken::Algorithm;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthzError {
    #[error("role is misconfigured: {0}")]
    MisconfiguredRole(String),
    #[error("invalid application scope: {0}")]
    InvalidScope(String),
    #[error("invalid role type: {0}")]
    InvalidRoleType(String),
    #[error("resource ids must be provided for scope {0}")]
    MissingResourceIds(String),
    #[error("jwt error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),
    #[error("key error: {0}")]
    Key(String),
    #[error("unexpected signing algorithm: {0:?}")]
    UnexpectedAlgorithm(Algorithm),
    #[error("token type mismatch: expected {expected}, got {actual}")]
    TokenTypeMismatch {
        expected: TokenType,
        actual: TokenType,
    },
    #[error("token subject is empty")]
    MissingSubject,
    #[error("refresh token carries no session binding")]
    MissingSessionBinding,
    #[error("session key requires a client id")]
    MissingClient,
    #[error("session binding rejected for principal {0}")]
    SessionBindingRejected(String),
    #[error("unknown principal {0}")]
    UnknownPrincipal(String),
    #[error("password hashing failed: {0}")]
    PasswordHash(String),
    #[error("session key store failure: {0}")]
    SessionStore(#[source] anyhow::Error),
    #[error("principal repository failure: {0}")]
    PrincipalRepository(#[source] anyhow::Error),
}

impl AuthzError {
    /// Whether the error is an authentication failure that request
    /// authentication may absorb into an anonymous identity.
    ///
    /// Store and repository failures are system errors and always propagate.
    pub fn is_authentication_failure(&self) -> bool {
        matches!(
            self,
            AuthzError::Jwt(_)
                | AuthzError::UnexpectedAlgorithm(_)
                | AuthzError::TokenTypeMismatch { .. }
                | AuthzError::MissingSubject
                | AuthzError::MissingSessionBinding
                | AuthzError::SessionBindingRejected(_)
                | AuthzError::UnknownPrincipal(_)
        )
    }
}

pub type AuthzResult<T> = Result<T, AuthzError>;

/// Failures reported by a [`ResourceRepository`](crate::ResourceRepository) or
/// [`PrincipalRepository`](crate::PrincipalRepository).
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("{resource_type}:{resource_id} not found")]
    NotFound {
        resource_type: String,
        resource_id: String,
    },
    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

/// System errors raised while resolving access. A denial is never an error;
/// it is `Ok(false)` from the resolver.
#[derive(Debug, Error)]
pub enum AccessError {
    #[error("{resource_type}:{resource_id} not found")]
    NotFound {
        resource_type: String,
        resource_id: String,
    },
    #[error("failed to get {resource_type}:{resource_id}: {source}")]
    Repository {
        resource_type: String,
        resource_id: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("resource chain exceeded {0} parent hops")]
    ChainTooDeep(usize),
    #[error("timed out fetching {resource_type}:{resource_id}")]
    Timeout {
        resource_type: String,
        resource_id: String,
    },
    #[error("access resolution cancelled")]
    Cancelled,
}
