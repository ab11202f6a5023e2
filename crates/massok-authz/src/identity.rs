//! Request authentication and the typed request identity.
//!
//! # Purpose
//! Turn a bearer token and the observed client into an [`Identity`] that the
//! request carries for its lifetime. Authorization reads roles and the
//! principal id from it; refresh handlers read the session binding.
//!
//! # Key invariants
//! - Authentication fails open: a missing, malformed, expired, mis-signed or
//!   unbound token yields [`Identity::Anonymous`]. Authorization stays fail
//!   closed because anonymous holds no roles.
//! - An access token is tried first; any authentication failure falls back to
//!   validating the same token as a refresh token bound to `client`.
//! - Store and repository failures are never absorbed; they propagate.
//! - [`Authenticator::authenticate_refresh`] is terminal: failures are
//!   returned to the caller.
use crate::{
    AuthzError, AuthzResult, ClientId, Principal, PrincipalId, PrincipalRepository, RepositoryError,
    Roles, SessionKeyHash, SessionKeyStore, SessionSecret, TokenClaims, TokenType, TokenValidator,
};
use std::collections::HashMap;
use std::sync::Arc;

const BEARER_SCHEME: &str = "Bearer";

#[derive(Debug, Clone, Default)]
pub enum Identity {
    #[default]
    Anonymous,
    Principal(PrincipalContext),
}

impl Identity {
    pub fn principal(&self) -> Option<&PrincipalContext> {
        match self {
            Identity::Anonymous => None,
            Identity::Principal(context) => Some(context),
        }
    }

    pub fn is_anonymous(&self) -> bool {
        matches!(self, Identity::Anonymous)
    }
}

/// Authenticated principal attached to a request.
#[derive(Debug, Clone)]
pub struct PrincipalContext {
    pub principal_id: PrincipalId,
    pub roles: Roles,
    pub session_keys: HashMap<ClientId, SessionKeyHash>,
    pub token_type: TokenType,
}

/// Extract the token from an `Authorization` header value.
///
/// Only `Bearer <token>` with exactly one space-separated token is accepted.
pub fn extract_bearer(header: &str) -> Option<&str> {
    let mut parts = header.split(' ');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(BEARER_SCHEME), Some(token), None) if !token.is_empty() => Some(token),
        _ => None,
    }
}

pub struct Authenticator {
    validator: TokenValidator,
    principals: Arc<dyn PrincipalRepository>,
    sessions: Arc<dyn SessionKeyStore>,
}

impl Authenticator {
    pub fn new(
        validator: TokenValidator,
        principals: Arc<dyn PrincipalRepository>,
        sessions: Arc<dyn SessionKeyStore>,
    ) -> Self {
        Self {
            validator,
            principals,
            sessions,
        }
    }

    /// Authenticate a request.
    ///
    /// # Errors
    /// Only system errors (session store, principal repository, key ring).
    pub async fn authenticate(
        &self,
        bearer: Option<&str>,
        client: &ClientId,
    ) -> AuthzResult<Identity> {
        let Some(token) = bearer.filter(|token| !token.is_empty()) else {
            return Ok(Identity::Anonymous);
        };

        let outcome = match self.validator.validate(token, TokenType::Access) {
            Ok(claims) => self.load_context(&claims, TokenType::Access).await,
            Err(err) if err.is_authentication_failure() => {
                tracing::debug!(error = %err, "access token rejected; trying refresh");
                self.authenticate_refresh(token, client).await
            }
            Err(err) => Err(err),
        };

        match outcome {
            Ok(context) => Ok(Identity::Principal(context)),
            Err(err) if err.is_authentication_failure() => {
                tracing::debug!(error = %err, client = %client, "request left anonymous");
                Ok(Identity::Anonymous)
            }
            Err(err) => Err(err),
        }
    }

    /// Authenticate a refresh token for `client`. Failures are terminal.
    ///
    /// # Errors
    /// - Token validation errors from [`TokenValidator::validate`].
    /// - [`AuthzError::UnknownPrincipal`] when the subject no longer exists.
    /// - [`AuthzError::SessionBindingRejected`] when the token's session hash
    ///   is not the current one for `client`.
    pub async fn authenticate_refresh(
        &self,
        token: &str,
        client: &ClientId,
    ) -> AuthzResult<PrincipalContext> {
        let claims = self.validator.validate(token, TokenType::Refresh)?;
        let principal_id = claims.principal_id();
        let presented = claims.skh.as_deref().unwrap_or_default();
        let bound = self
            .sessions
            .verify_binding(&principal_id, client, presented)
            .await?;
        if !bound {
            tracing::warn!(
                principal = %principal_id,
                client = %client,
                "refresh session binding rejected"
            );
            return Err(AuthzError::SessionBindingRejected(principal_id.to_string()));
        }
        self.load_context(&claims, TokenType::Refresh).await
    }

    /// Redeem a refresh token for `client`: validate it, load the principal,
    /// then rotate the client's session key only if the token carries the
    /// current hash.
    ///
    /// Concurrent redemptions of one token yield at most one new secret. A
    /// failed principal lookup leaves the binding untouched.
    ///
    /// # Errors
    /// As [`Authenticator::authenticate_refresh`].
    pub async fn redeem_refresh(
        &self,
        token: &str,
        client: &ClientId,
    ) -> AuthzResult<(PrincipalContext, SessionSecret)> {
        let claims = self.validator.validate(token, TokenType::Refresh)?;
        let principal = self.load_principal(&claims).await?;
        let presented = claims.skh.as_deref().unwrap_or_default();
        let Some(secret) = self
            .sessions
            .rotate_if_current(&principal.id, client, presented)
            .await?
        else {
            tracing::warn!(
                principal = %principal.id,
                client = %client,
                "refresh token replayed or unbound"
            );
            return Err(AuthzError::SessionBindingRejected(principal.id.to_string()));
        };
        let context = self.context_for(principal, TokenType::Refresh).await?;
        Ok((context, secret))
    }

    async fn load_context(
        &self,
        claims: &TokenClaims,
        token_type: TokenType,
    ) -> AuthzResult<PrincipalContext> {
        let principal = self.load_principal(claims).await?;
        self.context_for(principal, token_type).await
    }

    async fn load_principal(&self, claims: &TokenClaims) -> AuthzResult<Principal> {
        let principal_id = claims.principal_id();
        match self.principals.get(&principal_id).await {
            Ok(principal) => Ok(principal),
            Err(RepositoryError::NotFound { .. }) => {
                Err(AuthzError::UnknownPrincipal(principal_id.to_string()))
            }
            Err(RepositoryError::Unexpected(err)) => {
                tracing::error!(principal = %principal_id, error = %err, "principal lookup failed");
                Err(AuthzError::PrincipalRepository(err))
            }
        }
    }

    async fn context_for(
        &self,
        principal: Principal,
        token_type: TokenType,
    ) -> AuthzResult<PrincipalContext> {
        let session_keys = self.sessions.session_keys(&principal.id).await?;
        Ok(PrincipalContext {
            principal_id: principal.id,
            roles: principal.roles,
            session_keys,
            token_type,
        })
    }
}

impl std::fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authenticator")
            .field("validator", &self.validator)
            .finish_non_exhaustive()
    }
}
