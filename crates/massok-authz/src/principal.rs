use crate::{PrincipalId, RepositoryError, Roles};
use async_trait::async_trait;

/// An authenticated subject as seen by the authorization core.
#[derive(Clone)]
pub struct Principal {
    pub id: PrincipalId,
    pub roles: Roles,
    /// Argon2 PHC string.
    pub password_hash: String,
}

impl std::fmt::Debug for Principal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Principal")
            .field("id", &self.id)
            .field("roles", &self.roles)
            .finish_non_exhaustive()
    }
}

/// Confirms a token subject still exists and supplies its current roles.
#[async_trait]
pub trait PrincipalRepository: Send + Sync {
    async fn get(&self, id: &PrincipalId) -> Result<Principal, RepositoryError>;
}
