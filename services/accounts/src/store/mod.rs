//! Accounts persistence.
//!
//! # Purpose
//! [`AccountsStore`] is the service's storage seam. [`StoreResources`] adapts
//! it to the repositories the authorization core consumes, dispatching on
//! the resource type names of the model.
use crate::model::{ADDRESS_RESOURCE, Address, USER_RESOURCE, User, UserPatch, UserRecord};
use async_trait::async_trait;
use massok_authz::{
    Principal, PrincipalId, PrincipalRepository, RepositoryError, Resource, ResourceRepository,
};
use std::sync::Arc;
use thiserror::Error;

pub mod memory;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait AccountsStore: Send + Sync {
    async fn list_users(&self) -> StoreResult<Vec<User>>;
    async fn get_user(&self, user_id: &str) -> StoreResult<UserRecord>;
    async fn find_user_by_email(&self, email: &str) -> StoreResult<UserRecord>;
    /// Fails with [`StoreError::Conflict`] when the id or email is taken.
    async fn create_user(&self, record: UserRecord) -> StoreResult<User>;
    /// Applies `patch` to the current record in one step; the email must
    /// stay unique.
    async fn patch_user(&self, user_id: &str, patch: UserPatch) -> StoreResult<User>;
    /// Removes the user and every address it owns.
    async fn delete_user(&self, user_id: &str) -> StoreResult<()>;

    /// Fails with [`StoreError::NotFound`] when the owning user is missing.
    async fn create_address(&self, address: Address) -> StoreResult<Address>;
    async fn get_address(&self, address_id: &str) -> StoreResult<Address>;

    async fn health_check(&self) -> StoreResult<()>;
    fn backend_name(&self) -> &'static str;
}

/// Resource and principal lookups backed by an [`AccountsStore`].
#[derive(Clone)]
pub struct StoreResources {
    store: Arc<dyn AccountsStore>,
}

impl StoreResources {
    pub fn new(store: Arc<dyn AccountsStore>) -> Self {
        Self { store }
    }
}

fn repository_error(resource_type: &str, resource_id: &str, err: StoreError) -> RepositoryError {
    match err {
        StoreError::NotFound(_) => RepositoryError::NotFound {
            resource_type: resource_type.to_string(),
            resource_id: resource_id.to_string(),
        },
        StoreError::Conflict(message) => RepositoryError::Unexpected(anyhow::anyhow!(message)),
        StoreError::Unexpected(err) => RepositoryError::Unexpected(err),
    }
}

#[async_trait]
impl ResourceRepository for StoreResources {
    async fn get(
        &self,
        resource_type: &str,
        resource_id: &str,
    ) -> Result<Arc<dyn Resource>, RepositoryError> {
        match resource_type {
            USER_RESOURCE => self
                .store
                .get_user(resource_id)
                .await
                .map(|record| Arc::new(record.user) as Arc<dyn Resource>)
                .map_err(|err| repository_error(resource_type, resource_id, err)),
            ADDRESS_RESOURCE => self
                .store
                .get_address(resource_id)
                .await
                .map(|address| Arc::new(address) as Arc<dyn Resource>)
                .map_err(|err| repository_error(resource_type, resource_id, err)),
            _ => Err(RepositoryError::NotFound {
                resource_type: resource_type.to_string(),
                resource_id: resource_id.to_string(),
            }),
        }
    }
}

#[async_trait]
impl PrincipalRepository for StoreResources {
    async fn get(&self, id: &PrincipalId) -> Result<Principal, RepositoryError> {
        let record = self
            .store
            .get_user(id.as_str())
            .await
            .map_err(|err| repository_error(USER_RESOURCE, id.as_str(), err))?;
        Ok(Principal {
            id: PrincipalId::new(record.user.id),
            roles: record.user.roles,
            password_hash: record.password_hash,
        })
    }
}
