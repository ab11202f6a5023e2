//! In-memory implementation of the accounts store.
//!
//! # Durability and consistency
//! - **Not durable**: all state is lost on process restart.
//! - One `tokio::sync::RwLock` guards every map, so multi-map mutations
//!   (unique email index, cascading address deletes) are atomic.
use super::{AccountsStore, StoreError, StoreResult};
use crate::model::{Address, User, UserPatch, UserRecord};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct State {
    users: HashMap<String, UserRecord>,
    // Lowercased email -> user id.
    emails: HashMap<String, String>,
    addresses: HashMap<String, Address>,
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    state: Arc<RwLock<State>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn email_key(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}

#[async_trait]
impl AccountsStore for InMemoryStore {
    async fn list_users(&self) -> StoreResult<Vec<User>> {
        let state = self.state.read().await;
        let mut users: Vec<User> = state
            .users
            .values()
            .map(|record| record.user.clone())
            .collect();
        users.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(users)
    }

    async fn get_user(&self, user_id: &str) -> StoreResult<UserRecord> {
        self.state
            .read()
            .await
            .users
            .get(user_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("user {user_id}")))
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<UserRecord> {
        let state = self.state.read().await;
        state
            .emails
            .get(&email_key(email))
            .and_then(|user_id| state.users.get(user_id))
            .cloned()
            .ok_or_else(|| StoreError::NotFound("user by email".to_string()))
    }

    async fn create_user(&self, record: UserRecord) -> StoreResult<User> {
        let mut state = self.state.write().await;
        let key = email_key(&record.user.email);
        if state.users.contains_key(&record.user.id) {
            return Err(StoreError::Conflict(format!("user {}", record.user.id)));
        }
        if state.emails.contains_key(&key) {
            return Err(StoreError::Conflict("email already registered".to_string()));
        }
        let user = record.user.clone();
        state.emails.insert(key, user.id.clone());
        state.users.insert(user.id.clone(), record);
        Ok(user)
    }

    async fn patch_user(&self, user_id: &str, patch: UserPatch) -> StoreResult<User> {
        let mut guard = self.state.write().await;
        let state = &mut *guard;
        let Some(record) = state.users.get_mut(user_id) else {
            return Err(StoreError::NotFound(format!("user {user_id}")));
        };
        let old_key = email_key(&record.user.email);
        let new_key = patch.email.as_deref().map(email_key);
        if let Some(new_key) = new_key.filter(|key| *key != old_key) {
            if state.emails.contains_key(&new_key) {
                return Err(StoreError::Conflict("email already registered".to_string()));
            }
            state.emails.remove(&old_key);
            state.emails.insert(new_key, user_id.to_string());
        }
        patch.apply(record);
        Ok(record.user.clone())
    }

    async fn delete_user(&self, user_id: &str) -> StoreResult<()> {
        let mut state = self.state.write().await;
        let Some(record) = state.users.remove(user_id) else {
            return Err(StoreError::NotFound(format!("user {user_id}")));
        };
        state.emails.remove(&email_key(&record.user.email));
        state.addresses.retain(|_, address| address.user_id != user_id);
        Ok(())
    }

    async fn create_address(&self, address: Address) -> StoreResult<Address> {
        let mut state = self.state.write().await;
        if !state.users.contains_key(&address.user_id) {
            return Err(StoreError::NotFound(format!("user {}", address.user_id)));
        }
        if state.addresses.contains_key(&address.id) {
            return Err(StoreError::Conflict(format!("address {}", address.id)));
        }
        state.addresses.insert(address.id.clone(), address.clone());
        Ok(address)
    }

    async fn get_address(&self, address_id: &str) -> StoreResult<Address> {
        self.state
            .read()
            .await
            .addresses
            .get(address_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("address {address_id}")))
    }

    async fn health_check(&self) -> StoreResult<()> {
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::sample_user;

    fn record(id: &str) -> UserRecord {
        UserRecord {
            user: sample_user(id),
            password_hash: "hash".to_string(),
        }
    }

    fn address(id: &str, user_id: &str) -> Address {
        Address {
            id: id.to_string(),
            user_id: user_id.to_string(),
            line1: "1 Main St".to_string(),
            line2: None,
            city: "Springfield".to_string(),
            postal_code: "00001".to_string(),
            country: "US".to_string(),
            created_at: 0,
            created_by: user_id.to_string(),
        }
    }

    #[tokio::test]
    async fn emails_are_unique_case_insensitively() {
        let store = InMemoryStore::new();
        store.create_user(record("u-1")).await.expect("create");

        let mut dup = record("u-2");
        dup.user.email = "U-1@Example.com".to_string();
        let err = store.create_user(dup).await.expect_err("duplicate email");
        assert!(matches!(err, StoreError::Conflict(_)));

        let found = store
            .find_user_by_email(" u-1@EXAMPLE.com ")
            .await
            .expect("lookup");
        assert_eq!(found.user.id, "u-1");
    }

    fn email_patch(email: &str) -> UserPatch {
        UserPatch {
            email: Some(email.to_string()),
            ..UserPatch::default()
        }
    }

    #[tokio::test]
    async fn patch_moves_the_email_index() {
        let store = InMemoryStore::new();
        store.create_user(record("u-1")).await.expect("u-1");
        store.create_user(record("u-2")).await.expect("u-2");

        store
            .patch_user("u-1", email_patch("new@example.com"))
            .await
            .expect("patch");
        assert!(store.find_user_by_email("u-1@example.com").await.is_err());
        assert!(store.find_user_by_email("new@example.com").await.is_ok());

        let err = store
            .patch_user("u-2", email_patch("NEW@example.com"))
            .await
            .expect_err("clash");
        assert!(matches!(err, StoreError::Conflict(_)));
        assert!(store.find_user_by_email("u-2@example.com").await.is_ok());

        let err = store
            .patch_user("ghost", UserPatch::default())
            .await
            .expect_err("missing");
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_patches_keep_each_others_fields() {
        let store = InMemoryStore::new();
        let mut seeded = record("u-1");
        seeded.user.roles.push("users.user.u-2");
        store.create_user(seeded).await.expect("create");

        let revoke = UserPatch {
            remove_roles: vec!["users.user.u-2".to_string()],
            ..UserPatch::default()
        };
        let rename = UserPatch {
            first_name: Some("Renamed".to_string()),
            ..UserPatch::default()
        };
        let (left, right) = tokio::join!(
            {
                let store = store.clone();
                tokio::spawn(async move { store.patch_user("u-1", revoke).await })
            },
            {
                let store = store.clone();
                tokio::spawn(async move { store.patch_user("u-1", rename).await })
            }
        );
        left.expect("join").expect("revoke");
        right.expect("join").expect("rename");

        let user = store.get_user("u-1").await.expect("get").user;
        assert_eq!(user.first_name, "Renamed");
        assert!(!user.roles.has_role("users.user.u-2"));
    }

    #[tokio::test]
    async fn delete_cascades_to_addresses() {
        let store = InMemoryStore::new();
        store.create_user(record("u-1")).await.expect("user");
        store.create_address(address("a-1", "u-1")).await.expect("address");

        store.delete_user("u-1").await.expect("delete");
        assert!(matches!(
            store.get_address("a-1").await,
            Err(StoreError::NotFound(_))
        ));
        assert!(matches!(
            store.delete_user("u-1").await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn address_requires_existing_owner() {
        let store = InMemoryStore::new();
        let err = store
            .create_address(address("a-1", "ghost"))
            .await
            .expect_err("no owner");
        assert!(matches!(err, StoreError::NotFound(_)));
    }
}
