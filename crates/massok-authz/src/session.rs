//! Per-client session keys that bind refresh tokens to a client.
//!
//! # Purpose
//! Every (principal, client) pair owns one random secret. Refresh tokens carry
//! the SHA-256 hash of the secret that was current when they were issued; a
//! refresh is accepted only while that hash still matches the stored one.
//! Rotating on every refresh makes each refresh token single-use per client.
//!
//! # Key invariants
//! - The plaintext secret is returned once by [`SessionKeyStore::create_or_rotate`]
//!   and never stored; only its hash is retained.
//! - After any number of concurrent rotations of one pair exactly one hash is
//!   current (last writer wins).
//! - Unknown pairs and empty client ids fail closed.
//!
//! # Concurrency model
//! [`MemorySessionKeyStore`] keeps one `DashMap` entry per principal; writes
//! for a principal are serialized by the shard lock.
use crate::{AuthzError, AuthzResult, ClientId, PrincipalId};
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use dashmap::DashMap;
use rand::RngCore;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;

const SESSION_SECRET_LEN: usize = 32;

/// Plaintext session secret. Only handed out once, at rotation time.
pub struct SessionSecret(SecretString);

impl SessionSecret {
    /// Generate a fresh random secret (32 bytes, base64url without padding).
    pub fn generate() -> Self {
        let mut bytes = [0u8; SESSION_SECRET_LEN];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self::from_plaintext(URL_SAFE_NO_PAD.encode(bytes))
    }

    pub fn from_plaintext(value: impl Into<String>) -> Self {
        Self(SecretString::from(value.into()))
    }

    pub fn hash(&self) -> SessionKeyHash {
        hash_secret(self.0.expose_secret())
    }

    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }
}

impl std::fmt::Debug for SessionSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SessionSecret([REDACTED])")
    }
}

/// Hex-encoded SHA-256 hash of a session secret.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionKeyHash(String);

impl SessionKeyHash {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Constant-time comparison against a presented hash.
    pub fn matches(&self, presented: &str) -> bool {
        constant_time_eq(self.0.as_bytes(), presented.as_bytes())
    }
}

impl std::fmt::Display for SessionKeyHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

pub fn hash_secret(secret: &str) -> SessionKeyHash {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    SessionKeyHash(hex::encode(hasher.finalize()))
}

pub(crate) fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (left, right) in a.iter().zip(b.iter()) {
        diff |= left ^ right;
    }
    diff == 0
}

#[async_trait]
pub trait SessionKeyStore: Send + Sync {
    /// Replace the pair's secret with a fresh one and return its plaintext.
    ///
    /// # Errors
    /// - [`AuthzError::MissingClient`] when `client` is empty.
    /// - [`AuthzError::SessionStore`] when the backing store fails.
    async fn create_or_rotate(
        &self,
        principal: &PrincipalId,
        client: &ClientId,
    ) -> AuthzResult<SessionSecret>;

    /// Compare the pair's current hash with `presented` in constant time.
    ///
    /// Returns `Ok(false)` for unknown pairs and empty client ids.
    async fn verify_binding(
        &self,
        principal: &PrincipalId,
        client: &ClientId,
        presented: &str,
    ) -> AuthzResult<bool>;

    /// Rotate the pair only while its current hash still equals `presented`.
    ///
    /// The compare and the replacement happen under one lock, so of several
    /// callers presenting the same hash at most one receives `Some`.
    async fn rotate_if_current(
        &self,
        principal: &PrincipalId,
        client: &ClientId,
        presented: &str,
    ) -> AuthzResult<Option<SessionSecret>>;

    /// Current hash per client for a principal; empty when none exist.
    async fn session_keys(
        &self,
        principal: &PrincipalId,
    ) -> AuthzResult<HashMap<ClientId, SessionKeyHash>>;

    /// Drop every client binding of a principal; returns how many were dropped.
    async fn revoke_all(&self, principal: &PrincipalId) -> AuthzResult<usize>;
}

/// In-memory [`SessionKeyStore`].
#[derive(Debug, Default)]
pub struct MemorySessionKeyStore {
    keys: DashMap<PrincipalId, HashMap<ClientId, SessionKeyHash>>,
}

impl MemorySessionKeyStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionKeyStore for MemorySessionKeyStore {
    async fn create_or_rotate(
        &self,
        principal: &PrincipalId,
        client: &ClientId,
    ) -> AuthzResult<SessionSecret> {
        if client.is_empty() {
            return Err(AuthzError::MissingClient);
        }
        let secret = SessionSecret::generate();
        let hash = secret.hash();
        let rotated = self
            .keys
            .entry(principal.clone())
            .or_default()
            .insert(client.clone(), hash)
            .is_some();
        tracing::debug!(principal = %principal, client = %client, rotated, "session key issued");
        Ok(secret)
    }

    async fn verify_binding(
        &self,
        principal: &PrincipalId,
        client: &ClientId,
        presented: &str,
    ) -> AuthzResult<bool> {
        if client.is_empty() || presented.is_empty() {
            return Ok(false);
        }
        let Some(entry) = self.keys.get(principal) else {
            return Ok(false);
        };
        Ok(entry
            .get(client)
            .map(|stored| stored.matches(presented))
            .unwrap_or(false))
    }

    async fn rotate_if_current(
        &self,
        principal: &PrincipalId,
        client: &ClientId,
        presented: &str,
    ) -> AuthzResult<Option<SessionSecret>> {
        if client.is_empty() || presented.is_empty() {
            return Ok(None);
        }
        let Some(mut entry) = self.keys.get_mut(principal) else {
            return Ok(None);
        };
        let Some(stored) = entry.value_mut().get_mut(client) else {
            return Ok(None);
        };
        if !stored.matches(presented) {
            tracing::debug!(
                principal = %principal,
                client = %client,
                "stale session key presented"
            );
            return Ok(None);
        }
        let secret = SessionSecret::generate();
        *stored = secret.hash();
        Ok(Some(secret))
    }

    async fn session_keys(
        &self,
        principal: &PrincipalId,
    ) -> AuthzResult<HashMap<ClientId, SessionKeyHash>> {
        Ok(self
            .keys
            .get(principal)
            .map(|entry| entry.value().clone())
            .unwrap_or_default())
    }

    async fn revoke_all(&self, principal: &PrincipalId) -> AuthzResult<usize> {
        let revoked = self
            .keys
            .remove(principal)
            .map(|(_, clients)| clients.len())
            .unwrap_or(0);
        tracing::debug!(principal = %principal, revoked, "session keys revoked");
        Ok(revoked)
    }
}
