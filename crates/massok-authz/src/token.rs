//! Access and refresh token issuance and validation.
//!
//! # Purpose
//! Sign and verify the two bearer token kinds used by massok services:
//! short-lived access tokens and long-lived refresh tokens bound to a client
//! session key.
//!
//! # Architectural role
//! Login and refresh handlers mint token pairs through [`TokenIssuer`];
//! request authentication verifies them through [`TokenValidator`]. Both
//! share one [`KeyRing`] holding separate Ed25519 key sets per token type.
//!
//! # Key invariants
//! - Tokens are always EdDSA (Ed25519). Any other header algorithm is
//!   rejected with [`AuthzError::UnexpectedAlgorithm`] before key lookup.
//! - Access and refresh tokens are signed with different key sets, so a
//!   token of one type never verifies as the other.
//! - Expiry is strict: zero leeway, a token is dead once `now > exp`.
//! - Refresh tokens carry `skh`, the hex SHA-256 of the session secret.
//!
//! # Concurrency model
//! [`KeyRing`] guards keys and derived key material with `RwLock`s. Reads
//! dominate; writes happen on first use of a key and on rotation.
//!
//! # Security model and threat assumptions
//! - Callers may present arbitrary JWTs; algorithm, issuer, type, subject and
//!   session binding claims are all checked before claims are returned.
//! - Key IDs (`kid`) order verification attempts but are not secrets.
//! - Private seeds never leave the ring; `Debug` output redacts them.
//!
//! # Examples
//! ```rust
//! use massok_authz::{
//!     DEFAULT_ISSUER, KeyRing, PrincipalId, TokenIssuer, TokenType, TokenValidator,
//!     generate_token_keys,
//! };
//! use std::sync::Arc;
//!
//! let ring = Arc::new(KeyRing::new(generate_token_keys()).unwrap());
//! let issuer = TokenIssuer::new(DEFAULT_ISSUER, ring.clone());
//! let validator = TokenValidator::new(DEFAULT_ISSUER, ring);
//!
//! let issued = issuer.issue_access_token(&PrincipalId::new("u-1")).unwrap();
//! let claims = validator.validate(&issued.token, TokenType::Access).unwrap();
//! assert_eq!(claims.sub, "u-1");
//! ```
use crate::{AuthzError, AuthzResult, PrincipalId, SessionSecret};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use ed25519_dalek::SigningKey as Ed25519SigningKey;
use ed25519_dalek::pkcs8::EncodePrivateKey;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub(crate) const ED25519_KEY_LEN: usize = 32;

pub const ACCESS_TOKEN_TTL: Duration = Duration::from_secs(15 * 60);
pub const REFRESH_TOKEN_TTL: Duration = Duration::from_secs(18 * 60 * 60);
pub const DEFAULT_ISSUER: &str = "classic-massok.auth.service";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

impl TokenType {
    pub fn as_str(self) -> &'static str {
        match self {
            TokenType::Access => "access",
            TokenType::Refresh => "refresh",
        }
    }

    pub fn ttl(self) -> Duration {
        match self {
            TokenType::Access => ACCESS_TOKEN_TTL,
            TokenType::Refresh => REFRESH_TOKEN_TTL,
        }
    }
}

impl std::fmt::Display for TokenType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Claims carried by massok tokens.
///
/// # Security
/// - `skh` is present on refresh tokens only and must match the stored
///   session key hash for the presenting client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    pub sub: String,
    pub token_type: TokenType,
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skh: Option<String>,
}

impl TokenClaims {
    pub fn principal_id(&self) -> PrincipalId {
        PrincipalId::new(self.sub.clone())
    }
}

/// Ed25519 signing key material.
///
/// # Security
/// - Never serialize or log `private_key`.
/// - `alg` must remain EdDSA.
#[derive(Clone)]
pub struct SigningKey {
    pub kid: String,
    pub alg: Algorithm,
    pub private_key: [u8; ED25519_KEY_LEN],
    pub public_key: [u8; ED25519_KEY_LEN],
}

impl SigningKey {
    /// Derive a key from a raw 32-byte seed.
    pub fn from_seed(kid: impl Into<String>, seed: [u8; ED25519_KEY_LEN]) -> Self {
        let public_key = Ed25519SigningKey::from_bytes(&seed)
            .verifying_key()
            .to_bytes();
        Self {
            kid: kid.into(),
            alg: Algorithm::EdDSA,
            private_key: seed,
            public_key,
        }
    }

    /// Check the algorithm is EdDSA and the public key matches the seed.
    ///
    /// # Errors
    /// - [`AuthzError::Key`] on any mismatch.
    pub fn validate(&self) -> AuthzResult<()> {
        if self.alg != Algorithm::EdDSA {
            return Err(AuthzError::Key(format!(
                "invalid signing algorithm for {}: {:?}",
                self.kid, self.alg
            )));
        }
        let expected = Ed25519SigningKey::from_bytes(&self.private_key)
            .verifying_key()
            .to_bytes();
        if expected != self.public_key {
            return Err(AuthzError::Key(format!(
                "public key of {} does not match private seed",
                self.kid
            )));
        }
        Ok(())
    }
}

impl std::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningKey")
            .field("kid", &self.kid)
            .field("alg", &self.alg)
            .field("private_key", &"[REDACTED]")
            .field("public_key", &URL_SAFE_NO_PAD.encode(self.public_key))
            .finish()
    }
}

/// Current key plus previous keys still accepted for verification.
#[derive(Debug, Clone)]
pub struct KeySet {
    pub current: SigningKey,
    pub previous: Vec<SigningKey>,
}

impl KeySet {
    pub fn new(current: SigningKey) -> Self {
        Self {
            current,
            previous: Vec::new(),
        }
    }

    pub fn validate(&self) -> AuthzResult<()> {
        self.current.validate()?;
        for key in &self.previous {
            key.validate()?;
        }
        Ok(())
    }

    /// Current key first, then previous keys in rotation order.
    pub fn all_keys(&self) -> impl Iterator<Item = &SigningKey> {
        std::iter::once(&self.current).chain(self.previous.iter())
    }

    /// Keys in the order verification should try them: the key named by
    /// `kid` first (when known), then the rest in rotation order.
    pub fn verification_order(&self, kid: Option<&str>) -> Vec<&SigningKey> {
        let mut ordered = Vec::with_capacity(1 + self.previous.len());
        if let Some(kid) = kid
            && let Some(found) = self.all_keys().find(|entry| entry.kid == kid)
        {
            ordered.push(found);
            ordered.extend(self.all_keys().filter(|entry| entry.kid != kid));
            return ordered;
        }
        ordered.extend(self.all_keys());
        ordered
    }
}

/// One key set per token type.
#[derive(Debug, Clone)]
pub struct TokenKeys {
    pub access: KeySet,
    pub refresh: KeySet,
}

impl TokenKeys {
    pub fn validate(&self) -> AuthzResult<()> {
        self.access.validate()?;
        self.refresh.validate()?;
        let shared = self
            .access
            .all_keys()
            .any(|a| self.refresh.all_keys().any(|r| r.public_key == a.public_key));
        if shared {
            return Err(AuthzError::Key(
                "access and refresh tokens must use distinct keys".to_string(),
            ));
        }
        Ok(())
    }

    pub fn for_type(&self, token_type: TokenType) -> &KeySet {
        match token_type {
            TokenType::Access => &self.access,
            TokenType::Refresh => &self.refresh,
        }
    }
}

type CacheKey = (TokenType, String);

/// Shared token keys with cached `jsonwebtoken` key material.
///
/// # Overview
/// PKCS8 conversion and public-key decoding are done once per `(type, kid)`
/// and reused until [`KeyRing::rotate`] replaces the keys, which clears both
/// caches so stale material is never used.
pub struct KeyRing {
    keys: RwLock<TokenKeys>,
    encoding: RwLock<HashMap<CacheKey, EncodingKey>>,
    decoding: RwLock<HashMap<CacheKey, DecodingKey>>,
}

impl KeyRing {
    /// # Errors
    /// - [`AuthzError::Key`] if any key is invalid or shared between types.
    pub fn new(keys: TokenKeys) -> AuthzResult<Self> {
        keys.validate()?;
        Ok(Self {
            keys: RwLock::new(keys),
            encoding: RwLock::new(HashMap::new()),
            decoding: RwLock::new(HashMap::new()),
        })
    }

    /// Replace the keys and invalidate cached key material.
    pub fn rotate(&self, keys: TokenKeys) -> AuthzResult<()> {
        keys.validate()?;
        let mut current = self
            .keys
            .write()
            .map_err(|_| AuthzError::Key("key ring lock poisoned".to_string()))?;
        *current = keys;
        if let Ok(mut map) = self.encoding.write() {
            map.clear();
        }
        if let Ok(mut map) = self.decoding.write() {
            map.clear();
        }
        tracing::info!(
            access_kid = %current.access.current.kid,
            refresh_kid = %current.refresh.current.kid,
            "token keys rotated"
        );
        Ok(())
    }

    /// Snapshot of the current keys.
    pub fn keys(&self) -> AuthzResult<TokenKeys> {
        self.keys
            .read()
            .map(|keys| keys.clone())
            .map_err(|_| AuthzError::Key("key ring lock poisoned".to_string()))
    }

    pub(crate) fn key_set(&self, token_type: TokenType) -> AuthzResult<KeySet> {
        self.keys
            .read()
            .map(|keys| keys.for_type(token_type).clone())
            .map_err(|_| AuthzError::Key("key ring lock poisoned".to_string()))
    }

    fn encoding_key(&self, token_type: TokenType, key: &SigningKey) -> AuthzResult<EncodingKey> {
        let cache_key = (token_type, key.kid.clone());
        if let Ok(map) = self.encoding.read()
            && let Some(found) = map.get(&cache_key)
        {
            return Ok(found.clone());
        }
        // jsonwebtoken takes EdDSA private keys as PKCS8 DER only.
        let der = Ed25519SigningKey::from_bytes(&key.private_key)
            .to_pkcs8_der()
            .map_err(|err| AuthzError::Key(format!("encode Ed25519 key: {err}")))?;
        let encoding_key = EncodingKey::from_ed_der(der.as_bytes());
        if let Ok(mut map) = self.encoding.write() {
            map.insert(cache_key, encoding_key.clone());
        }
        Ok(encoding_key)
    }

    fn decoding_key(&self, token_type: TokenType, key: &SigningKey) -> AuthzResult<DecodingKey> {
        let cache_key = (token_type, key.kid.clone());
        if let Ok(map) = self.decoding.read()
            && let Some(found) = map.get(&cache_key)
        {
            return Ok(found.clone());
        }
        let x = URL_SAFE_NO_PAD.encode(key.public_key);
        let decoding_key = DecodingKey::from_ed_components(&x)?;
        if let Ok(mut map) = self.decoding.write() {
            map.insert(cache_key, decoding_key.clone());
        }
        Ok(decoding_key)
    }

    #[cfg(test)]
    fn cached_entries(&self) -> usize {
        let encoding = self.encoding.read().map(|map| map.len()).unwrap_or(0);
        let decoding = self.decoding.read().map(|map| map.len()).unwrap_or(0);
        encoding + decoding
    }
}

impl std::fmt::Debug for KeyRing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyRing").finish_non_exhaustive()
    }
}

/// A signed token and its expiry (unix seconds).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenPair {
    pub access: IssuedToken,
    pub refresh: IssuedToken,
}

#[derive(Debug, Clone)]
pub struct TokenIssuer {
    issuer: String,
    keys: Arc<KeyRing>,
}

impl TokenIssuer {
    pub fn new(issuer: impl Into<String>, keys: Arc<KeyRing>) -> Self {
        Self {
            issuer: issuer.into(),
            keys,
        }
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Issue an access token valid for [`ACCESS_TOKEN_TTL`].
    pub fn issue_access_token(&self, subject: &PrincipalId) -> AuthzResult<IssuedToken> {
        self.issue(subject, TokenType::Access, None)
    }

    /// Issue a refresh token valid for [`REFRESH_TOKEN_TTL`], bound to the
    /// hash of `secret`.
    pub fn issue_refresh_token(
        &self,
        subject: &PrincipalId,
        secret: &SessionSecret,
    ) -> AuthzResult<IssuedToken> {
        let skh = secret.hash();
        self.issue(subject, TokenType::Refresh, Some(skh.as_str().to_string()))
    }

    pub fn issue_pair(
        &self,
        subject: &PrincipalId,
        secret: &SessionSecret,
    ) -> AuthzResult<TokenPair> {
        Ok(TokenPair {
            access: self.issue_access_token(subject)?,
            refresh: self.issue_refresh_token(subject, secret)?,
        })
    }

    fn issue(
        &self,
        subject: &PrincipalId,
        token_type: TokenType,
        skh: Option<String>,
    ) -> AuthzResult<IssuedToken> {
        if subject.is_empty() {
            return Err(AuthzError::MissingSubject);
        }
        let now = now_epoch_seconds();
        let claims = TokenClaims {
            sub: subject.to_string(),
            token_type,
            iss: self.issuer.clone(),
            iat: now,
            exp: now + token_type.ttl().as_secs() as i64,
            skh,
        };
        let token = self.encode_claims(&claims)?;
        Ok(IssuedToken {
            token,
            expires_at: claims.exp,
        })
    }

    /// Sign arbitrary claims with the current key of the claims' token type.
    pub(crate) fn encode_claims(&self, claims: &TokenClaims) -> AuthzResult<String> {
        let key_set = self.keys.key_set(claims.token_type)?;
        let mut header = Header::new(Algorithm::EdDSA);
        header.kid = Some(key_set.current.kid.clone());
        let encoding_key = self
            .keys
            .encoding_key(claims.token_type, &key_set.current)?;
        Ok(jsonwebtoken::encode(&header, claims, &encoding_key)?)
    }
}

#[derive(Debug, Clone)]
pub struct TokenValidator {
    issuer: String,
    keys: Arc<KeyRing>,
}

impl TokenValidator {
    pub fn new(issuer: impl Into<String>, keys: Arc<KeyRing>) -> Self {
        Self {
            issuer: issuer.into(),
            keys,
        }
    }

    /// Verify `token` as a token of type `expected`.
    ///
    /// # Overview
    /// Pins the header algorithm to EdDSA, tries the expected type's keys in
    /// `kid` order, then checks issuer, expiry (zero leeway), token type,
    /// subject and, for refresh tokens, the session key hash claim.
    ///
    /// # Errors
    /// - [`AuthzError::UnexpectedAlgorithm`] for non-EdDSA headers.
    /// - [`AuthzError::Jwt`] for malformed, mis-signed, expired or
    ///   wrong-issuer tokens.
    /// - [`AuthzError::TokenTypeMismatch`], [`AuthzError::MissingSubject`],
    ///   [`AuthzError::MissingSessionBinding`] for claim violations.
    pub fn validate(&self, token: &str, expected: TokenType) -> AuthzResult<TokenClaims> {
        let header = jsonwebtoken::decode_header(token)?;
        if header.alg != Algorithm::EdDSA {
            return Err(AuthzError::UnexpectedAlgorithm(header.alg));
        }

        let key_set = self.keys.key_set(expected)?;
        let mut validation = Validation::new(Algorithm::EdDSA);
        validation.set_issuer(&[self.issuer.as_str()]);
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);
        validation.validate_aud = false;
        validation.leeway = 0;

        let mut last_err = None;
        for key in key_set.verification_order(header.kid.as_deref()) {
            let decoding_key = self.keys.decoding_key(expected, key)?;
            match jsonwebtoken::decode::<TokenClaims>(token, &decoding_key, &validation) {
                Ok(data) => return self.check_claims(data.claims, expected),
                // Only a signature mismatch is worth retrying with an older key.
                Err(err) if matches!(err.kind(), ErrorKind::InvalidSignature) => {
                    last_err = Some(err);
                }
                Err(err) => return Err(AuthzError::Jwt(err)),
            }
        }
        Err(AuthzError::Jwt(
            last_err.unwrap_or_else(|| ErrorKind::InvalidSignature.into()),
        ))
    }

    fn check_claims(&self, claims: TokenClaims, expected: TokenType) -> AuthzResult<TokenClaims> {
        if claims.token_type != expected {
            return Err(AuthzError::TokenTypeMismatch {
                expected,
                actual: claims.token_type,
            });
        }
        if claims.sub.trim().is_empty() {
            return Err(AuthzError::MissingSubject);
        }
        if expected == TokenType::Refresh && claims.skh.as_deref().is_none_or(str::is_empty) {
            return Err(AuthzError::MissingSessionBinding);
        }
        Ok(claims)
    }
}

pub(crate) fn now_epoch_seconds() -> i64 {
    // A clock before the epoch clamps to zero instead of panicking.
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_else(|_| Duration::from_secs(0))
        .as_secs() as i64
}
