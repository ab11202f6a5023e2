//! Ed25519 signing key generation for access and refresh tokens.
//!
//! # Key invariants
//! - Keys are always Ed25519; the private key is a raw 32-byte seed and the
//!   public key is derived from it.
//! - Generated `kid`s are random; seed-derived `kid`s are a stable hash of
//!   the public key so restarts with the same seed keep the same `kid`.
//! - Access and refresh key sets are generated independently.
use crate::token::ED25519_KEY_LEN;
use crate::{AuthzError, AuthzResult, KeySet, SigningKey, TokenKeys};
use rand::RngCore;
use sha2::{Digest, Sha256};

const KID_LEN: usize = 16;

/// Generate a fresh signing key with a random `kid`.
pub fn generate_signing_key() -> SigningKey {
    let mut seed = [0u8; ED25519_KEY_LEN];
    rand::thread_rng().fill_bytes(&mut seed);

    let mut kid_bytes = [0u8; KID_LEN];
    rand::thread_rng().fill_bytes(&mut kid_bytes);

    SigningKey::from_seed(hex::encode(kid_bytes), seed)
}

/// Generate independent access and refresh key sets with no previous keys.
pub fn generate_token_keys() -> TokenKeys {
    TokenKeys {
        access: KeySet::new(generate_signing_key()),
        refresh: KeySet::new(generate_signing_key()),
    }
}

/// Build a signing key from a hex-encoded 32-byte seed.
///
/// # Errors
/// - [`AuthzError::Key`] when the value is not 64 hex characters.
pub fn signing_key_from_hex_seed(seed_hex: &str) -> AuthzResult<SigningKey> {
    let bytes = hex::decode(seed_hex.trim())
        .map_err(|err| AuthzError::Key(format!("decode seed: {err}")))?;
    let seed: [u8; ED25519_KEY_LEN] = bytes.try_into().map_err(|bytes: Vec<u8>| {
        AuthzError::Key(format!(
            "seed must be {ED25519_KEY_LEN} bytes, got {}",
            bytes.len()
        ))
    })?;
    let mut key = SigningKey::from_seed(String::new(), seed);
    key.kid = derive_kid(&key.public_key);
    Ok(key)
}

fn derive_kid(public_key: &[u8; ED25519_KEY_LEN]) -> String {
    let digest = Sha256::digest(public_key);
    hex::encode(&digest[..KID_LEN])
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::Algorithm;

    #[test]
    fn generated_keys_are_valid_and_distinct() {
        let keys = generate_token_keys();
        keys.validate().expect("valid keys");
        assert_eq!(keys.access.current.alg, Algorithm::EdDSA);
        assert_ne!(keys.access.current.kid, keys.refresh.current.kid);
        assert!(keys.access.previous.is_empty());
    }

    #[test]
    fn hex_seed_yields_stable_kid() {
        let seed = "11".repeat(ED25519_KEY_LEN);
        let a = signing_key_from_hex_seed(&seed).expect("key");
        let b = signing_key_from_hex_seed(&seed).expect("key");
        a.validate().expect("valid");
        assert_eq!(a.kid, b.kid);
        assert_eq!(a.kid.len(), KID_LEN * 2);
        assert_eq!(a.public_key, b.public_key);
    }

    #[test]
    fn hex_seed_rejects_bad_input() {
        assert!(matches!(
            signing_key_from_hex_seed("zz"),
            Err(AuthzError::Key(_))
        ));
        assert!(matches!(
            signing_key_from_hex_seed("abcd"),
            Err(AuthzError::Key(_))
        ));
    }
}
