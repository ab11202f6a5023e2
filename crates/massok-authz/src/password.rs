//! Argon2id password hashing.
//!
//! Hashes are PHC strings (`$argon2id$v=19$...`) carrying their own salt and
//! parameters, so verification needs nothing but the stored string.
use crate::{AuthzError, AuthzResult};
use argon2::Argon2;
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};

pub fn hash_password(password: &str) -> AuthzResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| AuthzError::PasswordHash(err.to_string()))
}

/// Check `password` against a stored PHC hash.
///
/// # Errors
/// - [`AuthzError::PasswordHash`] when the stored hash cannot be parsed.
///   A wrong password is `Ok(false)`.
pub fn verify_password(password: &str, stored_hash: &str) -> AuthzResult<bool> {
    let parsed =
        PasswordHash::new(stored_hash).map_err(|err| AuthzError::PasswordHash(err.to_string()))?;
    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(err) => Err(AuthzError::PasswordHash(err.to_string())),
    }
}
