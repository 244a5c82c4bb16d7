use std::sync::OnceLock;

use argon2::{
    password_hash::{self, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand_core::OsRng;

use crate::services::auth::AuthError;

/// Hash a plaintext password into a salted Argon2 PHC string.
pub fn hash_password(plaintext: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(plaintext.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| {
            log::error!("Password hashing failed: {}", e);
            AuthError::HashingFailure
        })
}

/// Check a plaintext password against a stored digest.
///
/// A mismatch is `Ok(false)`. Only an unreadable digest or an internal
/// Argon2 fault is an error.
pub fn verify_password(plaintext: &str, digest: &str) -> Result<bool, AuthError> {
    let parsed = PasswordHash::new(digest).map_err(|e| {
        log::error!("Stored password digest is unreadable: {}", e);
        AuthError::HashingFailure
    })?;

    match Argon2::default().verify_password(plaintext.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(password_hash::Error::Password) => Ok(false),
        Err(e) => {
            log::error!("Password verification failed: {}", e);
            Err(AuthError::HashingFailure)
        }
    }
}

/// [`hash_password`] on the blocking pool, off the async workers.
pub async fn hash_password_blocking(plaintext: &str) -> Result<String, AuthError> {
    let plaintext = plaintext.to_owned();
    tokio::task::spawn_blocking(move || hash_password(&plaintext))
        .await
        .map_err(|e| {
            log::error!("Password hashing task failed: {}", e);
            AuthError::HashingFailure
        })?
}

/// [`verify_password`] on the blocking pool, off the async workers.
pub async fn verify_password_blocking(plaintext: &str, digest: &str) -> Result<bool, AuthError> {
    let plaintext = plaintext.to_owned();
    let digest = digest.to_owned();
    tokio::task::spawn_blocking(move || verify_password(&plaintext, &digest))
        .await
        .map_err(|e| {
            log::error!("Password verification task failed: {}", e);
            AuthError::HashingFailure
        })?
}

/// Digest verified against when no account matches, so an unknown email
/// costs the same as a wrong password.
pub fn dummy_digest() -> Result<&'static str, AuthError> {
    static DUMMY: OnceLock<String> = OnceLock::new();

    if let Some(digest) = DUMMY.get() {
        return Ok(digest.as_str());
    }
    let digest = hash_password("no-such-account-placeholder")?;
    Ok(DUMMY.get_or_init(|| digest).as_str())
}
