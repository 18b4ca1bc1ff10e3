//! Argon2 password hashing for operator accounts

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use once_cell::sync::Lazy;
use rand::rngs::OsRng;
use rand::TryRngCore;

use crate::KeyError;

const SALT_BYTES: usize = 16;

fn hash_error(reason: impl Into<String>) -> KeyError {
    KeyError::PasswordHash {
        reason: reason.into(),
    }
}

/// Hash a password into a PHC string (argon2id, default parameters).
pub fn hash_password(password: &str) -> Result<String, KeyError> {
    if password.is_empty() {
        return Err(hash_error("empty password"));
    }

    let mut salt_bytes = [0u8; SALT_BYTES];
    OsRng
        .try_fill_bytes(&mut salt_bytes)
        .map_err(|e| KeyError::EntropySource {
            reason: e.to_string(),
        })?;
    let salt = SaltString::encode_b64(&salt_bytes).map_err(|e| hash_error(e.to_string()))?;

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| hash_error(format!("failed to hash password: {e}")))
}

/// Check a password against a stored PHC string.
///
/// Returns `Ok(false)` on mismatch. An empty input or an unparseable hash
/// is an error so callers can fail closed and log the cause.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, KeyError> {
    if password.is_empty() {
        return Err(hash_error("empty password"));
    }
    if hash.is_empty() {
        return Err(hash_error("empty stored hash"));
    }

    let parsed = PasswordHash::new(hash)
        .map_err(|e| hash_error(format!("invalid password hash format: {e}")))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

/// Hash with the same parameters as real accounts, for rejections that never
/// reach a stored hash. `None` only if hashing itself is broken.
static DUMMY_HASH: Lazy<Option<String>> =
    Lazy::new(|| hash_password("station-dummy-password").ok());

/// Spend the same argon2 work as a real check, then report no match.
///
/// Used when the account is unknown or unconfirmed so those rejections cost
/// as much as a wrong password.
pub fn verify_dummy_password(password: &str) -> bool {
    if let Some(hash) = DUMMY_HASH.as_ref() {
        let _ = verify_password(password, hash);
    }
    false
}
