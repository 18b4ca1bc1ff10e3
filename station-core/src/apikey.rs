//! API key codec
//!
//! A full key has the shape `prefix.secret`. The prefix is a short random
//! hex string used only to locate the stored record. The secret is 32 bytes
//! of OS entropy, hex encoded, and is never persisted in plaintext.

use rand::rngs::OsRng;
use rand::TryRngCore;
use secrecy::{ExposeSecret, SecretString};
use std::fmt;

use crate::KeyError;

/// Separator between the prefix and the secret.
pub const KEY_SEPARATOR: char = '.';

/// Bytes of entropy in the secret half.
pub const SECRET_BYTES: usize = 32;

/// Hex length of the secret half.
pub const SECRET_HEX_LEN: usize = SECRET_BYTES * 2;

/// Longest prefix accepted when parsing.
pub const MAX_PARSED_PREFIX_LEN: usize = 64;

pub const DEFAULT_PREFIX_LEN: usize = 12;
pub const MIN_PREFIX_LEN: usize = 8;
pub const MAX_PREFIX_LEN: usize = 32;

/// A freshly minted key. The full key is shown to the client exactly once.
pub struct GeneratedKey {
    pub full_key: SecretString,
    pub prefix: String,
    pub secret: SecretString,
}

impl fmt::Debug for GeneratedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeneratedKey")
            .field("full_key", &"[REDACTED]")
            .field("prefix", &self.prefix)
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

fn malformed(reason: &str) -> KeyError {
    KeyError::Malformed {
        reason: reason.to_string(),
    }
}

fn is_hex(s: &str) -> bool {
    s.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Split a full key into `(prefix, secret)`.
pub fn parse_api_key(full: &str) -> Result<(&str, &str), KeyError> {
    let mut parts = full.split(KEY_SEPARATOR);
    let (prefix, secret) = match (parts.next(), parts.next(), parts.next()) {
        (Some(prefix), Some(secret), None) => (prefix, secret),
        _ => return Err(malformed("expected exactly one separator")),
    };

    if prefix.is_empty() {
        return Err(malformed("empty prefix"));
    }
    if prefix.len() > MAX_PARSED_PREFIX_LEN {
        return Err(malformed("prefix too long"));
    }
    if !is_hex(prefix) {
        return Err(malformed("prefix is not hex"));
    }
    if secret.len() != SECRET_HEX_LEN {
        return Err(malformed("secret has wrong length"));
    }
    if !is_hex(secret) {
        return Err(malformed("secret is not hex"));
    }

    Ok((prefix, secret))
}

/// Join a prefix and a secret into the wire form.
pub fn format_api_key(prefix: &str, secret: &str) -> String {
    let mut key = String::with_capacity(prefix.len() + 1 + secret.len());
    key.push_str(prefix);
    key.push(KEY_SEPARATOR);
    key.push_str(secret);
    key
}

fn fill_from_os(buf: &mut [u8]) -> Result<(), KeyError> {
    OsRng
        .try_fill_bytes(buf)
        .map_err(|e| KeyError::EntropySource {
            reason: e.to_string(),
        })
}

/// Mint a new key. Prefix and secret are drawn independently from the OS
/// CSPRNG; an entropy failure is an error, never a weaker fallback.
pub fn generate_api_key(prefix_len: usize) -> Result<GeneratedKey, KeyError> {
    if !(MIN_PREFIX_LEN..=MAX_PREFIX_LEN).contains(&prefix_len) {
        return Err(KeyError::InvalidPrefixLength {
            len: prefix_len,
            min: MIN_PREFIX_LEN,
            max: MAX_PREFIX_LEN,
        });
    }

    let mut prefix_bytes = vec![0u8; prefix_len.div_ceil(2)];
    fill_from_os(&mut prefix_bytes)?;
    let mut prefix = hex::encode(&prefix_bytes);
    prefix.truncate(prefix_len);

    let mut secret_bytes = [0u8; SECRET_BYTES];
    fill_from_os(&mut secret_bytes)?;
    let secret = hex::encode(secret_bytes);

    let full_key = format_api_key(&prefix, &secret);

    Ok(GeneratedKey {
        full_key: SecretString::new(full_key.into()),
        prefix,
        secret: SecretString::new(secret.into()),
    })
}

impl GeneratedKey {
    /// Convenience accessor for the one place the key leaves the process.
    pub fn expose_full_key(&self) -> &str {
        self.full_key.expose_secret()
    }
}
