//! Digesting of API key secrets
//!
//! With a pepper configured the digest is HMAC-SHA256 keyed by the pepper,
//! otherwise plain SHA-256. The pepper lives only in process memory.

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};
use std::fmt;
use subtle::ConstantTimeEq;

use crate::KeyError;

type HmacSha256 = Hmac<Sha256>;

/// Digest width in bytes.
pub const DIGEST_LEN: usize = 32;

/// Stand-in compared against when no record exists, so an unknown prefix
/// costs the same as a wrong secret.
const DUMMY_DIGEST: [u8; DIGEST_LEN] = [0u8; DIGEST_LEN];

#[derive(Clone)]
pub struct KeyDigester {
    mac: Option<HmacSha256>,
}

impl fmt::Debug for KeyDigester {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyDigester")
            .field("peppered", &self.mac.is_some())
            .finish()
    }
}

impl KeyDigester {
    pub fn new(pepper: Option<SecretString>) -> Result<Self, KeyError> {
        let mac = match pepper {
            Some(pepper) => {
                let bytes = pepper.expose_secret().as_bytes();
                if bytes.is_empty() {
                    return Err(KeyError::InvalidDigest {
                        reason: "pepper is empty".to_string(),
                    });
                }
                let mac = HmacSha256::new_from_slice(bytes).map_err(|e| KeyError::InvalidDigest {
                    reason: e.to_string(),
                })?;
                Some(mac)
            }
            None => None,
        };
        Ok(Self { mac })
    }

    /// Unpeppered digester. Suitable for tests and local development.
    pub fn unpeppered() -> Self {
        Self { mac: None }
    }

    pub fn is_peppered(&self) -> bool {
        self.mac.is_some()
    }

    pub fn digest(&self, secret: &str) -> [u8; DIGEST_LEN] {
        match &self.mac {
            Some(mac) => {
                let mut mac = mac.clone();
                mac.update(secret.as_bytes());
                mac.finalize().into_bytes().into()
            }
            None => Sha256::digest(secret.as_bytes()).into(),
        }
    }

    /// Hex form, as persisted in the key record.
    pub fn digest_hex(&self, secret: &str) -> String {
        hex::encode(self.digest(secret))
    }

    /// Recompute and compare in constant time. A stored value that is not
    /// valid hex of the right width never verifies.
    pub fn verify(&self, candidate: &str, stored_hex: &str) -> bool {
        let computed = self.digest(candidate);
        let mut stored = [0u8; DIGEST_LEN];
        if hex::decode_to_slice(stored_hex, &mut stored).is_err() {
            // Still compare so the failure costs the same.
            let _ = computed.ct_eq(&DUMMY_DIGEST);
            return false;
        }
        computed.ct_eq(&stored).into()
    }

    /// Burn one digest and comparison without a stored record.
    pub fn verify_dummy(&self, candidate: &str) -> bool {
        let computed = self.digest(candidate);
        let _ = computed.ct_eq(&DUMMY_DIGEST);
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn peppered() -> KeyDigester {
        KeyDigester::new(Some(SecretString::new(
            "a-pepper-that-is-at-least-32-bytes-long".into(),
        )))
        .unwrap()
    }

    #[test]
    fn test_unpeppered_is_sha256() {
        let digester = KeyDigester::new(None).unwrap();
        assert!(!digester.is_peppered());
        assert_eq!(
            digester.digest_hex("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_pepper_changes_digest() {
        let plain = KeyDigester::unpeppered();
        let salted = peppered();
        assert!(salted.is_peppered());
        assert_ne!(plain.digest("secret"), salted.digest("secret"));
    }

    #[test]
    fn test_empty_pepper_rejected() {
        let err = KeyDigester::new(Some(SecretString::new("".into()))).unwrap_err();
        assert!(matches!(err, KeyError::InvalidDigest { .. }));
    }

    #[test]
    fn test_verify_rejects_malformed_stored_digest() {
        let digester = peppered();
        assert!(!digester.verify("secret", "not hex"));
        assert!(!digester.verify("secret", ""));
        assert!(!digester.verify("secret", &"ab".repeat(31)));
    }

    #[test]
    fn test_verify_dummy_never_succeeds() {
        assert!(!peppered().verify_dummy("anything"));
    }

    #[test]
    fn test_debug_hides_pepper() {
        let debug = format!("{:?}", peppered());
        assert!(!debug.contains("pepper-that"));
        assert!(debug.contains("peppered: true"));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(128))]

        #[test]
        fn prop_verify_own_digest(secret in "[0-9a-f]{64}", pepper in proptest::option::of("[ -~]{32,48}")) {
            let digester = KeyDigester::new(pepper.map(|p| SecretString::new(p.into()))).unwrap();
            let stored = digester.digest_hex(&secret);
            prop_assert!(digester.verify(&secret, &stored));
        }

        #[test]
        fn prop_distinct_secrets_distinct_digests(a in "[0-9a-f]{64}", b in "[0-9a-f]{64}") {
            prop_assume!(a != b);
            for digester in [KeyDigester::unpeppered(), peppered()] {
                prop_assert_ne!(digester.digest(&a), digester.digest(&b));
                prop_assert!(!digester.verify(&b, &digester.digest_hex(&a)));
            }
        }
    }
}
