//! Password hashing for the user directory.
//!
//! Stored form: `base64url(salt)$base64url(sha256(salt || password))`.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngCore;
use sha2::{Digest, Sha256};

/// Stateless hash/verify pair injected into the user directory.
pub trait PasswordHasher: Send + Sync {
    /// Hash a plaintext password with a fresh salt.
    fn hash(&self, password: &str) -> String;

    /// Check a plaintext password against a stored hash.
    fn verify(&self, password: &str, stored: &str) -> bool;
}

/// Salted SHA-256.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256Hasher;

impl Sha256Hasher {
    fn digest(salt: &[u8], password: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(salt);
        hasher.update(password.as_bytes());
        URL_SAFE_NO_PAD.encode(hasher.finalize())
    }
}

impl PasswordHasher for Sha256Hasher {
    fn hash(&self, password: &str) -> String {
        let mut salt = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut salt);
        format!(
            "{}${}",
            URL_SAFE_NO_PAD.encode(salt),
            Self::digest(&salt, password)
        )
    }

    fn verify(&self, password: &str, stored: &str) -> bool {
        let Some((salt, expected)) = stored.split_once('$') else {
            return false;
        };
        let Ok(salt) = URL_SAFE_NO_PAD.decode(salt) else {
            return false;
        };

        constant_time_eq::constant_time_eq(
            Self::digest(&salt, password).as_bytes(),
            expected.as_bytes(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_verifies_and_is_salted() {
        let hasher = Sha256Hasher;
        let first = hasher.hash("secret");
        let second = hasher.hash("secret");

        assert_ne!(first, second);
        assert!(hasher.verify("secret", &first));
        assert!(hasher.verify("secret", &second));
        assert!(!hasher.verify("Secret", &first));
    }

    #[test]
    fn malformed_hash_never_verifies() {
        let hasher = Sha256Hasher;
        assert!(!hasher.verify("secret", "no-separator"));
        assert!(!hasher.verify("secret", "!!!$abc"));
    }
}
