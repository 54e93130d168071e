//! API key generation and bcrypt hashing.

use rand::distr::Alphanumeric;
use rand::{Rng, rng};

use crate::auth::AuthError;

/// bcrypt cost factor.
pub const BCRYPT_COST: u32 = 10;

/// Plaintext key length.
const KEY_LENGTH: usize = 32;

/// Generate a random key (32 alphanumeric chars).
pub fn generate_key() -> String {
    rng()
        .sample_iter(&Alphanumeric)
        .take(KEY_LENGTH)
        .map(char::from)
        .collect()
}

/// Hash a key with bcrypt.
pub fn hash_key(key: &str, cost: u32) -> Result<String, AuthError> {
    bcrypt::hash(key, cost).map_err(|e| AuthError::Signing(format!("bcrypt hash: {e}")))
}

/// Verify a key against a bcrypt hash. A malformed hash never matches.
pub fn verify_key(key: &str, hash: &str) -> bool {
    bcrypt::verify(key, hash).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_keys_are_alphanumeric_and_distinct() {
        let a = generate_key();
        let b = generate_key();
        assert_eq!(a.len(), KEY_LENGTH);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(a, b);
    }

    #[test]
    fn hash_then_verify() {
        let hash = hash_key("secret-key", 4).unwrap();
        assert_ne!(hash, "secret-key");
        assert!(verify_key("secret-key", &hash));
        assert!(!verify_key("other-key", &hash));
    }

    #[test]
    fn malformed_hash_does_not_match() {
        assert!(!verify_key("secret-key", "not-a-bcrypt-hash"));
    }
}
