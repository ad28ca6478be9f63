use anyhow::anyhow;
use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::rngs::OsRng;
use tracing::{error, warn};

/// Produces a PHC string (`$argon2id$...`) with the crate's default cost and a
/// salt drawn from the OS.
pub fn hash_password(plain: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map(|phc| phc.to_string())
        .map_err(|e| {
            error!(error = %e, "password hashing failed");
            anyhow!("password hashing failed: {e}")
        })
}

/// Returns `false` for any mismatch, including an unparseable stored hash.
pub fn verify_password(plain: &str, stored: &str) -> bool {
    match PasswordHash::new(stored) {
        Ok(phc) => Argon2::default()
            .verify_password(plain.as_bytes(), &phc)
            .is_ok(),
        Err(e) => {
            warn!(error = %e, "stored password hash is malformed");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registered_password_verifies() {
        let hash = hash_password("Valid1Pass!").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("Valid1Pass!", &hash));
    }

    #[test]
    fn near_miss_passwords_are_rejected() {
        let hash = hash_password("Valid1Pass!").unwrap();
        for attempt in ["Wrong1Pass!", "valid1pass!", "Valid1Pass", "Valid1Pass! ", ""] {
            assert!(!verify_password(attempt, &hash), "{attempt:?}");
        }
    }

    #[test]
    fn same_password_hashes_differently() {
        let a = hash_password("Valid1Pass!").unwrap();
        let b = hash_password("Valid1Pass!").unwrap();
        assert_ne!(a, b);
        assert!(verify_password("Valid1Pass!", &a));
        assert!(verify_password("Valid1Pass!", &b));
    }

    #[test]
    fn hash_never_contains_plaintext() {
        let hash = hash_password("Valid1Pass!").unwrap();
        assert!(!hash.contains("Valid1Pass!"));
    }

    #[test]
    fn verify_returns_false_on_malformed_hash() {
        assert!(!verify_password("Valid1Pass!", "not-a-valid-hash"));
        assert!(!verify_password("Valid1Pass!", ""));
    }
}
