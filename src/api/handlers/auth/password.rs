//! Password hashing. Argon2id with per-password salts; the stored string is
//! the PHC format produced by `hash_password`.

use anyhow::{Context, Result, anyhow};
use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};

/// Minimum accepted password length, checked before hashing.
pub(crate) const MIN_PASSWORD_LEN: usize = 8;

/// Hash a password for storage. Never returns the plaintext.
pub(crate) fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|err| anyhow!("{err}"))
        .context("failed to hash password")?;
    Ok(hash.to_string())
}

/// Check a password against a stored PHC hash. Unparseable hashes count as a
/// mismatch rather than an error so login keeps a single failure path.
pub(crate) fn verify_password(password: &str, stored_hash: &str) -> bool {
    PasswordHash::new(stored_hash).is_ok_and(|parsed| {
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_then_verify_round_trip() -> Result<()> {
        let hash = hash_password("Password123!")?;
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("Password123!", &hash));
        assert!(!verify_password("password123!", &hash));
        Ok(())
    }

    #[test]
    fn hashes_are_salted() -> Result<()> {
        let first = hash_password("Password123!")?;
        let second = hash_password("Password123!")?;
        assert_ne!(first, second);
        Ok(())
    }

    #[test]
    fn garbage_stored_hash_is_a_mismatch() {
        assert!(!verify_password("Password123!", "not-a-phc-string"));
    }
}
