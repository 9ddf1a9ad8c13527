//! Password hashing and token key helpers.
use anyhow::{anyhow, Result};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::{Duration, NaiveDateTime, Utc};
use rand::Rng;

/// Hash a password with Argon2id and a random salt (PHC string format).
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow!("Failed to hash password: {e}"))?;

    Ok(hash.to_string())
}

pub fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let parsed_hash =
        PasswordHash::new(hash).map_err(|e| anyhow!("Invalid password hash format: {e}"))?;

    match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(anyhow!("Password verification failed: {e}")),
    }
}

/// Generate a 40-character hex token key.
pub fn generate_token_key() -> String {
    let mut bytes = [0u8; 20];
    rand::rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

pub fn token_is_expired(created_at: NaiveDateTime, ttl_secs: i64) -> bool {
    Utc::now().naive_utc() > created_at + Duration::seconds(ttl_secs)
}

/// Remaining token lifetime in whole seconds, floored at zero.
pub fn seconds_to_expire(created_at: NaiveDateTime, ttl_secs: i64) -> i64 {
    let expires_at = created_at + Duration::seconds(ttl_secs);
    (expires_at - Utc::now().naive_utc()).num_seconds().max(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify_password() {
        let hash = hash_password("s3cret-pass").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("s3cret-pass", &hash).unwrap());
        assert!(!verify_password("wrong-pass", &hash).unwrap());
    }

    #[test]
    fn test_token_key_is_40_hex_chars() {
        let key = generate_token_key();
        assert_eq!(key.len(), 40);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(key, generate_token_key());
    }

    #[test]
    fn test_token_expiry_window() {
        let now = Utc::now().naive_utc();
        assert!(!token_is_expired(now, 60));
        assert!(token_is_expired(now - Duration::seconds(61), 60));

        assert_eq!(seconds_to_expire(now - Duration::seconds(3600), 60), 0);
        let remaining = seconds_to_expire(now, 14400);
        assert!(remaining > 14000 && remaining <= 14400);
    }
}
