//! Credential hashing and the password policy.

use anyhow::{Context, Result};
use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use tokio::task;

use crate::config::{PasswordPolicyConfig, SecurityConfig};

/// Hash a password using Argon2id with the configured params.
pub fn hash_password(password: &str, config: &SecurityConfig) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);

    let params = Params::new(
        config.argon2_memory_cost_kib,
        config.argon2_time_cost,
        config.argon2_parallelism,
        None,
    )
    .map_err(|e| anyhow::anyhow!("Invalid Argon2 params: {e}"))?;
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Failed to hash password: {e}"))?;

    Ok(hash.to_string())
}

/// Params are read back from the PHC string, so hashes made under older
/// settings keep verifying.
#[must_use]
pub fn verify_password(password_hash: &str, password: &str) -> bool {
    let Ok(parsed_hash) = PasswordHash::new(password_hash) else {
        return false;
    };

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

/// Argon2 is CPU-bound; keep it off the async workers.
pub async fn hash_password_blocking(password: &str, config: &SecurityConfig) -> Result<String> {
    let password = password.to_string();
    let config = config.clone();
    task::spawn_blocking(move || hash_password(&password, &config))
        .await
        .context("Password hashing task panicked")?
}

pub async fn verify_password_blocking(password_hash: &str, password: &str) -> Result<bool> {
    let password_hash = password_hash.to_string();
    let password = password.to_string();
    task::spawn_blocking(move || verify_password(&password_hash, &password))
        .await
        .context("Password verification task panicked")
}

const COMMON_PASSWORDS: &[&str] = &[
    "123456", "1234567", "12345678", "123456789", "1234567890", "password", "password1",
    "qwerty", "qwerty123", "abc123", "111111", "letmein", "welcome", "monkey", "dragon",
    "iloveyou", "admin", "admin123", "passw0rd", "sunshine", "football", "baseball",
    "master", "trustno1", "secret", "changeme",
];

#[derive(Debug, Clone)]
pub struct PasswordPolicy {
    config: PasswordPolicyConfig,
}

impl PasswordPolicy {
    #[must_use]
    pub const fn new(config: PasswordPolicyConfig) -> Self {
        Self { config }
    }

    /// Returns one message per broken rule; empty means acceptable.
    #[must_use]
    pub fn validate(&self, password: &str, username: &str) -> Vec<String> {
        let mut errors = Vec::new();
        let lowered = password.to_lowercase();

        if password.chars().count() < self.config.min_length {
            errors.push(format!(
                "This password is too short. It must contain at least {} characters.",
                self.config.min_length
            ));
        }

        if self.config.reject_common && COMMON_PASSWORDS.contains(&lowered.as_str()) {
            errors.push("This password is too common.".to_string());
        }

        if self.config.reject_numeric
            && !password.is_empty()
            && password.chars().all(|c| c.is_ascii_digit())
        {
            errors.push("This password is entirely numeric.".to_string());
        }

        if self.config.reject_similar_to_username && is_similar(&lowered, username) {
            errors.push("The password is too similar to the username.".to_string());
        }

        errors
    }
}

fn is_similar(lowered_password: &str, username: &str) -> bool {
    let username = username.trim().to_lowercase();
    if username.len() < 3 || lowered_password.is_empty() {
        return false;
    }
    lowered_password.contains(&username) || username.contains(lowered_password)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_config() -> SecurityConfig {
        SecurityConfig {
            argon2_memory_cost_kib: 1024,
            argon2_time_cost: 1,
            ..SecurityConfig::default()
        }
    }

    #[test]
    fn hash_never_equals_plaintext_and_verifies() {
        let hash = hash_password("S3cret!", &fast_config()).unwrap();
        assert_ne!(hash, "S3cret!");
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password(&hash, "S3cret!"));
        assert!(!verify_password(&hash, "s3cret!"));
    }

    #[test]
    fn same_password_hashes_differently() {
        let a = hash_password("S3cret!", &fast_config()).unwrap();
        let b = hash_password("S3cret!", &fast_config()).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn malformed_hash_does_not_verify() {
        assert!(!verify_password("not-a-hash", "anything"));
    }

    #[test]
    fn policy_accepts_reasonable_password() {
        let policy = PasswordPolicy::new(PasswordPolicyConfig::default());
        assert!(policy.validate("S3cret!", "alice").is_empty());
    }

    #[test]
    fn policy_reports_each_broken_rule() {
        let policy = PasswordPolicy::new(PasswordPolicyConfig::default());
        assert_eq!(policy.validate("123", "alice").len(), 2);
        assert_eq!(policy.validate("password", "bob"), vec!["This password is too common."]);
        assert_eq!(
            policy.validate("alice2024", "alice"),
            vec!["The password is too similar to the username."]
        );
    }

    #[test]
    fn policy_rules_can_be_disabled() {
        let policy = PasswordPolicy::new(PasswordPolicyConfig {
            min_length: 1,
            reject_numeric: false,
            reject_common: false,
            reject_similar_to_username: false,
        });
        assert!(policy.validate("123456", "123456").is_empty());
    }
}
