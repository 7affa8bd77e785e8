//! Password hashing, verification and policy checks.
//!
//! Uses Argon2id for secure password hashing.

use crate::outcome::{IdentityError, IdentityErrorCode};
use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use serde::Deserialize;

/// Password rules enforced on registration.
#[derive(Debug, Clone, Deserialize)]
pub struct PasswordOptions {
    #[serde(default = "default_required_length")]
    pub required_length: usize,
    #[serde(default = "default_require_digit")]
    pub require_digit: bool,
}

fn default_required_length() -> usize {
    8
}

fn default_require_digit() -> bool {
    true
}

impl Default for PasswordOptions {
    fn default() -> Self {
        Self {
            required_length: default_required_length(),
            require_digit: default_require_digit(),
        }
    }
}

impl PasswordOptions {
    /// Check a candidate password, returning every rule it breaks.
    pub fn validate(&self, password: &str) -> Vec<IdentityError> {
        let mut errors = Vec::new();
        if password.chars().count() < self.required_length {
            errors.push(IdentityError::new(
                IdentityErrorCode::PasswordTooWeak,
                format!(
                    "Passwords must be at least {} characters.",
                    self.required_length
                ),
            ));
        }
        if self.require_digit && !password.chars().any(|c| c.is_ascii_digit()) {
            errors.push(IdentityError::new(
                IdentityErrorCode::PasswordTooWeak,
                "Passwords must have at least one digit ('0'-'9').",
            ));
        }
        errors
    }
}

/// Hash a password using Argon2id.
///
/// Returns the PHC-formatted hash string suitable for storage.
pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2.hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

/// Verify a password against a stored hash.
///
/// Returns true if the password matches.
pub fn verify_password(password: &str, hash: &str) -> bool {
    let Ok(parsed_hash) = PasswordHash::new(hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify_password() {
        let password = "Passw0rd!";
        let hash = hash_password(password).expect("Failed to hash password");

        assert!(hash.starts_with("$argon2"));
        assert!(verify_password(password, &hash));
        assert!(!verify_password("Passw0rd?", &hash));
    }

    #[test]
    fn test_hash_produces_different_salts() {
        let hash1 = hash_password("same-password1").expect("Failed to hash");
        let hash2 = hash_password("same-password1").expect("Failed to hash");

        assert_ne!(hash1, hash2);
        assert!(verify_password("same-password1", &hash1));
        assert!(verify_password("same-password1", &hash2));
    }

    #[test]
    fn test_verify_invalid_hash_format() {
        // Invalid hash formats should return false, not panic
        assert!(!verify_password("password", "not-a-valid-hash"));
        assert!(!verify_password("password", ""));
        assert!(!verify_password("password", "$invalid$hash$format"));
    }

    #[test]
    fn test_default_policy_accepts_strong_password() {
        assert!(PasswordOptions::default().validate("Passw0rd!").is_empty());
    }

    #[test]
    fn test_default_policy_rejects_short_password() {
        let errors = PasswordOptions::default().validate("Pa5s");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].code, IdentityErrorCode::PasswordTooWeak);
        assert!(errors[0].description.contains("at least 8"));
    }

    #[test]
    fn test_default_policy_requires_digit() {
        let errors = PasswordOptions::default().validate("Password!");
        assert_eq!(errors.len(), 1);
        assert!(errors[0].description.contains("digit"));
    }

    #[test]
    fn test_policy_reports_every_violation() {
        let errors = PasswordOptions::default().validate("short");
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn test_relaxed_policy() {
        let options = PasswordOptions {
            required_length: 4,
            require_digit: false,
        };
        assert!(options.validate("abcd").is_empty());
        assert_eq!(options.validate("abc").len(), 1);
    }
}
