//! Structured operation outcomes.
//!
//! Validation and lookup failures are values, not errors: callers check
//! [`IdentityResult::succeeded`] or [`SignInResult::succeeded`] before
//! trusting anything else returned alongside.

use serde::Serialize;
use std::fmt;
use utoipa::ToSchema;

/// Machine-readable failure codes carried by [`IdentityError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub enum IdentityErrorCode {
    DuplicateEmail,
    PasswordTooWeak,
    InvalidUsername,
    InvalidEmail,
    InvalidCulture,
    UserNotFound,
    RoleNotFound,
    UserAlreadyInRole,
    LoginAlreadyAssociated,
    InvalidRoleName,
    DuplicateRoleName,
    InvalidRoleDescription,
}

impl IdentityErrorCode {
    pub const fn as_str(self) -> &'static str {
        match self {
            IdentityErrorCode::DuplicateEmail => "DuplicateEmail",
            IdentityErrorCode::PasswordTooWeak => "PasswordTooWeak",
            IdentityErrorCode::InvalidUsername => "InvalidUsername",
            IdentityErrorCode::InvalidEmail => "InvalidEmail",
            IdentityErrorCode::InvalidCulture => "InvalidCulture",
            IdentityErrorCode::UserNotFound => "UserNotFound",
            IdentityErrorCode::RoleNotFound => "RoleNotFound",
            IdentityErrorCode::UserAlreadyInRole => "UserAlreadyInRole",
            IdentityErrorCode::LoginAlreadyAssociated => "LoginAlreadyAssociated",
            IdentityErrorCode::InvalidRoleName => "InvalidRoleName",
            IdentityErrorCode::DuplicateRoleName => "DuplicateRoleName",
            IdentityErrorCode::InvalidRoleDescription => "InvalidRoleDescription",
        }
    }
}

impl fmt::Display for IdentityErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One failure with a human-readable description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct IdentityError {
    pub code: IdentityErrorCode,
    pub description: String,
}

impl IdentityError {
    pub fn new(code: IdentityErrorCode, description: impl Into<String>) -> Self {
        Self {
            code,
            description: description.into(),
        }
    }

    pub fn duplicate_email(email: &str) -> Self {
        Self::new(
            IdentityErrorCode::DuplicateEmail,
            format!("Email '{email}' is already taken."),
        )
    }

    pub fn invalid_username() -> Self {
        Self::new(
            IdentityErrorCode::InvalidUsername,
            "User name is invalid, can only contain letters, digits or symbols.",
        )
    }

    pub fn invalid_email(email: &str) -> Self {
        Self::new(
            IdentityErrorCode::InvalidEmail,
            format!("Email '{email}' is invalid."),
        )
    }

    pub fn invalid_culture(culture: &str) -> Self {
        Self::new(
            IdentityErrorCode::InvalidCulture,
            format!("Culture '{culture}' must be between 1 and 10 characters."),
        )
    }

    pub fn user_not_found() -> Self {
        Self::new(IdentityErrorCode::UserNotFound, "User not found")
    }

    pub fn role_not_found(role: &str) -> Self {
        Self::new(
            IdentityErrorCode::RoleNotFound,
            format!("Role '{role}' does not exist."),
        )
    }

    pub fn user_already_in_role(role: &str) -> Self {
        Self::new(
            IdentityErrorCode::UserAlreadyInRole,
            format!("User already in role '{role}'."),
        )
    }

    pub fn invalid_role_name(name: &str) -> Self {
        Self::new(
            IdentityErrorCode::InvalidRoleName,
            format!("Role name '{name}' is invalid."),
        )
    }

    pub fn duplicate_role_name(name: &str) -> Self {
        Self::new(
            IdentityErrorCode::DuplicateRoleName,
            format!("Role name '{name}' is already taken."),
        )
    }

    pub fn invalid_role_description(max: usize) -> Self {
        Self::new(
            IdentityErrorCode::InvalidRoleDescription,
            format!("Role description cannot exceed {max} characters."),
        )
    }

    pub fn login_already_associated() -> Self {
        Self::new(
            IdentityErrorCode::LoginAlreadyAssociated,
            "A user with this login already exists.",
        )
    }
}

/// Outcome of an operation that creates or mutates identity records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct IdentityResult {
    pub succeeded: bool,
    pub errors: Vec<IdentityError>,
}

impl IdentityResult {
    pub fn success() -> Self {
        Self {
            succeeded: true,
            errors: Vec::new(),
        }
    }

    pub fn failed(errors: impl IntoIterator<Item = IdentityError>) -> Self {
        Self {
            succeeded: false,
            errors: errors.into_iter().collect(),
        }
    }

    pub fn has_error(&self, code: IdentityErrorCode) -> bool {
        self.errors.iter().any(|e| e.code == code)
    }
}

impl fmt::Display for IdentityResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.succeeded {
            return f.write_str("Succeeded");
        }
        let codes: Vec<&str> = self.errors.iter().map(|e| e.code.as_str()).collect();
        write!(f, "Failed : {}", codes.join(","))
    }
}

/// Outcome of a sign-in attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub enum SignInResult {
    Succeeded,
    /// Unknown user, wrong password, or an account without a password.
    InvalidCredentials,
    /// No external handshake result was available to sign in with.
    ExternalLoginInfoMissing,
    /// The external login is not linked to any user yet.
    NotLinked,
}

impl SignInResult {
    pub fn succeeded(self) -> bool {
        matches!(self, SignInResult::Succeeded)
    }
}

/// An outcome paired with the session token issued on success.
///
/// `token` is `None` on failure, and also on success when token issuance is
/// not configured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthOutcome<R> {
    pub result: R,
    pub token: Option<String>,
}

impl<R> AuthOutcome<R> {
    pub fn new(result: R, token: Option<String>) -> Self {
        Self { result, token }
    }

    pub fn without_token(result: R) -> Self {
        Self {
            result,
            token: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_has_no_errors() {
        let result = IdentityResult::success();
        assert!(result.succeeded);
        assert!(result.errors.is_empty());
        assert_eq!(result.to_string(), "Succeeded");
    }

    #[test]
    fn test_failed_lists_codes() {
        let result = IdentityResult::failed([
            IdentityError::duplicate_email("a@x.com"),
            IdentityError::invalid_culture("way-too-long-tag"),
        ]);
        assert!(!result.succeeded);
        assert!(result.has_error(IdentityErrorCode::DuplicateEmail));
        assert!(result.has_error(IdentityErrorCode::InvalidCulture));
        assert!(!result.has_error(IdentityErrorCode::UserNotFound));
        assert_eq!(result.to_string(), "Failed : DuplicateEmail,InvalidCulture");
    }

    #[test]
    fn test_user_not_found_description() {
        assert_eq!(IdentityError::user_not_found().description, "User not found");
    }

    #[test]
    fn test_sign_in_result_succeeded() {
        assert!(SignInResult::Succeeded.succeeded());
        assert!(!SignInResult::InvalidCredentials.succeeded());
        assert!(!SignInResult::ExternalLoginInfoMissing.succeeded());
        assert!(!SignInResult::NotLinked.succeeded());
    }
}
