//! Domain types shared by the stores, the user manager and the credential service.

pub mod culture;
pub mod external_login;
pub mod role;
pub mod user;

pub use culture::Culture;
pub use external_login::{ExternalLoginInfo, UserLoginInfo};
pub use role::Role;
pub use user::User;

/// Lookup form of an email address: trimmed and lowercased.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Lookup form of a role name: trimmed and uppercased.
pub fn normalize_role_name(name: &str) -> String {
    name.trim().to_uppercase()
}
