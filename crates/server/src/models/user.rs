use super::{Culture, normalize_email};

/// A user account.
///
/// `password_hash` holds an Argon2 PHC string and is `None` for accounts that
/// only sign in through an external provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: String,
    pub user_name: Option<String>,
    pub email: String,
    pub password_hash: Option<String>,
    pub culture: String,
}

impl User {
    /// Candidate user for a password registration: the normalized email doubles as user name.
    pub fn new(email: &str, culture: Option<&str>) -> Self {
        let email = normalize_email(email);
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_name: Some(email.clone()),
            email,
            password_hash: None,
            culture: culture
                .map(str::to_string)
                .unwrap_or_else(|| Culture::default().tag().to_string()),
        }
    }

    pub fn normalized_email(&self) -> String {
        normalize_email(&self.email)
    }
}
