use thiserror::Error;

/// Failures raised while building or talking to a user store.
///
/// Validation and not-found conditions are never reported here; they travel
/// inside [`crate::outcome::IdentityResult`].
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Value cannot be null (Parameter '{parameter}')")]
    InvalidArgument { parameter: &'static str },
    #[error("Invalid data source type (Parameter '{parameter}')")]
    UnsupportedBackend {
        parameter: &'static str,
        value: String,
    },
    #[error("Relational store error: {0}")]
    Database(#[from] sea_orm::DbErr),
    #[error("Document store error: {0}")]
    Document(#[from] mongodb::error::Error),
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("Token issuance is not configured")]
    Disabled,
    #[error("Token error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Token(#[from] TokenError),
    #[error("Password hashing failed: {0}")]
    PasswordHash(String),
}

impl From<argon2::password_hash::Error> for ServiceError {
    fn from(e: argon2::password_hash::Error) -> Self {
        ServiceError::PasswordHash(e.to_string())
    }
}
