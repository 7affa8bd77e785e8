//! User manager: validation, password policy and hashing over a [`UserStore`].

use crate::error::ServiceError;
use crate::models::culture::is_valid_culture;
use crate::models::role::MAX_ROLE_DESCRIPTION_LEN;
use crate::models::{Role, User, UserLoginInfo, normalize_email};
use crate::outcome::{IdentityError, IdentityResult};
use crate::password::{PasswordOptions, hash_password, verify_password};
use crate::store::UserStore;
use std::sync::Arc;

pub struct UserManager {
    store: Arc<dyn UserStore>,
    password_options: PasswordOptions,
}

impl UserManager {
    pub fn new(store: Arc<dyn UserStore>, password_options: PasswordOptions) -> Self {
        Self {
            store,
            password_options,
        }
    }

    /// Check a candidate user before it is persisted.
    ///
    /// Every broken rule is reported; the duplicate-email probe is skipped when
    /// the email is already malformed.
    async fn validate_user(&self, user: &User) -> Result<Vec<IdentityError>, ServiceError> {
        let mut errors = Vec::new();

        if user.user_name.as_deref().is_none_or(|n| n.trim().is_empty()) {
            errors.push(IdentityError::invalid_username());
        }

        let email = user.normalized_email();
        if email.is_empty() || !email.contains('@') {
            errors.push(IdentityError::invalid_email(&user.email));
        } else if let Some(existing) = self.store.find_by_email(&email).await? {
            if existing.id != user.id {
                errors.push(IdentityError::duplicate_email(&user.email));
            }
        }

        if !is_valid_culture(&user.culture) {
            errors.push(IdentityError::invalid_culture(&user.culture));
        }

        Ok(errors)
    }

    /// Create a password-backed user.
    #[tracing::instrument(skip(self, user, password), fields(email = %user.email))]
    pub async fn create(&self, user: &User, password: &str) -> Result<IdentityResult, ServiceError> {
        let mut errors = self.validate_user(user).await?;
        errors.extend(self.password_options.validate(password));
        if !errors.is_empty() {
            return Ok(IdentityResult::failed(errors));
        }

        let mut user = user.clone();
        user.password_hash = Some(hash_password(password)?);
        Ok(self.store.create(&user).await?)
    }

    /// Create a user that signs in only through `login`, linking both in one store operation.
    #[tracing::instrument(skip(self, user, login), fields(email = %user.email, provider = %login.provider))]
    pub async fn create_external(
        &self,
        user: &User,
        login: &UserLoginInfo,
    ) -> Result<IdentityResult, ServiceError> {
        let errors = self.validate_user(user).await?;
        if !errors.is_empty() {
            return Ok(IdentityResult::failed(errors));
        }
        Ok(self.store.create_with_login(user, login).await?)
    }

    /// Resolve `email` and check `password` against the stored hash.
    ///
    /// Accounts without a password never verify. Failed attempts are not counted.
    #[tracing::instrument(skip(self, password))]
    pub async fn verify_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Option<User>, ServiceError> {
        let Some(user) = self.find_by_email(email).await? else {
            return Ok(None);
        };
        let verified = user
            .password_hash
            .as_deref()
            .is_some_and(|hash| verify_password(password, hash));
        Ok(verified.then_some(user))
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>, ServiceError> {
        Ok(self.store.find_by_email(&normalize_email(email)).await?)
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<User>, ServiceError> {
        Ok(self.store.find_by_id(id).await?)
    }

    pub async fn find_by_login(
        &self,
        provider: &str,
        provider_key: &str,
    ) -> Result<Option<User>, ServiceError> {
        Ok(self.store.find_by_login(provider, provider_key).await?)
    }

    pub async fn add_to_role(&self, user: &User, role: &str) -> Result<IdentityResult, ServiceError> {
        Ok(self.store.add_to_role(user, role).await?)
    }

    pub async fn is_in_role(&self, user: &User, role: &str) -> Result<bool, ServiceError> {
        Ok(self.store.is_in_role(user, role).await?)
    }

    pub async fn roles(&self, user: &User) -> Result<Vec<String>, ServiceError> {
        Ok(self.store.roles(user).await?)
    }

    /// Persist changes to an existing user after re-validating it.
    #[tracing::instrument(skip(self, user), fields(user_id = %user.id))]
    pub async fn update(&self, user: &User) -> Result<IdentityResult, ServiceError> {
        let errors = self.validate_user(user).await?;
        if !errors.is_empty() {
            return Ok(IdentityResult::failed(errors));
        }
        Ok(self.store.update(user).await?)
    }

    #[tracing::instrument(skip(self, description))]
    pub async fn create_role(
        &self,
        name: &str,
        description: Option<&str>,
    ) -> Result<IdentityResult, ServiceError> {
        if name.trim().is_empty() {
            return Ok(IdentityResult::failed([IdentityError::invalid_role_name(name)]));
        }
        if description.is_some_and(|d| d.chars().count() > MAX_ROLE_DESCRIPTION_LEN) {
            return Ok(IdentityResult::failed([
                IdentityError::invalid_role_description(MAX_ROLE_DESCRIPTION_LEN),
            ]));
        }
        if self.store.find_role(name).await?.is_some() {
            return Ok(IdentityResult::failed([IdentityError::duplicate_role_name(
                name.trim(),
            )]));
        }

        let result = self.store.create_role(&Role::new(name, description)).await?;
        if result.succeeded {
            tracing::info!(role = name.trim(), "Role created");
        }
        Ok(result)
    }

    pub async fn find_role(&self, name: &str) -> Result<Option<Role>, ServiceError> {
        Ok(self.store.find_role(name).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outcome::IdentityErrorCode;
    use crate::store::RelationalUserStore;

    async fn setup_manager() -> UserManager {
        let store = RelationalUserStore::connect("sqlite::memory:")
            .await
            .expect("connect");
        store.initialize().await.expect("migrate");
        UserManager::new(Arc::new(store), PasswordOptions::default())
    }

    #[tokio::test]
    async fn test_create_hashes_password() {
        let manager = setup_manager().await;
        let user = User::new("a@x.com", Some("en-US"));

        let result = manager.create(&user, "Passw0rd!").await.unwrap();
        assert!(result.succeeded, "{result}");

        let stored = manager.find_by_email("A@X.com").await.unwrap().unwrap();
        let hash = stored.password_hash.expect("hash stored");
        assert!(hash.starts_with("$argon2"));
        assert_ne!(hash, "Passw0rd!");
    }

    #[tokio::test]
    async fn test_create_reports_duplicate_email() {
        let manager = setup_manager().await;
        manager
            .create(&User::new("a@x.com", None), "Passw0rd!")
            .await
            .unwrap();

        let result = manager
            .create(&User::new(" A@x.com", None), "Another1!")
            .await
            .unwrap();
        assert!(result.has_error(IdentityErrorCode::DuplicateEmail));
    }

    #[tokio::test]
    async fn test_create_collects_every_violation() {
        let manager = setup_manager().await;
        let user = User::new("not-an-email", Some("far-too-long-culture"));

        let result = manager.create(&user, "weak").await.unwrap();
        assert!(!result.succeeded);
        assert!(result.has_error(IdentityErrorCode::InvalidEmail));
        assert!(result.has_error(IdentityErrorCode::InvalidCulture));
        assert!(result.has_error(IdentityErrorCode::PasswordTooWeak));
        assert!(manager.find_by_email("not-an-email").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_create_rejects_missing_user_name() {
        let manager = setup_manager().await;
        let mut user = User::new("a@x.com", None);
        user.user_name = Some("   ".to_string());

        let result = manager.create(&user, "Passw0rd!").await.unwrap();
        assert!(result.has_error(IdentityErrorCode::InvalidUsername));
    }

    #[tokio::test]
    async fn test_verify_password() {
        let manager = setup_manager().await;
        manager
            .create(&User::new("a@x.com", None), "Passw0rd!")
            .await
            .unwrap();

        assert!(manager.verify_password("a@x.com", "Passw0rd!").await.unwrap().is_some());
        assert!(manager.verify_password("a@x.com", "wrong").await.unwrap().is_none());
        assert!(manager.verify_password("b@x.com", "Passw0rd!").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_external_user_never_verifies_password() {
        let manager = setup_manager().await;
        let user = User::new("ext@x.com", None);
        let login = UserLoginInfo::new("Google", "g-1", Some("Google"));
        assert!(manager.create_external(&user, &login).await.unwrap().succeeded);

        assert!(manager.verify_password("ext@x.com", "").await.unwrap().is_none());
        assert!(manager.find_by_login("Google", "g-1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_update_validates_culture() {
        let manager = setup_manager().await;
        let mut user = User::new("a@x.com", None);
        manager.create(&user, "Passw0rd!").await.unwrap();
        user = manager.find_by_email("a@x.com").await.unwrap().unwrap();

        user.culture = "12345678901".to_string();
        let result = manager.update(&user).await.unwrap();
        assert!(result.has_error(IdentityErrorCode::InvalidCulture));

        user.culture = "en-US".to_string();
        assert!(manager.update(&user).await.unwrap().succeeded);
        let stored = manager.find_by_id(&user.id).await.unwrap().unwrap();
        assert_eq!(stored.culture, "en-US");
    }

    #[tokio::test]
    async fn test_create_role_validation() {
        let manager = setup_manager().await;

        assert!(
            manager
                .create_role("  ", None)
                .await
                .unwrap()
                .has_error(IdentityErrorCode::InvalidRoleName)
        );
        let long = "x".repeat(MAX_ROLE_DESCRIPTION_LEN + 1);
        assert!(
            manager
                .create_role("Admin", Some(&long))
                .await
                .unwrap()
                .has_error(IdentityErrorCode::InvalidRoleDescription)
        );

        assert!(manager.create_role("Admin", Some("Administrators")).await.unwrap().succeeded);
        assert!(
            manager
                .create_role("ADMIN", None)
                .await
                .unwrap()
                .has_error(IdentityErrorCode::DuplicateRoleName)
        );
        let role = manager.find_role("admin").await.unwrap().unwrap();
        assert_eq!(role.description.as_deref(), Some("Administrators"));
    }
}
