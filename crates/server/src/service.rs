//! Credential service: registration, sign-in, role and culture operations.
//!
//! Holds no state of its own. Every call goes through the [`UserManager`],
//! establishes the session through the injected [`SessionManager`] and, on
//! success, asks the [`TokenIssuer`] for a session token.

use crate::error::ServiceError;
use crate::manager::UserManager;
use crate::models::culture::is_valid_culture;
use crate::models::{ExternalLoginInfo, User};
use crate::outcome::{AuthOutcome, IdentityError, IdentityResult, SignInResult};
use crate::session::SessionManager;
use crate::token::TokenIssuer;
use std::sync::Arc;

pub struct UserManagementService {
    manager: Arc<UserManager>,
    issuer: Arc<TokenIssuer>,
    session: Arc<dyn SessionManager>,
}

impl UserManagementService {
    pub fn new(
        manager: Arc<UserManager>,
        issuer: Arc<TokenIssuer>,
        session: Arc<dyn SessionManager>,
    ) -> Self {
        Self {
            manager,
            issuer,
            session,
        }
    }

    async fn issue_token(&self, user: &User) -> Result<Option<String>, ServiceError> {
        if !self.issuer.is_enabled() {
            return Ok(None);
        }
        let roles = self.manager.roles(user).await?;
        Ok(self.issuer.issue(user, &roles)?)
    }

    /// Create a password account and sign it in.
    #[tracing::instrument(skip(self, password))]
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        culture: &str,
    ) -> Result<AuthOutcome<IdentityResult>, ServiceError> {
        let user = User::new(email, Some(culture));
        let result = self.manager.create(&user, password).await?;
        if !result.succeeded {
            tracing::info!(%result, "Registration rejected");
            return Ok(AuthOutcome::without_token(result));
        }

        self.session.sign_in(&user, false).await;
        let token = self.issue_token(&user).await?;
        tracing::info!(user_id = %user.id, "User registered");
        Ok(AuthOutcome::new(result, token))
    }

    /// Password sign-in. Failed attempts are not throttled.
    #[tracing::instrument(skip(self, password))]
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        persistent: bool,
    ) -> Result<AuthOutcome<SignInResult>, ServiceError> {
        let Some(user) = self.manager.verify_password(email, password).await? else {
            tracing::info!("Sign-in failed");
            return Ok(AuthOutcome::without_token(SignInResult::InvalidCredentials));
        };

        self.session.sign_in(&user, persistent).await;
        let token = self.issue_token(&user).await?;
        tracing::info!(user_id = %user.id, "User signed in");
        Ok(AuthOutcome::new(SignInResult::Succeeded, token))
    }

    pub async fn sign_out(&self) {
        self.session.sign_out().await;
        tracing::debug!("Session ended");
    }

    #[tracing::instrument(skip(self))]
    pub async fn add_to_role(&self, email: &str, role: &str) -> Result<IdentityResult, ServiceError> {
        let Some(user) = self.manager.find_by_email(email).await? else {
            return Ok(IdentityResult::failed([IdentityError::user_not_found()]));
        };

        let result = self.manager.add_to_role(&user, role).await?;
        if result.succeeded {
            tracing::info!(user_id = %user.id, role, "User added to role");
        }
        Ok(result)
    }

    /// Unknown users are simply not members.
    #[tracing::instrument(skip(self))]
    pub async fn is_in_role(&self, email: &str, role: &str) -> Result<bool, ServiceError> {
        match self.manager.find_by_email(email).await? {
            Some(user) => self.manager.is_in_role(&user, role).await,
            None => Ok(false),
        }
    }

    #[tracing::instrument(skip(self))]
    pub async fn update_culture(
        &self,
        email: &str,
        culture: &str,
    ) -> Result<IdentityResult, ServiceError> {
        let Some(mut user) = self.manager.find_by_email(email).await? else {
            return Ok(IdentityResult::failed([IdentityError::user_not_found()]));
        };
        if !is_valid_culture(culture) {
            return Ok(IdentityResult::failed([IdentityError::invalid_culture(culture)]));
        }

        user.culture = culture.to_string();
        self.manager.update(&user).await
    }

    pub async fn external_login_info(&self) -> Option<ExternalLoginInfo> {
        self.session.external_login_info().await
    }

    /// Sign in the user linked to the captured external login.
    ///
    /// The captured handshake result is authoritative: a provider or key that
    /// does not match it is rejected.
    #[tracing::instrument(skip(self, provider_key))]
    pub async fn external_login_sign_in(
        &self,
        provider: &str,
        provider_key: &str,
        persistent: bool,
    ) -> Result<AuthOutcome<SignInResult>, ServiceError> {
        let Some(info) = self.session.external_login_info().await else {
            return Ok(AuthOutcome::without_token(
                SignInResult::ExternalLoginInfoMissing,
            ));
        };
        if info.provider() != provider || info.provider_key() != provider_key {
            tracing::warn!("External sign-in does not match the captured login");
            return Ok(AuthOutcome::without_token(SignInResult::InvalidCredentials));
        }

        let Some(user) = self
            .manager
            .find_by_login(info.provider(), info.provider_key())
            .await?
        else {
            return Ok(AuthOutcome::without_token(SignInResult::NotLinked));
        };

        self.session.sign_in(&user, persistent).await;
        let token = self.issue_token(&user).await?;
        tracing::info!(user_id = %user.id, provider, "External user signed in");
        Ok(AuthOutcome::new(SignInResult::Succeeded, token))
    }

    /// Create a user from an external login and link the login in one step.
    ///
    /// The email claim becomes both user name and email; without it the
    /// display name stands in as user name, which still fails for want of an email.
    #[tracing::instrument(skip(self, info), fields(provider = %info.provider()))]
    pub async fn create_external_user(
        &self,
        info: &ExternalLoginInfo,
        culture: &str,
    ) -> Result<AuthOutcome<IdentityResult>, ServiceError> {
        let email = info
            .email
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty());
        let display_name = info
            .display_name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty());

        let Some(email) = email else {
            let error = match display_name {
                Some(name) => IdentityError::invalid_email(name),
                None => IdentityError::invalid_username(),
            };
            return Ok(AuthOutcome::without_token(IdentityResult::failed([error])));
        };

        let user = User::new(email, Some(culture));
        let result = self.manager.create_external(&user, &info.login).await?;
        if !result.succeeded {
            tracing::info!(%result, "External registration rejected");
            return Ok(AuthOutcome::without_token(result));
        }

        self.session.sign_in(&user, false).await;
        let token = self.issue_token(&user).await?;
        tracing::info!(user_id = %user.id, "External user created");
        Ok(AuthOutcome::new(result, token))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UserLoginInfo;
    use crate::outcome::IdentityErrorCode;
    use crate::password::PasswordOptions;
    use crate::session::MemorySession;
    use crate::store::{RelationalUserStore, UserStore};
    use crate::token::JwtSettings;

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    struct Harness {
        manager: Arc<UserManager>,
        issuer: Arc<TokenIssuer>,
        session: Arc<MemorySession>,
    }

    impl Harness {
        async fn new(jwt: JwtSettings) -> Self {
            let store = RelationalUserStore::connect("sqlite::memory:")
                .await
                .expect("connect");
            store.initialize().await.expect("migrate");
            Self {
                manager: Arc::new(UserManager::new(Arc::new(store), PasswordOptions::default())),
                issuer: Arc::new(TokenIssuer::new(&jwt)),
                session: Arc::new(MemorySession::new()),
            }
        }

        async fn with_tokens() -> Self {
            Self::new(JwtSettings::new("https://id.example.com", "example-api", SECRET)).await
        }

        fn service(&self) -> UserManagementService {
            UserManagementService::new(
                self.manager.clone(),
                self.issuer.clone(),
                self.session.clone(),
            )
        }
    }

    fn google_login(email: Option<&str>, name: Option<&str>) -> ExternalLoginInfo {
        ExternalLoginInfo {
            login: UserLoginInfo::new("Google", "google-123", Some("Google")),
            email: email.map(str::to_string),
            display_name: name.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn test_register_issues_token_and_signs_in() {
        let harness = Harness::with_tokens().await;
        let service = harness.service();

        let outcome = service.register("a@x.com", "Passw0rd!", "en-US").await.unwrap();
        assert!(outcome.result.succeeded);
        let token = outcome.token.expect("token issued");

        let claims = harness.issuer.validate(&token).unwrap();
        assert_eq!(claims.culture, "en-US");
        assert_eq!(claims.email, "a@x.com");
        let signed_in = harness.session.current().await.expect("session");
        assert_eq!(signed_in.user_id, claims.sub);
        assert!(!signed_in.persistent);
    }

    #[tokio::test]
    async fn test_register_without_token_settings() {
        let harness = Harness::new(JwtSettings::default()).await;
        let outcome = harness
            .service()
            .register("a@x.com", "Passw0rd!", "en-GB")
            .await
            .unwrap();
        assert!(outcome.result.succeeded);
        assert!(outcome.token.is_none());
    }

    #[tokio::test]
    async fn test_register_duplicate_email_has_no_token() {
        let harness = Harness::with_tokens().await;
        let service = harness.service();
        service.register("a@x.com", "Passw0rd!", "en-US").await.unwrap();

        for password in ["Passw0rd!", "weak"] {
            let outcome = service.register("A@X.COM", password, "en-US").await.unwrap();
            assert!(!outcome.result.succeeded);
            assert!(outcome.result.has_error(IdentityErrorCode::DuplicateEmail));
            assert!(outcome.token.is_none());
        }
    }

    #[tokio::test]
    async fn test_register_weak_password() {
        let harness = Harness::with_tokens().await;
        let outcome = harness
            .service()
            .register("a@x.com", "password", "en-US")
            .await
            .unwrap();
        assert!(outcome.result.has_error(IdentityErrorCode::PasswordTooWeak));
        assert!(outcome.token.is_none());
        assert!(harness.session.current().await.is_none());
    }

    #[tokio::test]
    async fn test_login() {
        let harness = Harness::with_tokens().await;
        let service = harness.service();
        service.register("a@x.com", "Passw0rd!", "en-US").await.unwrap();
        service.sign_out().await;

        let wrong = service.login("a@x.com", "Wr0ngPass", false).await.unwrap();
        assert_eq!(wrong.result, SignInResult::InvalidCredentials);
        assert!(wrong.token.is_none());
        assert!(harness.session.current().await.is_none());

        let unknown = service.login("b@x.com", "Passw0rd!", false).await.unwrap();
        assert_eq!(unknown.result, SignInResult::InvalidCredentials);

        let ok = service.login(" A@x.com ", "Passw0rd!", true).await.unwrap();
        assert!(ok.result.succeeded());
        assert!(ok.token.is_some());
        assert!(harness.session.current().await.unwrap().persistent);
    }

    #[tokio::test]
    async fn test_add_to_role_and_is_in_role() {
        let harness = Harness::with_tokens().await;
        let service = harness.service();
        harness.manager.create_role("Admin", None).await.unwrap();
        service.register("a@x.com", "Passw0rd!", "en-US").await.unwrap();

        let missing_user = service.add_to_role("nobody@x.com", "Admin").await.unwrap();
        assert!(missing_user.has_error(IdentityErrorCode::UserNotFound));

        let missing_role = service.add_to_role("a@x.com", "Ghost").await.unwrap();
        assert!(missing_role.has_error(IdentityErrorCode::RoleNotFound));

        assert!(service.add_to_role("a@x.com", "Admin").await.unwrap().succeeded);
        assert!(service.is_in_role("a@x.com", "Admin").await.unwrap());
        assert!(!service.is_in_role("nobody@x.com", "Admin").await.unwrap());

        let login = service.login("a@x.com", "Passw0rd!", false).await.unwrap();
        let claims = harness.issuer.validate(&login.token.unwrap()).unwrap();
        assert_eq!(claims.role, vec!["Admin".to_string()]);
    }

    #[tokio::test]
    async fn test_update_culture() {
        let harness = Harness::with_tokens().await;
        let service = harness.service();
        service.register("a@x.com", "Passw0rd!", "en-US").await.unwrap();

        let missing = service.update_culture("nobody@x.com", "en-GB").await.unwrap();
        assert!(missing.has_error(IdentityErrorCode::UserNotFound));
        assert_eq!(missing.errors[0].description, "User not found");
        assert!(harness.manager.find_by_email("nobody@x.com").await.unwrap().is_none());

        let invalid = service.update_culture("a@x.com", "xx-XXXXXXXXX").await.unwrap();
        assert!(invalid.has_error(IdentityErrorCode::InvalidCulture));

        assert!(service.update_culture("a@x.com", "en-GB").await.unwrap().succeeded);
        let user = harness.manager.find_by_email("a@x.com").await.unwrap().unwrap();
        assert_eq!(user.culture, "en-GB");
    }

    #[tokio::test]
    async fn test_external_sign_in_requires_captured_login() {
        let harness = Harness::with_tokens().await;
        let outcome = harness
            .service()
            .external_login_sign_in("Google", "google-123", false)
            .await
            .unwrap();
        assert_eq!(outcome.result, SignInResult::ExternalLoginInfoMissing);
        assert!(outcome.token.is_none());
    }

    #[tokio::test]
    async fn test_external_user_flow() {
        let harness = Harness::with_tokens().await;
        let info = google_login(Some("g@x.com"), Some("Gee"));
        harness.session.set_external_login(Some(info.clone())).await;
        let service = harness.service();

        assert_eq!(service.external_login_info().await, Some(info.clone()));

        let not_linked = service
            .external_login_sign_in("Google", "google-123", false)
            .await
            .unwrap();
        assert_eq!(not_linked.result, SignInResult::NotLinked);

        let created = service.create_external_user(&info, "en-US").await.unwrap();
        assert!(created.result.succeeded, "{}", created.result);
        assert!(created.token.is_some());

        let mismatch = service
            .external_login_sign_in("Google", "someone-else", false)
            .await
            .unwrap();
        assert_eq!(mismatch.result, SignInResult::InvalidCredentials);

        let signed_in = service
            .external_login_sign_in("Google", "google-123", true)
            .await
            .unwrap();
        assert!(signed_in.result.succeeded());
        let claims = harness.issuer.validate(&signed_in.token.unwrap()).unwrap();
        assert_eq!(claims.email, "g@x.com");
        assert_eq!(claims.culture, "en-US");
    }

    #[tokio::test]
    async fn test_create_external_user_requires_claims() {
        let harness = Harness::with_tokens().await;
        let service = harness.service();

        let nothing = service
            .create_external_user(&google_login(None, None), "en-GB")
            .await
            .unwrap();
        assert!(nothing.result.has_error(IdentityErrorCode::InvalidUsername));
        assert!(nothing.token.is_none());

        let name_only = service
            .create_external_user(&google_login(None, Some("Gee")), "en-GB")
            .await
            .unwrap();
        assert!(name_only.result.has_error(IdentityErrorCode::InvalidEmail));
        assert!(harness.manager.find_by_login("Google", "google-123").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_create_external_user_failure_leaves_no_user() {
        let harness = Harness::with_tokens().await;
        let service = harness.service();
        service
            .create_external_user(&google_login(Some("first@x.com"), None), "en-GB")
            .await
            .unwrap();

        // Same provider key, different email: the link collides.
        let outcome = service
            .create_external_user(&google_login(Some("second@x.com"), None), "en-GB")
            .await
            .unwrap();
        assert!(outcome.result.has_error(IdentityErrorCode::LoginAlreadyAssociated));
        assert!(outcome.token.is_none());
        assert!(harness.manager.find_by_email("second@x.com").await.unwrap().is_none());

        // Invalid culture fails validation before anything is written.
        let outcome = service
            .create_external_user(&google_login(Some("third@x.com"), None), "not-a-culture-tag")
            .await
            .unwrap();
        assert!(outcome.result.has_error(IdentityErrorCode::InvalidCulture));
        assert!(harness.manager.find_by_email("third@x.com").await.unwrap().is_none());
    }
}
