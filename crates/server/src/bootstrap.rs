//! Process-start wiring: configuration in, ready-to-use services out.

use crate::config::{AppConfig, ConfigError, SeedRole};
use crate::error::{ServiceError, StoreError};
use crate::manager::UserManager;
use crate::outcome::IdentityErrorCode;
use crate::service::UserManagementService;
use crate::session::SessionManager;
use crate::store::{DataSourceType, DefaultUserStoreFactory, UserStoreFactory};
use crate::token::{JwtSettings, TokenIssuer};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Role required by [`REQUIRE_ADMIN_ROLE`].
pub const ADMIN_ROLE: &str = "Admin";
pub const REQUIRE_ADMIN_ROLE: &str = "RequireAdminRole";

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Service(#[from] ServiceError),
    #[error("Failed to seed role '{name}': {result}")]
    SeedRole { name: String, result: String },
}

/// How requests are expected to authenticate by default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthScheme {
    Bearer,
    Cookie,
}

impl AuthScheme {
    pub const fn as_str(self) -> &'static str {
        match self {
            AuthScheme::Bearer => "Bearer",
            AuthScheme::Cookie => "Cookie",
        }
    }
}

impl fmt::Display for AuthScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExternalProvider {
    Google,
    Apple,
}

impl ExternalProvider {
    /// Provider name as stored on user logins.
    pub const fn name(self) -> &'static str {
        match self {
            ExternalProvider::Google => "Google",
            ExternalProvider::Apple => "Apple",
        }
    }
}

/// A named requirement on the caller's roles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationPolicy {
    pub name: &'static str,
    pub required_role: &'static str,
}

impl AuthorizationPolicy {
    pub fn require_admin_role() -> Self {
        Self {
            name: REQUIRE_ADMIN_ROLE,
            required_role: ADMIN_ROLE,
        }
    }

    pub fn is_satisfied_by(&self, roles: &[String]) -> bool {
        roles.iter().any(|r| r.eq_ignore_ascii_case(self.required_role))
    }
}

/// Everything the process needs to serve identity requests, built once at start-up.
pub struct UserManagement {
    manager: Arc<UserManager>,
    issuer: Arc<TokenIssuer>,
    default_scheme: AuthScheme,
    providers: Vec<ExternalProvider>,
    admin_policy: Option<AuthorizationPolicy>,
}

impl UserManagement {
    pub async fn build(config: &AppConfig) -> Result<Self, BootstrapError> {
        Self::build_with(config, &DefaultUserStoreFactory).await
    }

    #[tracing::instrument(skip(config, factory), fields(kind = %config.data_source.kind))]
    pub async fn build_with(
        config: &AppConfig,
        factory: &dyn UserStoreFactory,
    ) -> Result<Self, BootstrapError> {
        config.validate()?;

        let kind: DataSourceType = config.data_source.kind.parse()?;
        let store = factory
            .create_user_store(
                kind,
                &config.data_source.name,
                config.data_source.connection_string.as_deref(),
            )
            .await?;

        if config.data_source.auto_migrate {
            store.initialize().await?;
            tracing::info!(backend = %kind, "User store initialized");
        }

        let manager = Arc::new(UserManager::new(store, config.password.clone()));
        seed_roles(&manager, &config.seed_roles).await?;

        let jwt = config.jwt.settings();
        let issuer = Arc::new(TokenIssuer::new(&jwt));
        if !jwt.is_complete() && (config.jwt.enabled || jwt != JwtSettings::default()) {
            tracing::warn!("JWT issuer, audience or secret missing; tokens will not be issued");
        }

        let default_scheme = default_scheme(config);
        let providers = enabled_providers(config);
        let admin_policy = config
            .enable_roles
            .then(AuthorizationPolicy::require_admin_role);

        tracing::info!(
            scheme = %default_scheme,
            providers = ?providers,
            roles = config.enable_roles,
            "User management ready"
        );

        Ok(Self {
            manager,
            issuer,
            default_scheme,
            providers,
            admin_policy,
        })
    }

    /// A credential service bound to one caller's session.
    pub fn service(&self, session: Arc<dyn SessionManager>) -> UserManagementService {
        UserManagementService::new(self.manager.clone(), self.issuer.clone(), session)
    }

    pub fn manager(&self) -> &Arc<UserManager> {
        &self.manager
    }

    pub fn issuer(&self) -> &Arc<TokenIssuer> {
        &self.issuer
    }

    pub fn default_scheme(&self) -> AuthScheme {
        self.default_scheme
    }

    pub fn providers(&self) -> &[ExternalProvider] {
        &self.providers
    }

    pub fn admin_policy(&self) -> Option<&AuthorizationPolicy> {
        self.admin_policy.as_ref()
    }
}

/// Bearer when JWT is switched on and fully configured, cookies otherwise.
pub fn default_scheme(config: &AppConfig) -> AuthScheme {
    if config.jwt.enabled && config.jwt.settings().is_complete() {
        AuthScheme::Bearer
    } else {
        AuthScheme::Cookie
    }
}

/// Providers that are switched on and carry every credential they need.
pub fn enabled_providers(config: &AppConfig) -> Vec<ExternalProvider> {
    let mut providers = Vec::new();

    let google = &config.google;
    if google.enabled {
        if [&google.client_id, &google.client_secret]
            .iter()
            .all(|v| !v.is_empty())
        {
            providers.push(ExternalProvider::Google);
        } else {
            tracing::warn!("Google sign-in enabled without client id and secret; skipping");
        }
    }

    let apple = &config.apple;
    if apple.enabled {
        if [
            &apple.client_id,
            &apple.team_id,
            &apple.key_id,
            &apple.private_key,
        ]
        .iter()
        .all(|v| !v.is_empty())
        {
            providers.push(ExternalProvider::Apple);
        } else {
            tracing::warn!("Apple sign-in enabled with incomplete credentials; skipping");
        }
    }

    providers
}

/// Create configured roles that do not exist yet.
pub async fn seed_roles(manager: &UserManager, roles: &[SeedRole]) -> Result<(), BootstrapError> {
    for role in roles {
        let result = manager
            .create_role(&role.name, role.description.as_deref())
            .await?;
        if result.succeeded {
            continue;
        }
        if result.has_error(IdentityErrorCode::DuplicateRoleName) {
            tracing::debug!(role = %role.name, "Role already present");
            continue;
        }
        return Err(BootstrapError::SeedRole {
            name: role.name.clone(),
            result: result.to_string(),
        });
    }
    Ok(())
}
