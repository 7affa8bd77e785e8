//! External identity provider results.

/// A persisted link between a user and an external provider account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserLoginInfo {
    /// Provider name, e.g. "Google" or "Apple".
    pub provider: String,
    /// Provider-assigned subject identifier.
    pub provider_key: String,
    pub provider_display_name: Option<String>,
}

impl UserLoginInfo {
    pub fn new(provider: &str, provider_key: &str, provider_display_name: Option<&str>) -> Self {
        Self {
            provider: provider.to_string(),
            provider_key: provider_key.to_string(),
            provider_display_name: provider_display_name.map(str::to_string),
        }
    }
}

/// What an external authentication handshake produced.
///
/// Transient: consumed once to sign a linked user in, or to create and link a new user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalLoginInfo {
    pub login: UserLoginInfo,
    /// `email` claim from the provider, if released.
    pub email: Option<String>,
    /// Display name claim from the provider, if released.
    pub display_name: Option<String>,
}

impl ExternalLoginInfo {
    pub fn provider(&self) -> &str {
        &self.login.provider
    }

    pub fn provider_key(&self) -> &str {
        &self.login.provider_key
    }
}
