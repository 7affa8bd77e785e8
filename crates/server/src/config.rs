use crate::password::PasswordOptions;
use crate::token::JwtSettings;
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

/// HS256 keys shorter than this are rejected.
pub const MIN_JWT_SECRET_LEN: usize = 32;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration build error: {0}")]
    Build(#[from] config::ConfigError),
    #[error("Invalid configuration: {0}")]
    Validation(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct DataSourceConfig {
    /// Backend kind as written in configuration, e.g. `relational` or `mongodb`.
    pub kind: String,
    /// Database name; only document stores use it.
    #[serde(default = "default_data_source_name")]
    pub name: String,
    pub connection_string: Option<String>,
    #[serde(default = "default_true")]
    pub auto_migrate: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct JwtConfig {
    #[serde(default)]
    pub enabled: bool,
    pub issuer: Option<String>,
    pub audience: Option<String>,
    pub secret: Option<String>,
}

impl JwtConfig {
    pub fn settings(&self) -> JwtSettings {
        JwtSettings {
            issuer: self.issuer.clone(),
            audience: self.audience.clone(),
            secret: self.secret.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GoogleConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppleConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub team_id: String,
    #[serde(default)]
    pub key_id: String,
    #[serde(default)]
    pub private_key: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedRole {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_listen_address")]
    pub listen_address: String,
    pub data_source: DataSourceConfig,
    #[serde(default)]
    pub jwt: JwtConfig,
    #[serde(default)]
    pub password: PasswordOptions,
    #[serde(default)]
    pub google: GoogleConfig,
    #[serde(default)]
    pub apple: AppleConfig,
    #[serde(default = "default_true")]
    pub enable_roles: bool,
    #[serde(default)]
    pub seed_roles: Vec<SeedRole>,
}

fn default_listen_address() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_data_source_name() -> String {
    "identity".to_string()
}

fn default_true() -> bool {
    true
}

impl AppConfig {
    /// Reject values that would only fail later at runtime.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let jwt = self.jwt.settings();
        if jwt.is_complete()
            && jwt
                .secret
                .as_deref()
                .is_some_and(|s| s.len() < MIN_JWT_SECRET_LEN)
        {
            return Err(ConfigError::Validation(format!(
                "jwt.secret must be at least {MIN_JWT_SECRET_LEN} bytes"
            )));
        }
        if self.password.required_length == 0 {
            return Err(ConfigError::Validation(
                "password.required_length must be >= 1".into(),
            ));
        }
        Ok(())
    }

    /// Parse and validate a YAML document without touching the environment.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        use config::{Config, File, FileFormat};
        let app: AppConfig = Config::builder()
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .build()?
            .try_deserialize()?;
        app.validate()?;
        Ok(app)
    }
}

/// Load configuration from `path` + environment overrides.
///
/// Any environment variable matching the key path with `__` separators
/// (e.g. `JWT__SECRET`, `DATA_SOURCE__CONNECTION_STRING`) overrides the file value.
pub fn load_config_from(path: impl AsRef<Path>) -> Result<AppConfig, ConfigError> {
    use config::{Config, Environment, File};
    let cfg = Config::builder()
        .add_source(File::from(path.as_ref()))
        .add_source(Environment::default().separator("__"))
        .build()?;

    let app: AppConfig = cfg.try_deserialize()?;
    app.validate()?;
    Ok(app)
}

/// Load `config.yaml` from the working directory + environment overrides.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    load_config_from("config.yaml")
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
data_source:
  kind: relational
  connection_string: "sqlite::memory:"
"#;

    #[test]
    fn defaults_apply() {
        let config = AppConfig::from_yaml_str(MINIMAL).unwrap();
        assert_eq!(config.listen_address, "0.0.0.0:8080");
        assert_eq!(config.data_source.name, "identity");
        assert!(config.data_source.auto_migrate);
        assert!(config.enable_roles);
        assert!(!config.jwt.enabled);
        assert!(!config.jwt.settings().is_complete());
        assert_eq!(config.password.required_length, 8);
        assert!(config.password.require_digit);
        assert!(!config.google.enabled);
        assert!(config.seed_roles.is_empty());
    }

    #[test]
    fn short_secret_rejected() {
        let yaml = format!(
            "{MINIMAL}jwt:\n  enabled: true\n  issuer: iss\n  audience: aud\n  secret: too-short\n"
        );
        let err = AppConfig::from_yaml_str(&yaml).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(msg) if msg.contains("jwt.secret")));
    }

    #[test]
    fn short_secret_allowed_when_triple_incomplete() {
        let yaml = format!("{MINIMAL}jwt:\n  enabled: true\n  secret: short\n");
        assert!(AppConfig::from_yaml_str(&yaml).is_ok());
    }

    #[test]
    fn zero_password_length_rejected() {
        let yaml = format!("{MINIMAL}password:\n  required_length: 0\n");
        assert!(matches!(
            AppConfig::from_yaml_str(&yaml),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn missing_data_source_is_build_error() {
        assert!(matches!(
            AppConfig::from_yaml_str("enable_roles: false\n"),
            Err(ConfigError::Build(_))
        ));
    }
}
