//! Session token issuance and validation.
//!
//! Tokens are HS256 JWTs valid for one hour. Issuance needs issuer, audience
//! and secret; when any of them is missing the issuer is disabled and
//! [`TokenIssuer::issue`] yields `None` instead of failing.

use crate::error::TokenError;
use crate::models::User;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

/// Lifetime of every issued token.
pub const TOKEN_LIFETIME: Duration = Duration::hours(1);

/// Issuer, audience and signing secret, each optional in configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JwtSettings {
    pub issuer: Option<String>,
    pub audience: Option<String>,
    pub secret: Option<String>,
}

impl JwtSettings {
    pub fn new(issuer: &str, audience: &str, secret: &str) -> Self {
        Self {
            issuer: Some(issuer.to_string()),
            audience: Some(audience.to_string()),
            secret: Some(secret.to_string()),
        }
    }

    /// All three values present and non-empty.
    pub fn is_complete(&self) -> bool {
        [&self.issuer, &self.audience, &self.secret]
            .iter()
            .all(|v| v.as_deref().is_some_and(|s| !s.is_empty()))
    }
}

/// Claims carried by a session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sub: String,
    pub email: String,
    pub culture: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub role: Vec<String>,
    pub iss: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
}

struct SigningConfig {
    issuer: String,
    audience: String,
    encoding: EncodingKey,
    decoding: DecodingKey,
}

pub struct TokenIssuer {
    signing: Option<SigningConfig>,
}

impl TokenIssuer {
    pub fn new(settings: &JwtSettings) -> Self {
        let signing = match (&settings.issuer, &settings.audience, &settings.secret) {
            (Some(issuer), Some(audience), Some(secret)) if settings.is_complete() => {
                Some(SigningConfig {
                    issuer: issuer.clone(),
                    audience: audience.clone(),
                    encoding: EncodingKey::from_secret(secret.as_bytes()),
                    decoding: DecodingKey::from_secret(secret.as_bytes()),
                })
            }
            _ => None,
        };
        Self { signing }
    }

    pub fn disabled() -> Self {
        Self { signing: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.signing.is_some()
    }

    /// Sign a token for `user` carrying `roles`.
    ///
    /// Returns `Ok(None)` when the issuer is disabled.
    #[tracing::instrument(skip(self, user, roles), fields(user_id = %user.id))]
    pub fn issue(&self, user: &User, roles: &[String]) -> Result<Option<String>, TokenError> {
        let Some(signing) = &self.signing else {
            return Ok(None);
        };

        let now = OffsetDateTime::now_utc();
        let mut role = roles.to_vec();
        role.sort();

        let claims = SessionClaims {
            sub: user.id.clone(),
            email: user.email.clone(),
            culture: user.culture.clone(),
            role,
            iss: signing.issuer.clone(),
            aud: signing.audience.clone(),
            iat: now.unix_timestamp(),
            exp: (now + TOKEN_LIFETIME).unix_timestamp(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &signing.encoding)?;
        Ok(Some(token))
    }

    /// Check signature, issuer, audience and lifetime of a bearer token. No clock skew is allowed.
    pub fn validate(&self, token: &str) -> Result<SessionClaims, TokenError> {
        let signing = self.signing.as_ref().ok_or(TokenError::Disabled)?;

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_exp = true;
        validation.set_issuer(&[signing.issuer.as_str()]);
        validation.set_audience(&[signing.audience.as_str()]);
        validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);

        let data = decode::<SessionClaims>(token, &signing.decoding, &validation)?;
        Ok(data.claims)
    }
}
