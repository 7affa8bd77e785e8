//! Request authentication (bearer token or session cookie) and role policy checks.

use crate::AppResources;
use crate::bootstrap::{AuthScheme, AuthorizationPolicy};
use crate::session::{EstablishedSession, PERSISTENT_SESSION_LIFETIME};
use crate::token::SessionClaims;
use axum::{
    Json,
    extract::FromRequestParts,
    http::{
        HeaderMap, StatusCode,
        header::{AUTHORIZATION, COOKIE},
        request::Parts,
    },
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Error type for authentication failures
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AuthError {
    /// Error code (e.g., "invalid_token", "forbidden")
    pub error: String,
    /// Human-readable error description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
}

impl AuthError {
    pub fn invalid_token(description: impl Into<String>) -> Self {
        Self {
            error: "invalid_token".to_string(),
            error_description: Some(description.into()),
        }
    }

    pub fn forbidden(description: impl Into<String>) -> Self {
        Self {
            error: "forbidden".to_string(),
            error_description: Some(description.into()),
        }
    }

    pub fn server_error() -> Self {
        Self {
            error: "server_error".to_string(),
            error_description: None,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = match self.error.as_str() {
            "invalid_token" => StatusCode::UNAUTHORIZED,
            "forbidden" => StatusCode::FORBIDDEN,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(self)).into_response()
    }
}

/// Name of the cookie carrying the session id.
pub const SESSION_COOKIE: &str = "um_session";

/// `Set-Cookie` value that makes the browser drop the session cookie.
pub const EXPIRED_SESSION_COOKIE: &str = "um_session=; Path=/; HttpOnly; Secure; SameSite=Lax; Max-Age=0";

/// `Set-Cookie` value for a freshly established session. Non-persistent
/// sessions get a browser-session cookie.
pub fn session_cookie(session: &EstablishedSession) -> String {
    let mut cookie = format!(
        "{SESSION_COOKIE}={}; Path=/; HttpOnly; Secure; SameSite=Lax",
        session.id
    );
    if session.persistent {
        cookie.push_str(&format!(
            "; Max-Age={}",
            PERSISTENT_SESSION_LIFETIME.whole_seconds()
        ));
    }
    cookie
}

/// Session id from the request's `Cookie` headers, if present.
pub fn session_id(headers: &HeaderMap) -> Option<&str> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .find_map(|pair| {
            let (name, value) = pair.trim().split_once('=')?;
            (name == SESSION_COOKIE && !value.is_empty()).then_some(value)
        })
}

/// The authenticated principal behind a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub user_id: String,
    pub email: String,
    pub roles: Vec<String>,
}

impl From<SessionClaims> for Caller {
    fn from(claims: SessionClaims) -> Self {
        Self {
            user_id: claims.sub,
            email: claims.email,
            roles: claims.role,
        }
    }
}

/// Axum extractor accepting either `Authorization: Bearer <token>` or the
/// session cookie set by sign-in. The configured default scheme decides which
/// credential is consulted first when a request carries both.
///
/// ```ignore
/// async fn handler(Authenticated(caller): Authenticated) -> impl IntoResponse {
///     format!("Hello, {}", caller.email)
/// }
/// ```
pub struct Authenticated(pub Caller);

impl<S> FromRequestParts<S> for Authenticated
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let resources = parts
            .extensions
            .get::<AppResources>()
            .cloned()
            .ok_or_else(|| {
                tracing::error!("AppResources not found in extensions");
                AuthError::server_error()
            })?;

        let authorization = parts
            .headers
            .get(AUTHORIZATION)
            .map(|v| v.to_str().unwrap_or_default().to_string());
        let session = session_id(&parts.headers).map(str::to_string);

        let caller = match (resources.management.default_scheme(), authorization, session) {
            (AuthScheme::Bearer, Some(header), _) | (AuthScheme::Cookie, Some(header), None) => {
                bearer_caller(&resources, &header)?
            }
            (_, _, Some(id)) => session_caller(&resources, &id).await?,
            (_, None, None) => {
                return Err(AuthError::invalid_token(
                    "Missing bearer token or session cookie",
                ));
            }
        };
        Ok(Authenticated(caller))
    }
}

fn bearer_caller(resources: &AppResources, header: &str) -> Result<Caller, AuthError> {
    let Some(token) = header.strip_prefix("Bearer ") else {
        return Err(AuthError::invalid_token(
            "Authorization header must use Bearer scheme",
        ));
    };

    let claims = resources
        .management
        .issuer()
        .validate(token.trim())
        .map_err(|e| {
            tracing::debug!(error = %e, "Rejected bearer token");
            AuthError::invalid_token("Token is not valid")
        })?;
    Ok(claims.into())
}

/// Resolve a session cookie; roles are read from the store so they reflect
/// membership changes made after sign-in.
async fn session_caller(resources: &AppResources, id: &str) -> Result<Caller, AuthError> {
    let principal = match resources.sessions.get(id).await {
        Some(session) => session.current().await,
        None => None,
    }
    .ok_or_else(|| AuthError::invalid_token("Session is not valid"))?;

    let manager = resources.management.manager();
    let lookup_failed = |e: crate::error::ServiceError| {
        tracing::error!(error = %e, "Failed to resolve session user");
        AuthError::server_error()
    };
    let user = manager
        .find_by_id(&principal.user_id)
        .await
        .map_err(lookup_failed)?
        .ok_or_else(|| AuthError::invalid_token("Session user no longer exists"))?;
    let roles = manager.roles(&user).await.map_err(lookup_failed)?;

    Ok(Caller {
        user_id: user.id,
        email: user.email,
        roles,
    })
}

/// Enforce an authorization policy on the caller. A missing policy means roles are disabled.
pub fn require_policy(
    caller: &Caller,
    policy: Option<&AuthorizationPolicy>,
) -> Result<(), AuthError> {
    let Some(policy) = policy else {
        return Err(AuthError::forbidden("Role management is disabled"));
    };
    if policy.is_satisfied_by(&caller.roles) {
        Ok(())
    } else {
        Err(AuthError::forbidden(format!(
            "Policy '{}' requires role '{}'",
            policy.name, policy.required_role
        )))
    }
}
