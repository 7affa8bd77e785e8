//! Account endpoints: registration, sign-in, sign-out and culture.
//!
//! Successful registration and sign-in establish a server-side session and
//! set its cookie; a bearer token is returned as well when token issuance is
//! configured.

use crate::AppResources;
use crate::api::auth::{
    AuthError, Authenticated, EXPIRED_SESSION_COOKIE, SESSION_COOKIE, session_cookie, session_id,
};
use crate::api::responses::{
    ApiError, AuthResponse, ErrorsResponse, SignInFailure, ensure_succeeded,
};
use crate::models::Culture;
use crate::session::MemorySession;
use axum::{
    Extension, Json,
    http::{HeaderMap, HeaderName, StatusCode, header::SET_COOKIE},
    response::AppendHeaders,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use utoipa_axum::{router::OpenApiRouter, routes};

/// Tag for OpenAPI documentation.
pub const ACCOUNT_TAG: &str = "Account";

#[derive(Debug, Deserialize, ToSchema)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    /// Culture tag such as `en-US`; defaults to `en-GB`.
    #[serde(default)]
    pub culture: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub remember_me: bool,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CultureRequest {
    pub culture: String,
}

/// How clients can authenticate against this deployment.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SchemesResponse {
    /// `Bearer` or `Cookie`.
    pub default_scheme: String,
    pub token_issuance: bool,
    /// External providers available for sign-in, e.g. `Google`.
    pub external_providers: Vec<String>,
}

type SetCookie = AppendHeaders<Vec<(HeaderName, String)>>;

/// Register a signed-in session and produce its cookie.
async fn establish_session(resources: &AppResources, session: Arc<MemorySession>) -> SetCookie {
    let cookies = match resources.sessions.establish(session).await {
        Some(established) => vec![(SET_COOKIE, session_cookie(&established))],
        None => Vec::new(),
    };
    AppendHeaders(cookies)
}

pub fn router() -> OpenApiRouter {
    OpenApiRouter::new()
        .routes(routes!(schemes))
        .routes(routes!(register))
        .routes(routes!(login))
        .routes(routes!(logout))
        .routes(routes!(update_culture))
}

#[utoipa::path(
    post,
    path = "/register",
    tag = ACCOUNT_TAG,
    request_body = RegisterRequest,
    responses(
        (status = 200, description = "Account created and signed in; sets the session cookie", body = AuthResponse),
        (status = 400, description = "Validation failed", body = ErrorsResponse),
        (status = 500, description = "Internal server error")
    )
)]
#[tracing::instrument(skip(resources, payload), fields(email = %payload.email))]
pub async fn register(
    Extension(resources): Extension<AppResources>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(SetCookie, Json<AuthResponse>), ApiError> {
    let culture = payload
        .culture
        .unwrap_or_else(|| Culture::default().tag().to_string());
    let session = Arc::new(MemorySession::new());
    let service = resources.management.service(session.clone());

    let outcome = service
        .register(&payload.email, &payload.password, &culture)
        .await?;
    ensure_succeeded(outcome.result)?;

    Ok((
        establish_session(&resources, session).await,
        Json(AuthResponse {
            succeeded: true,
            token: outcome.token,
        }),
    ))
}

#[utoipa::path(
    post,
    path = "/login",
    tag = ACCOUNT_TAG,
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Signed in; sets the session cookie", body = AuthResponse),
        (status = 401, description = "Invalid credentials", body = SignInFailure),
        (status = 500, description = "Internal server error")
    )
)]
#[tracing::instrument(skip(resources, payload), fields(email = %payload.email))]
pub async fn login(
    Extension(resources): Extension<AppResources>,
    Json(payload): Json<LoginRequest>,
) -> Result<(SetCookie, Json<AuthResponse>), ApiError> {
    let session = Arc::new(MemorySession::new());
    let service = resources.management.service(session.clone());

    let outcome = service
        .login(&payload.email, &payload.password, payload.remember_me)
        .await?;
    if !outcome.result.succeeded() {
        return Err(ApiError::SignIn(outcome.result));
    }

    Ok((
        establish_session(&resources, session).await,
        Json(AuthResponse {
            succeeded: true,
            token: outcome.token,
        }),
    ))
}

/// Ends the cookie session. Bearer tokens are not revocable and stay valid until they expire.
#[utoipa::path(
    post,
    path = "/logout",
    tag = ACCOUNT_TAG,
    responses((status = 204, description = "Session ended; clears the session cookie"))
)]
#[tracing::instrument(skip(resources, headers))]
pub async fn logout(
    Extension(resources): Extension<AppResources>,
    headers: HeaderMap,
) -> (StatusCode, AppendHeaders<[(HeaderName, &'static str); 1]>) {
    if let Some(id) = session_id(&headers) {
        match resources.sessions.remove(id).await {
            Some(session) => resources.management.service(session).sign_out().await,
            None => tracing::debug!(cookie = SESSION_COOKIE, "Sign-out for unknown session"),
        }
    }
    (
        StatusCode::NO_CONTENT,
        AppendHeaders([(SET_COOKIE, EXPIRED_SESSION_COOKIE)]),
    )
}

#[utoipa::path(
    put,
    path = "/culture",
    tag = ACCOUNT_TAG,
    request_body = CultureRequest,
    security(("Authorization" = []), ("Session" = [])),
    responses(
        (status = 204, description = "Culture updated"),
        (status = 400, description = "Invalid culture", body = ErrorsResponse),
        (status = 401, description = "Missing or invalid credentials", body = AuthError),
        (status = 404, description = "Caller no longer exists", body = ErrorsResponse)
    )
)]
#[tracing::instrument(skip(resources, caller, payload), fields(user_id = %caller.user_id))]
pub async fn update_culture(
    Extension(resources): Extension<AppResources>,
    Authenticated(caller): Authenticated,
    Json(payload): Json<CultureRequest>,
) -> Result<StatusCode, ApiError> {
    let service = resources.management.service(Arc::new(MemorySession::new()));
    let result = service
        .update_culture(&caller.email, &payload.culture)
        .await?;
    ensure_succeeded(result)?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/schemes",
    tag = ACCOUNT_TAG,
    responses((status = 200, description = "Supported authentication schemes", body = SchemesResponse))
)]
pub async fn schemes(Extension(resources): Extension<AppResources>) -> Json<SchemesResponse> {
    let management = &resources.management;
    Json(SchemesResponse {
        default_scheme: management.default_scheme().to_string(),
        token_issuance: management.issuer().is_enabled(),
        external_providers: management
            .providers()
            .iter()
            .map(|p| p.name().to_string())
            .collect(),
    })
}
