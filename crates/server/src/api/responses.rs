//! Shared response bodies and the outcome-to-status mapping.

use crate::error::ServiceError;
use crate::outcome::{IdentityError, IdentityErrorCode, IdentityResult, SignInResult};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::json;
use utoipa::ToSchema;

/// Successful authentication. `token` is absent when token issuance is not configured.
#[derive(Debug, Serialize, ToSchema)]
pub struct AuthResponse {
    pub succeeded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

/// Identity operation rejected; every reason is listed.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorsResponse {
    pub errors: Vec<IdentityError>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SignInFailure {
    pub result: SignInResult,
}

pub enum ApiError {
    Identity(IdentityResult),
    SignIn(SignInResult),
    Internal(ServiceError),
}

impl From<ServiceError> for ApiError {
    fn from(e: ServiceError) -> Self {
        ApiError::Internal(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Identity(result) => {
                let status = if result.has_error(IdentityErrorCode::UserNotFound) {
                    StatusCode::NOT_FOUND
                } else {
                    StatusCode::BAD_REQUEST
                };
                (
                    status,
                    Json(ErrorsResponse {
                        errors: result.errors,
                    }),
                )
                    .into_response()
            }
            ApiError::SignIn(result) => {
                (StatusCode::UNAUTHORIZED, Json(SignInFailure { result })).into_response()
            }
            ApiError::Internal(e) => {
                tracing::error!(error = %e, "Request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": "server_error" })),
                )
                    .into_response()
            }
        }
    }
}

/// Turn a failed [`IdentityResult`] into an error response.
pub fn ensure_succeeded(result: IdentityResult) -> Result<(), ApiError> {
    if result.succeeded {
        Ok(())
    } else {
        Err(ApiError::Identity(result))
    }
}
