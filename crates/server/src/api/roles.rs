//! Role membership endpoints.

use crate::AppResources;
use crate::api::auth::{AuthError, Authenticated, require_policy};
use crate::api::responses::{ApiError, ErrorsResponse, ensure_succeeded};
use crate::session::MemorySession;
use axum::{
    Extension, Json,
    extract::Path,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use utoipa_axum::{router::OpenApiRouter, routes};

/// Tag for OpenAPI documentation.
pub const ROLES_TAG: &str = "Roles";

#[derive(Debug, Deserialize, ToSchema)]
pub struct AddMemberRequest {
    pub email: String,
    pub role: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MembershipResponse {
    pub role: String,
    pub email: String,
    pub is_member: bool,
}

pub fn router() -> OpenApiRouter {
    OpenApiRouter::new()
        .routes(routes!(add_member))
        .routes(routes!(is_member))
}

#[utoipa::path(
    post,
    path = "/members",
    tag = ROLES_TAG,
    request_body = AddMemberRequest,
    security(("Authorization" = []), ("Session" = [])),
    responses(
        (status = 204, description = "User added to role"),
        (status = 400, description = "Unknown role or already a member", body = ErrorsResponse),
        (status = 401, description = "Missing or invalid credentials", body = AuthError),
        (status = 403, description = "Caller is not an administrator", body = AuthError),
        (status = 404, description = "User not found", body = ErrorsResponse)
    )
)]
#[tracing::instrument(skip(resources, caller, payload), fields(caller = %caller.user_id, role = %payload.role))]
pub async fn add_member(
    Extension(resources): Extension<AppResources>,
    Authenticated(caller): Authenticated,
    Json(payload): Json<AddMemberRequest>,
) -> Response {
    if let Err(e) = require_policy(&caller, resources.management.admin_policy()) {
        return e.into_response();
    }

    let service = resources.management.service(Arc::new(MemorySession::new()));
    let result = match service.add_to_role(&payload.email, &payload.role).await {
        Ok(result) => result,
        Err(e) => return ApiError::from(e).into_response(),
    };
    match ensure_succeeded(result) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => e.into_response(),
    }
}

#[utoipa::path(
    get,
    path = "/{role}/members/{email}",
    tag = ROLES_TAG,
    params(
        ("role" = String, Path, description = "Role name"),
        ("email" = String, Path, description = "Email of the user to check")
    ),
    security(("Authorization" = []), ("Session" = [])),
    responses(
        (status = 200, description = "Membership status", body = MembershipResponse),
        (status = 401, description = "Missing or invalid credentials", body = AuthError)
    )
)]
#[tracing::instrument(skip(resources, _caller))]
pub async fn is_member(
    Extension(resources): Extension<AppResources>,
    Authenticated(_caller): Authenticated,
    Path((role, email)): Path<(String, String)>,
) -> Result<Json<MembershipResponse>, ApiError> {
    let service = resources.management.service(Arc::new(MemorySession::new()));
    let is_member = service.is_in_role(&email, &role).await?;
    Ok(Json(MembershipResponse {
        role,
        email,
        is_member,
    }))
}
