//! OpenAPI/Utoipa configuration.

use crate::api::{account::ACCOUNT_TAG, auth::SESSION_COOKIE, health::MISC_TAG, roles::ROLES_TAG};
use utoipa::{
    Modify, OpenApi,
    openapi::security::{ApiKey, ApiKeyValue, HttpAuthScheme, HttpBuilder, SecurityScheme},
};

/// Security addon for OpenAPI documentation.
pub struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            let bearer = HttpBuilder::new()
                .scheme(HttpAuthScheme::Bearer)
                .bearer_format("JWT")
                .description(Some(
                    "Use the token returned by `/account/register` or `/account/login`.",
                ))
                .build();
            components.add_security_scheme("Authorization", SecurityScheme::Http(bearer));

            // Set by register/login; the only credential when token issuance is off.
            let session = ApiKey::Cookie(ApiKeyValue::with_description(
                SESSION_COOKIE,
                "Session cookie set by `/account/register` or `/account/login`.",
            ));
            components.add_security_scheme("Session", SecurityScheme::ApiKey(session));
        }
    }
}

/// OpenAPI documentation configuration.
#[derive(OpenApi)]
#[openapi(
    modifiers(&SecurityAddon),
    info(
        title = "User Management API",
        version = "1.0.0",
        description = "Registration, sign-in and role membership over a relational or document user store."
    ),
    tags(
        (name = MISC_TAG, description = "Miscellaneous endpoints"),
        (name = ACCOUNT_TAG, description = "Account endpoints"),
        (name = ROLES_TAG, description = "Role membership endpoints")
    )
)]
pub struct ApiDoc;
