//! HTTP surface over the credential service.
//!
//! - `account` - registration, sign-in, sign-out, culture, supported schemes (/account/*)
//! - `roles` - role membership (/roles/*)
//! - `auth` - bearer token / session cookie authentication
//! - `health` - liveness (/health)
//! - `openapi` - OpenAPI/Utoipa configuration, served as Redoc at /api-docs

pub mod account;
pub mod auth;
pub mod health;
pub mod openapi;
pub mod responses;
pub mod roles;

pub use account::ACCOUNT_TAG;
pub use health::MISC_TAG;
pub use roles::ROLES_TAG;

use crate::AppResources;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_axum::{router::OpenApiRouter, routes};
use utoipa_redoc::{Redoc, Servable};

/// Build the application router with every route and middleware layer attached.
pub fn router(resources: AppResources) -> axum::Router {
    let (router, api) = OpenApiRouter::with_openapi(openapi::ApiDoc::openapi())
        .nest("/account", account::router())
        .nest("/roles", roles::router())
        .routes(routes!(health::health))
        .layer(axum::Extension(resources))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .split_for_parts();

    router.merge(Redoc::with_url("/api-docs", api))
}

/// Starts the web server on the configured listen address.
#[tracing::instrument(skip(resources))]
pub async fn start_webserver(resources: AppResources) -> color_eyre::Result<()> {
    let addr = resources.config.listen_address.clone();
    let router = router(resources);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "Server running");
    axum::serve(listener, router)
        .await
        .map_err(|e| color_eyre::Report::msg(format!("Failed to start server: {e}")))?;

    Ok(())
}
