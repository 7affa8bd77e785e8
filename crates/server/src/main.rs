use std::sync::Arc;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};
use user_management::AppResources;
use user_management::api::start_webserver;
use user_management::bootstrap::UserManagement;
use user_management::config::{load_config, load_config_from};

fn initialize_tracing() {
    let default_directives = "user_management=info,sea_orm=info";
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives));

    let registry = tracing_subscriber::registry().with(env_filter);
    let layer = fmt::layer().with_target(true).with_level(true);

    registry.with(layer).init();
}

#[tokio::main]
async fn main() -> color_eyre::eyre::Result<()> {
    color_eyre::install()?;
    // A missing .env is fine; the environment may already be set.
    let _ = dotenvy::dotenv();

    initialize_tracing();

    // First argument overrides the config path.
    let config = match std::env::args().nth(1) {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };
    let config = Arc::new(config);

    let management = Arc::new(UserManagement::build(&config).await?);
    let resources = AppResources::new(management, config);

    start_webserver(resources).await
}
