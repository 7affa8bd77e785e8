use config::Config;
use sea_orm_migration::prelude::*;
use std::env;

/// Relational connection string from `config.yaml`, if the file and key exist.
fn connection_string_from_config() -> Option<String> {
    let settings = Config::builder()
        .add_source(config::File::with_name("config.yaml").required(false))
        .build()
        .ok()?;
    let url = settings.get_string("data_source.connection_string").ok()?;
    let url = url.trim();
    (!url.is_empty()).then(|| url.to_string())
}

#[tokio::main]
async fn main() {
    // DATABASE_URL (or --database-url) wins over the service config.
    if env::var("DATABASE_URL").is_err() {
        match connection_string_from_config() {
            Some(url) => env::set_var("DATABASE_URL", url),
            None => eprintln!("DATABASE_URL unset and no data_source.connection_string in config.yaml"),
        }
    }
    cli::run_cli(migration::Migrator).await;
}
