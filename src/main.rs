use anyhow::{Context, Result};
use pathstore::{config::ServerConfig, credential::Argon2Hasher, server, store::Store};
use tracing_subscriber::EnvFilter;

use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("pathstore=info,tower_http=info,warn")),
        )
        .init();

    let config = ServerConfig::from_env()?;
    let store = Store::open(&config.db_file)
        .with_context(|| format!("Failed to open the database file {}", config.db_file))?;
    store.bootstrap()?;

    let state = server::AppState::new(store, Arc::new(Argon2Hasher), config.filter_policy());
    server::serve(&config, state).await
}
