//! Frontdesk Server — application entry point.

use frontdesk_db::{DbConfig, DbManager};
use tracing_subscriber::EnvFilter;

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.into())
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("frontdesk=info".parse().unwrap()),
        )
        .json()
        .init();

    tracing::info!("Starting Frontdesk server...");

    let config = DbConfig {
        url: env_or("FRONTDESK_DB_URL", "127.0.0.1:8000"),
        namespace: env_or("FRONTDESK_DB_NAMESPACE", "frontdesk"),
        database: env_or("FRONTDESK_DB_DATABASE", "main"),
        username: env_or("FRONTDESK_DB_USERNAME", "root"),
        password: env_or("FRONTDESK_DB_PASSWORD", "root"),
    };

    let manager = match DbManager::connect(&config).await {
        Ok(manager) => manager,
        Err(e) => {
            tracing::error!(error = %e, "Failed to connect to SurrealDB");
            std::process::exit(1);
        }
    };

    if let Err(e) = frontdesk_db::run_migrations(manager.client()).await {
        tracing::error!(error = %e, "Failed to run migrations");
        std::process::exit(1);
    }

    tracing::info!("Frontdesk back office ready.");
}
