use anyhow::Context;
use tracing_subscriber::EnvFilter;

use lms_auth_api::config::AppConfig;
use lms_auth_api::database::{DatabaseManager, Stores};
use lms_auth_api::routes::{app, AppState};
use lms_auth_api::services::{notifier, reaper};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, JWT_SECRET, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "info,lms_auth_api=debug".into()),
        )
        .init();

    let config = AppConfig::from_env();
    config.validate().context("invalid configuration")?;
    tracing::info!("Starting LMS Auth API in {:?} mode", config.environment);

    let stores = match &config.database.url {
        Some(_) => {
            let pool = DatabaseManager::connect(&config.database).await?;
            DatabaseManager::ensure_schema(&pool).await?;
            Stores::postgres(pool)
        }
        None => Stores::memory(),
    };

    reaper::spawn(
        stores.clone(),
        std::time::Duration::from_secs(config.database.reap_interval_secs),
    );

    let notifier = notifier::from_config(&config.email);
    let bind_addr = format!("{}:{}", config.server.bind_host, config.server.port);
    let state = AppState::new(config, stores, notifier);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;
    tracing::info!("LMS Auth API listening on http://{}", bind_addr);

    axum::serve(listener, app(state)).await.context("server error")?;
    Ok(())
}
