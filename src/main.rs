//! Hearth maintenance entry point
//!
//! Brings the session schema up to date and reclaims expired sessions.
//! Takes an optional config path (default `config.yml`).

use anyhow::Result;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use hearth::{
    config::Config,
    db::{self, repositories::SqlxSessionRepository, DatabasePool},
    services::{SessionManager, SessionPolicy},
};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "hearth=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.yml"));

    let config = Config::load_with_env(&config_path)?;
    tracing::info!("Configuration loaded from {}", config_path.display());

    let pool = db::create_pool(&config.database).await?;
    tracing::info!("Database connected: {:?}", config.database.driver);

    let applied = db::migrations::run_migrations(&pool).await?;
    tracing::info!("Database migrations completed ({} applied)", applied);

    let policy = SessionPolicy::from_config(&config.session)?;
    let sessions = SessionManager::with_policy(SqlxSessionRepository::boxed(pool.clone()), policy);

    let removed = sessions.purge_expired_sessions().await?;
    tracing::info!("Removed {} expired session(s)", removed);

    pool.close().await;
    Ok(())
}
