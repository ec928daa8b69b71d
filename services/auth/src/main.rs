use anyhow::Result;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod config;
mod error;
mod jwt;
mod middleware;
mod models;
mod password;
mod reaper;
mod repositories;
mod revocation;
mod routes;
mod session;
mod validation;

#[cfg(test)]
mod test_support;

use common::{database, error::DatabaseError};

use crate::{
    config::AppConfig,
    jwt::JwtService,
    password::PasswordService,
    reaper::RevocationReaper,
    repositories::{PgCredentialRepository, PgRevocationStore},
    revocation::{RevocationStore, TimedRevocationStore},
    session::SessionManager,
};

/// Embedded schema migrations
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!();

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub sessions: SessionManager,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting authentication service");

    // Refuse to serve without a usable signing secret
    let config = AppConfig::from_env()?;
    let jwt_service = JwtService::new(config.jwt.clone())?;

    // Initialize database connection pool
    let pool = database::init_pool(&config.database).await?;
    if database::health_check(&pool).await? {
        info!("Database connection successful");
    } else {
        anyhow::bail!("Failed to connect to database");
    }

    MIGRATOR
        .run(&pool)
        .await
        .map_err(|e| DatabaseError::Migration(e.to_string()))?;

    let revocations: Arc<dyn RevocationStore> = Arc::new(PgRevocationStore::new(pool.clone()));
    let sessions = SessionManager::new(
        jwt_service,
        Arc::new(TimedRevocationStore::new(
            revocations.clone(),
            config.revocation.lookup_timeout,
        )),
        Arc::new(PgCredentialRepository::new(pool)),
        PasswordService::new(),
    );

    let reaper = RevocationReaper::new(revocations, &config.revocation).spawn();

    let app_state = AppState { sessions };

    // Start the web server
    let app = routes::create_router(app_state);

    let listener = tokio::net::TcpListener::bind(config.server.bind_address).await?;
    info!(
        "Authentication service listening on {}",
        config.server.bind_address
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {}", e);
            }
        })
        .await?;

    reaper.abort();
    info!("Shutting down authentication service");

    Ok(())
}
