//! PostgreSQL connection management and seeding.

pub mod seed;

use service_core::error::AppError;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::sync::Arc;
use std::time::Duration;

use crate::config::{DatabaseConfig, ServiceConfig};
use crate::services::{CredentialStore, InMemoryCredentialStore, PgCredentialStore};

/// Create a PostgreSQL connection pool for `url`.
pub async fn create_pool(config: &DatabaseConfig, url: &str) -> Result<PgPool, sqlx::Error> {
    tracing::info!("Connecting to PostgreSQL...");

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(30))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .connect(url)
        .await?;

    tracing::info!("Successfully connected to PostgreSQL");

    Ok(pool)
}

/// Run database migrations.
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    tracing::info!("Running database migrations...");
    sqlx::migrate!("./migrations").run(pool).await?;
    tracing::info!("Database migrations completed");
    Ok(())
}

/// Opens the credential store named by the configuration.
///
/// With a `DATABASE_URL` this is Postgres (migrations applied); without one,
/// which only a dev configuration allows, it is the in-memory store.
pub async fn connect_store(
    config: &ServiceConfig,
) -> Result<Arc<dyn CredentialStore>, AppError> {
    match config.database.url.as_deref() {
        Some(url) => {
            let pool = create_pool(&config.database, url).await.map_err(|e| {
                AppError::InternalError(anyhow::anyhow!("Failed to connect to PostgreSQL: {}", e))
            })?;
            run_migrations(&pool).await.map_err(|e| {
                AppError::InternalError(anyhow::anyhow!("Failed to run migrations: {}", e))
            })?;
            Ok(Arc::new(PgCredentialStore::new(pool)))
        }
        None => {
            tracing::warn!("DATABASE_URL not set; using the in-memory store (data is lost on exit)");
            Ok(Arc::new(InMemoryCredentialStore::new()))
        }
    }
}
