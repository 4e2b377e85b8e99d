mod postgres_repository;


pub use postgres_repository::create_postgres_repository;

use crate::config::DatabaseConfig;
use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;

/// Delay between connection attempts while the database comes up.
const RETRY_DELAY: Duration = Duration::from_secs(1);

/// Connects to PostgreSQL, retrying until the database accepts connections,
/// then applies pending migrations.
///
/// # Errors
/// Returns an error once `retry_count` attempts have failed, or if a
/// migration fails.
pub async fn connect_with_retry(config: &DatabaseConfig) -> Result<PgPool> {
    // ---
    let options = PgPoolOptions::new()
        .min_connections(config.min_connections)
        .max_connections(config.max_connections)
        .acquire_timeout(config.acquire_timeout);

    let attempts = config.retry_count.max(1);
    let mut attempt = 0;

    let pool = loop {
        attempt += 1;
        match options.clone().connect(&config.database_url).await {
            Ok(pool) => break pool,
            Err(e) if attempt < attempts => {
                tracing::warn!("Database not ready (attempt {}/{}): {}", attempt, attempts, e);
                tokio::time::sleep(RETRY_DELAY).await;
            }
            Err(e) => {
                return Err(e).with_context(|| {
                    format!("Failed to connect to database after {attempts} attempts")
                })
            }
        }
    };

    run_migrations(&pool).await?;
    tracing::info!("Database ready after {} attempt(s)", attempt);

    Ok(pool)
}

/// Applies the SQL migrations under `migrations/`.
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    // ---
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("Failed to run database migrations")
}
