//! # Dedup Database
//!
//! Connection pooling and schema for the PostgreSQL dedup record table.

use anyhow::{Context, Result};
use dedup_config::DbConfig;
use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};

/// Database connection pool type
pub type DbPool = Pool<Postgres>;

/// Create a PostgreSQL connection pool
pub async fn create_pool(db_config: &DbConfig) -> Result<DbPool> {
    let pool = PgPoolOptions::new()
        .max_connections(db_config.max_connections)
        .acquire_timeout(std::time::Duration::from_secs(
            db_config.acquire_timeout_secs,
        ))
        .idle_timeout(Some(std::time::Duration::from_secs(
            db_config.idle_timeout_secs,
        )))
        .test_before_acquire(true) // Test connections before returning from pool
        .connect(&db_config.url)
        .await
        .context("Failed to connect to PostgreSQL")?;

    Ok(pool)
}

/// Apply the message_dedup schema
pub async fn run_migrations(pool: &DbPool) -> Result<()> {
    tracing::info!("Applying dedup database migrations...");
    sqlx::migrate!()
        .run(pool)
        .await
        .context("Failed to apply dedup migrations")?;
    tracing::info!("Dedup database migrations applied successfully");
    Ok(())
}

/// Connect and make sure the schema exists
pub async fn connect(db_config: &DbConfig) -> Result<DbPool> {
    let pool = create_pool(db_config).await?;
    run_migrations(&pool).await?;
    Ok(pool)
}
