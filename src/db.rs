use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use crate::utils::{retry_with_backoff, RetryConfig};

// ============================================================================
// Postgres pool construction and embedded migrations
// ============================================================================

/// Connect to Postgres with startup retries: the database container may
/// still be coming up when a service starts.
pub async fn connect(conn_string: &str) -> Result<PgPool> {
    let pool = retry_with_backoff(RetryConfig::startup(), |attempt| async move {
        tracing::debug!(attempt, "connecting to postgres");
        PgPoolOptions::new()
            .max_connections(10)
            .connect(conn_string)
            .await
    })
    .await
    .context("failed to connect to postgres")?;

    tracing::info!("connected to postgres");
    Ok(pool)
}

pub async fn apply_migrations(pool: &PgPool, migrations: &[&str]) -> Result<()> {
    for migration in migrations {
        sqlx::query(migration)
            .execute(pool)
            .await
            .with_context(|| format!("failed to apply migration: {migration}"))?;
    }
    Ok(())
}

pub const ORDER_MIGRATIONS: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS orders (
        id UUID PRIMARY KEY,
        user_id UUID NOT NULL,
        description TEXT NOT NULL,
        amount BIGINT NOT NULL,
        status TEXT NOT NULL DEFAULT 'new'
    )"#,
    r#"CREATE TABLE IF NOT EXISTS outbox (
        id BIGSERIAL PRIMARY KEY,
        message JSONB NOT NULL
    )"#,
];

pub const PAYMENT_MIGRATIONS: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS accounts (
        user_id UUID PRIMARY KEY,
        amount BIGINT NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS settlements (
        order_id UUID PRIMARY KEY
    )"#,
    r#"CREATE TABLE IF NOT EXISTS outbox (
        id BIGSERIAL PRIMARY KEY,
        message JSONB NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS inbox (
        id BIGSERIAL PRIMARY KEY,
        message JSONB NOT NULL
    )"#,
];
