//! Database connection management using sqlx

use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::info;

pub type DbPool = PgPool;

/// Initialize the database connection pool.
///
/// Every checkout is liveness-tested first, so a dropped connection is
/// replaced transparently before the next statement.
pub async fn init_pool(
    options: PgConnectOptions,
    max_connections: u32,
    acquire_timeout: Duration,
) -> Result<PgPool, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(acquire_timeout)
        .test_before_acquire(true)
        .connect_with(options)
        .await?;

    // Test the connection
    sqlx::query("SELECT 1").execute(&pool).await?;

    info!("Database connection established ({} max connections)", max_connections);
    Ok(pool)
}
