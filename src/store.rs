//! Database-level helpers: shared pool, tenant database creation, connectivity checks.

use crate::config::DatabaseSettings;
use crate::error::AppError;
use serde::Serialize;
use sqlx::postgres::PgPoolOptions;
use sqlx::{ConnectOptions, PgPool};
use std::time::Duration;

/// Pool on the shared (auth) database.
pub async fn connect_shared(settings: &DatabaseSettings) -> Result<PgPool, AppError> {
    let pool = PgPoolOptions::new()
        .max_connections(settings.pool_max)
        .acquire_timeout(settings.connect_timeout)
        .connect_with(settings.shared_connect_options())
        .await?;
    tracing::info!(database = %settings.shared_database, "connected to shared database");
    Ok(pool)
}

/// Create `database` if it does not exist, through the `postgres` maintenance database.
/// Returns whether it was created.
pub async fn ensure_database_exists(settings: &DatabaseSettings, database: &str) -> Result<bool, AppError> {
    if database.is_empty() || database == "postgres" {
        return Ok(false);
    }
    let mut conn = settings.connect_options("postgres").connect().await?;
    let exists: (bool,) = sqlx::query_as("SELECT EXISTS(SELECT 1 FROM pg_database WHERE datname = $1)")
        .bind(database)
        .fetch_one(&mut conn)
        .await?;
    if exists.0 {
        return Ok(false);
    }
    sqlx::query(&format!("CREATE DATABASE {}", quote_ident(database)))
        .execute(&mut conn)
        .await?;
    tracing::info!(database, "database created");
    Ok(true)
}

pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

#[derive(Debug, Serialize)]
pub struct DatabaseInfo {
    pub database: String,
    pub version: String,
}

/// `current_database()` and server version, bounded by `timeout`. The query is not
/// cancelled server-side when the timeout fires.
pub async fn database_info(pool: &PgPool, timeout: Duration) -> Result<DatabaseInfo, AppError> {
    let query = sqlx::query_as::<_, (String, String)>("SELECT current_database(), version()").fetch_one(pool);
    let (database, version) = tokio::time::timeout(timeout, query)
        .await
        .map_err(|_| AppError::Timeout(format!("query exceeded {:?}", timeout)))??;
    Ok(DatabaseInfo { database, version })
}
