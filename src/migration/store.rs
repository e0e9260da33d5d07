//! Durable migration history for one database.

use super::{Migration, MigrationRecord};
use crate::error::MigrationError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Executor, PgConnection, PgPool};

pub const HISTORY_TABLE: &str = "_migration_history";

/// One database's schema plus its history table.
#[async_trait]
pub trait MigrationStore: Send + Sync {
    /// Name shown in reports and logs.
    fn database(&self) -> &str;

    async fn ensure_history(&self) -> Result<(), MigrationError>;

    /// Applied migrations ordered by version.
    async fn applied(&self) -> Result<Vec<MigrationRecord>, MigrationError>;

    /// Run `up` and record it. A failing `up` is never recorded.
    async fn apply(&self, migration: &Migration) -> Result<MigrationRecord, MigrationError>;

    /// Run `down` and delete the record.
    async fn revert(&self, migration: &Migration) -> Result<(), MigrationError>;
}

pub struct PgMigrationStore {
    pool: PgPool,
    database: String,
}

impl PgMigrationStore {
    pub fn new(pool: PgPool, database: impl Into<String>) -> Self {
        PgMigrationStore {
            pool,
            database: database.into(),
        }
    }
}

fn failed(migration: &Migration, e: sqlx::Error) -> MigrationError {
    MigrationError::MigrationFailed {
        name: migration.label(),
        reason: e.to_string(),
    }
}

/// Multi-statement script through the simple query protocol.
async fn run_script(conn: &mut PgConnection, sql: &str) -> Result<(), sqlx::Error> {
    conn.execute(sqlx::raw_sql(sql)).await?;
    Ok(())
}

async fn record(conn: &mut PgConnection, migration: &Migration) -> Result<DateTime<Utc>, sqlx::Error> {
    let sql = format!(
        "INSERT INTO {} (version, name) VALUES ($1, $2) RETURNING applied_at",
        HISTORY_TABLE
    );
    let (applied_at,): (DateTime<Utc>,) = sqlx::query_as(&sql)
        .bind(migration.version)
        .bind(migration.name)
        .fetch_one(conn)
        .await?;
    Ok(applied_at)
}

async fn forget(conn: &mut PgConnection, version: i64) -> Result<(), sqlx::Error> {
    let sql = format!("DELETE FROM {} WHERE version = $1", HISTORY_TABLE);
    sqlx::query(&sql).bind(version).execute(conn).await?;
    Ok(())
}

/// `up` then the history row, in one transaction when the migration allows it.
async fn apply_on(pool: &PgPool, migration: &Migration) -> Result<DateTime<Utc>, MigrationError> {
    if migration.transactional {
        let mut tx = pool.begin().await.map_err(MigrationError::History)?;
        run_script(&mut tx, migration.up).await.map_err(|e| failed(migration, e))?;
        let applied_at = record(&mut tx, migration).await.map_err(MigrationError::History)?;
        tx.commit().await.map_err(MigrationError::History)?;
        Ok(applied_at)
    } else {
        let mut conn = pool.acquire().await.map_err(MigrationError::History)?;
        run_script(&mut conn, migration.up).await.map_err(|e| failed(migration, e))?;
        record(&mut conn, migration).await.map_err(MigrationError::History)
    }
}

async fn revert_on(pool: &PgPool, migration: &Migration) -> Result<(), MigrationError> {
    if migration.transactional {
        let mut tx = pool.begin().await.map_err(MigrationError::History)?;
        run_script(&mut tx, migration.down).await.map_err(|e| failed(migration, e))?;
        forget(&mut tx, migration.version).await.map_err(MigrationError::History)?;
        tx.commit().await.map_err(MigrationError::History)
    } else {
        let mut conn = pool.acquire().await.map_err(MigrationError::History)?;
        run_script(&mut conn, migration.down).await.map_err(|e| failed(migration, e))?;
        forget(&mut conn, migration.version).await.map_err(MigrationError::History)
    }
}

#[async_trait]
impl MigrationStore for PgMigrationStore {
    fn database(&self) -> &str {
        &self.database
    }

    async fn ensure_history(&self) -> Result<(), MigrationError> {
        let ddl = format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                version BIGINT PRIMARY KEY,
                name TEXT NOT NULL,
                applied_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
            HISTORY_TABLE
        );
        sqlx::query(&ddl)
            .execute(&self.pool)
            .await
            .map_err(MigrationError::History)?;
        Ok(())
    }

    async fn applied(&self) -> Result<Vec<MigrationRecord>, MigrationError> {
        let sql = format!("SELECT version, name, applied_at FROM {} ORDER BY version", HISTORY_TABLE);
        let rows: Vec<(i64, String, DateTime<Utc>)> = sqlx::query_as(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(MigrationError::History)?;
        Ok(rows
            .into_iter()
            .map(|(version, name, applied_at)| MigrationRecord {
                version,
                name,
                applied_at,
            })
            .collect())
    }

    async fn apply(&self, migration: &Migration) -> Result<MigrationRecord, MigrationError> {
        let applied_at = apply_on(&self.pool, migration).await?;
        Ok(MigrationRecord {
            version: migration.version,
            name: migration.name.to_string(),
            applied_at,
        })
    }

    async fn revert(&self, migration: &Migration) -> Result<(), MigrationError> {
        revert_on(&self.pool, migration).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
    use std::sync::Arc;
    use std::time::Duration;

    fn unreachable_store() -> PgMigrationStore {
        let pool = PgPoolOptions::new()
            .max_connections(1)
            .acquire_timeout(Duration::from_millis(300))
            .connect_lazy_with(PgConnectOptions::new().host("127.0.0.1").port(1).database("erp_topsteel_acme"));
        PgMigrationStore::new(pool, "erp_topsteel_acme")
    }

    const CREATE_NOTES: Migration = Migration::new(1, "CreateNotes", "CREATE TABLE notes (id INT)", "DROP TABLE notes");

    #[tokio::test]
    async fn store_runs_on_spawned_tasks_and_reports_history_errors() {
        let store: Arc<dyn MigrationStore> = Arc::new(unreachable_store());
        assert_eq!(store.database(), "erp_topsteel_acme");

        let task = tokio::spawn({
            let store = Arc::clone(&store);
            async move {
                (
                    store.apply(&CREATE_NOTES).await,
                    store.apply(&CREATE_NOTES.non_transactional()).await,
                    store.revert(&CREATE_NOTES).await,
                )
            }
        });
        let (applied, applied_outside_tx, reverted) = task.await.unwrap();
        assert!(matches!(applied, Err(MigrationError::History(_))));
        assert!(matches!(applied_outside_tx, Err(MigrationError::History(_))));
        assert!(matches!(reverted, Err(MigrationError::History(_))));
    }
}
