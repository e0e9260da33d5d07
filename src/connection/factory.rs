use crate::config::DatabaseSettings;
use crate::tenant::Tenant;
use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

/// Opens the physical pool for a tenant database.
#[async_trait]
pub trait ConnectionFactory: Send + Sync {
    async fn connect(&self, tenant: &Tenant) -> Result<PgPool, sqlx::Error>;
}

/// Connects with the process-wide host and credentials, overriding only the database name.
#[derive(Clone, Debug)]
pub struct PgConnectionFactory {
    settings: DatabaseSettings,
}

impl PgConnectionFactory {
    pub fn new(settings: DatabaseSettings) -> Self {
        PgConnectionFactory { settings }
    }
}

#[async_trait]
impl ConnectionFactory for PgConnectionFactory {
    async fn connect(&self, tenant: &Tenant) -> Result<PgPool, sqlx::Error> {
        tracing::debug!(tenant = %tenant.code, database = %tenant.database_name, "opening tenant pool");
        let pool = PgPoolOptions::new()
            .max_connections(self.settings.pool_max)
            .acquire_timeout(self.settings.connect_timeout)
            .connect_with(self.settings.connect_options(&tenant.database_name))
            .await?;
        sqlx::query("SELECT 1").execute(&pool).await?;
        Ok(pool)
    }
}
