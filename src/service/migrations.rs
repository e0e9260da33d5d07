//! Run, roll back and report migrations against the shared database or a tenant database.

use crate::connection::TenantResolver;
use crate::error::AppError;
use crate::migration::{
    MigrationRecord, MigrationReport, MigrationRunner, MigrationStatus, MigrationTarget, PgMigrationStore,
};
use sqlx::PgPool;
use std::sync::Arc;

#[derive(Clone)]
pub struct MigrationService {
    shared_pool: PgPool,
    shared_database: String,
    resolver: Arc<TenantResolver>,
}

impl MigrationService {
    pub fn new(shared_pool: PgPool, shared_database: impl Into<String>, resolver: Arc<TenantResolver>) -> Self {
        MigrationService {
            shared_pool,
            shared_database: shared_database.into(),
            resolver,
        }
    }

    /// Tenant stores reuse the cached tenant pool; the tenant must exist in the registry.
    async fn store_for(&self, target: &MigrationTarget) -> Result<PgMigrationStore, AppError> {
        match target {
            MigrationTarget::Shared => Ok(PgMigrationStore::new(
                self.shared_pool.clone(),
                self.shared_database.clone(),
            )),
            MigrationTarget::Tenant(code) => {
                let conn = self.resolver.resolve(code).await?;
                Ok(PgMigrationStore::new(conn.pool().clone(), conn.database()))
            }
        }
    }

    pub async fn run(&self, target: &MigrationTarget) -> Result<MigrationReport, AppError> {
        let store = self.store_for(target).await?;
        let runner = MigrationRunner::new(target.migrations()?);
        tracing::info!(migration_target = %target, "running migrations");
        Ok(runner.run(&store).await?)
    }

    pub async fn rollback(&self, target: &MigrationTarget) -> Result<Option<MigrationRecord>, AppError> {
        let store = self.store_for(target).await?;
        let runner = MigrationRunner::new(target.migrations()?);
        Ok(runner.rollback(&store).await?)
    }

    pub async fn status(&self, target: &MigrationTarget) -> Result<MigrationStatus, AppError> {
        let store = self.store_for(target).await?;
        let runner = MigrationRunner::new(target.migrations()?);
        Ok(runner.status(&store).await)
    }

    /// Shared database first, then every active tenant in code order. A database that
    /// cannot be reached is listed with an `error` status instead of failing the whole listing.
    pub async fn status_all(&self) -> Result<Vec<MigrationStatus>, AppError> {
        let mut targets = vec![(MigrationTarget::Shared, self.shared_database.clone())];
        for tenant in self.resolver.registry().list_active().await? {
            targets.push((MigrationTarget::Tenant(tenant.code), tenant.database_name));
        }
        let mut statuses = Vec::with_capacity(targets.len());
        for (target, database) in targets {
            let status = match self.status(&target).await {
                Ok(status) => status,
                Err(e) => {
                    tracing::warn!(migration_target = %target, error = %e, "migration status unavailable");
                    MigrationStatus::failed(database, e.to_string())
                }
            };
            statuses.push(status);
        }
        Ok(statuses)
    }

    /// Every active tenant in code order; stops at the first failing tenant.
    pub async fn run_all_tenants(&self) -> Result<Vec<MigrationReport>, AppError> {
        let tenants = self.resolver.registry().list_active().await?;
        let mut reports = Vec::with_capacity(tenants.len());
        for tenant in tenants {
            reports.push(self.run(&MigrationTarget::Tenant(tenant.code)).await?);
        }
        Ok(reports)
    }
}
