//! Tenant code → initialized connection, through the cache.

use super::cache::ConnectionCache;
use super::factory::ConnectionFactory;
use super::handle::{ConnectionStats, TenantConnection};
use crate::error::AppError;
use crate::tenant::{TenantCode, TenantRegistry};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub struct TenantResolver {
    registry: Arc<dyn TenantRegistry>,
    factory: Arc<dyn ConnectionFactory>,
    cache: Arc<ConnectionCache>,
    connect_timeout: Duration,
    generation: AtomicU64,
}

impl TenantResolver {
    pub fn new(
        registry: Arc<dyn TenantRegistry>,
        factory: Arc<dyn ConnectionFactory>,
        cache: Arc<ConnectionCache>,
        connect_timeout: Duration,
    ) -> Self {
        TenantResolver {
            registry,
            factory,
            cache,
            connect_timeout,
            generation: AtomicU64::new(0),
        }
    }

    pub fn registry(&self) -> &Arc<dyn TenantRegistry> {
        &self.registry
    }

    /// Cached handle, or look the tenant up and open its pool. Errors are never cached
    /// and never retried here: `TenantNotFound` from the registry passes through as is,
    /// connect failures and timeouts become `TenantDatabaseUnavailable`.
    pub async fn resolve(&self, code: &TenantCode) -> Result<Arc<TenantConnection>, AppError> {
        if let Some(conn) = self.cache.get(code) {
            return Ok(conn);
        }
        self.cache
            .get_or_create(code, || async {
                let tenant = self.registry.find_by_code(code).await?;
                let unavailable = |reason: String| AppError::TenantDatabaseUnavailable {
                    tenant: code.to_string(),
                    reason,
                };
                let pool = match tokio::time::timeout(self.connect_timeout, self.factory.connect(&tenant)).await {
                    Ok(Ok(pool)) => pool,
                    Ok(Err(e)) => {
                        tracing::warn!(tenant = %code, database = %tenant.database_name, error = %e, "tenant database connect failed");
                        return Err(unavailable(e.to_string()));
                    }
                    Err(_) => {
                        tracing::warn!(tenant = %code, database = %tenant.database_name, "tenant database connect timed out");
                        return Err(unavailable(format!("connect timed out after {:?}", self.connect_timeout)));
                    }
                };
                let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
                tracing::info!(tenant = %code, database = %tenant.database_name, generation, "tenant connection initialized");
                Ok(TenantConnection::new(tenant.code, tenant.database_name, generation, pool))
            })
            .await
    }

    /// Force the next `resolve` to reinitialize (credentials rotated, database moved).
    /// Returns whether an initialized handle was dropped from the cache.
    pub fn invalidate(&self, code: &TenantCode) -> bool {
        let removed = self.cache.invalidate(code);
        if let Some(conn) = &removed {
            tracing::info!(tenant = %code, generation = conn.generation(), "tenant connection invalidated");
        }
        removed.is_some()
    }

    pub fn connections(&self) -> Vec<ConnectionStats> {
        self.cache.snapshot().iter().map(|c| c.stats()).collect()
    }

    /// Close every cached pool. Only for process shutdown.
    pub async fn shutdown(&self) {
        for conn in self.cache.drain() {
            conn.pool().close().await;
            tracing::debug!(tenant = %conn.tenant(), "tenant pool closed");
        }
    }
}
