//! Per-tenant connection handling: cache, factory and resolver.

pub mod cache;
pub mod factory;
pub mod handle;
pub mod resolver;

pub use cache::ConnectionCache;
pub use factory::{ConnectionFactory, PgConnectionFactory};
pub use handle::{ConnectionStats, TenantConnection};
pub use resolver::TenantResolver;

#[cfg(test)]
pub(crate) mod testing {
    use super::ConnectionFactory;
    use crate::tenant::{InMemoryTenantRegistry, Tenant, TenantRegistry};
    use async_trait::async_trait;
    use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
    use sqlx::PgPool;
    use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    /// Pool that never opens a socket until a query runs; queries fail fast (nothing listens on port 1).
    pub fn lazy_pool(database: &str) -> PgPool {
        PgPoolOptions::new()
            .max_connections(1)
            .acquire_timeout(Duration::from_millis(500))
            .connect_lazy_with(PgConnectOptions::new().host("127.0.0.1").port(1).database(database))
    }

    pub fn registry_with(tenants: &[(&str, &str)]) -> Arc<dyn TenantRegistry> {
        Arc::new(InMemoryTenantRegistry::new(tenants.iter().map(|(code, db)| {
            Tenant::new(code.parse().unwrap(), code.to_string(), db.to_string())
        })))
    }

    /// Counts connect calls; can be switched to fail or made slow.
    #[derive(Default)]
    pub struct CountingFactory {
        pub calls: AtomicU64,
        pub fail: AtomicBool,
        delay: Duration,
    }

    impl CountingFactory {
        pub fn with_delay(delay: Duration) -> Self {
            CountingFactory {
                delay,
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl ConnectionFactory for CountingFactory {
        async fn connect(&self, tenant: &Tenant) -> Result<PgPool, sqlx::Error> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if self.fail.load(Ordering::SeqCst) {
                return Err(sqlx::Error::PoolTimedOut);
            }
            Ok(lazy_pool(&tenant.database_name))
        }
    }
}
