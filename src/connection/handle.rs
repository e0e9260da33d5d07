use crate::tenant::TenantCode;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;

/// Live, initialized pool for one tenant database. Owned by the connection cache;
/// request handlers borrow it through an `Arc` and never close it.
#[derive(Debug)]
pub struct TenantConnection {
    tenant: TenantCode,
    database: String,
    initialized_at: DateTime<Utc>,
    generation: u64,
    pool: PgPool,
}

impl TenantConnection {
    pub fn new(tenant: TenantCode, database: String, generation: u64, pool: PgPool) -> Self {
        TenantConnection {
            tenant,
            database,
            initialized_at: Utc::now(),
            generation,
            pool,
        }
    }

    pub fn tenant(&self) -> &TenantCode {
        &self.tenant
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn initialized_at(&self) -> DateTime<Utc> {
        self.initialized_at
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn stats(&self) -> ConnectionStats {
        ConnectionStats {
            tenant: self.tenant.to_string(),
            database: self.database.clone(),
            initialized_at: self.initialized_at,
            generation: self.generation,
            pool_size: self.pool.size(),
            idle: self.pool.num_idle(),
            closed: self.pool.is_closed(),
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct ConnectionStats {
    pub tenant: String,
    pub database: String,
    pub initialized_at: DateTime<Utc>,
    pub generation: u64,
    pub pool_size: u32,
    pub idle: usize,
    pub closed: bool,
}
