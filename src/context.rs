//! Per-request tenant binding, passed explicitly to every call that touches a tenant database.

use crate::connection::TenantConnection;
use crate::error::AppError;
use crate::tenant::TenantCode;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

/// Built once at the request boundary and never mutated; dropped with the request.
#[derive(Clone, Debug)]
pub struct RequestContext {
    request_id: Uuid,
    tenant: TenantCode,
    user_id: Option<String>,
    connection: Arc<TenantConnection>,
}

impl RequestContext {
    pub fn new(
        request_id: Uuid,
        tenant: TenantCode,
        user_id: Option<String>,
        connection: Arc<TenantConnection>,
    ) -> Self {
        RequestContext {
            request_id,
            tenant,
            user_id,
            connection,
        }
    }

    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    pub fn tenant(&self) -> &TenantCode {
        &self.tenant
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    pub fn connection(&self) -> &TenantConnection {
        &self.connection
    }

    /// Pool of the tenant database, borrowed for the life of the request.
    pub fn pool(&self) -> &PgPool {
        self.connection.pool()
    }

    /// Tag a failure from a query on this request's pool with the tenant.
    pub fn db_error(&self, e: impl Into<AppError>) -> AppError {
        e.into().on_tenant(&self.tenant)
    }
}
