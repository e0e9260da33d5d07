//! Administrative endpoints: tenants, cached connections, migrations.

use crate::error::AppError;
use crate::migration::MigrationTarget;
use crate::response::{list, ok};
use crate::state::AppState;
use crate::store::database_info;
use crate::tenant::TenantCode;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Serialize;
use std::time::Instant;

fn parse_code(raw: &str) -> Result<TenantCode, AppError> {
    raw.parse()
}

/// GET /admin/tenants
pub async fn list_tenants(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let tenants = state.resolver.registry().list_active().await?;
    Ok(list(tenants))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantHealth {
    pub tenant: String,
    pub healthy: bool,
    pub latency_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// GET /admin/tenants/:code/health: round trip to the tenant database. An unreachable
/// database is reported as unhealthy (200); an unknown tenant is still an error.
pub async fn tenant_health(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let code = parse_code(&code)?;
    let started = Instant::now();
    let probe = match state.resolver.resolve(&code).await {
        Ok(conn) => database_info(conn.pool(), state.settings.database.query_timeout)
            .await
            .map_err(|e| e.on_tenant(&code)),
        Err(e) => Err(e),
    };
    let latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
    let health = match probe {
        Ok(info) => TenantHealth {
            tenant: code.to_string(),
            healthy: true,
            latency_ms,
            database: Some(info.database),
            version: Some(info.version),
            error: None,
        },
        Err(e @ AppError::TenantNotFound(_)) => return Err(e),
        Err(e) => {
            tracing::warn!(tenant = %code, error = %e, "tenant database health check failed");
            TenantHealth {
                tenant: code.to_string(),
                healthy: false,
                latency_ms,
                database: None,
                version: None,
                error: Some(e.to_string()),
            }
        }
    };
    Ok(ok(health))
}

/// GET /admin/connections
pub async fn list_connections(State(state): State<AppState>) -> impl IntoResponse {
    list(state.resolver.connections())
}

/// DELETE /admin/connections/:code: the next request for the tenant reconnects.
pub async fn invalidate_connection(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<StatusCode, AppError> {
    let code = parse_code(&code)?;
    if state.resolver.invalidate(&code) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(format!("no cached connection for tenant {}", code)))
    }
}

/// GET /admin/migrations: shared database plus every active tenant.
pub async fn all_migration_status(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let statuses = state.migrations().status_all().await?;
    Ok(list(statuses))
}

/// POST /admin/migrations/tenants: every active tenant, stopping at the first failure.
pub async fn run_all_tenant_migrations(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let reports = state.migrations().run_all_tenants().await?;
    Ok(list(reports))
}

/// GET /admin/migrations/shared
pub async fn shared_migration_status(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let status = state.migrations().status(&MigrationTarget::Shared).await?;
    Ok(ok(status))
}

/// POST /admin/migrations/shared
pub async fn run_shared_migrations(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let report = state.migrations().run(&MigrationTarget::Shared).await?;
    Ok(ok(report))
}

/// GET /admin/migrations/tenants/:code
pub async fn tenant_migration_status(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let target = MigrationTarget::Tenant(parse_code(&code)?);
    let status = state.migrations().status(&target).await?;
    Ok(ok(status))
}

/// POST /admin/migrations/tenants/:code
pub async fn run_tenant_migrations(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let target = MigrationTarget::Tenant(parse_code(&code)?);
    let report = state.migrations().run(&target).await?;
    Ok(ok(report))
}
