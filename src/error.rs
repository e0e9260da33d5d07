//! Typed errors and HTTP mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use crate::tenant::TenantCode;
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid value for {var}: {reason}")]
    Invalid { var: &'static str, reason: String },
    #[error("tenant features: {0}")]
    Features(String),
}

#[derive(Error, Debug)]
pub enum MigrationError {
    #[error("migration versions must strictly increase: {version} follows {previous}")]
    InvalidOrder { previous: i64, version: i64 },
    #[error("history contains version {version} which is not a known migration")]
    UnknownApplied { version: i64 },
    #[error("pending migration {version} is older than the latest applied migration {latest}")]
    OutOfOrder { version: i64, latest: i64 },
    #[error("migration {name} failed: {reason}")]
    MigrationFailed { name: String, reason: String },
    #[error("migration history: {0}")]
    History(#[source] sqlx::Error),
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Migration(#[from] MigrationError),
    #[error("tenant not found: {0}")]
    TenantNotFound(String),
    #[error("no tenant supplied with the request")]
    MissingTenant,
    #[error("admin token missing or wrong")]
    AdminUnauthorized,
    #[error("database for tenant {tenant} is unavailable: {reason}")]
    TenantDatabaseUnavailable { tenant: String, reason: String },
    #[error("timed out: {0}")]
    Timeout(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("database: {0}")]
    Db(#[from] sqlx::Error),
    #[error("bad request: {0}")]
    BadRequest(String),
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl AppError {
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "config_error"),
            AppError::Migration(MigrationError::MigrationFailed { .. }) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "migration_failed")
            }
            AppError::Migration(MigrationError::History(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "database_error")
            }
            AppError::Migration(_) => (StatusCode::CONFLICT, "migration_conflict"),
            AppError::TenantNotFound(_) => (StatusCode::FORBIDDEN, "tenant_not_found"),
            AppError::MissingTenant => (StatusCode::UNAUTHORIZED, "missing_tenant"),
            AppError::AdminUnauthorized => (StatusCode::UNAUTHORIZED, "admin_unauthorized"),
            AppError::TenantDatabaseUnavailable { .. } => {
                (StatusCode::SERVICE_UNAVAILABLE, "tenant_database_unavailable")
            }
            AppError::Timeout(_) => (StatusCode::GATEWAY_TIMEOUT, "timeout"),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            AppError::Db(e) => {
                if let sqlx::Error::RowNotFound = e {
                    (StatusCode::NOT_FOUND, "not_found")
                } else {
                    (StatusCode::INTERNAL_SERVER_ERROR, "database_error")
                }
            }
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
        }
    }
}

/// The database could not be reached or the session dropped, as opposed to a failing statement.
pub fn is_connection_loss(e: &sqlx::Error) -> bool {
    match e {
        sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed
        | sqlx::Error::Io(_)
        | sqlx::Error::Tls(_) => true,
        // 08xxx connection exception, 57P0x server shutdown, 3D000 database dropped
        sqlx::Error::Database(db) => db
            .code()
            .is_some_and(|c| c.starts_with("08") || matches!(&*c, "57P01" | "57P02" | "57P03" | "3D000")),
        _ => false,
    }
}

impl AppError {
    /// Errors raised on a tenant's pool: connection loss becomes `TenantDatabaseUnavailable`.
    pub fn on_tenant(self, tenant: &TenantCode) -> AppError {
        match self {
            AppError::Db(e) if is_connection_loss(&e) => AppError::TenantDatabaseUnavailable {
                tenant: tenant.to_string(),
                reason: e.to_string(),
            },
            other => other,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        if status.is_server_error() {
            tracing::error!(code, error = %self, "request failed");
        }
        let details = match &self {
            AppError::TenantNotFound(tenant) | AppError::TenantDatabaseUnavailable { tenant, .. } => {
                Some(serde_json::json!({ "tenant": tenant }))
            }
            _ => None,
        };
        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message: self.to_string(),
                details,
            },
        };
        (status, Json(body)).into_response()
    }
}
