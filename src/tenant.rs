//! Tenant (société) registry: lookup of tenant metadata in the shared database.

use crate::config::TenantFeatures;
use crate::error::AppError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Serialize;
use sqlx::PgPool;
use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;
use uuid::Uuid;

static TENANT_CODE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Z0-9_]{1,32}$").expect("tenant code pattern compiles")
});

/// Registry table in the shared database.
pub const TENANTS_TABLE: &str = "societes";

/// Validated tenant code: uppercase ASCII letters, digits and underscore, at most 32 chars.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct TenantCode(String);

impl TenantCode {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::str::FromStr for TenantCode {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = s.trim().to_uppercase();
        if !TENANT_CODE_RE.is_match(&code) {
            return Err(AppError::BadRequest(format!(
                "invalid tenant code: {:?} (expected A-Z, 0-9 or _, max 32 chars)",
                s
            )));
        }
        Ok(TenantCode(code))
    }
}

impl fmt::Display for TenantCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One customer organization, isolated in its own physical database.
#[derive(Clone, Debug, Serialize)]
pub struct Tenant {
    pub id: Uuid,
    pub code: TenantCode,
    pub name: String,
    /// Physical database name; unique across tenants.
    pub database_name: String,
    pub features: TenantFeatures,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_by: Option<Uuid>,
    pub updated_by: Option<Uuid>,
    pub deleted_by: Option<Uuid>,
}

impl Tenant {
    /// Fresh active tenant record, mainly for fixtures and provisioning tools.
    pub fn new(code: TenantCode, name: impl Into<String>, database_name: impl Into<String>) -> Self {
        let now = Utc::now();
        Tenant {
            id: Uuid::new_v4(),
            code,
            name: name.into(),
            database_name: database_name.into(),
            features: TenantFeatures::default(),
            created_at: now,
            updated_at: now,
            deleted_at: None,
            created_by: None,
            updated_by: None,
            deleted_by: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.deleted_at.is_none()
    }
}

/// Read-only access to tenant metadata. Writes go through provisioning tooling.
#[async_trait]
pub trait TenantRegistry: Send + Sync {
    /// Unknown and soft-deleted codes both yield `AppError::TenantNotFound`.
    async fn find_by_code(&self, code: &TenantCode) -> Result<Tenant, AppError>;

    /// All non-deleted tenants ordered by code. Not for the request hot path.
    async fn list_active(&self) -> Result<Vec<Tenant>, AppError>;
}

/// Registry held in memory, keyed by code.
#[derive(Clone, Default)]
pub struct InMemoryTenantRegistry {
    by_code: HashMap<TenantCode, Tenant>,
}

impl InMemoryTenantRegistry {
    pub fn new(tenants: impl IntoIterator<Item = Tenant>) -> Self {
        InMemoryTenantRegistry {
            by_code: tenants.into_iter().map(|t| (t.code.clone(), t)).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.by_code.is_empty()
    }
}

#[async_trait]
impl TenantRegistry for InMemoryTenantRegistry {
    async fn find_by_code(&self, code: &TenantCode) -> Result<Tenant, AppError> {
        self.by_code
            .get(code)
            .filter(|t| t.is_active())
            .cloned()
            .ok_or_else(|| AppError::TenantNotFound(code.to_string()))
    }

    async fn list_active(&self) -> Result<Vec<Tenant>, AppError> {
        let mut tenants: Vec<Tenant> = self.by_code.values().filter(|t| t.is_active()).cloned().collect();
        tenants.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(tenants)
    }
}

#[derive(sqlx::FromRow)]
struct SocieteRow {
    id: Uuid,
    code: String,
    nom: String,
    database_name: String,
    configuration: Option<serde_json::Value>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
    created_by: Option<Uuid>,
    updated_by: Option<Uuid>,
    deleted_by: Option<Uuid>,
}

impl TryFrom<SocieteRow> for Tenant {
    type Error = AppError;

    fn try_from(row: SocieteRow) -> Result<Self, Self::Error> {
        let features = TenantFeatures::from_json(row.configuration.as_ref().unwrap_or(&serde_json::Value::Null))?;
        Ok(Tenant {
            id: row.id,
            code: row.code.parse()?,
            name: row.nom,
            database_name: row.database_name,
            features,
            created_at: row.created_at,
            updated_at: row.updated_at,
            deleted_at: row.deleted_at,
            created_by: row.created_by,
            updated_by: row.updated_by,
            deleted_by: row.deleted_by,
        })
    }
}

const SOCIETE_COLUMNS: &str = "id, code, nom, database_name, configuration, created_at, updated_at, \
     deleted_at, created_by, updated_by, deleted_by";

/// Registry backed by the `societes` table of the shared database.
#[derive(Clone)]
pub struct PgTenantRegistry {
    pool: PgPool,
}

impl PgTenantRegistry {
    pub fn new(pool: PgPool) -> Self {
        PgTenantRegistry { pool }
    }
}

#[async_trait]
impl TenantRegistry for PgTenantRegistry {
    async fn find_by_code(&self, code: &TenantCode) -> Result<Tenant, AppError> {
        let sql = format!(
            "SELECT {} FROM {} WHERE code = $1 AND deleted_at IS NULL",
            SOCIETE_COLUMNS, TENANTS_TABLE
        );
        let row: Option<SocieteRow> = sqlx::query_as(&sql)
            .bind(code.as_str())
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => row.try_into(),
            None => Err(AppError::TenantNotFound(code.to_string())),
        }
    }

    async fn list_active(&self) -> Result<Vec<Tenant>, AppError> {
        let sql = format!(
            "SELECT {} FROM {} WHERE deleted_at IS NULL ORDER BY code",
            SOCIETE_COLUMNS, TENANTS_TABLE
        );
        let rows: Vec<SocieteRow> = sqlx::query_as(&sql).fetch_all(&self.pool).await?;
        Ok(valid_tenants(rows))
    }
}

/// A row with a bad code or configuration is logged and left out instead of failing the listing.
fn valid_tenants(rows: Vec<SocieteRow>) -> Vec<Tenant> {
    let mut tenants = Vec::with_capacity(rows.len());
    for row in rows {
        let code = row.code.clone();
        match Tenant::try_from(row) {
            Ok(t) => tenants.push(t),
            Err(e) => tracing::warn!(tenant = %code, error = %e, "skipping invalid tenant row"),
        }
    }
    tenants
}
