//! Ordered schema migrations, tracked per database in `_migration_history`.
//!
//! The shared database and every tenant database keep independent histories.
//! A migration flagged `transactional` runs together with its history insert in
//! one transaction; the others may leave a partial change behind on failure and
//! need an operator before retrying.

pub mod catalog;
pub mod runner;
pub mod store;

pub use catalog::{shared_migrations, tenant_migrations};
pub use runner::{MigrationReport, MigrationRunner, MigrationState, MigrationStatus};
pub use store::{MigrationStore, PgMigrationStore, HISTORY_TABLE};

use crate::error::MigrationError;
use crate::tenant::TenantCode;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

#[derive(Clone, Debug)]
pub struct Migration {
    /// Timestamp-style identifier; defines the total order.
    pub version: i64,
    pub name: &'static str,
    pub up: &'static str,
    pub down: &'static str,
    pub transactional: bool,
}

impl Migration {
    pub const fn new(version: i64, name: &'static str, up: &'static str, down: &'static str) -> Self {
        Migration {
            version,
            name,
            up,
            down,
            transactional: true,
        }
    }

    /// For statements PostgreSQL refuses inside a transaction (`CREATE INDEX CONCURRENTLY`).
    pub fn non_transactional(mut self) -> Self {
        self.transactional = false;
        self
    }

    pub fn label(&self) -> String {
        format!("{}-{}", self.version, self.name)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MigrationRecord {
    pub version: i64,
    pub name: String,
    pub applied_at: DateTime<Utc>,
}

/// Migrations with strictly increasing versions.
#[derive(Clone, Debug)]
pub struct MigrationSet {
    migrations: Vec<Migration>,
}

impl MigrationSet {
    pub fn new(migrations: Vec<Migration>) -> Result<Self, MigrationError> {
        for pair in migrations.windows(2) {
            if pair[1].version <= pair[0].version {
                return Err(MigrationError::InvalidOrder {
                    previous: pair[0].version,
                    version: pair[1].version,
                });
            }
        }
        Ok(MigrationSet { migrations })
    }

    pub fn iter(&self) -> impl Iterator<Item = &Migration> {
        self.migrations.iter()
    }

    pub fn get(&self, version: i64) -> Option<&Migration> {
        self.migrations
            .binary_search_by_key(&version, |m| m.version)
            .ok()
            .map(|i| &self.migrations[i])
    }

    pub fn len(&self) -> usize {
        self.migrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.migrations.is_empty()
    }
}

/// Which history a migration run targets.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MigrationTarget {
    Shared,
    Tenant(TenantCode),
}

impl fmt::Display for MigrationTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MigrationTarget::Shared => f.write_str("shared"),
            MigrationTarget::Tenant(code) => write!(f, "tenant:{}", code),
        }
    }
}

impl MigrationTarget {
    pub fn migrations(&self) -> Result<MigrationSet, MigrationError> {
        match self {
            MigrationTarget::Shared => shared_migrations(),
            MigrationTarget::Tenant(_) => tenant_migrations(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_rejects_non_increasing_versions() {
        let err = MigrationSet::new(vec![
            Migration::new(2, "B", "", ""),
            Migration::new(2, "C", "", ""),
        ])
        .unwrap_err();
        assert!(matches!(err, MigrationError::InvalidOrder { previous: 2, version: 2 }));
    }

    #[test]
    fn set_lookup_by_version() {
        let set = MigrationSet::new(vec![
            Migration::new(1, "A", "", ""),
            Migration::new(5, "B", "", "").non_transactional(),
        ])
        .unwrap();
        assert_eq!(set.get(5).map(|m| m.name), Some("B"));
        assert!(!set.get(5).unwrap().transactional);
        assert!(set.get(3).is_none());
        assert_eq!(set.get(1).unwrap().label(), "1-A");
    }

    #[test]
    fn target_display() {
        assert_eq!(MigrationTarget::Shared.to_string(), "shared");
        assert_eq!(
            MigrationTarget::Tenant("TOPSTEEL".parse().unwrap()).to_string(),
            "tenant:TOPSTEEL"
        );
    }
}
