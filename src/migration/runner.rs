use super::store::MigrationStore;
use super::{Migration, MigrationRecord, MigrationSet};
use crate::error::MigrationError;
use serde::Serialize;
use std::collections::HashSet;

#[derive(Clone, Debug, Serialize)]
pub struct MigrationReport {
    pub database: String,
    /// Labels of migrations applied by this run, in order.
    pub applied: Vec<String>,
    pub skipped: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum MigrationState {
    UpToDate,
    Pending,
    Error,
}

#[derive(Clone, Debug, Serialize)]
pub struct MigrationStatus {
    pub database: String,
    pub executed: Vec<String>,
    pub pending: Vec<String>,
    pub status: MigrationState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl MigrationStatus {
    /// Status for a database whose history could not be read at all.
    pub fn failed(database: impl Into<String>, error: impl Into<String>) -> Self {
        MigrationStatus {
            database: database.into(),
            executed: Vec::new(),
            pending: Vec::new(),
            status: MigrationState::Error,
            error: Some(error.into()),
        }
    }
}

pub struct MigrationRunner {
    set: MigrationSet,
}

impl MigrationRunner {
    pub fn new(set: MigrationSet) -> Self {
        MigrationRunner { set }
    }

    /// Pending migrations in order. Every applied version must still exist in the set,
    /// and nothing pending may be older than the newest applied migration.
    pub fn plan(&self, applied: &[MigrationRecord]) -> Result<Vec<&Migration>, MigrationError> {
        let mut done = HashSet::with_capacity(applied.len());
        for record in applied {
            if self.set.get(record.version).is_none() {
                return Err(MigrationError::UnknownApplied { version: record.version });
            }
            done.insert(record.version);
        }
        let latest = applied.iter().map(|r| r.version).max();

        let mut pending = Vec::new();
        for migration in self.set.iter() {
            if done.contains(&migration.version) {
                continue;
            }
            if let Some(latest) = latest.filter(|&latest| migration.version < latest) {
                return Err(MigrationError::OutOfOrder {
                    version: migration.version,
                    latest,
                });
            }
            pending.push(migration);
        }
        Ok(pending)
    }

    /// Apply everything pending, stopping at the first failure. Safe to re-run.
    pub async fn run(&self, store: &dyn MigrationStore) -> Result<MigrationReport, MigrationError> {
        store.ensure_history().await?;
        let applied = store.applied().await?;
        let pending = self.plan(&applied)?;
        for record in &applied {
            tracing::debug!(database = store.database(), migration = %record.name, "already applied, skipping");
        }

        let mut report = MigrationReport {
            database: store.database().to_string(),
            applied: Vec::with_capacity(pending.len()),
            skipped: applied.len(),
        };
        for migration in pending {
            tracing::info!(database = store.database(), migration = %migration.label(), "applying migration");
            if let Err(e) = store.apply(migration).await {
                tracing::error!(
                    database = store.database(),
                    migration = %migration.label(),
                    transactional = migration.transactional,
                    error = %e,
                    "migration failed, resolve manually before retrying"
                );
                return Err(e);
            }
            report.applied.push(migration.label());
        }
        if report.applied.is_empty() {
            tracing::info!(database = store.database(), "schema up to date");
        }
        Ok(report)
    }

    /// Revert only the most recently applied migration. `None` when the history is empty.
    pub async fn rollback(&self, store: &dyn MigrationStore) -> Result<Option<MigrationRecord>, MigrationError> {
        store.ensure_history().await?;
        let applied = store.applied().await?;
        let Some(last) = applied.into_iter().max_by_key(|r| r.version) else {
            return Ok(None);
        };
        let migration = self
            .set
            .get(last.version)
            .ok_or(MigrationError::UnknownApplied { version: last.version })?;
        tracing::warn!(database = store.database(), migration = %migration.label(), "rolling back migration");
        store.revert(migration).await?;
        Ok(Some(last))
    }

    /// Executed and pending lists. Failures are reported in the status, not returned.
    pub async fn status(&self, store: &dyn MigrationStore) -> MigrationStatus {
        let applied = match store.ensure_history().await {
            Ok(()) => store.applied().await,
            Err(e) => Err(e),
        };
        let applied = match applied {
            Ok(applied) => applied,
            Err(e) => return MigrationStatus::failed(store.database(), e.to_string()),
        };
        let mut status = MigrationStatus {
            database: store.database().to_string(),
            executed: applied.iter().map(|r| format!("{}-{}", r.version, r.name)).collect(),
            pending: Vec::new(),
            status: MigrationState::Error,
            error: None,
        };
        match self.plan(&applied) {
            Ok(pending) => {
                status.pending = pending.iter().map(|m| m.label()).collect();
                status.status = if status.pending.is_empty() {
                    MigrationState::UpToDate
                } else {
                    MigrationState::Pending
                };
            }
            Err(e) => status.error = Some(e.to_string()),
        }
        status
    }
}
