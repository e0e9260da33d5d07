//! Shared application state for all routes.

use crate::config::Settings;
use crate::connection::TenantResolver;
use crate::service::MigrationService;
use sqlx::PgPool;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    /// Shared (auth) database: tenant registry and its migration history.
    pub shared_pool: PgPool,
    pub resolver: Arc<TenantResolver>,
    pub settings: Arc<Settings>,
}

impl AppState {
    pub fn migrations(&self) -> MigrationService {
        MigrationService::new(
            self.shared_pool.clone(),
            self.settings.database.shared_database.clone(),
            Arc::clone(&self.resolver),
        )
    }
}
