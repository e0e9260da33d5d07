//! TopSteel tenancy: per-tenant PostgreSQL routing and schema migrations.
//!
//! A request carries a tenant code; the resolver maps it to a cached pool on that
//! tenant's own database and the handler receives it through [`RequestContext`].

pub mod config;
pub mod connection;
pub mod context;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod migration;
pub mod response;
pub mod routes;
pub mod service;
pub mod state;
pub mod store;
pub mod telemetry;
pub mod tenant;

pub use config::{DatabaseSettings, Settings, TenantFeatures, TenantSource};
pub use connection::{ConnectionCache, ConnectionFactory, PgConnectionFactory, TenantConnection, TenantResolver};
pub use context::RequestContext;
pub use error::{AppError, ConfigError, MigrationError};
pub use migration::{MigrationRunner, MigrationTarget};
pub use routes::app_router;
pub use service::MigrationService;
pub use state::AppState;
pub use store::{connect_shared, ensure_database_exists};
pub use tenant::{InMemoryTenantRegistry, PgTenantRegistry, Tenant, TenantCode, TenantRegistry};
