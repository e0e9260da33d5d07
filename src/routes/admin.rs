//! Administrative routes. With `ADMIN_TOKEN` set every route requires it in
//! `X-Admin-Token`; without it they rely on the deployment's admin authentication.

use crate::error::AppError;
use crate::handlers::admin::{
    all_migration_status, invalidate_connection, list_connections, list_tenants, run_all_tenant_migrations,
    run_shared_migrations, run_tenant_migrations, shared_migration_status, tenant_health, tenant_migration_status,
};
use crate::state::AppState;
use axum::{
    extract::{Request, State},
    middleware::{self, Next},
    response::Response,
    routing::{delete, get, post},
    Router,
};

pub const ADMIN_TOKEN_HEADER: &str = "X-Admin-Token";

async fn require_admin_token(State(state): State<AppState>, req: Request, next: Next) -> Result<Response, AppError> {
    if let Some(expected) = state.settings.admin_token.as_deref() {
        let supplied = req.headers().get(ADMIN_TOKEN_HEADER).and_then(|v| v.to_str().ok());
        if supplied != Some(expected) {
            tracing::warn!(path = %req.uri().path(), "admin request rejected");
            return Err(AppError::AdminUnauthorized);
        }
    }
    Ok(next.run(req).await)
}

pub fn admin_routes(state: AppState) -> Router {
    Router::new()
        .route("/admin/tenants", get(list_tenants))
        .route("/admin/tenants/:code/health", get(tenant_health))
        .route("/admin/connections", get(list_connections))
        .route("/admin/connections/:code", delete(invalidate_connection))
        .route("/admin/migrations", get(all_migration_status))
        .route(
            "/admin/migrations/shared",
            get(shared_migration_status).post(run_shared_migrations),
        )
        .route("/admin/migrations/tenants", post(run_all_tenant_migrations))
        .route(
            "/admin/migrations/tenants/:code",
            get(tenant_migration_status).post(run_tenant_migrations),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), require_admin_token))
        .with_state(state)
}
