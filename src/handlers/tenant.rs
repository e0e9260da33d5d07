//! Tenant-scoped endpoints. Each handler receives the request context and queries
//! only through its pool.

use crate::context::RequestContext;
use crate::error::AppError;
use crate::response::tenant_scoped;
use crate::state::AppState;
use crate::store::database_info;
use axum::{extract::State, response::IntoResponse};

/// GET /tenant/ping: confirms the request is routed to the tenant's own database.
pub async fn ping(State(state): State<AppState>, ctx: RequestContext) -> Result<impl IntoResponse, AppError> {
    let info = database_info(ctx.pool(), state.settings.database.query_timeout)
        .await
        .map_err(|e| ctx.db_error(e))?;
    Ok(tenant_scoped(&ctx, info))
}
