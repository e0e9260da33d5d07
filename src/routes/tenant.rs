//! Routes that require a resolved tenant context.

use crate::handlers::tenant::ping;
use crate::state::AppState;
use axum::{routing::get, Router};

pub fn tenant_routes(state: AppState) -> Router {
    Router::new().route("/tenant/ping", get(ping)).with_state(state)
}
