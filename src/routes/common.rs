//! Probes outside any tenant: health, readiness, version.

use crate::state::AppState;
use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde::Serialize;

#[derive(Serialize)]
struct Probe {
    status: &'static str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Readiness {
    status: &'static str,
    shared_database: String,
    shared_reachable: bool,
    tenant_connections: usize,
}

async fn health() -> Json<Probe> {
    Json(Probe { status: "ok" })
}

/// Only the shared database gates readiness; tenant pools open on first request.
async fn ready(State(state): State<AppState>) -> (StatusCode, Json<Readiness>) {
    let shared_reachable = sqlx::query("SELECT 1").execute(&state.shared_pool).await.is_ok();
    let body = Readiness {
        status: if shared_reachable { "ok" } else { "degraded" },
        shared_database: state.settings.database.shared_database.clone(),
        shared_reachable,
        tenant_connections: state.resolver.connections().len(),
    };
    let code = if shared_reachable { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (code, Json(body))
}

async fn version() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION")
    }))
}

pub fn common_routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/ready", get(ready))
        .route("/version", get(version))
        .with_state(state)
}
