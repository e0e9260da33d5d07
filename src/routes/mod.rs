//! Router assembly.

pub mod admin;
pub mod common;
pub mod tenant;

pub use admin::{admin_routes, ADMIN_TOKEN_HEADER};
pub use common::common_routes;
pub use tenant::tenant_routes;

use crate::state::AppState;
use axum::Router;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

const BODY_LIMIT_BYTES: usize = 1024 * 1024;

/// Common routes at the root, tenant and admin routes under `/api/v1`.
pub fn app_router(state: AppState) -> Router {
    Router::new()
        .merge(common_routes(state.clone()))
        .nest("/api/v1", tenant_routes(state.clone()).merge(admin_routes(state)))
        .layer(TraceLayer::new_for_http())
        .layer(RequestBodyLimitLayer::new(BODY_LIMIT_BYTES))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::connection::testing::{lazy_pool, registry_with, CountingFactory};
    use crate::connection::{ConnectionCache, TenantResolver};
    use crate::context::RequestContext;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use axum::routing::get;
    use serde_json::Value;
    use std::sync::atomic::Ordering;
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;

    fn state_with(factory: Arc<CountingFactory>, settings: Settings) -> AppState {
        let resolver = TenantResolver::new(
            registry_with(&[("TOPSTEEL", "erp_topsteel_topsteel"), ("ACME", "erp_topsteel_acme")]),
            factory,
            Arc::new(ConnectionCache::new()),
            Duration::from_secs(5),
        );
        AppState {
            shared_pool: lazy_pool("erp_topsteel_auth"),
            resolver: Arc::new(resolver),
            settings: Arc::new(settings),
        }
    }

    fn state() -> AppState {
        state_with(Arc::new(CountingFactory::default()), Settings::default())
    }

    fn unreachable_tenants() -> AppState {
        let factory = CountingFactory::default();
        factory.fail.store(true, Ordering::SeqCst);
        state_with(Arc::new(factory), Settings::default())
    }

    /// App router plus a route echoing the resolved context, so no tenant query runs.
    fn app(state: AppState) -> Router {
        let whoami = Router::new()
            .route(
                "/whoami",
                get(|ctx: RequestContext| async move {
                    format!("{}:{}:{}", ctx.tenant(), ctx.connection().database(), ctx.user_id().unwrap_or("-"))
                }),
            )
            .with_state(state.clone());
        app_router(state).merge(whoami)
    }

    async fn send(app: Router, req: Request<Body>) -> (StatusCode, Vec<u8>) {
        let res = app.oneshot(req).await.unwrap();
        let status = res.status();
        let body = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        (status, body.to_vec())
    }

    fn get_req(uri: &str, tenant: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri(uri);
        if let Some(t) = tenant {
            builder = builder.header("X-Tenant-ID", t);
        }
        builder.body(Body::empty()).unwrap()
    }

    fn error_code(body: &[u8]) -> String {
        let v: Value = serde_json::from_slice(body).unwrap();
        v["error"]["code"].as_str().unwrap_or_default().to_string()
    }

    #[tokio::test]
    async fn health_is_ok() {
        let (status, _) = send(app(state()), get_req("/health", None)).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn missing_tenant_is_unauthorized() {
        let (status, body) = send(app(state()), get_req("/whoami", None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(error_code(&body), "missing_tenant");

        let (status, _) = send(app(state()), get_req("/api/v1/tenant/ping", None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn unknown_tenant_is_forbidden_and_malformed_is_bad_request() {
        let (status, body) = send(app(state()), get_req("/whoami", Some("UNKNOWN"))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(error_code(&body), "tenant_not_found");

        let (status, _) = send(app(state()), get_req("/whoami", Some("TOP-STEEL"))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn known_tenant_binds_its_database() {
        let req = Request::builder()
            .uri("/whoami")
            .header("X-Tenant-ID", "topsteel")
            .header("X-User-ID", "u-42")
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(app(state()), req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(String::from_utf8(body).unwrap(), "TOPSTEEL:erp_topsteel_topsteel:u-42");
    }

    #[tokio::test]
    async fn admin_lists_and_invalidates_connections() {
        let state = state();
        let (status, _) = send(app(state.clone()), get_req("/whoami", Some("TOPSTEEL"))).await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = send(app(state.clone()), get_req("/api/v1/admin/connections", None)).await;
        assert_eq!(status, StatusCode::OK);
        let v: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(v["meta"]["count"], 1);
        assert_eq!(v["data"][0]["tenant"], "TOPSTEEL");
        assert_eq!(v["data"][0]["database"], "erp_topsteel_topsteel");

        let delete = |uri: &str| Request::builder().method("DELETE").uri(uri).body(Body::empty()).unwrap();
        let (status, _) = send(app(state.clone()), delete("/api/v1/admin/connections/TOPSTEEL")).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = send(app(state.clone()), delete("/api/v1/admin/connections/TOPSTEEL")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn admin_lists_active_tenants() {
        let (status, body) = send(app(state()), get_req("/api/v1/admin/tenants", None)).await;
        assert_eq!(status, StatusCode::OK);
        let v: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(v["meta"]["count"], 2);
        assert_eq!(v["data"][0]["code"], "ACME");
    }

    #[tokio::test]
    async fn tenant_migration_status_for_unknown_tenant_is_forbidden() {
        let (status, _) = send(app(state()), get_req("/api/v1/admin/migrations/tenants/NOPE", None)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn lost_tenant_database_on_ping_is_unavailable() {
        let (status, body) = send(app(state()), get_req("/api/v1/tenant/ping", Some("TOPSTEEL"))).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(error_code(&body), "tenant_database_unavailable");
    }

    #[tokio::test]
    async fn aggregated_migration_status_reports_unreachable_databases() {
        let (status, body) = send(app(unreachable_tenants()), get_req("/api/v1/admin/migrations", None)).await;
        assert_eq!(status, StatusCode::OK);
        let v: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(v["meta"]["count"], 3);
        let databases: Vec<&str> = v["data"].as_array().unwrap().iter().map(|s| s["database"].as_str().unwrap()).collect();
        assert_eq!(databases, vec!["erp_topsteel_auth", "erp_topsteel_acme", "erp_topsteel_topsteel"]);
        assert!(v["data"].as_array().unwrap().iter().all(|s| s["status"] == "error" && s["error"].is_string()));
    }

    #[tokio::test]
    async fn run_all_tenant_migrations_stops_on_unreachable_tenant() {
        let req = Request::builder()
            .method("POST")
            .uri("/api/v1/admin/migrations/tenants")
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(app(unreachable_tenants()), req).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        let v: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(v["error"]["details"]["tenant"], "ACME");
    }

    #[tokio::test]
    async fn tenant_health_reports_unreachable_database_as_unhealthy() {
        let (status, body) = send(app(unreachable_tenants()), get_req("/api/v1/admin/tenants/acme/health", None)).await;
        assert_eq!(status, StatusCode::OK);
        let v: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(v["data"]["tenant"], "ACME");
        assert_eq!(v["data"]["healthy"], false);
        assert!(v["data"]["error"].is_string());

        let (status, _) = send(app(state()), get_req("/api/v1/admin/tenants/NOPE/health", None)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn admin_token_guards_admin_routes_only() {
        let settings = Settings {
            admin_token: Some("s3cret".into()),
            ..Settings::default()
        };
        let state = state_with(Arc::new(CountingFactory::default()), settings);

        let (status, body) = send(app(state.clone()), get_req("/api/v1/admin/connections", None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(error_code(&body), "admin_unauthorized");

        let wrong = Request::builder()
            .uri("/api/v1/admin/connections")
            .header(ADMIN_TOKEN_HEADER, "guess")
            .body(Body::empty())
            .unwrap();
        assert_eq!(send(app(state.clone()), wrong).await.0, StatusCode::UNAUTHORIZED);

        let right = Request::builder()
            .uri("/api/v1/admin/connections")
            .header(ADMIN_TOKEN_HEADER, "s3cret")
            .body(Body::empty())
            .unwrap();
        assert_eq!(send(app(state.clone()), right).await.0, StatusCode::OK);

        let (status, _) = send(app(state), get_req("/whoami", Some("TOPSTEEL"))).await;
        assert_eq!(status, StatusCode::OK);
    }
}
