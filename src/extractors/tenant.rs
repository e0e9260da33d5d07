//! Build the request context from the tenant signal (header or subdomain).

use crate::config::TenantSource;
use crate::context::RequestContext;
use crate::error::AppError;
use crate::state::AppState;
use crate::tenant::TenantCode;
use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    http::{header::HOST, request::Parts, HeaderMap},
};
use uuid::Uuid;

pub const REQUEST_ID_HEADER: &str = "X-Request-ID";
/// Set by the upstream authentication layer once the session is verified.
pub const USER_ID_HEADER: &str = "X-User-ID";

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Raw tenant signal from the request, before validation.
pub fn tenant_signal(headers: &HeaderMap, source: &TenantSource) -> Option<String> {
    match source {
        TenantSource::Header(name) => header_str(headers, name).map(str::to_string),
        TenantSource::Subdomain => {
            let host = header_str(headers, HOST.as_str())?;
            let host = host.split(':').next().unwrap_or(host);
            let labels: Vec<&str> = host.split('.').collect();
            if labels.len() < 3 || labels[0].eq_ignore_ascii_case("www") || labels[0].is_empty() {
                return None;
            }
            Some(labels[0].to_string())
        }
    }
}

fn request_id(headers: &HeaderMap) -> Uuid {
    header_str(headers, REQUEST_ID_HEADER)
        .and_then(|s| Uuid::parse_str(s).ok())
        .unwrap_or_else(Uuid::new_v4)
}

/// Fails before the handler runs: no signal → `MissingTenant`, malformed code →
/// `BadRequest`, unknown tenant → `TenantNotFound`, database down → `TenantDatabaseUnavailable`.
#[async_trait]
impl FromRequestParts<AppState> for RequestContext {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let signal = tenant_signal(&parts.headers, &state.settings.tenant_source).ok_or(AppError::MissingTenant)?;
        let tenant: TenantCode = signal.parse()?;
        let connection = state.resolver.resolve(&tenant).await?;
        let ctx = RequestContext::new(
            request_id(&parts.headers),
            tenant,
            header_str(&parts.headers, USER_ID_HEADER).map(str::to_string),
            connection,
        );
        tracing::debug!(
            request_id = %ctx.request_id(),
            tenant = %ctx.tenant(),
            user = ctx.user_id().unwrap_or("-"),
            "request context established"
        );
        Ok(ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (k, v) in pairs {
            map.insert(*k, HeaderValue::from_static(*v));
        }
        map
    }

    #[test]
    fn header_source_reads_configured_header() {
        let source = TenantSource::Header("X-Tenant-ID".into());
        assert_eq!(
            tenant_signal(&headers(&[("x-tenant-id", " TOPSTEEL ")]), &source).as_deref(),
            Some("TOPSTEEL")
        );
        assert_eq!(tenant_signal(&headers(&[("x-tenant-id", "  ")]), &source), None);
        assert_eq!(tenant_signal(&HeaderMap::new(), &source), None);
    }

    #[test]
    fn subdomain_source_uses_first_host_label() {
        let source = TenantSource::Subdomain;
        assert_eq!(
            tenant_signal(&headers(&[("host", "topsteel.erp.example.com:443")]), &source).as_deref(),
            Some("topsteel")
        );
        assert_eq!(tenant_signal(&headers(&[("host", "www.example.com")]), &source), None);
        assert_eq!(tenant_signal(&headers(&[("host", "localhost:3002")]), &source), None);
    }

    #[test]
    fn request_id_is_reused_or_generated() {
        let id = "5b0c1f4e-8a54-4c8e-9d0a-3f1d2a7c9e11";
        assert_eq!(request_id(&headers(&[("x-request-id", id)])).to_string(), id);
        assert_ne!(request_id(&headers(&[("x-request-id", "nope")])).to_string(), "nope");
    }
}
