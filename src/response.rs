//! Response envelopes: `{ "data": ..., "meta": ... }`.

use crate::context::RequestContext;
use axum::{http::StatusCode, Json};
use serde::Serialize;
use uuid::Uuid;

#[derive(Serialize)]
pub struct Envelope<T, M> {
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<M>,
}

#[derive(Serialize)]
pub struct MetaCount {
    pub count: u64,
}

/// Echoed on tenant-scoped responses so callers can correlate logs with the pool that served them.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantMeta {
    pub request_id: Uuid,
    pub tenant: String,
    pub database: String,
    pub generation: u64,
}

impl From<&RequestContext> for TenantMeta {
    fn from(ctx: &RequestContext) -> Self {
        TenantMeta {
            request_id: ctx.request_id(),
            tenant: ctx.tenant().to_string(),
            database: ctx.connection().database().to_string(),
            generation: ctx.connection().generation(),
        }
    }
}

pub type Reply<T, M = ()> = (StatusCode, Json<Envelope<T, M>>);

pub fn ok<T: Serialize>(data: T) -> Reply<T> {
    (StatusCode::OK, Json(Envelope { data, meta: None }))
}

pub fn list<T: Serialize>(data: Vec<T>) -> Reply<Vec<T>, MetaCount> {
    let count = data.len() as u64;
    (
        StatusCode::OK,
        Json(Envelope {
            data,
            meta: Some(MetaCount { count }),
        }),
    )
}

pub fn tenant_scoped<T: Serialize>(ctx: &RequestContext, data: T) -> Reply<T, TenantMeta> {
    (
        StatusCode::OK,
        Json(Envelope {
            data,
            meta: Some(TenantMeta::from(ctx)),
        }),
    )
}
