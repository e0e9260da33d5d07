//! HTTP handlers for administration and tenant-scoped requests.

pub mod admin;
pub mod tenant;
