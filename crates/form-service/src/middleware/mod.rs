//! HTTP middleware for the form service.
//!
//! # Components
//!
//! - `auth` - Identity guard with per-route freshness policy
//! - `http_metrics` - HTTP request metrics middleware

pub mod auth;
pub mod http_metrics;

pub use auth::{require_identity, FreshnessPolicy, IdentityGuard};
pub use http_metrics::http_metrics_middleware;
