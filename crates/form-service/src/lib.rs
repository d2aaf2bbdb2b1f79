//! Formaura form service library.
//!
//! HTTP backend for the Formaura form builder: authenticated form and
//! affiliate management plus public form filling.
//!
//! # Authentication
//!
//! Requests carry an opaque session token (bearer header or session cookie).
//! Each protected route is wrapped in an identity guard with a freshness
//! policy:
//!
//! - `Cached` routes may be served an identity resolved up to one cache TTL
//!   ago from the process-wide identity store
//! - `AlwaysFresh` routes resolve against the database on every request and
//!   refresh the store
//!
//! # Modules
//!
//! - `auth` - Credentials, identity store, resolver and request binding
//! - `config` - Service configuration from environment
//! - `errors` - Error types with HTTP status code mapping
//! - `handlers` - HTTP request handlers
//! - `middleware` - Identity guard and HTTP metrics middleware
//! - `models` - Rows, requests and responses
//! - `observability` - Prometheus metrics
//! - `repositories` - Database access
//! - `routes` - Axum router setup
//! - `tasks` - Background maintenance tasks

pub mod auth;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod observability;
pub mod repositories;
pub mod routes;
pub mod tasks;
