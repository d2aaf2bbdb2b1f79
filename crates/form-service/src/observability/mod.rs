//! Observability for the form service.
//!
//! Provides metrics definitions and instrumentation helpers.

pub mod metrics;
