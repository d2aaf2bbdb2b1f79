//! Metrics definitions for the form service.
//!
//! All metrics follow Prometheus naming conventions:
//! - `form_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded:
//! - `method`: HTTP verbs
//! - `endpoint`: parameterized route templates, unknown paths become `/other`
//! - `policy`: `always_fresh` or `cached`
//! - `outcome`: `success`, `not_found` or `unavailable`
//! - `reason`: `expired`, `capacity` or `invalidated`
//!
//! No credential, email or user id is ever used as a label.

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Initialize the Prometheus recorder and return the handle used to serve
/// `/metrics`.
///
/// Must be called before any metrics are recorded.
///
/// # Errors
///
/// Returns error if the recorder fails to install (e.g., already installed).
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Prefix("form_http_request".to_string()),
            &[
                0.005, 0.010, 0.025, 0.050, 0.100, 0.150, 0.200, 0.300, 0.500, 1.000, 2.000,
            ],
        )
        .map_err(|e| format!("Failed to set HTTP request buckets: {e}"))?
        // Resolution is a single indexed join, so the interesting range is small
        .set_buckets_for_metric(
            Matcher::Prefix("form_identity_resolution".to_string()),
            &[0.001, 0.002, 0.005, 0.010, 0.020, 0.050, 0.100, 0.250, 0.500],
        )
        .map_err(|e| format!("Failed to set identity resolution buckets: {e}"))?
        .set_buckets_for_metric(
            Matcher::Prefix("form_db_query".to_string()),
            &[
                0.001, 0.002, 0.005, 0.010, 0.020, 0.050, 0.100, 0.250, 0.500, 1.000,
            ],
        )
        .map_err(|e| format!("Failed to set DB query buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {e}"))
}

// ============================================================================
// HTTP Request Metrics
// ============================================================================

/// Record HTTP request completion
///
/// Metric: `form_http_requests_total`, `form_http_request_duration_seconds`
/// Labels: `method`, `endpoint`, `status` / `status_code`
///
/// Covers framework-level rejections (404, 405, 415, JSON parse errors) as
/// well as handler responses.
pub fn record_http_request(method: &str, endpoint: &str, status_code: u16, duration: Duration) {
    let normalized_endpoint = normalize_endpoint(endpoint);
    let status = categorize_status_code(status_code);

    histogram!("form_http_request_duration_seconds",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint.clone(),
        "status" => status.to_string()
    )
    .record(duration.as_secs_f64());

    counter!("form_http_requests_total",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint,
        "status_code" => status_code.to_string()
    )
    .increment(1);
}

fn categorize_status_code(status_code: u16) -> &'static str {
    match status_code {
        200..=299 => "success",
        408 | 504 => "timeout",
        _ => "error",
    }
}

/// Map a request path onto its route template.
fn normalize_endpoint(path: &str) -> String {
    match path {
        "/health" | "/ready" | "/metrics" | "/api/auth/me" | "/api/auth/logout"
        | "/api/forms" | "/api/affiliates" => path.to_string(),
        _ => normalize_dynamic_endpoint(path),
    }
}

fn normalize_dynamic_endpoint(path: &str) -> String {
    let parts: Vec<&str> = path.split('/').collect();

    // ["", "api", <collection>, <uuid>, <action>?]
    match parts.as_slice() {
        ["", "api", "forms", id] if !id.is_empty() => "/api/forms/{uuid}".to_string(),
        ["", "api", "forms", id, "data"] if !id.is_empty() => {
            "/api/forms/{uuid}/data".to_string()
        }
        ["", "api", "forms", id, "affiliates"] if !id.is_empty() => {
            "/api/forms/{uuid}/affiliates".to_string()
        }
        ["", "api", "submissions", id] if !id.is_empty() => {
            "/api/submissions/{uuid}".to_string()
        }
        ["", "api", "submissions", id, "submit"] if !id.is_empty() => {
            "/api/submissions/{uuid}/submit".to_string()
        }
        _ => "/other".to_string(),
    }
}

// ============================================================================
// Identity Metrics
// ============================================================================

/// Record a `Cached`-policy store lookup.
///
/// Metric: `form_identity_cache_lookups_total`
/// Labels: `result` (`hit` or `miss`)
pub fn record_identity_cache_lookup(hit: bool) {
    let result = if hit { "hit" } else { "miss" };
    counter!("form_identity_cache_lookups_total", "result" => result).increment(1);
}

/// Record an authoritative identity resolution.
///
/// Metric: `form_identity_resolutions_total`, `form_identity_resolution_duration_seconds`
/// Labels: `policy`, `outcome`
pub fn record_identity_resolution(policy: &str, outcome: &str, duration: Duration) {
    histogram!("form_identity_resolution_duration_seconds",
        "policy" => policy.to_string()
    )
    .record(duration.as_secs_f64());

    counter!("form_identity_resolutions_total",
        "policy" => policy.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// Record entries removed from the identity store.
///
/// Metric: `form_identity_cache_evictions_total`
/// Labels: `reason`
pub fn record_identity_cache_eviction(reason: &str, count: u64) {
    if count == 0 {
        return;
    }
    counter!("form_identity_cache_evictions_total",
        "reason" => reason.to_string()
    )
    .increment(count);
}

/// Set the current number of entries held by the identity store.
///
/// Metric: `form_identity_cache_entries`
pub fn set_identity_cache_entries(count: usize) {
    gauge!("form_identity_cache_entries").set(count as f64);
}

// ============================================================================
// Database Metrics
// ============================================================================

/// Record database query execution
///
/// Metric: `form_db_query_duration_seconds`, `form_db_queries_total`
/// Labels: `operation`, `status`
pub fn record_db_query(operation: &str, status: &str, duration: Duration) {
    histogram!("form_db_query_duration_seconds",
        "operation" => operation.to_string()
    )
    .record(duration.as_secs_f64());

    counter!("form_db_queries_total",
        "operation" => operation.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    // Without an installed recorder the metrics macros are no-ops; these
    // tests exercise the recording paths and the label normalization.

    #[test]
    fn test_record_http_request() {
        record_http_request("GET", "/health", 200, Duration::from_millis(5));
        record_http_request("GET", "/api/forms", 200, Duration::from_millis(40));
        record_http_request(
            "PATCH",
            "/api/forms/550e8400-e29b-41d4-a716-446655440000",
            401,
            Duration::from_millis(3),
        );
        record_http_request("GET", "/api/auth/me", 504, Duration::from_secs(30));
    }

    #[test]
    fn test_categorize_status_code() {
        assert_eq!(categorize_status_code(200), "success");
        assert_eq!(categorize_status_code(201), "success");
        assert_eq!(categorize_status_code(204), "success");
        assert_eq!(categorize_status_code(408), "timeout");
        assert_eq!(categorize_status_code(504), "timeout");
        assert_eq!(categorize_status_code(400), "error");
        assert_eq!(categorize_status_code(401), "error");
        assert_eq!(categorize_status_code(403), "error");
        assert_eq!(categorize_status_code(503), "error");
    }

    #[test]
    fn test_normalize_endpoint_known_paths() {
        assert_eq!(normalize_endpoint("/health"), "/health");
        assert_eq!(normalize_endpoint("/ready"), "/ready");
        assert_eq!(normalize_endpoint("/metrics"), "/metrics");
        assert_eq!(normalize_endpoint("/api/auth/me"), "/api/auth/me");
        assert_eq!(normalize_endpoint("/api/forms"), "/api/forms");
        assert_eq!(normalize_endpoint("/api/affiliates"), "/api/affiliates");
    }

    #[test]
    fn test_normalize_endpoint_uuid_paths() {
        let id = "550e8400-e29b-41d4-a716-446655440000";

        assert_eq!(
            normalize_endpoint(&format!("/api/forms/{id}")),
            "/api/forms/{uuid}"
        );
        assert_eq!(
            normalize_endpoint(&format!("/api/forms/{id}/data")),
            "/api/forms/{uuid}/data"
        );
        assert_eq!(
            normalize_endpoint(&format!("/api/forms/{id}/affiliates")),
            "/api/forms/{uuid}/affiliates"
        );
        assert_eq!(
            normalize_endpoint(&format!("/api/submissions/{id}")),
            "/api/submissions/{uuid}"
        );
        assert_eq!(
            normalize_endpoint(&format!("/api/submissions/{id}/submit")),
            "/api/submissions/{uuid}/submit"
        );
    }

    #[test]
    fn test_normalize_endpoint_unknown_paths() {
        assert_eq!(normalize_endpoint("/"), "/other");
        assert_eq!(normalize_endpoint("/api/forms/"), "/other");
        assert_eq!(normalize_endpoint("/api/forms/abc/steps"), "/other");
        assert_eq!(normalize_endpoint("/api/users/abc"), "/other");
    }

    #[test]
    fn test_record_identity_metrics() {
        record_identity_cache_lookup(true);
        record_identity_cache_lookup(false);
        record_identity_resolution("cached", "success", Duration::from_millis(2));
        record_identity_resolution("always_fresh", "unavailable", Duration::from_millis(900));
        record_identity_cache_eviction("expired", 3);
        record_identity_cache_eviction("capacity", 0);
        set_identity_cache_entries(12);
    }

    #[test]
    fn test_record_db_query() {
        record_db_query("find_session_user", "success", Duration::from_millis(2));
        record_db_query("find_session_user", "error", Duration::from_millis(50));
    }
}
