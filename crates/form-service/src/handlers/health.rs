//! Health check handlers.
//!
//! - `/health`: liveness, reports database reachability but always answers 200
//! - `/ready`: readiness, 503 while the database is unreachable

use crate::models::{HealthResponse, ReadinessResponse};
use crate::routes::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use std::sync::Arc;

/// Liveness probe handler.
#[tracing::instrument(skip_all, name = "form.health.liveness")]
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let database = match sqlx::query("SELECT 1").fetch_one(&state.pool).await {
        Ok(_) => "healthy",
        Err(e) => {
            tracing::warn!(target: "form.handlers.health", error = %e, "Database ping failed");
            "unhealthy"
        }
    };

    Json(HealthResponse {
        status: "healthy",
        database,
    })
}

/// Readiness probe handler.
///
/// Error messages are generic; the actual error is logged server-side.
#[tracing::instrument(skip_all, name = "form.health.readiness")]
pub async fn readiness_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    if let Err(e) = sqlx::query("SELECT 1").fetch_one(&state.pool).await {
        tracing::warn!(target: "form.handlers.health", error = %e, "Readiness check failed: database error");
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ReadinessResponse {
                status: "not_ready",
                database: "unhealthy",
                error: Some("Service dependencies unavailable".to_string()),
            }),
        );
    }

    (
        StatusCode::OK,
        Json(ReadinessResponse {
            status: "ready",
            database: "healthy",
            error: None,
        }),
    )
}
