//! Public submission handlers.
//!
//! These routes are unauthenticated: anyone holding a form's uuid may load
//! it and submit answers.

use super::path_uuid;
use crate::errors::FormError;
use crate::models::{FormResponse, SubmissionResponse, SubmitFormRequest};
use crate::repositories::{FormsRepository, SubmissionsRepository};
use crate::routes::AppState;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Handler for GET /api/submissions/{uuid}
///
/// Returns the form for filling and counts a view. The counter update runs
/// in a detached task; the response never waits for it and a failed update
/// is logged, not reported to the caller.
#[instrument(skip_all, name = "form.handlers.get_public_form")]
pub async fn get_public_form(
    State(state): State<Arc<AppState>>,
    Path(raw_uuid): Path<String>,
) -> Result<Json<FormResponse>, FormError> {
    let form_uuid = path_uuid(&raw_uuid)?;

    let form = FormsRepository::get_by_uuid(&state.pool, form_uuid)
        .await?
        .ok_or_else(|| FormError::NotFound("Form not found".to_string()))?;

    let pool = state.pool.clone();
    let form_id = form.id;
    tokio::spawn(async move {
        if let Err(e) = FormsRepository::increment_views(&pool, form_id).await {
            warn!(
                target: "form.handlers.submissions",
                form_id = %form_uuid,
                error = %e,
                "Failed to count form view"
            );
        }
    });

    Ok(Json(FormResponse { form }))
}

/// Handler for POST /api/submissions/{uuid}/submit
///
/// # Response
///
/// - 201 Created with the submission uuid and timestamp
/// - 404 Not Found if the form does not exist
#[instrument(skip_all, name = "form.handlers.submit_form")]
pub async fn submit_form(
    State(state): State<Arc<AppState>>,
    Path(raw_uuid): Path<String>,
    Json(request): Json<SubmitFormRequest>,
) -> Result<(StatusCode, Json<SubmissionResponse>), FormError> {
    let form_uuid = path_uuid(&raw_uuid)?;

    let form = FormsRepository::get_by_uuid(&state.pool, form_uuid)
        .await?
        .ok_or_else(|| FormError::NotFound("Form not found".to_string()))?;

    let submission = SubmissionsRepository::create(&state.pool, form.id, &request.data).await?;

    info!(
        target: "form.handlers.submissions",
        form_id = %form_uuid,
        submission_id = %submission.uuid,
        "Submission stored"
    );

    Ok((StatusCode::CREATED, Json(SubmissionResponse { submission })))
}
