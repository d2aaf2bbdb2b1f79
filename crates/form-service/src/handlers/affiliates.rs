//! Affiliate handlers.

use crate::auth::CurrentUser;
use crate::errors::FormError;
use crate::models::{AffiliateListResponse, AffiliateResponse, CreateAffiliateRequest};
use crate::repositories::AffiliatesRepository;
use crate::routes::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use std::sync::Arc;
use tracing::instrument;

/// Handler for GET /api/affiliates
#[instrument(skip_all, name = "form.handlers.list_affiliates")]
pub async fn list_affiliates(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
) -> Result<Json<AffiliateListResponse>, FormError> {
    let affiliates = AffiliatesRepository::list_by_user(&state.pool, user.user_id).await?;

    Ok(Json(AffiliateListResponse { affiliates }))
}

/// Handler for POST /api/affiliates
///
/// # Response
///
/// - 201 Created with the new affiliate
/// - 400 Bad Request if names are blank or the email is malformed
#[instrument(skip_all, name = "form.handlers.create_affiliate")]
pub async fn create_affiliate(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Json(request): Json<CreateAffiliateRequest>,
) -> Result<(StatusCode, Json<AffiliateResponse>), FormError> {
    request
        .validate()
        .map_err(|msg| FormError::BadRequest(msg.to_string()))?;

    let affiliate = AffiliatesRepository::create(
        &state.pool,
        user.user_id,
        &request.first_name,
        &request.last_name,
        request.email.as_deref(),
        request.company.as_deref(),
    )
    .await?;

    tracing::info!(
        target: "form.handlers.affiliates",
        user_id = user.user_id,
        affiliate_id = %affiliate.uuid,
        "Affiliate created"
    );

    Ok((StatusCode::CREATED, Json(AffiliateResponse { affiliate })))
}
