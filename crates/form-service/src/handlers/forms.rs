//! Form builder handlers.
//!
//! Reads run under the cached identity policy; every write runs under
//! always-fresh so a revoked session or deactivated account can no longer
//! modify forms.
//!
//! Ownership: a form owned by another user is 403, a missing form is 404.

use super::path_uuid;
use crate::auth::{CurrentUser, ResolvedIdentity};
use crate::errors::FormError;
use crate::models::{
    untitled_form_name, AffiliateInfo, FormData, FormListResponse, FormResponse, FormRow,
    UpdateAffiliatesRequest, UpdateFormMetaRequest,
};
use crate::repositories::forms::AffiliateUpdate;
use crate::repositories::FormsRepository;
use crate::routes::AppState;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Response for `PUT /api/forms/{uuid}/affiliates`.
#[derive(Debug, Clone, Serialize)]
pub struct FormAffiliatesResponse {
    pub affiliates: Vec<AffiliateInfo>,
}

/// Load a form and check that `user` owns it.
async fn load_owned_form(
    pool: &PgPool,
    raw_uuid: &str,
    user: &ResolvedIdentity,
) -> Result<FormRow, FormError> {
    let form_uuid = path_uuid(raw_uuid)?;

    let form = FormsRepository::get_by_uuid(pool, form_uuid)
        .await?
        .ok_or_else(|| FormError::NotFound("Form not found".to_string()))?;

    if !form.is_owned_by(user) {
        warn!(
            target: "form.handlers.forms",
            form_id = %form_uuid,
            user_id = user.user_id,
            "User attempted to access a form they do not own"
        );
        return Err(FormError::Forbidden(
            "You do not have access to this form".to_string(),
        ));
    }

    Ok(form)
}

/// Handler for GET /api/forms
///
/// Returns the user's forms with linked affiliates and submission counts,
/// newest first.
#[instrument(skip_all, name = "form.handlers.list_forms")]
pub async fn list_forms(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
) -> Result<Json<FormListResponse>, FormError> {
    let forms = FormsRepository::detailed_listing_by_user(&state.pool, user.user_id).await?;

    Ok(Json(FormListResponse { forms }))
}

/// Handler for POST /api/forms
///
/// Creates a blank form named "Untitled form", or "Untitled form (N)" when
/// that name is already taken by one of the user's forms.
///
/// # Response
///
/// - 201 Created with the new form
#[instrument(skip_all, name = "form.handlers.create_form")]
pub async fn create_form(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
) -> Result<(StatusCode, Json<FormResponse>), FormError> {
    let existing = FormsRepository::list_names_by_user(&state.pool, user.user_id).await?;
    let name = untitled_form_name(existing.iter().map(String::as_str));

    let form = FormsRepository::create(
        &state.pool,
        user.user_id,
        &name,
        None,
        &FormData::default(),
    )
    .await?;

    info!(
        target: "form.handlers.forms",
        form_id = %form.uuid,
        user_id = user.user_id,
        "Form created"
    );

    Ok((StatusCode::CREATED, Json(FormResponse { form })))
}

/// Handler for GET /api/forms/{uuid}
#[instrument(skip_all, name = "form.handlers.get_form")]
pub async fn get_form(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(raw_uuid): Path<String>,
) -> Result<Json<FormResponse>, FormError> {
    let form = load_owned_form(&state.pool, &raw_uuid, &user).await?;

    Ok(Json(FormResponse { form }))
}

/// Handler for PATCH /api/forms/{uuid}
///
/// Updates name and description. The name is trimmed and must be 1-255
/// characters. An omitted or blank description clears it.
#[instrument(skip_all, name = "form.handlers.update_form_meta")]
pub async fn update_form_meta(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(raw_uuid): Path<String>,
    Json(request): Json<UpdateFormMetaRequest>,
) -> Result<Json<FormResponse>, FormError> {
    let name = request
        .validate()
        .map_err(|msg| FormError::BadRequest(msg.to_string()))?;

    let form = load_owned_form(&state.pool, &raw_uuid, &user).await?;

    let description = request
        .description
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty());

    let updated = FormsRepository::update_meta(&state.pool, form.id, name, description)
        .await?
        .ok_or_else(|| FormError::NotFound("Form not found".to_string()))?;

    Ok(Json(FormResponse { form: updated }))
}

/// Handler for PUT /api/forms/{uuid}/data
#[instrument(skip_all, name = "form.handlers.update_form_data")]
pub async fn update_form_data(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(raw_uuid): Path<String>,
    Json(form_data): Json<FormData>,
) -> Result<Json<FormResponse>, FormError> {
    form_data
        .validate()
        .map_err(|msg| FormError::BadRequest(msg.to_string()))?;

    let form = load_owned_form(&state.pool, &raw_uuid, &user).await?;

    let updated = FormsRepository::update_form_data(&state.pool, form.id, &form_data)
        .await?
        .ok_or_else(|| FormError::NotFound("Form not found".to_string()))?;

    Ok(Json(FormResponse { form: updated }))
}

/// Handler for PUT /api/forms/{uuid}/affiliates
///
/// Replaces the form's affiliate set. Every affiliate must belong to the
/// caller; otherwise nothing changes and the request is rejected with 400.
#[instrument(skip_all, name = "form.handlers.update_form_affiliates")]
pub async fn update_form_affiliates(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(raw_uuid): Path<String>,
    Json(request): Json<UpdateAffiliatesRequest>,
) -> Result<Json<FormAffiliatesResponse>, FormError> {
    let form = load_owned_form(&state.pool, &raw_uuid, &user).await?;

    let affiliate_uuids = request.unique_affiliates();

    match FormsRepository::set_affiliates(&state.pool, form.id, user.user_id, &affiliate_uuids)
        .await?
    {
        AffiliateUpdate::Updated(affiliates) => {
            info!(
                target: "form.handlers.forms",
                form_id = %form.uuid,
                count = affiliates.len(),
                "Form affiliates replaced"
            );
            Ok(Json(FormAffiliatesResponse { affiliates }))
        }
        AffiliateUpdate::UnknownAffiliate => Err(FormError::BadRequest(
            "One or more affiliates do not exist".to_string(),
        )),
    }
}

/// Handler for DELETE /api/forms/{uuid}
///
/// # Response
///
/// - 204 No Content
#[instrument(skip_all, name = "form.handlers.delete_form")]
pub async fn delete_form(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(raw_uuid): Path<String>,
) -> Result<StatusCode, FormError> {
    let form = load_owned_form(&state.pool, &raw_uuid, &user).await?;

    if !FormsRepository::delete(&state.pool, form.id).await? {
        return Err(FormError::NotFound("Form not found".to_string()));
    }

    info!(
        target: "form.handlers.forms",
        form_id = %form.uuid,
        user_id = user.user_id,
        "Form deleted"
    );

    Ok(StatusCode::NO_CONTENT)
}
