//! Session handlers: current user and logout.

use crate::auth::{Credential, CurrentUser};
use crate::errors::FormError;
use crate::models::{MeResponse, UserResponse};
use crate::repositories::SessionsRepository;
use crate::routes::AppState;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use axum_extra::extract::cookie::{Cookie, CookieJar};
use std::sync::Arc;
use tracing::instrument;

/// Handler for GET /api/auth/me
///
/// Served under the cached policy, so profile changes can take up to the
/// identity cache TTL to appear here.
#[instrument(skip_all, name = "form.handlers.me")]
pub async fn get_me(user: CurrentUser) -> Json<MeResponse> {
    Json(MeResponse {
        user: UserResponse::from(&*user),
    })
}

/// Handler for POST /api/auth/logout
///
/// Revokes the session row, drops the cached identity and clears the
/// session cookie.
///
/// # Response
///
/// - 204 No Content
#[instrument(skip_all, name = "form.handlers.logout")]
pub async fn logout(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    headers: HeaderMap,
) -> Result<impl IntoResponse, FormError> {
    let cookie_name = state.config.session_cookie_name.clone();
    let credential =
        Credential::from_headers(&headers, &cookie_name).ok_or(FormError::Unauthorized)?;
    let key = credential.cache_key();

    let revoked = SessionsRepository::revoke(&state.pool, &key).await?;
    state.identity_store.invalidate(&key).await;

    tracing::info!(
        target: "form.handlers.auth",
        user_id = user.user_id,
        revoked,
        "User logged out"
    );

    let jar = CookieJar::from_headers(&headers).remove(Cookie::build((cookie_name, "")).path("/"));

    Ok((StatusCode::NO_CONTENT, jar))
}
