//! HTTP routes for the form service.
//!
//! Defines the Axum router and application state.

use crate::auth::{IdentityResolver, IdentityStore, UserLookup};
use crate::config::Config;
use crate::handlers;
use crate::middleware::{http_metrics_middleware, require_identity, FreshnessPolicy, IdentityGuard};
use axum::{
    http::{header, request, HeaderValue, Method},
    middleware,
    routing::{get, patch, post, put},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use sqlx::PgPool;
use std::sync::Arc;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: PgPool,

    /// Service configuration.
    pub config: Config,

    /// The process-wide identity store, shared by both freshness policies.
    pub identity_store: Arc<IdentityStore>,

    /// Authoritative credential lookup.
    pub user_lookup: Arc<dyn UserLookup>,
}

fn guard(state: &AppState, policy: FreshnessPolicy) -> Arc<IdentityGuard> {
    Arc::new(IdentityGuard::new(
        Arc::clone(&state.identity_store),
        IdentityResolver::new(Arc::clone(&state.user_lookup)),
        policy,
        state.config.session_cookie_name.clone(),
    ))
}

fn cors_layer(config: &Config) -> CorsLayer {
    let allowed = config.cors_allowed_origin.clone();

    CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(
            move |origin: &HeaderValue, _parts: &request::Parts| {
                origin.as_bytes() == allowed.as_bytes()
            },
        ))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true)
}

/// Build the application routes.
///
/// Creates an Axum router with:
/// - `/health`, `/ready`, `/metrics` - operational endpoints, public
/// - `/api/submissions/:uuid[/submit]` - public form filling
/// - Cached identity policy: `GET /api/auth/me`, `GET /api/forms`,
///   `GET /api/forms/:uuid`, `GET /api/affiliates`
/// - Always-fresh identity policy: every form, affiliate and session write
///
/// Global layers: CORS, request timeout, TraceLayer and HTTP metrics.
pub fn build_routes(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let cached_guard = guard(&state, FreshnessPolicy::Cached);
    let fresh_guard = guard(&state, FreshnessPolicy::AlwaysFresh);

    let public_routes = Router::new()
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .route("/api/submissions/:uuid", get(handlers::get_public_form))
        .route("/api/submissions/:uuid/submit", post(handlers::submit_form))
        .with_state(state.clone());

    let metrics_routes = Router::new()
        .route("/metrics", get(handlers::metrics_handler))
        .with_state(metrics_handle);

    // Reads that tolerate an identity up to one cache TTL old
    let cached_routes = Router::new()
        .route("/api/auth/me", get(handlers::get_me))
        .route("/api/forms", get(handlers::list_forms))
        .route("/api/forms/:uuid", get(handlers::get_form))
        .route("/api/affiliates", get(handlers::list_affiliates))
        .route_layer(middleware::from_fn_with_state(
            cached_guard,
            require_identity,
        ))
        .with_state(state.clone());

    // Writes always revalidate the session against the database
    let fresh_routes = Router::new()
        .route("/api/auth/logout", post(handlers::logout))
        .route("/api/forms", post(handlers::create_form))
        .route(
            "/api/forms/:uuid",
            patch(handlers::update_form_meta).delete(handlers::delete_form),
        )
        .route("/api/forms/:uuid/data", put(handlers::update_form_data))
        .route(
            "/api/forms/:uuid/affiliates",
            put(handlers::update_form_affiliates),
        )
        .route("/api/affiliates", post(handlers::create_affiliate))
        .route_layer(middleware::from_fn_with_state(fresh_guard, require_identity))
        .with_state(state.clone());

    // Layer order (bottom-to-top execution):
    // 1. TimeoutLayer (innermost)
    // 2. TraceLayer
    // 3. CorsLayer - answers preflight before auth runs
    // 4. http_metrics_middleware (outermost) - records every response
    public_routes
        .merge(metrics_routes)
        .merge(cached_routes)
        .merge(fresh_routes)
        .layer(TimeoutLayer::new(state.config.request_timeout()))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&state.config))
        .layer(middleware::from_fn(http_metrics_middleware))
}
