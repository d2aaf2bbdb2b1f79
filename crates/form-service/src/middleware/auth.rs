//! Authentication middleware for protected routes.
//!
//! Every protected route is wrapped in an [`IdentityGuard`] configured with a
//! [`FreshnessPolicy`]:
//!
//! - `AlwaysFresh` resolves the credential against the user repository on
//!   every request and writes the result through to the identity store.
//! - `Cached` serves a live store entry when there is one and only resolves
//!   on a miss. A cached identity may lag account changes by up to the store
//!   TTL.
//!
//! Both policies share the store, so `AlwaysFresh` routes keep the cache warm
//! for `Cached` routes. A rejected request never reaches the handler and a
//! failed resolution is not retried.

use crate::auth::{
    bind_identity, Credential, IdentityResolver, IdentityStore, ResolveError, ResolvedIdentity,
};
use crate::errors::{AuthError, FormError};
use crate::observability::metrics;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::IntoResponse,
};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::instrument;

/// Whether a route may trust a cached identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FreshnessPolicy {
    /// Always revalidate against the system of record.
    AlwaysFresh,
    /// Prefer a live cached identity.
    Cached,
}

impl FreshnessPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            FreshnessPolicy::AlwaysFresh => "always_fresh",
            FreshnessPolicy::Cached => "cached",
        }
    }

    fn trusts_cache(&self) -> bool {
        matches!(self, FreshnessPolicy::Cached)
    }
}

impl fmt::Display for FreshnessPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State for the authentication middleware.
pub struct IdentityGuard {
    store: Arc<IdentityStore>,
    resolver: IdentityResolver,
    policy: FreshnessPolicy,
    cookie_name: String,
}

impl IdentityGuard {
    /// Create a guard over a shared store.
    ///
    /// # Arguments
    ///
    /// * `store` - The process-wide identity store
    /// * `resolver` - Authoritative identity resolver
    /// * `policy` - Cache trust policy for the routes this guard wraps
    /// * `cookie_name` - Session cookie consulted when no bearer header is sent
    pub fn new(
        store: Arc<IdentityStore>,
        resolver: IdentityResolver,
        policy: FreshnessPolicy,
        cookie_name: impl Into<String>,
    ) -> Self {
        Self {
            store,
            resolver,
            policy,
            cookie_name: cookie_name.into(),
        }
    }

    /// Resolve `credential` according to this guard's policy.
    ///
    /// On a cache miss (or always, for `AlwaysFresh`) the resolver is called
    /// once and a successful result is written to the store with a fresh TTL.
    pub async fn authenticate(
        &self,
        credential: &Credential,
    ) -> Result<Arc<ResolvedIdentity>, AuthError> {
        let key = credential.cache_key();

        if self.policy.trusts_cache() {
            if let Some(identity) = self.store.get(&key).await {
                metrics::record_identity_cache_lookup(true);
                tracing::debug!(target: "form.middleware.auth", user_id = identity.user_id, "Identity cache hit");
                return Ok(identity);
            }
            metrics::record_identity_cache_lookup(false);
        }

        let start = Instant::now();
        let result = self.resolver.resolve(credential).await;
        let outcome = match &result {
            Ok(_) => "success",
            Err(ResolveError::NotFound) => "not_found",
            Err(ResolveError::Unavailable(_)) => "unavailable",
        };
        metrics::record_identity_resolution(self.policy.as_str(), outcome, start.elapsed());

        let identity = Arc::new(result?);
        self.store.set(key, Arc::clone(&identity)).await;

        Ok(identity)
    }
}

/// Authentication middleware.
///
/// Extracts the session credential, authenticates it through the guard and
/// binds the identity to the request before running the handler.
///
/// # Response
///
/// - 401 Unauthorized if the credential is missing or cannot be resolved
/// - Otherwise the handler's response
#[instrument(skip_all, name = "form.middleware.auth", fields(policy = tracing::field::Empty))]
pub async fn require_identity(
    State(guard): State<Arc<IdentityGuard>>,
    mut req: Request,
    next: Next,
) -> Result<impl IntoResponse, FormError> {
    tracing::Span::current().record("policy", guard.policy.as_str());

    let credential = Credential::from_headers(req.headers(), &guard.cookie_name).ok_or_else(|| {
        tracing::debug!(target: "form.middleware.auth", "Missing session credential");
        AuthError::CredentialMissing
    })?;

    let identity = guard.authenticate(&credential).await.map_err(|e| {
        tracing::debug!(target: "form.middleware.auth", error = %e, "Rejected request");
        e
    })?;

    bind_identity(&mut req, identity);

    Ok(next.run(req).await)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::auth::{CurrentUser, MockUserLookup};
    use axum::{
        body::Body,
        http::{Request as HttpRequest, StatusCode},
        middleware,
        response::Response,
        routing::get,
        Router,
    };
    use http_body_util::BodyExt;
    use std::time::Duration;
    use tower::ServiceExt;
    use uuid::Uuid;

    const COOKIE: &str = "formaura_session";
    const TOKEN: &str = "session-token-1";

    fn user(first_name: &str) -> ResolvedIdentity {
        ResolvedIdentity {
            user_id: 1,
            uuid: Uuid::nil(),
            email: "ada@example.com".to_string(),
            first_name: first_name.to_string(),
            last_name: "Lovelace".to_string(),
        }
    }

    async fn whoami(user: CurrentUser) -> String {
        user.first_name.clone()
    }

    fn guard(
        store: &Arc<IdentityStore>,
        lookup: &Arc<MockUserLookup>,
        policy: FreshnessPolicy,
    ) -> Arc<IdentityGuard> {
        Arc::new(IdentityGuard::new(
            Arc::clone(store),
            IdentityResolver::new(lookup.clone()),
            policy,
            COOKIE,
        ))
    }

    fn app(guard: Arc<IdentityGuard>) -> Router {
        Router::new()
            .route("/me", get(whoami))
            .route_layer(middleware::from_fn_with_state(guard, require_identity))
    }

    async fn call(app: &Router, token: Option<&str>) -> Response {
        let mut builder = HttpRequest::get("/me");
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }
        app.clone()
            .oneshot(builder.body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    async fn body_string(response: Response) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn store() -> Arc<IdentityStore> {
        Arc::new(IdentityStore::new(Duration::from_secs(60)))
    }

    #[test]
    fn test_policy_names() {
        assert_eq!(FreshnessPolicy::AlwaysFresh.to_string(), "always_fresh");
        assert_eq!(FreshnessPolicy::Cached.to_string(), "cached");
    }

    #[tokio::test]
    async fn test_missing_credential_rejected_without_resolving() {
        for policy in [FreshnessPolicy::AlwaysFresh, FreshnessPolicy::Cached] {
            let lookup = Arc::new(MockUserLookup::with_session(TOKEN, user("Ada")));
            let app = app(guard(&store(), &lookup, policy));

            let response = call(&app, None).await;

            assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{}", policy);
            assert_eq!(lookup.call_count(), 0, "{}", policy);
        }
    }

    #[tokio::test]
    async fn test_unknown_credential_rejected() {
        for policy in [FreshnessPolicy::AlwaysFresh, FreshnessPolicy::Cached] {
            let lookup = Arc::new(MockUserLookup::new());
            let store = store();
            let app = app(guard(&store, &lookup, policy));

            let response = call(&app, Some("unknown")).await;

            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
            assert_eq!(lookup.call_count(), 1, "failed lookups are not retried");
            assert!(store.is_empty().await);
        }
    }

    #[tokio::test]
    async fn test_lookup_failure_rejected_as_unauthorized() {
        let lookup = Arc::new(MockUserLookup::with_session(TOKEN, user("Ada")));
        lookup.set_failing(true);
        let app = app(guard(&store(), &lookup, FreshnessPolicy::AlwaysFresh));

        let response = call(&app, Some(TOKEN)).await;

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(lookup.call_count(), 1);
    }

    #[tokio::test]
    async fn test_cookie_credential_accepted() {
        let lookup = Arc::new(MockUserLookup::with_session(TOKEN, user("Ada")));
        let app = app(guard(&store(), &lookup, FreshnessPolicy::Cached));

        let response = app
            .oneshot(
                HttpRequest::get("/me")
                    .header("cookie", format!("{}={}", COOKIE, TOKEN))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "Ada");
    }

    #[tokio::test]
    async fn test_cached_policy_resolves_once() {
        let lookup = Arc::new(MockUserLookup::with_session(TOKEN, user("Ada")));
        let app = app(guard(&store(), &lookup, FreshnessPolicy::Cached));

        for _ in 0..3 {
            let response = call(&app, Some(TOKEN)).await;
            assert_eq!(response.status(), StatusCode::OK);
        }

        assert_eq!(lookup.call_count(), 1);
    }

    #[tokio::test]
    async fn test_always_fresh_resolves_every_request() {
        let lookup = Arc::new(MockUserLookup::with_session(TOKEN, user("Ada")));
        let app = app(guard(&store(), &lookup, FreshnessPolicy::AlwaysFresh));

        for _ in 0..3 {
            let response = call(&app, Some(TOKEN)).await;
            assert_eq!(response.status(), StatusCode::OK);
        }

        assert_eq!(lookup.call_count(), 3);
    }

    #[tokio::test]
    async fn test_policies_diverge_on_stale_entry() {
        let store = store();
        let lookup = Arc::new(MockUserLookup::with_session(TOKEN, user("Ada")));
        let cached = app(guard(&store, &lookup, FreshnessPolicy::Cached));
        let fresh = app(guard(&store, &lookup, FreshnessPolicy::AlwaysFresh));

        // Prime the cache, then change the record behind it
        assert_eq!(body_string(call(&cached, Some(TOKEN)).await).await, "Ada");
        lookup.insert_session(TOKEN, user("Augusta"));

        assert_eq!(body_string(call(&cached, Some(TOKEN)).await).await, "Ada");
        assert_eq!(body_string(call(&fresh, Some(TOKEN)).await).await, "Augusta");

        // AlwaysFresh wrote through, so the cached route now sees the update
        let key = Credential::new(TOKEN).unwrap().cache_key();
        assert_eq!(store.get(&key).await.unwrap().first_name, "Augusta");
        assert_eq!(body_string(call(&cached, Some(TOKEN)).await).await, "Augusta");
    }

    #[tokio::test]
    async fn test_always_fresh_warms_cache_for_cached_routes() {
        let store = store();
        let lookup = Arc::new(MockUserLookup::with_session(TOKEN, user("Ada")));
        let cached = app(guard(&store, &lookup, FreshnessPolicy::Cached));
        let fresh = app(guard(&store, &lookup, FreshnessPolicy::AlwaysFresh));

        assert_eq!(call(&fresh, Some(TOKEN)).await.status(), StatusCode::OK);
        assert_eq!(call(&cached, Some(TOKEN)).await.status(), StatusCode::OK);

        assert_eq!(lookup.call_count(), 1);
    }

    #[tokio::test]
    async fn test_always_fresh_rejects_revoked_session_even_when_cached() {
        let store = store();
        let lookup = Arc::new(MockUserLookup::with_session(TOKEN, user("Ada")));
        let cached = app(guard(&store, &lookup, FreshnessPolicy::Cached));
        let fresh = app(guard(&store, &lookup, FreshnessPolicy::AlwaysFresh));

        assert_eq!(call(&cached, Some(TOKEN)).await.status(), StatusCode::OK);
        lookup.remove_session(TOKEN);

        assert_eq!(
            call(&fresh, Some(TOKEN)).await.status(),
            StatusCode::UNAUTHORIZED
        );
        // Still inside the staleness window for cached routes
        assert_eq!(call(&cached, Some(TOKEN)).await.status(), StatusCode::OK);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cached_policy_resolves_again_after_expiry() {
        let store = Arc::new(IdentityStore::new(Duration::from_millis(100)));
        let lookup = Arc::new(MockUserLookup::with_session(TOKEN, user("Ada")));
        let app = app(guard(&store, &lookup, FreshnessPolicy::Cached));

        assert_eq!(call(&app, Some(TOKEN)).await.status(), StatusCode::OK);
        lookup.insert_session(TOKEN, user("Augusta"));

        tokio::time::advance(Duration::from_millis(150)).await;

        assert_eq!(body_string(call(&app, Some(TOKEN)).await).await, "Augusta");
        assert_eq!(lookup.call_count(), 2);
    }

    #[tokio::test]
    async fn test_invalidated_entry_forces_resolution() {
        let store = store();
        let lookup = Arc::new(MockUserLookup::with_session(TOKEN, user("Ada")));
        let app = app(guard(&store, &lookup, FreshnessPolicy::Cached));

        assert_eq!(call(&app, Some(TOKEN)).await.status(), StatusCode::OK);
        lookup.remove_session(TOKEN);
        store
            .invalidate(&Credential::new(TOKEN).unwrap().cache_key())
            .await;

        assert_eq!(
            call(&app, Some(TOKEN)).await.status(),
            StatusCode::UNAUTHORIZED
        );
    }
}
