//! Per-request identity binding.
//!
//! The auth middleware binds the resolved identity into the request
//! extensions; handlers read it back with the [`CurrentUser`] extractor.
//! Extensions belong to a single request, so a bound identity is never
//! visible to any other in-flight request.

use crate::auth::identity::ResolvedIdentity;
use crate::errors::AuthError;
use axum::async_trait;
use axum::extract::{FromRequestParts, Request};
use axum::http::request::Parts;
use std::ops::Deref;
use std::sync::Arc;

/// Extension wrapper so only this module can bind identities.
#[derive(Clone)]
struct BoundIdentity(Arc<ResolvedIdentity>);

/// Attach `identity` to the request, replacing any earlier binding.
pub fn bind_identity<B>(req: &mut Request<B>, identity: Arc<ResolvedIdentity>) {
    req.extensions_mut().insert(BoundIdentity(identity));
}

/// Extension trait for reading the bound identity from a request.
pub trait IdentityExt {
    /// The identity bound by the auth middleware, if any.
    fn identity(&self) -> Option<Arc<ResolvedIdentity>>;
}

impl<B> IdentityExt for Request<B> {
    fn identity(&self) -> Option<Arc<ResolvedIdentity>> {
        self.extensions()
            .get::<BoundIdentity>()
            .map(|bound| Arc::clone(&bound.0))
    }
}

/// Extractor for the authenticated user.
///
/// Rejects with `AuthError::BindingMissing` (500) when the route was not
/// wrapped in an identity guard.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Arc<ResolvedIdentity>);

impl Deref for CurrentUser {
    type Target = ResolvedIdentity;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<BoundIdentity>()
            .map(|bound| CurrentUser(Arc::clone(&bound.0)))
            .ok_or(AuthError::BindingMissing)
    }
}
