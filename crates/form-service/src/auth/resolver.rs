//! Identity resolution against the system of record.
//!
//! The resolver turns a credential into a [`ResolvedIdentity`] by asking a
//! [`UserLookup`] implementation (the Postgres sessions/users tables in
//! production, an in-memory mock in tests). It holds no mutable state and is
//! safe to call from any number of requests at once.

use crate::auth::credential::Credential;
use crate::auth::identity::ResolvedIdentity;
use std::sync::Arc;
use thiserror::Error;
use tracing::instrument;

/// Failure of the backing user lookup itself (not "user unknown").
#[derive(Debug, Error)]
#[error("User lookup failed: {0}")]
pub struct LookupError(pub String);

impl From<sqlx::Error> for LookupError {
    fn from(err: sqlx::Error) -> Self {
        LookupError(err.to_string())
    }
}

/// Authority-of-record lookup from credential digest to user.
#[async_trait::async_trait]
pub trait UserLookup: Send + Sync {
    /// Find the active user owning the session with this credential digest.
    ///
    /// Returns `Ok(None)` when the session is unknown, revoked or expired, or
    /// the user is inactive.
    async fn find_by_credential(
        &self,
        credential_key: &str,
    ) -> Result<Option<ResolvedIdentity>, LookupError>;
}

/// Why a credential could not be resolved.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// The credential does not belong to a known, active user.
    #[error("Credential does not match an active user")]
    NotFound,

    /// The lookup could not be completed.
    #[error("Identity lookup unavailable: {0}")]
    Unavailable(String),
}

/// Resolves credentials to identities through a [`UserLookup`].
#[derive(Clone)]
pub struct IdentityResolver {
    lookup: Arc<dyn UserLookup>,
}

impl IdentityResolver {
    pub fn new(lookup: Arc<dyn UserLookup>) -> Self {
        Self { lookup }
    }

    /// Resolve a credential to the identity currently on record.
    ///
    /// # Errors
    ///
    /// - `ResolveError::NotFound` if no active user owns the credential
    /// - `ResolveError::Unavailable` if the lookup failed
    #[instrument(skip_all, name = "form.auth.resolve")]
    pub async fn resolve(&self, credential: &Credential) -> Result<ResolvedIdentity, ResolveError> {
        match self.lookup.find_by_credential(&credential.cache_key()).await {
            Ok(Some(identity)) => {
                tracing::debug!(target: "form.auth.resolver", user_id = identity.user_id, "Identity resolved");
                Ok(identity)
            }
            Ok(None) => {
                tracing::debug!(target: "form.auth.resolver", "Credential not recognized");
                Err(ResolveError::NotFound)
            }
            Err(e) => {
                tracing::warn!(target: "form.auth.resolver", error = %e, "Identity lookup failed");
                Err(ResolveError::Unavailable(e.0))
            }
        }
    }
}

/// Mock user lookup for testing.
///
/// Sessions are keyed by raw token; the mock hashes them the same way the
/// real session table does.
pub mod mock {
    use super::*;
    use crate::auth::credential::hash_token;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::RwLock;

    /// In-memory [`UserLookup`] with call counting and failure injection.
    #[derive(Default)]
    pub struct MockUserLookup {
        sessions: RwLock<HashMap<String, ResolvedIdentity>>,
        call_count: AtomicUsize,
        failing: AtomicBool,
    }

    impl MockUserLookup {
        /// Create an empty lookup that knows no sessions.
        pub fn new() -> Self {
            Self::default()
        }

        /// Create a lookup that knows a single session.
        pub fn with_session(token: &str, identity: ResolvedIdentity) -> Self {
            let lookup = Self::new();
            lookup.insert_session(token, identity);
            lookup
        }

        /// Register or replace the identity behind a session token.
        pub fn insert_session(&self, token: &str, identity: ResolvedIdentity) {
            if let Ok(mut sessions) = self.sessions.write() {
                sessions.insert(hash_token(token), identity);
            }
        }

        /// Forget a session token.
        pub fn remove_session(&self, token: &str) {
            if let Ok(mut sessions) = self.sessions.write() {
                sessions.remove(&hash_token(token));
            }
        }

        /// Make every subsequent lookup fail (or succeed again).
        pub fn set_failing(&self, failing: bool) {
            self.failing.store(failing, Ordering::SeqCst);
        }

        /// Number of lookups performed.
        pub fn call_count(&self) -> usize {
            self.call_count.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl UserLookup for MockUserLookup {
        async fn find_by_credential(
            &self,
            credential_key: &str,
        ) -> Result<Option<ResolvedIdentity>, LookupError> {
            self.call_count.fetch_add(1, Ordering::SeqCst);

            if self.failing.load(Ordering::SeqCst) {
                return Err(LookupError("mock lookup failure".to_string()));
            }

            let sessions = self
                .sessions
                .read()
                .map_err(|_| LookupError("mock lookup poisoned".to_string()))?;
            Ok(sessions.get(credential_key).cloned())
        }
    }
}

pub use mock::MockUserLookup;
