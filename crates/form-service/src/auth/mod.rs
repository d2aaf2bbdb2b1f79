//! Session authentication.
//!
//! # Components
//!
//! - `credential` - Session token extraction and digesting
//! - `identity` - The resolved user snapshot
//! - `store` - Process-wide, time-bounded identity store
//! - `resolver` - Authoritative credential -> identity lookup
//! - `context` - Per-request identity binding for handlers
//!
//! The freshness policies that combine these live in `middleware::auth`.

pub mod context;
pub mod credential;
pub mod identity;
pub mod resolver;
pub mod store;

pub use context::{bind_identity, CurrentUser, IdentityExt};
pub use credential::Credential;
pub use identity::ResolvedIdentity;
pub use resolver::{IdentityResolver, LookupError, MockUserLookup, ResolveError, UserLookup};
pub use store::{IdentityStore, DEFAULT_IDENTITY_TTL};
