//! Resolved user identity.

use uuid::Uuid;

/// Snapshot of an authenticated user.
///
/// Produced by the identity resolver from the system of record and shared
/// through the identity store as `Arc<ResolvedIdentity>`. It holds plain data
/// only, so a cached copy can never reach back into the database or be
/// mutated by one request while another request reads it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedIdentity {
    /// Internal user ID (foreign key for forms and affiliates).
    pub user_id: i32,

    /// Public user identifier.
    pub uuid: Uuid,

    /// Login email.
    pub email: String,

    pub first_name: String,

    pub last_name: String,
}
