//! Users and sessions.
//!
//! Sessions are written by the sign-in flow. This service only resolves them
//! to users and revokes them on logout. Tokens are never stored; rows are
//! keyed by the hex SHA-256 digest produced by `Credential::cache_key`.

use crate::auth::{LookupError, ResolvedIdentity, UserLookup};
use crate::errors::FormError;
use crate::observability::metrics;
use sqlx::{PgPool, Row};
use std::time::Instant;
use tracing::instrument;

/// [`UserLookup`] backed by the `sessions` and `users` tables.
#[derive(Clone)]
pub struct PgUserLookup {
    pool: PgPool,
}

impl PgUserLookup {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl UserLookup for PgUserLookup {
    #[instrument(skip_all, name = "form.repo.find_session_user")]
    async fn find_by_credential(
        &self,
        credential_key: &str,
    ) -> Result<Option<ResolvedIdentity>, LookupError> {
        let start = Instant::now();

        let row = sqlx::query(
            r#"
            SELECT u.id, u.uuid, u.email, u.first_name, u.last_name
            FROM sessions s
            JOIN users u ON u.id = s.user_id
            WHERE s.token_hash = $1
              AND s.revoked_at IS NULL
              AND s.expires_at > NOW()
              AND u.is_active = true
            "#,
        )
        .bind(credential_key)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            metrics::record_db_query("find_session_user", "error", start.elapsed());
            LookupError::from(e)
        })?;

        metrics::record_db_query("find_session_user", "success", start.elapsed());

        row.map(|row| -> Result<ResolvedIdentity, sqlx::Error> {
            Ok(ResolvedIdentity {
                user_id: row.try_get("id")?,
                uuid: row.try_get("uuid")?,
                email: row.try_get("email")?,
                first_name: row.try_get("first_name")?,
                last_name: row.try_get("last_name")?,
            })
        })
        .transpose()
        .map_err(LookupError::from)
    }
}

/// Session repository.
pub struct SessionsRepository;

impl SessionsRepository {
    /// Mark a session revoked.
    ///
    /// Returns `true` if an active session was revoked, `false` if it was
    /// unknown or already revoked.
    #[instrument(skip_all, name = "form.repo.revoke_session")]
    pub async fn revoke(pool: &PgPool, token_hash: &str) -> Result<bool, FormError> {
        let start = Instant::now();

        let result = sqlx::query(
            r#"
            UPDATE sessions
            SET revoked_at = NOW()
            WHERE token_hash = $1 AND revoked_at IS NULL
            "#,
        )
        .bind(token_hash)
        .execute(pool)
        .await
        .map_err(|e| {
            metrics::record_db_query("revoke_session", "error", start.elapsed());
            FormError::Database(e.to_string())
        })?;

        metrics::record_db_query("revoke_session", "success", start.elapsed());

        Ok(result.rows_affected() > 0)
    }
}
