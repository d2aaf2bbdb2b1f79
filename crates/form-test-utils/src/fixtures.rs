//! Database fixtures.
//!
//! Sessions normally come from the sign-in service; tests create them here
//! with the same digest scheme the service uses.

use form_service::auth::credential::hash_token;
use sqlx::PgPool;
use uuid::Uuid;

/// A user with one active session.
#[derive(Debug, Clone)]
pub struct TestUser {
    pub id: i32,
    pub uuid: Uuid,
    pub email: String,
    /// Raw session token, as a client would send it.
    pub token: String,
}

impl TestUser {
    /// `Authorization` header value for this user's session.
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.token)
    }
}

/// Insert an active user with a session valid for one hour.
pub async fn create_user(
    pool: &PgPool,
    email: &str,
    first_name: &str,
    last_name: &str,
) -> Result<TestUser, anyhow::Error> {
    let (id, uuid): (i32, Uuid) = sqlx::query_as(
        r#"
        INSERT INTO users (email, first_name, last_name)
        VALUES ($1, $2, $3)
        RETURNING id, uuid
        "#,
    )
    .bind(email)
    .bind(first_name)
    .bind(last_name)
    .fetch_one(pool)
    .await?;

    let token = create_session(pool, id, 3600).await?;

    Ok(TestUser {
        id,
        uuid,
        email: email.to_string(),
        token,
    })
}

/// Insert a session for `user_id` expiring `ttl_seconds` from now (negative
/// for an already expired session). Returns the raw token.
pub async fn create_session(
    pool: &PgPool,
    user_id: i32,
    ttl_seconds: i64,
) -> Result<String, anyhow::Error> {
    let token = format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple());

    sqlx::query(
        r#"
        INSERT INTO sessions (token_hash, user_id, expires_at)
        VALUES ($1, $2, NOW() + make_interval(secs => $3))
        "#,
    )
    .bind(hash_token(&token))
    .bind(user_id)
    .bind(ttl_seconds as f64)
    .execute(pool)
    .await?;

    Ok(token)
}

/// Mark every session of `user_id` revoked.
pub async fn revoke_sessions(pool: &PgPool, user_id: i32) -> Result<(), anyhow::Error> {
    sqlx::query("UPDATE sessions SET revoked_at = NOW() WHERE user_id = $1")
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Deactivate a user account.
pub async fn deactivate_user(pool: &PgPool, user_id: i32) -> Result<(), anyhow::Error> {
    sqlx::query("UPDATE users SET is_active = false, updated_at = NOW() WHERE id = $1")
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Change a user's first name.
pub async fn rename_user(pool: &PgPool, user_id: i32, first_name: &str) -> Result<(), anyhow::Error> {
    sqlx::query("UPDATE users SET first_name = $1, updated_at = NOW() WHERE id = $2")
        .bind(first_name)
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(())
}
