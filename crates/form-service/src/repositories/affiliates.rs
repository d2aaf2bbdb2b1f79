//! Affiliates repository.

use crate::errors::FormError;
use crate::models::AffiliateRow;
use crate::observability::metrics;
use sqlx::PgPool;
use std::time::Instant;
use tracing::instrument;

/// Affiliates repository.
pub struct AffiliatesRepository;

impl AffiliatesRepository {
    /// Insert an affiliate owned by `user_id`.
    ///
    /// Blank optional fields are stored as NULL.
    #[instrument(skip_all, name = "form.repo.create_affiliate")]
    pub async fn create(
        pool: &PgPool,
        user_id: i32,
        first_name: &str,
        last_name: &str,
        email: Option<&str>,
        company: Option<&str>,
    ) -> Result<AffiliateRow, FormError> {
        let start = Instant::now();
        let email = email.map(str::trim).filter(|s| !s.is_empty());
        let company = company.map(str::trim).filter(|s| !s.is_empty());

        let affiliate = sqlx::query_as::<_, AffiliateRow>(
            r#"
            INSERT INTO affiliates (user_id, first_name, last_name, email, company)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, uuid, user_id, first_name, last_name, email, company,
                      created_at, updated_at
            "#,
        )
        .bind(user_id)
        .bind(first_name.trim())
        .bind(last_name.trim())
        .bind(email)
        .bind(company)
        .fetch_one(pool)
        .await
        .map_err(|e| {
            metrics::record_db_query("create_affiliate", "error", start.elapsed());
            FormError::Database(e.to_string())
        })?;

        metrics::record_db_query("create_affiliate", "success", start.elapsed());

        Ok(affiliate)
    }

    /// Affiliates owned by `user_id`, ordered by name.
    #[instrument(skip_all, name = "form.repo.list_affiliates")]
    pub async fn list_by_user(pool: &PgPool, user_id: i32) -> Result<Vec<AffiliateRow>, FormError> {
        let start = Instant::now();

        let affiliates = sqlx::query_as::<_, AffiliateRow>(
            r#"
            SELECT id, uuid, user_id, first_name, last_name, email, company,
                   created_at, updated_at
            FROM affiliates
            WHERE user_id = $1
            ORDER BY last_name, first_name, id
            "#,
        )
        .bind(user_id)
        .fetch_all(pool)
        .await
        .map_err(|e| {
            metrics::record_db_query("list_affiliates", "error", start.elapsed());
            FormError::Database(e.to_string())
        })?;

        metrics::record_db_query("list_affiliates", "success", start.elapsed());

        Ok(affiliates)
    }
}
