//! Forms repository for database operations.

use crate::errors::FormError;
use crate::models::{AffiliateInfo, FormData, FormListingRow, FormRow};
use crate::observability::metrics;
use sqlx::types::Json;
use sqlx::PgPool;
use std::time::Instant;
use tracing::instrument;
use uuid::Uuid;

/// Outcome of replacing a form's affiliate set.
#[derive(Debug, Clone, PartialEq)]
pub enum AffiliateUpdate {
    /// The form now links exactly these affiliates.
    Updated(Vec<AffiliateInfo>),
    /// At least one requested affiliate does not exist or belongs to another user.
    UnknownAffiliate,
}

/// Forms repository.
pub struct FormsRepository;

fn db_error(operation: &'static str, start: Instant) -> impl FnOnce(sqlx::Error) -> FormError {
    move |e| {
        metrics::record_db_query(operation, "error", start.elapsed());
        FormError::Database(e.to_string())
    }
}

impl FormsRepository {
    /// Insert a new form owned by `user_id`.
    #[instrument(skip_all, name = "form.repo.create_form")]
    pub async fn create(
        pool: &PgPool,
        user_id: i32,
        name: &str,
        description: Option<&str>,
        form_data: &FormData,
    ) -> Result<FormRow, FormError> {
        let start = Instant::now();

        let form = sqlx::query_as::<_, FormRow>(
            r#"
            INSERT INTO forms (user_id, name, description, form_data)
            VALUES ($1, $2, $3, $4)
            RETURNING id, uuid, user_id, name, description, form_data, views,
                      created_at, updated_at
            "#,
        )
        .bind(user_id)
        .bind(name)
        .bind(description)
        .bind(Json(form_data))
        .fetch_one(pool)
        .await
        .map_err(db_error("create_form", start))?;

        metrics::record_db_query("create_form", "success", start.elapsed());

        Ok(form)
    }

    /// Fetch a form by its public uuid regardless of owner.
    #[instrument(skip_all, name = "form.repo.get_form")]
    pub async fn get_by_uuid(pool: &PgPool, uuid: Uuid) -> Result<Option<FormRow>, FormError> {
        let start = Instant::now();

        let form = sqlx::query_as::<_, FormRow>(
            r#"
            SELECT id, uuid, user_id, name, description, form_data, views,
                   created_at, updated_at
            FROM forms
            WHERE uuid = $1
            "#,
        )
        .bind(uuid)
        .fetch_optional(pool)
        .await
        .map_err(db_error("get_form", start))?;

        metrics::record_db_query("get_form", "success", start.elapsed());

        Ok(form)
    }

    /// Names of every form owned by `user_id`, newest first.
    #[instrument(skip_all, name = "form.repo.list_form_names")]
    pub async fn list_names_by_user(pool: &PgPool, user_id: i32) -> Result<Vec<String>, FormError> {
        let start = Instant::now();

        let names = sqlx::query_scalar::<_, String>(
            r#"
            SELECT name
            FROM forms
            WHERE user_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(pool)
        .await
        .map_err(db_error("list_form_names", start))?;

        metrics::record_db_query("list_form_names", "success", start.elapsed());

        Ok(names)
    }

    /// Forms owned by `user_id` with their affiliates and submission counts,
    /// newest first.
    #[instrument(skip_all, name = "form.repo.list_forms")]
    pub async fn detailed_listing_by_user(
        pool: &PgPool,
        user_id: i32,
    ) -> Result<Vec<FormListingRow>, FormError> {
        let start = Instant::now();

        // Affiliates and submissions are aggregated in separate subqueries so
        // neither multiplies the other.
        let forms = sqlx::query_as::<_, FormListingRow>(
            r#"
            SELECT
                f.uuid,
                f.name,
                f.description,
                f.created_at,
                f.updated_at,
                COALESCE(aff.affiliates, '[]'::jsonb) AS affiliates,
                COALESCE(subs.submission_count, 0) AS submission_count
            FROM forms f
            LEFT JOIN LATERAL (
                SELECT jsonb_agg(
                    jsonb_build_object(
                        'uuid', a.uuid,
                        'first_name', a.first_name,
                        'last_name', a.last_name
                    )
                    ORDER BY a.last_name, a.first_name, a.id
                ) AS affiliates
                FROM form_affiliates fa
                JOIN affiliates a ON a.id = fa.affiliate_id
                WHERE fa.form_id = f.id
            ) aff ON true
            LEFT JOIN LATERAL (
                SELECT COUNT(*) AS submission_count
                FROM form_submissions s
                WHERE s.form_id = f.id
            ) subs ON true
            WHERE f.user_id = $1
            ORDER BY f.created_at DESC, f.id DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(pool)
        .await
        .map_err(db_error("list_forms", start))?;

        metrics::record_db_query("list_forms", "success", start.elapsed());

        Ok(forms)
    }

    /// Update name and description.
    #[instrument(skip_all, name = "form.repo.update_form_meta")]
    pub async fn update_meta(
        pool: &PgPool,
        form_id: i32,
        name: &str,
        description: Option<&str>,
    ) -> Result<Option<FormRow>, FormError> {
        let start = Instant::now();

        let form = sqlx::query_as::<_, FormRow>(
            r#"
            UPDATE forms
            SET name = $1, description = $2, updated_at = NOW()
            WHERE id = $3
            RETURNING id, uuid, user_id, name, description, form_data, views,
                      created_at, updated_at
            "#,
        )
        .bind(name)
        .bind(description)
        .bind(form_id)
        .fetch_optional(pool)
        .await
        .map_err(db_error("update_form_meta", start))?;

        metrics::record_db_query("update_form_meta", "success", start.elapsed());

        Ok(form)
    }

    /// Replace the form definition.
    #[instrument(skip_all, name = "form.repo.update_form_data")]
    pub async fn update_form_data(
        pool: &PgPool,
        form_id: i32,
        form_data: &FormData,
    ) -> Result<Option<FormRow>, FormError> {
        let start = Instant::now();

        let form = sqlx::query_as::<_, FormRow>(
            r#"
            UPDATE forms
            SET form_data = $1, updated_at = NOW()
            WHERE id = $2
            RETURNING id, uuid, user_id, name, description, form_data, views,
                      created_at, updated_at
            "#,
        )
        .bind(Json(form_data))
        .bind(form_id)
        .fetch_optional(pool)
        .await
        .map_err(db_error("update_form_data", start))?;

        metrics::record_db_query("update_form_data", "success", start.elapsed());

        Ok(form)
    }

    /// Replace the set of affiliates linked to a form.
    ///
    /// Runs in a single transaction: either every requested affiliate is
    /// owned by `user_id` and the set is replaced, or nothing changes.
    #[instrument(skip_all, name = "form.repo.set_form_affiliates", fields(count = affiliate_uuids.len()))]
    pub async fn set_affiliates(
        pool: &PgPool,
        form_id: i32,
        user_id: i32,
        affiliate_uuids: &[Uuid],
    ) -> Result<AffiliateUpdate, FormError> {
        let start = Instant::now();
        let on_error = || db_error("set_form_affiliates", start);

        let mut tx = pool.begin().await.map_err(on_error())?;

        let affiliate_ids: Vec<i32> = sqlx::query_scalar(
            r#"
            SELECT id
            FROM affiliates
            WHERE uuid = ANY($1) AND user_id = $2
            "#,
        )
        .bind(affiliate_uuids)
        .bind(user_id)
        .fetch_all(&mut *tx)
        .await
        .map_err(on_error())?;

        if affiliate_ids.len() != affiliate_uuids.len() {
            // Dropping the transaction rolls it back
            metrics::record_db_query("set_form_affiliates", "success", start.elapsed());
            return Ok(AffiliateUpdate::UnknownAffiliate);
        }

        sqlx::query("DELETE FROM form_affiliates WHERE form_id = $1")
            .bind(form_id)
            .execute(&mut *tx)
            .await
            .map_err(on_error())?;

        sqlx::query(
            r#"
            INSERT INTO form_affiliates (form_id, affiliate_id)
            SELECT $1, UNNEST($2::int[])
            "#,
        )
        .bind(form_id)
        .bind(&affiliate_ids)
        .execute(&mut *tx)
        .await
        .map_err(on_error())?;

        sqlx::query("UPDATE forms SET updated_at = NOW() WHERE id = $1")
            .bind(form_id)
            .execute(&mut *tx)
            .await
            .map_err(on_error())?;

        let affiliates = sqlx::query_as::<_, (Uuid, String, String)>(
            r#"
            SELECT a.uuid, a.first_name, a.last_name
            FROM form_affiliates fa
            JOIN affiliates a ON a.id = fa.affiliate_id
            WHERE fa.form_id = $1
            ORDER BY a.last_name, a.first_name, a.id
            "#,
        )
        .bind(form_id)
        .fetch_all(&mut *tx)
        .await
        .map_err(on_error())?;

        tx.commit().await.map_err(on_error())?;

        metrics::record_db_query("set_form_affiliates", "success", start.elapsed());

        Ok(AffiliateUpdate::Updated(
            affiliates
                .into_iter()
                .map(|(uuid, first_name, last_name)| AffiliateInfo {
                    uuid,
                    first_name,
                    last_name,
                })
                .collect(),
        ))
    }

    /// Delete a form. Links and submissions go with it.
    ///
    /// Returns `false` if the form no longer exists.
    #[instrument(skip_all, name = "form.repo.delete_form")]
    pub async fn delete(pool: &PgPool, form_id: i32) -> Result<bool, FormError> {
        let start = Instant::now();

        let result = sqlx::query("DELETE FROM forms WHERE id = $1")
            .bind(form_id)
            .execute(pool)
            .await
            .map_err(db_error("delete_form", start))?;

        metrics::record_db_query("delete_form", "success", start.elapsed());

        Ok(result.rows_affected() > 0)
    }

    /// Count one public view of a form.
    #[instrument(skip_all, name = "form.repo.increment_views")]
    pub async fn increment_views(pool: &PgPool, form_id: i32) -> Result<(), FormError> {
        let start = Instant::now();

        sqlx::query("UPDATE forms SET views = views + 1 WHERE id = $1")
            .bind(form_id)
            .execute(pool)
            .await
            .map_err(db_error("increment_views", start))?;

        metrics::record_db_query("increment_views", "success", start.elapsed());

        Ok(())
    }
}
