//! Form submissions repository.

use crate::errors::FormError;
use crate::models::SubmissionReceipt;
use crate::observability::metrics;
use sqlx::types::Json;
use sqlx::PgPool;
use std::time::Instant;
use tracing::instrument;

/// Submissions repository.
pub struct SubmissionsRepository;

impl SubmissionsRepository {
    /// Store one submission for a form.
    #[instrument(skip_all, name = "form.repo.create_submission")]
    pub async fn create(
        pool: &PgPool,
        form_id: i32,
        data: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<SubmissionReceipt, FormError> {
        let start = Instant::now();

        let receipt = sqlx::query_as::<_, SubmissionReceipt>(
            r#"
            INSERT INTO form_submissions (form_id, data)
            VALUES ($1, $2)
            RETURNING uuid, created_at
            "#,
        )
        .bind(form_id)
        .bind(Json(data))
        .fetch_one(pool)
        .await
        .map_err(|e| {
            metrics::record_db_query("create_submission", "error", start.elapsed());
            FormError::Database(e.to_string())
        })?;

        metrics::record_db_query("create_submission", "success", start.elapsed());

        Ok(receipt)
    }
}
