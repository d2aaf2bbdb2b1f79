//! Public form filling integration tests.

use form_service::repositories::FormsRepository;
use form_test_utils::{create_user, TestFormServer};
use serde_json::{json, Value};
use sqlx::PgPool;
use std::time::Duration;

async fn create_form(server: &TestFormServer, bearer: &str) -> Result<String, anyhow::Error> {
    let body: Value = reqwest::Client::new()
        .post(format!("{}/api/forms", server.url()))
        .header("Authorization", bearer)
        .send()
        .await?
        .json()
        .await?;

    Ok(body["form"]["uuid"].as_str().unwrap_or_default().to_string())
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_public_form_counts_views(pool: PgPool) -> Result<(), anyhow::Error> {
    let server = TestFormServer::spawn(pool.clone()).await?;
    let ada = create_user(&pool, "ada@example.com", "Ada", "Lovelace").await?;
    let form_uuid = create_form(&server, &ada.bearer()).await?;

    let response = reqwest::get(format!("{}/api/submissions/{}", server.url(), form_uuid)).await?;
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await?;
    assert_eq!(body["form"]["uuid"], form_uuid.as_str());
    assert!(body["form"].get("user_id").is_none());

    // The counter is updated off the request path
    let form_uuid = uuid::Uuid::parse_str(&form_uuid)?;
    let mut views = 0;
    for _ in 0..50 {
        views = FormsRepository::get_by_uuid(&pool, form_uuid)
            .await?
            .map(|form| form.views)
            .unwrap_or_default();
        if views == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(views, 1);

    Ok(())
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_public_form_missing_or_invalid(pool: PgPool) -> Result<(), anyhow::Error> {
    let server = TestFormServer::spawn(pool).await?;

    let response = reqwest::get(format!(
        "{}/api/submissions/550e8400-e29b-41d4-a716-446655440000",
        server.url()
    ))
    .await?;
    assert_eq!(response.status(), 404);

    let response = reqwest::get(format!("{}/api/submissions/12345", server.url())).await?;
    assert_eq!(response.status(), 400);

    Ok(())
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_submit_form_stores_answers(pool: PgPool) -> Result<(), anyhow::Error> {
    let server = TestFormServer::spawn(pool.clone()).await?;
    let ada = create_user(&pool, "ada@example.com", "Ada", "Lovelace").await?;
    let form_uuid = create_form(&server, &ada.bearer()).await?;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/api/submissions/{}/submit", server.url(), form_uuid))
        .json(&json!({"data": {"email": "visitor@example.com", "consent": true}}))
        .send()
        .await?;
    assert_eq!(response.status(), 201);
    let body: Value = response.json().await?;
    assert!(body["submission"]["uuid"].is_string());
    assert!(body["submission"]["created_at"].is_string());

    let form = FormsRepository::get_by_uuid(&pool, uuid::Uuid::parse_str(&form_uuid)?)
        .await?
        .ok_or_else(|| anyhow::anyhow!("form vanished"))?;
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM form_submissions WHERE form_id = $1")
        .bind(form.id)
        .fetch_one(&pool)
        .await?;
    assert_eq!(count, 1);

    let stored: Value =
        sqlx::query_scalar("SELECT data FROM form_submissions WHERE form_id = $1")
            .bind(form.id)
            .fetch_one(&pool)
            .await?;
    assert_eq!(stored["consent"], true);

    Ok(())
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_submit_rejects_bad_payloads(pool: PgPool) -> Result<(), anyhow::Error> {
    let server = TestFormServer::spawn(pool.clone()).await?;
    let ada = create_user(&pool, "ada@example.com", "Ada", "Lovelace").await?;
    let form_uuid = create_form(&server, &ada.bearer()).await?;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/api/submissions/{}/submit", server.url(), form_uuid))
        .json(&json!({"data": ["not", "an", "object"]}))
        .send()
        .await?;
    assert_eq!(response.status(), 422);

    let response = client
        .post(format!(
            "{}/api/submissions/550e8400-e29b-41d4-a716-446655440000/submit",
            server.url()
        ))
        .json(&json!({"data": {}}))
        .send()
        .await?;
    assert_eq!(response.status(), 404);

    Ok(())
}
