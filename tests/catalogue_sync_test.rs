mod common;

use std::sync::Arc;

use academy::catalogue::{CatalogueClient, HttpCatalogueClient, NoopCatalogueClient};
use academy::config::{CatalogueConfig, PricingConfig};
use academy::db;
use academy::models::{SyncAction, SyncStatus};
use academy::services::availability::expire_courses;
use academy::services::sync_service::SyncOutcome;
use academy::services::{CatalogueSync, SyncSettings};
use common::*;
use serde_json::json;
use sqlx::SqlitePool;
use wiremock::matchers::{basic_auth, body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn storefront() -> MockServer {
    let server = MockServer::start().await;
    // Listings are only ever created or updated.
    Mock::given(method("DELETE"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    server
}

fn sync_for(pool: &SqlitePool, server: &MockServer) -> CatalogueSync {
    let client = HttpCatalogueClient::new(CatalogueConfig {
        base_url: server.uri(),
        consumer_key: "ck_test".to_string(),
        consumer_secret: "cs_test".to_string(),
        timeout_secs: 5,
        max_attempts: 2,
    })
    .unwrap();
    sync_with(pool, Arc::new(client))
}

fn sync_with(pool: &SqlitePool, client: Arc<dyn CatalogueClient>) -> CatalogueSync {
    CatalogueSync::new(
        pool.clone(),
        client,
        SyncSettings {
            public_base_url: "https://school.example".to_string(),
            max_attempts: 2,
            pricing: PricingConfig::default(),
        },
    )
}

#[tokio::test]
async fn test_published_course_is_created() {
    let pool = setup_test_db().await;
    let server = storefront().await;
    let course = create_test_course(&pool, json!({})).await;

    Mock::given(method("POST"))
        .and(path("/products"))
        .and(basic_auth("ck_test", "cs_test"))
        .and(body_partial_json(json!({
            "type": "external",
            "status": "publish",
            "button_text": "Enrol Now",
            "external_url": format!("https://school.example/enrol?course={}", course.id),
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "id": 501 })))
        .expect(1)
        .mount(&server)
        .await;

    let report = sync_for(&pool, &server).sync_course(course.id, today()).await.unwrap();
    assert_eq!(report.outcome, SyncOutcome::Created);
    assert_eq!(report.external_id.as_deref(), Some("501"));
    assert_eq!(report.attempts, 1);

    let stored = db::courses::fetch_course(&pool, course.id).await.unwrap().unwrap();
    assert_eq!(stored.external_id.as_deref(), Some("501"));

    let logs = db::sync_logs::fetch_for_course(&pool, course.id).await.unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].action, SyncAction::Create);
    assert_eq!(logs[0].status, SyncStatus::Success);
    assert!(logs[0].request_payload.contains("Watercolour Basics"));
}

#[tokio::test]
async fn test_unlisted_draft_is_skipped() {
    let pool = setup_test_db().await;
    let server = storefront().await;
    let course = create_test_course(&pool, json!({ "status": "draft" })).await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "id": 1 })))
        .expect(0)
        .mount(&server)
        .await;

    let report = sync_for(&pool, &server).sync_course(course.id, today()).await.unwrap();
    assert_eq!(report.outcome, SyncOutcome::Skipped);
    assert!(db::sync_logs::fetch_for_course(&pool, course.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_listed_course_is_updated_in_place() {
    let pool = setup_test_db().await;
    let server = storefront().await;
    let course = create_test_course(&pool, json!({})).await;
    db::courses::set_external_id(&pool, course.id, "77").await.unwrap();

    Mock::given(method("PUT"))
        .and(path("/products/77"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "77" })))
        .expect(1)
        .mount(&server)
        .await;

    let report = sync_for(&pool, &server).sync_course(course.id, today()).await.unwrap();
    assert_eq!(report.outcome, SyncOutcome::Updated);
    assert_eq!(report.external_id.as_deref(), Some("77"));
}

#[tokio::test]
async fn test_expired_course_goes_to_draft() {
    let pool = setup_test_db().await;
    let server = storefront().await;
    let course = create_test_course(
        &pool,
        json!({ "start_date": "2026-01-05", "end_date": "2026-02-23" }),
    )
    .await;
    db::courses::set_external_id(&pool, course.id, "88").await.unwrap();
    expire_courses(&pool, today()).await.unwrap();

    Mock::given(method("PUT"))
        .and(path("/products/88"))
        .and(body_partial_json(json!({ "status": "draft" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": 88 })))
        .expect(1)
        .mount(&server)
        .await;

    let report = sync_for(&pool, &server).sync_course(course.id, today()).await.unwrap();
    assert_eq!(report.outcome, SyncOutcome::Updated);
}

#[tokio::test]
async fn test_missing_listing_is_recreated() {
    let pool = setup_test_db().await;
    let server = storefront().await;
    let course = create_test_course(&pool, json!({})).await;
    db::courses::set_external_id(&pool, course.id, "42").await.unwrap();

    Mock::given(method("PUT"))
        .and(path("/products/42"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({ "code": "invalid_id" })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/products"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "id": 900 })))
        .expect(1)
        .mount(&server)
        .await;

    let report = sync_for(&pool, &server).sync_course(course.id, today()).await.unwrap();
    assert_eq!(report.outcome, SyncOutcome::Recreated);
    assert_eq!(report.external_id.as_deref(), Some("900"));

    let stored = db::courses::fetch_course(&pool, course.id).await.unwrap().unwrap();
    assert_eq!(stored.external_id.as_deref(), Some("900"));

    let logs = db::sync_logs::fetch_for_course(&pool, course.id).await.unwrap();
    let trail: Vec<_> = logs.iter().map(|l| (l.action, l.status)).collect();
    assert_eq!(
        trail,
        vec![
            (SyncAction::Update, SyncStatus::Failed),
            (SyncAction::Recreate, SyncStatus::Success),
        ]
    );
}

#[tokio::test]
async fn test_server_error_is_retried_once() {
    let pool = setup_test_db().await;
    let server = storefront().await;
    let course = create_test_course(&pool, json!({})).await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "id": 12 })))
        .with_priority(2)
        .mount(&server)
        .await;

    let report = sync_for(&pool, &server).sync_course(course.id, today()).await.unwrap();
    assert_eq!(report.outcome, SyncOutcome::Created);
    assert_eq!(report.attempts, 2);

    let logs = db::sync_logs::fetch_for_course(&pool, course.id).await.unwrap();
    let retries: Vec<_> = logs.iter().map(|l| (l.status, l.retry_count)).collect();
    assert_eq!(retries, vec![(SyncStatus::Failed, 0), (SyncStatus::Success, 1)]);
}

#[tokio::test]
async fn test_client_error_is_not_retried() {
    let pool = setup_test_db().await;
    let server = storefront().await;
    let course = create_test_course(&pool, json!({})).await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(400).set_body_string("bad price"))
        .expect(1)
        .mount(&server)
        .await;

    let report = sync_for(&pool, &server).sync_course(course.id, today()).await.unwrap();
    assert_eq!(report.outcome, SyncOutcome::Failed);
    assert_eq!(report.attempts, 1);
    assert!(report.error.unwrap().contains("400"));
}

#[tokio::test]
async fn test_failed_courses_can_be_retried_later() {
    let pool = setup_test_db().await;
    let server = storefront().await;
    let course = create_test_course(&pool, json!({})).await;
    let draft = create_test_course(&pool, json!({ "status": "draft", "name": "Later" })).await;
    let sync = sync_for(&pool, &server);

    let down = Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(2)
        .mount_as_scoped(&server)
        .await;
    let report = sync.sync_course(course.id, today()).await.unwrap();
    assert_eq!(report.outcome, SyncOutcome::Failed);
    assert_eq!(report.attempts, 2);
    drop(down);

    let pending = sync.unsynced_courses().await.unwrap();
    let ids: Vec<_> = pending.iter().map(|c| c.id).collect();
    assert_eq!(ids, vec![course.id]);
    assert!(!ids.contains(&draft.id));

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "id": 31 })))
        .expect(1)
        .mount(&server)
        .await;

    let batch = sync.retry_unsynced(today()).await.unwrap();
    assert_eq!(batch.attempted, 1);
    assert_eq!(batch.succeeded, 1);
    assert!(sync.unsynced_courses().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_noop_client_reports_disabled() {
    let pool = setup_test_db().await;
    let course = create_test_course(&pool, json!({})).await;

    let report = sync_with(&pool, Arc::new(NoopCatalogueClient))
        .sync_course(course.id, today())
        .await
        .unwrap();
    assert_eq!(report.outcome, SyncOutcome::Disabled);
    assert!(db::sync_logs::fetch_for_course(&pool, course.id).await.unwrap().is_empty());
}
