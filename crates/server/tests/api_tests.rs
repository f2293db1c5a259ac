//! API tests against the in-process router with mock providers.

mod common;

use std::time::Duration;

use axum::http::StatusCode;
use serde_json::json;

use prospector_core::DispatchEvent;

use common::{fixtures, TestConfig, TestFixture};

// ============================================================================
// Health, config, auth
// ============================================================================

#[tokio::test]
async fn test_health_reports_config_hash() {
    let fixture = TestFixture::new().await;

    let response = fixture.get("/api/v1/health").await;

    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["status"], "ok");
    assert_eq!(response.body["config_hash"], "0123456789abcdef");
}

#[tokio::test]
async fn test_config_hides_secrets() {
    let fixture = TestFixture::with_config(TestConfig::default().with_api_key("s3cret")).await;

    let response = fixture.get_with_token("/api/v1/config", "s3cret").await;

    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["auth"]["method"], "api_key");
    assert_eq!(response.body["llm"]["api_key_configured"], false);
    assert!(!response.body.to_string().contains("s3cret"));
}

#[tokio::test]
async fn test_api_key_required_on_api_routes() {
    let fixture = TestFixture::with_config(TestConfig::default().with_api_key("s3cret")).await;

    let missing = fixture.get("/api/v1/session").await;
    assert_status!(missing, StatusCode::UNAUTHORIZED);

    let wrong = fixture.get_with_token("/api/v1/session", "nope").await;
    assert_status!(wrong, StatusCode::UNAUTHORIZED);

    let ok = fixture.get_with_token("/api/v1/session", "s3cret").await;
    assert_status!(ok, StatusCode::OK);

    // Scrapes stay open
    let metrics = fixture.get("/metrics").await;
    assert_status!(metrics, StatusCode::OK);
}

#[tokio::test]
async fn test_metrics_exposes_gauges() {
    let fixture = TestFixture::new().await;

    let response = fixture.get("/metrics").await;

    assert_status!(response, StatusCode::OK);
    let text = response.body.as_str().unwrap_or_default();
    assert!(text.contains("prospector_quota_remaining"), "{}", text);
}

// ============================================================================
// Session and senders
// ============================================================================

#[tokio::test]
async fn test_session_never_exposes_tokens() {
    let fixture =
        TestFixture::with_config(TestConfig::default().with_senders(&["a@agency.com"])).await;

    let response = fixture.get("/api/v1/session").await;

    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["quota"], 10);
    assert_eq!(response.body["profile"]["company_name"], "Prospector Ltd");
    assert_eq!(response.body["senders"][0]["email"], "a@agency.com");
    assert_eq!(response.body["senders"][0]["next_up"], true);
    assert!(!response.body.to_string().contains("token-"));
}

#[tokio::test]
async fn test_add_credits() {
    let fixture = TestFixture::new().await;

    let response = fixture
        .post("/api/v1/session/credits", json!({ "credits": 5 }))
        .await;
    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["quota"], 15);

    let zero = fixture
        .post("/api/v1/session/credits", json!({ "credits": 0 }))
        .await;
    assert_status!(zero, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_update_profile_requires_company_name() {
    let fixture = TestFixture::new().await;

    let bad = fixture
        .put("/api/v1/session/profile", json!({ "company_name": "  " }))
        .await;
    assert_status!(bad, StatusCode::BAD_REQUEST);

    let good = fixture
        .put(
            "/api/v1/session/profile",
            json!({ "company_name": "Kuzey Dijital", "sector": "Ajans" }),
        )
        .await;
    assert_status!(good, StatusCode::OK);
    assert_eq!(fixture.session.profile().await.company_name, "Kuzey Dijital");
}

#[tokio::test]
async fn test_sender_link_and_unlink() {
    let fixture = TestFixture::new().await;

    let invalid = fixture
        .post(
            "/api/v1/senders",
            json!({ "email": "not-an-email", "access_token": "t" }),
        )
        .await;
    assert_status!(invalid, StatusCode::BAD_REQUEST);

    let created = fixture
        .post(
            "/api/v1/senders",
            json!({ "email": "b@agency.com", "access_token": "tok" }),
        )
        .await;
    assert_status!(created, StatusCode::CREATED);
    assert_eq!(created.body["next_up"], true);
    let id = created.body["id"].as_str().unwrap().to_string();

    let list = fixture.get("/api/v1/senders").await;
    assert_eq!(list.body.as_array().unwrap().len(), 1);

    let removed = fixture.delete(&format!("/api/v1/senders/{}", id)).await;
    assert_status!(removed, StatusCode::NO_CONTENT);

    let missing = fixture.delete(&format!("/api/v1/senders/{}", id)).await;
    assert_status!(missing, StatusCode::NOT_FOUND);
}

// ============================================================================
// Pipeline
// ============================================================================

#[tokio::test]
async fn test_pipeline_run_enriches_and_charges() {
    let fixture = TestFixture::new().await;

    let response = fixture
        .post(
            "/api/v1/pipeline/run",
            json!({ "query": "Yazılım şirketleri", "location": "İstanbul" }),
        )
        .await;
    assert_status!(response, StatusCode::ACCEPTED);
    assert_eq!(response.body["limit"], 5);

    fixture.wait_for_pipeline().await;

    let leads = fixture.get("/api/v1/leads").await;
    assert_eq!(leads.body["total"], 3);
    let completed = fixture.get("/api/v1/leads?status=completed").await;
    assert_eq!(completed.body["total"], 3);

    let status = fixture.get("/api/v1/pipeline/status").await;
    assert_eq!(status.body["running"], false);
    assert_eq!(status.body["last_run"]["enriched"], 3);

    assert_eq!(fixture.session.quota().await, 7);
}

#[tokio::test]
async fn test_pipeline_rejects_empty_query() {
    let fixture = TestFixture::new().await;

    let response = fixture
        .post("/api/v1/pipeline/run", json!({ "query": "   " }))
        .await;

    assert_status!(response, StatusCode::BAD_REQUEST);
    assert_eq!(fixture.extractor.call_count(), 0);
}

#[tokio::test]
async fn test_pipeline_without_credits_is_payment_required() {
    let fixture = TestFixture::with_config(TestConfig::default().with_quota(0)).await;

    let response = fixture
        .post("/api/v1/pipeline/run", json!({ "query": "Ajanslar" }))
        .await;

    assert_status!(response, StatusCode::PAYMENT_REQUIRED);
    assert_eq!(fixture.extractor.call_count(), 0);
    assert!(!fixture.pipeline.is_running());
}

#[tokio::test]
async fn test_second_run_conflicts_then_cancel() {
    let fixture = TestFixture::with_config(
        TestConfig::default().with_enrich_delay(Duration::from_millis(200)),
    )
    .await;

    let first = fixture
        .post("/api/v1/pipeline/run", json!({ "query": "Ajanslar" }))
        .await;
    assert_status!(first, StatusCode::ACCEPTED);

    let second = fixture
        .post("/api/v1/pipeline/run", json!({ "query": "Ajanslar" }))
        .await;
    assert_status!(second, StatusCode::CONFLICT);

    let cancel = fixture.post_empty("/api/v1/pipeline/cancel").await;
    assert_status!(cancel, StatusCode::OK);
    assert_eq!(cancel.body["cancelled"], true);

    fixture.wait_for_pipeline().await;
    assert!(fixture.enricher.call_count() < 3);

    let idle = fixture.post_empty("/api/v1/pipeline/cancel").await;
    assert_eq!(idle.body["cancelled"], false);
}

// ============================================================================
// Leads
// ============================================================================

#[tokio::test]
async fn test_lead_get_and_delete() {
    let fixture = TestFixture::new().await;
    let lead = fixtures::queued_lead("Acme", "ceo@acme.com");
    let id = lead.id.clone();
    fixture.leads.prepend_all(vec![lead]).await;

    let found = fixture.get(&format!("/api/v1/leads/{}", id)).await;
    assert_status!(found, StatusCode::OK);
    assert_eq!(found.body["name"], "Acme");

    let deleted = fixture.delete(&format!("/api/v1/leads/{}", id)).await;
    assert_status!(deleted, StatusCode::NO_CONTENT);

    let gone = fixture.get(&format!("/api/v1/leads/{}", id)).await;
    assert_status!(gone, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_queue_all_enriched_leads() {
    let fixture = TestFixture::new().await;
    fixture
        .post("/api/v1/pipeline/run", json!({ "query": "Ajanslar" }))
        .await;
    fixture.wait_for_pipeline().await;

    let response = fixture.post_empty("/api/v1/leads/queue").await;

    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["queued"].as_array().unwrap().len(), 3);

    let queued = fixture.get("/api/v1/leads?automation=queued").await;
    assert_eq!(queued.body["total"], 3);
}

#[tokio::test]
async fn test_clear_leads() {
    let fixture = TestFixture::new().await;
    fixture
        .leads
        .prepend_all(vec![
            fixtures::queued_lead("A", "a@a.com"),
            fixtures::queued_lead("B", "b@b.com"),
        ])
        .await;

    let response = fixture.delete("/api/v1/leads").await;

    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["removed"], 2);
    assert!(fixture.leads.is_empty().await);
}

// ============================================================================
// Dispatch
// ============================================================================

#[tokio::test]
async fn test_dispatch_start_requires_sender() {
    let fixture = TestFixture::new().await;

    let response = fixture.post_empty("/api/v1/dispatch/start").await;

    assert_status!(response, StatusCode::CONFLICT);
    assert!(!fixture.dispatch.is_running());
}

#[tokio::test]
async fn test_dispatch_sends_then_stops() {
    let fixture =
        TestFixture::with_config(TestConfig::default().with_senders(&["a@agency.com"])).await;
    fixture
        .leads
        .prepend_all(vec![fixtures::queued_lead("Acme", "ceo@acme.com")])
        .await;

    let mut events = fixture.dispatch.subscribe();

    let started = fixture.post_empty("/api/v1/dispatch/start").await;
    assert_status!(started, StatusCode::OK);
    assert_eq!(started.body["changed"], true);

    // The next attempt is scheduled once the first send is recorded.
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if let Ok(DispatchEvent::Scheduled { .. }) = events.recv().await {
                break;
            }
        }
    })
    .await
    .expect("no send scheduled");

    let sent = fixture.mailbox.sent();
    assert_eq!(sent[0].sender, "a@agency.com");
    assert_eq!(sent[0].to, "ceo@acme.com");

    let status = fixture.get("/api/v1/dispatch/status").await;
    assert_eq!(status.body["running"], true);
    assert_eq!(status.body["sent_count"], 1);
    assert!(status.body["countdown_secs"].as_u64().unwrap() >= 419);

    let stopped = fixture.post_empty("/api/v1/dispatch/stop").await;
    assert_status!(stopped, StatusCode::OK);
    assert_eq!(stopped.body["changed"], true);
    assert_eq!(stopped.body["status"]["running"], false);

    let again = fixture.post_empty("/api/v1/dispatch/stop").await;
    assert_eq!(again.body["changed"], false);

    let logs = fixture.get("/api/v1/dispatch/logs?limit=1").await;
    assert_status!(logs, StatusCode::OK);
    let logs = logs.body.as_array().unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0]["message"], "Automation stopped");
}
