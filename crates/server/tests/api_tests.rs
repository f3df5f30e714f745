//! API tests against the in-process router with mock backends.

mod common;

use axum::http::StatusCode;
use common::{fixtures, TestConfig, TestFixture, TEST_API_KEY};
use shiptrack_core::{JobConfig, ShipmentStatus};

const JOB_PATH: &str = "/api/v1/jobs/tracking-notifications";

// ============================================================================
// Health, config, metrics
// ============================================================================

#[tokio::test]
async fn test_health_is_public() {
    let fixture = TestFixture::with_config(TestConfig::with_api_key()).await;

    let response = fixture.get("/api/v1/health").await;

    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["status"], "ok");
}

#[tokio::test]
async fn test_config_hides_secrets() {
    let fixture = TestFixture::with_config(TestConfig::with_api_key()).await;

    let response = fixture.get_with_key("/api/v1/config", TEST_API_KEY).await;

    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["auth"]["method"], "api_key");
    assert_eq!(response.body["job"]["batch_size"], 50);
    let raw = response.body.to_string();
    assert!(!raw.contains(TEST_API_KEY));
}

#[tokio::test]
async fn test_metrics_exposition() {
    let fixture = TestFixture::new().await;
    fixture.post(JOB_PATH).await;

    let (status, body) = fixture.get_text("/metrics").await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("shiptrack_job_runs_total"));
    assert!(body.contains("shiptrack_pending_anomalies"));
}

// ============================================================================
// Authentication
// ============================================================================

#[tokio::test]
async fn test_job_requires_api_key() {
    let fixture = TestFixture::with_config(TestConfig::with_api_key()).await;

    let response = fixture.post(JOB_PATH).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);

    let response = fixture.post_with_key(JOB_PATH, "wrong").await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);

    let response = fixture.post_with_key(JOB_PATH, TEST_API_KEY).await;
    assert_status!(response, StatusCode::OK);
}

#[tokio::test]
async fn test_anomalies_and_audit_require_api_key() {
    let fixture = TestFixture::with_config(TestConfig::with_api_key()).await;

    assert_eq!(
        fixture.get("/api/v1/anomalies").await.status,
        StatusCode::UNAUTHORIZED
    );
    assert_eq!(
        fixture.get("/api/v1/audit").await.status,
        StatusCode::UNAUTHORIZED
    );
}

// ============================================================================
// Reconciliation job
// ============================================================================

#[tokio::test]
async fn test_run_returns_summary() {
    let fixture = TestFixture::new().await;
    fixture
        .store
        .insert(fixtures::order("o1", "TRK1", Some(ShipmentStatus::InTransit)));
    fixture
        .store
        .insert(fixtures::order("o2", "TRK2", Some(ShipmentStatus::InTransit)));
    fixture.provider.set_code("TRK1", "Delivered").await;
    fixture.provider.set_code("TRK2", "InTransit").await;

    let response = fixture.post(JOB_PATH).await;

    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["processed"], 2);
    assert_eq!(response.body["notified"], 1);
    assert_eq!(response.body["unchanged"], 1);
    assert_eq!(response.body["failed"], 0);
    assert_eq!(response.body["anomalies"], 0);
    assert!(response.body["run_id"].is_string());
    assert_eq!(fixture.email.sent_count().await, 1);
}

#[tokio::test]
async fn test_get_triggers_run_too() {
    let fixture = TestFixture::new().await;
    fixture
        .store
        .insert(fixtures::order("o1", "TRK1", Some(ShipmentStatus::Pending)));
    fixture.provider.set_code("TRK1", "InTransit").await;

    let response = fixture.get(JOB_PATH).await;

    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["notified"], 1);
}

#[tokio::test]
async fn test_batch_size_override() {
    let fixture = TestFixture::new().await;
    for i in 0..3 {
        let id = format!("o{}", i);
        let code = format!("TRK{}", i);
        fixture
            .store
            .insert(fixtures::order(&id, &code, Some(ShipmentStatus::InTransit)));
        fixture.provider.set_code(&code, "InTransit").await;
    }

    let response = fixture
        .post(&format!("{}?batch_size=2", JOB_PATH))
        .await;

    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["batch_size"], 2);
    assert_eq!(fixture.provider.call_count().await, 2);
}

#[tokio::test]
async fn test_invalid_overrides_rejected() {
    let fixture = TestFixture::new().await;

    let response = fixture.post(&format!("{}?batch_size=0", JOB_PATH)).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);

    let response = fixture.post(&format!("{}?timeout_secs=0", JOB_PATH)).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);

    let response = fixture.post(&format!("{}?timeout_secs=86401", JOB_PATH)).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);

    let response = fixture
        .post(&format!("{}?timeout_secs={}", JOB_PATH, u64::MAX))
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);

    assert_eq!(fixture.provider.call_count().await, 0);
}

#[tokio::test]
async fn test_largest_timeout_override_runs() {
    let fixture = TestFixture::new().await;
    fixture
        .store
        .insert(fixtures::order("o1", "TRK1", Some(ShipmentStatus::InTransit)));
    fixture.provider.set_code("TRK1", "Delivered").await;

    let response = fixture
        .post(&format!("{}?timeout_secs=86400", JOB_PATH))
        .await;

    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["notified"], 1);
}

#[tokio::test]
async fn test_infrastructure_failure_is_500() {
    let fixture = TestFixture::new().await;
    fixture.store.fail_queries(true);

    let response = fixture.post(JOB_PATH).await;

    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(response.body["error"]
        .as_str()
        .unwrap()
        .contains("infrastructure"));
}

#[tokio::test]
async fn test_job_unavailable_without_providers() {
    let fixture = TestFixture::with_config(TestConfig::without_job()).await;

    let response = fixture.post(JOB_PATH).await;

    assert_eq!(response.status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_overlapping_run_rejected() {
    let fixture = TestFixture::with_config(TestConfig {
        job: Some(JobConfig {
            batch_size: 10,
            max_concurrency: 1,
            max_age_hours: 72,
            timeout_secs: 30,
        }),
        ..Default::default()
    })
    .await;
    fixture
        .store
        .insert(fixtures::order("o1", "TRK1", Some(ShipmentStatus::InTransit)));
    fixture.provider.set_code("TRK1", "InTransit").await;
    fixture
        .provider
        .set_latency(std::time::Duration::from_millis(300))
        .await;

    let (first, second) = tokio::join!(fixture.post(JOB_PATH), async {
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        fixture.post(JOB_PATH).await
    });

    assert_status!(first, StatusCode::OK);
    assert_eq!(second.status, StatusCode::CONFLICT);
}

// ============================================================================
// Anomalies and audit
// ============================================================================

#[tokio::test]
async fn test_anomaly_listed_after_failed_persist() {
    let fixture = TestFixture::new().await;
    fixture
        .store
        .insert(fixtures::order("o1", "TRK1", Some(ShipmentStatus::InTransit)));
    fixture.provider.set_code("TRK1", "Delivered").await;
    fixture.store.fail_updates(true);

    let run = fixture.post(JOB_PATH).await;
    assert_status!(run, StatusCode::OK);
    assert_eq!(run.body["anomalies"], 1);
    assert_eq!(run.body["issues"][0]["kind"], "anomaly");

    let response = fixture.get("/api/v1/anomalies").await;
    assert_status!(response, StatusCode::OK);
    let anomalies = response.body["anomalies"].as_array().unwrap();
    assert_eq!(anomalies.len(), 1);
    assert_eq!(anomalies[0]["order_id"], "o1");
    assert_eq!(anomalies[0]["persisted_status"], "in_transit");
    assert_eq!(anomalies[0]["notified_status"], "delivered");
}

#[tokio::test]
async fn test_audit_query_by_order() {
    let fixture = TestFixture::new().await;
    fixture
        .store
        .insert(fixtures::order("o1", "TRK1", Some(ShipmentStatus::InTransit)));
    fixture.provider.set_code("TRK1", "OutForDelivery").await;

    let run = fixture.post(JOB_PATH).await;
    assert_status!(run, StatusCode::OK);
    fixture.wait_for_audit("job_completed", 1).await;

    let response = fixture.get("/api/v1/audit?order_id=o1").await;
    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["total"], 1);
    assert_eq!(response.body["events"][0]["event_type"], "notification_sent");

    let run_id = run.body["run_id"].as_str().unwrap();
    let response = fixture
        .get(&format!("/api/v1/audit?run_id={}", run_id))
        .await;
    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["total"], 3);
}

#[tokio::test]
async fn test_audit_query_by_status() {
    let fixture = TestFixture::new().await;
    fixture
        .store
        .insert(fixtures::order("o1", "TRK1", Some(ShipmentStatus::InTransit)));
    fixture
        .store
        .insert(fixtures::order("o2", "TRK2", Some(ShipmentStatus::InTransit)));
    fixture.provider.set_code("TRK1", "Delivered").await;
    fixture.provider.set_code("TRK2", "OutForDelivery").await;

    let run = fixture.post(JOB_PATH).await;
    assert_status!(run, StatusCode::OK);
    fixture.wait_for_audit("job_completed", 1).await;

    let response = fixture.get("/api/v1/audit?status=delivered").await;
    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["total"], 1);
    assert_eq!(response.body["events"][0]["order_id"], "o1");
    assert_eq!(response.body["events"][0]["status"], "delivered");

    let response = fixture.get("/api/v1/audit?status=teleported").await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_anomaly_history_and_run_timeline() {
    let fixture = TestFixture::new().await;
    fixture
        .store
        .insert(fixtures::order("o1", "TRK1", Some(ShipmentStatus::InTransit)));
    fixture.provider.set_code("TRK1", "Delivered").await;
    fixture.store.fail_updates(true);

    let run = fixture.post(JOB_PATH).await;
    assert_status!(run, StatusCode::OK);
    fixture.wait_for_audit("job_completed", 1).await;

    let history = fixture.get("/api/v1/audit/anomalies").await;
    assert_status!(history, StatusCode::OK);
    assert_eq!(history.body["total"], 1);
    assert_eq!(
        history.body["events"][0]["event_type"],
        "reconciliation_anomaly"
    );

    let run_id = run.body["run_id"].as_str().unwrap();
    let timeline = fixture
        .get(&format!("/api/v1/runs/{}/audit", run_id))
        .await;
    assert_status!(timeline, StatusCode::OK);
    assert_eq!(timeline.body["notified"], 1);
    assert_eq!(timeline.body["anomalies"], 1);
    let events = timeline.body["events"].as_array().unwrap();
    assert_eq!(events.first().unwrap()["event_type"], "job_started");
    assert_eq!(events.last().unwrap()["event_type"], "job_completed");

    let missing = fixture.get("/api/v1/runs/no-such-run/audit").await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
}
