//! Common test utilities for in-process API testing with mocks.
//!
//! This module provides a test fixture that builds the router with mock
//! tracking, email and order-store backends, so the HTTP surface can be
//! exercised end to end without external infrastructure.

#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use shiptrack_core::{
    create_audit_system, testing::{MockEmailSender, MockOrderStore, MockTrackingProvider},
    ApiKeyAuthenticator, AuditStore, AuthConfig, AuthMethod, Authenticator, Config,
    DatabaseConfig, JobConfig, NoneAuthenticator, OrderStore, ServerConfig, SqliteAuditStore,
    TrackingReconciliationJob,
};

/// Re-export fixtures for test convenience
pub use shiptrack_core::testing::fixtures;

/// API key used when a fixture is built with authentication.
pub const TEST_API_KEY: &str = "cron-secret";

/// Test fixture with controllable mocks behind the real router.
///
/// # Example
///
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_run_notifies() {
///     let fixture = TestFixture::new().await;
///     fixture.store.insert(fixtures::order("o1", "TRK1", Some(ShipmentStatus::InTransit)));
///     fixture.provider.set_code("TRK1", "Delivered").await;
///
///     let response = fixture.post("/api/v1/jobs/tracking-notifications").await;
///     assert_eq!(response.body["notified"], 1);
/// }
/// ```
pub struct TestFixture {
    pub router: Router,
    pub store: Arc<MockOrderStore>,
    pub provider: Arc<MockTrackingProvider>,
    pub email: Arc<MockEmailSender>,
    pub audit_store: Arc<SqliteAuditStore>,
    /// Holds the audit database
    pub temp_dir: TempDir,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

/// Configuration for test fixture.
#[derive(Debug, Clone, Default)]
pub struct TestConfig {
    /// Require `TEST_API_KEY` on protected routes
    pub require_api_key: bool,
    /// Build the app without a reconciliation job
    pub without_job: bool,
    pub job: Option<JobConfig>,
}

impl TestConfig {
    pub fn with_api_key() -> Self {
        Self {
            require_api_key: true,
            ..Default::default()
        }
    }

    pub fn without_job() -> Self {
        Self {
            without_job: true,
            ..Default::default()
        }
    }
}

impl TestFixture {
    pub async fn new() -> Self {
        Self::with_config(TestConfig::default()).await
    }

    pub async fn with_config(test_config: TestConfig) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("test.db");

        let store = Arc::new(MockOrderStore::new());
        let provider = Arc::new(MockTrackingProvider::new());
        let email = Arc::new(MockEmailSender::new());

        let auth = if test_config.require_api_key {
            AuthConfig {
                method: AuthMethod::ApiKey,
                api_key: Some(TEST_API_KEY.to_string()),
            }
        } else {
            AuthConfig {
                method: AuthMethod::None,
                api_key: None,
            }
        };
        let authenticator: Arc<dyn Authenticator> = match auth.method {
            AuthMethod::None => Arc::new(NoneAuthenticator::new()),
            AuthMethod::ApiKey => Arc::new(ApiKeyAuthenticator::new(TEST_API_KEY.to_string())),
        };

        let job_config = test_config
            .job
            .clone()
            .unwrap_or_else(|| fixtures::job_config(5));

        let config = Config {
            auth,
            server: ServerConfig {
                host: std::net::IpAddr::V4(std::net::Ipv4Addr::LOCALHOST),
                port: 0,
            },
            database: DatabaseConfig {
                path: db_path.clone(),
            },
            job: job_config.clone(),
            tracking: None,
            email: None,
        };

        let audit_store =
            Arc::new(SqliteAuditStore::new(&db_path).expect("Failed to create audit store"));
        let (audit_handle, audit_writer) =
            create_audit_system(Arc::clone(&audit_store) as Arc<dyn AuditStore>, 100);
        tokio::spawn(audit_writer.run());

        let job = (!test_config.without_job).then(|| {
            Arc::new(
                TrackingReconciliationJob::new(
                    Arc::clone(&store) as Arc<dyn OrderStore>,
                    provider.clone(),
                    email.clone(),
                    job_config,
                )
                .with_audit(audit_handle.clone()),
            )
        });

        let state = Arc::new(shiptrack_server::state::AppState::new(
            config,
            authenticator,
            Arc::clone(&audit_store) as Arc<dyn AuditStore>,
            Arc::clone(&store) as Arc<dyn OrderStore>,
            job,
        ));
        let router = shiptrack_server::api::create_router(state);

        Self {
            router,
            store,
            provider,
            email,
            audit_store,
            temp_dir,
        }
    }

    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path, None).await
    }

    pub async fn post(&self, path: &str) -> TestResponse {
        self.request("POST", path, None).await
    }

    /// GET with a bearer token.
    pub async fn get_with_key(&self, path: &str, key: &str) -> TestResponse {
        self.request("GET", path, Some(key)).await
    }

    pub async fn post_with_key(&self, path: &str, key: &str) -> TestResponse {
        self.request("POST", path, Some(key)).await
    }

    /// Raw body text, for non-JSON endpoints.
    pub async fn get_text(&self, path: &str) -> (StatusCode, String) {
        let request = Request::builder().uri(path).body(Body::empty()).unwrap();
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();
        (status, String::from_utf8_lossy(&bytes).to_string())
    }

    /// Wait until the audit writer has caught up with `count` events of `event_type`.
    pub async fn wait_for_audit(&self, event_type: &str, count: i64) {
        let filter = shiptrack_core::AuditFilter::of_type(event_type);
        for _ in 0..100 {
            if self.audit_store.count(&filter).unwrap_or(0) >= count {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        panic!("audit event {} never reached {}", event_type, count);
    }

    async fn request(&self, method: &str, path: &str, key: Option<&str>) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(path);
        if let Some(key) = key {
            builder = builder.header("Authorization", format!("Bearer {}", key));
        }
        let request = builder.body(Body::empty()).unwrap();

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let body: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
        };

        TestResponse { status, body }
    }
}

/// Helper to assert a response has expected status.
#[macro_export]
macro_rules! assert_status {
    ($response:expr, $status:expr) => {
        assert_eq!(
            $response.status, $status,
            "Expected status {:?}, got {:?}. Body: {}",
            $status,
            $response.status,
            serde_json::to_string_pretty(&$response.body).unwrap_or_default()
        );
    };
}
