//! Mock tracking provider for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::tracking::{RemoteStatus, TrackingError, TrackingProvider};

/// What the mock answers for one tracking code.
#[derive(Debug, Clone)]
pub enum MockTrackingResponse {
    /// Reply with this raw provider code.
    Code(String),
    NotFound,
    RateLimited,
    ConnectionFailed,
    Timeout,
    /// Panic inside the lookup.
    Panic,
}

/// Mock implementation of the TrackingProvider trait.
///
/// Provides controllable behavior for testing:
/// - Per-tracking-code responses and failures
/// - Simulated latency
/// - Call recording and in-flight concurrency tracking
///
/// Unconfigured tracking codes answer `NotFound`.
///
/// # Example
///
/// ```rust,ignore
/// use shiptrack_core::testing::MockTrackingProvider;
///
/// let provider = MockTrackingProvider::new();
/// provider.set_code("TRK1", "Delivered").await;
/// provider.set_latency(Duration::from_millis(50)).await;
///
/// let remote = provider.get_shipment_status("TRK1").await?;
/// assert_eq!(remote.status, ShipmentStatus::Delivered);
/// assert_eq!(provider.max_in_flight(), 1);
/// ```
pub struct MockTrackingProvider {
    responses: Arc<RwLock<HashMap<String, MockTrackingResponse>>>,
    latency: Arc<RwLock<Duration>>,
    latency_overrides: Arc<RwLock<HashMap<String, Duration>>>,
    calls: Arc<RwLock<Vec<String>>>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

impl std::fmt::Debug for MockTrackingProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockTrackingProvider")
            .field("responses", &"<responses>")
            .field("calls", &"<calls>")
            .field("in_flight", &self.in_flight.load(Ordering::SeqCst))
            .field("max_in_flight", &self.max_in_flight.load(Ordering::SeqCst))
            .finish()
    }
}

impl Default for MockTrackingProvider {
    fn default() -> Self {
        Self::new()
    }
}

/// Decrements the in-flight counter even if the lookup panics.
struct InFlight(Arc<AtomicUsize>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl MockTrackingProvider {
    pub fn new() -> Self {
        Self {
            responses: Arc::new(RwLock::new(HashMap::new())),
            latency: Arc::new(RwLock::new(Duration::ZERO)),
            latency_overrides: Arc::new(RwLock::new(HashMap::new())),
            calls: Arc::new(RwLock::new(Vec::new())),
            in_flight: Arc::new(AtomicUsize::new(0)),
            max_in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Answer `raw_code` for `tracking_code`.
    pub async fn set_code(&self, tracking_code: &str, raw_code: &str) {
        self.set_response(tracking_code, MockTrackingResponse::Code(raw_code.to_string()))
            .await;
    }

    pub async fn set_response(&self, tracking_code: &str, response: MockTrackingResponse) {
        self.responses
            .write()
            .await
            .insert(tracking_code.to_string(), response);
    }

    /// Delay applied to every lookup.
    pub async fn set_latency(&self, latency: Duration) {
        *self.latency.write().await = latency;
    }

    /// Delay for one tracking code, overriding the global latency.
    pub async fn set_latency_for(&self, tracking_code: &str, latency: Duration) {
        self.latency_overrides
            .write()
            .await
            .insert(tracking_code.to_string(), latency);
    }

    /// Tracking codes looked up, in call order.
    pub async fn calls(&self) -> Vec<String> {
        self.calls.read().await.clone()
    }

    pub async fn call_count(&self) -> usize {
        self.calls.read().await.len()
    }

    /// Highest number of lookups that were in progress at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub async fn clear(&self) {
        self.responses.write().await.clear();
        self.latency_overrides.write().await.clear();
        self.calls.write().await.clear();
        self.max_in_flight.store(0, Ordering::SeqCst);
    }
}

#[async_trait]
impl TrackingProvider for MockTrackingProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn get_shipment_status(
        &self,
        tracking_code: &str,
    ) -> Result<RemoteStatus, TrackingError> {
        self.calls.write().await.push(tracking_code.to_string());

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let _guard = InFlight(Arc::clone(&self.in_flight));

        let latency = match self.latency_overrides.read().await.get(tracking_code) {
            Some(latency) => *latency,
            None => *self.latency.read().await,
        };
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        let response = self.responses.read().await.get(tracking_code).cloned();
        match response {
            Some(MockTrackingResponse::Code(code)) => Ok(RemoteStatus::from_code(code)),
            Some(MockTrackingResponse::RateLimited) => Err(TrackingError::RateLimited {
                retry_after_ms: 60_000,
            }),
            Some(MockTrackingResponse::ConnectionFailed) => Err(TrackingError::ConnectionFailed(
                "mock connection refused".to_string(),
            )),
            Some(MockTrackingResponse::Timeout) => Err(TrackingError::Timeout),
            Some(MockTrackingResponse::Panic) => {
                panic!("mock tracking provider panicked for {}", tracking_code)
            }
            Some(MockTrackingResponse::NotFound) | None => {
                Err(TrackingError::NotFound(tracking_code.to_string()))
            }
        }
    }
}
