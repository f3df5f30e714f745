//! HTTP tracking provider implementation.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::debug;

use crate::config::TrackingConfig;
use crate::metrics::{EXTERNAL_SERVICE_DURATION, EXTERNAL_SERVICE_REQUESTS};
use crate::shipment::ShipmentStatus;

use super::rate_limiter::RateLimiter;
use super::{RemoteStatus, TrackingError, TrackingProvider};

/// Tracking provider speaking the `GET /trackings/{code}` JSON API.
///
/// The response carries the carrier-normalised status in
/// `data.tracking.tag` (`InTransit`, `OutForDelivery`, `Delivered`, ...).
pub struct HttpTrackingProvider {
    client: Client,
    config: TrackingConfig,
    rate_limiter: Option<RateLimiter>,
}

impl HttpTrackingProvider {
    pub fn new(config: TrackingConfig) -> Result<Self, TrackingError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .build()
            .map_err(|e| TrackingError::ConnectionFailed(e.to_string()))?;

        let rate_limiter =
            (config.rate_limit_rpm > 0).then(|| RateLimiter::new(config.rate_limit_rpm));

        Ok(Self {
            client,
            config,
            rate_limiter,
        })
    }

    fn build_url(&self, tracking_code: &str) -> String {
        format!(
            "{}/trackings/{}",
            self.config.base_url.trim_end_matches('/'),
            urlencoding::encode(tracking_code)
        )
    }

    async fn fetch(&self, tracking_code: &str) -> Result<RemoteStatus, TrackingError> {
        if let Some(ref limiter) = self.rate_limiter {
            limiter.acquire().await;
        }

        let url = self.build_url(tracking_code);
        debug!(tracking_code = tracking_code, "Querying tracking provider");

        let response = self
            .client
            .get(&url)
            .header("tracking-api-key", &self.config.api_key)
            .header("accept", "application/json")
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TrackingError::Timeout
                } else if e.is_connect() {
                    TrackingError::ConnectionFailed(e.to_string())
                } else {
                    TrackingError::ApiError(e.to_string())
                }
            })?;

        match response.status() {
            StatusCode::NOT_FOUND => {
                return Err(TrackingError::NotFound(tracking_code.to_string()));
            }
            StatusCode::TOO_MANY_REQUESTS => {
                let retry_after_ms = response
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<u64>().ok())
                    .map(|secs| secs * 1000)
                    .unwrap_or(60_000);
                return Err(TrackingError::RateLimited { retry_after_ms });
            }
            status if !status.is_success() => {
                let body = response.text().await.unwrap_or_default();
                return Err(TrackingError::ApiError(format!(
                    "HTTP {}: {}",
                    status,
                    body.chars().take(200).collect::<String>()
                )));
            }
            _ => {}
        }

        let payload: TrackingResponse = response
            .json()
            .await
            .map_err(|e| TrackingError::ApiError(format!("Failed to parse response: {}", e)))?;

        let tag = payload.data.tracking.tag;
        Ok(RemoteStatus {
            status: ShipmentStatus::from_provider_code(&tag),
            raw_code: tag,
            observed_at: Utc::now(),
        })
    }
}

#[async_trait]
impl TrackingProvider for HttpTrackingProvider {
    fn name(&self) -> &str {
        "http"
    }

    async fn get_shipment_status(
        &self,
        tracking_code: &str,
    ) -> Result<RemoteStatus, TrackingError> {
        let start = Instant::now();
        let result = self.fetch(tracking_code).await;

        let outcome = match &result {
            Ok(_) => "success",
            Err(TrackingError::NotFound(_)) => "not_found",
            Err(_) => "error",
        };
        EXTERNAL_SERVICE_DURATION
            .with_label_values(&["tracking", "get_status"])
            .observe(start.elapsed().as_secs_f64());
        EXTERNAL_SERVICE_REQUESTS
            .with_label_values(&["tracking", "get_status", outcome])
            .inc();

        result
    }
}

#[derive(Debug, Deserialize)]
struct TrackingResponse {
    data: TrackingData,
}

#[derive(Debug, Deserialize)]
struct TrackingData {
    tracking: TrackingBody,
}

#[derive(Debug, Deserialize)]
struct TrackingBody {
    tag: String,
}
