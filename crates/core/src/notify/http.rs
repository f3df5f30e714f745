//! HTTP email sender (Resend-compatible `POST /emails`).

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use tracing::debug;

use crate::config::EmailConfig;
use crate::metrics::{EXTERNAL_SERVICE_DURATION, EXTERNAL_SERVICE_REQUESTS};

use super::template::render;
use super::{EmailError, EmailSender, TrackingUpdateEmail};

pub struct HttpEmailSender {
    client: Client,
    config: EmailConfig,
}

#[derive(Debug, Serialize)]
struct SendEmailRequest<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    html: &'a str,
    text: &'a str,
}

impl HttpEmailSender {
    pub fn new(config: EmailConfig) -> Result<Self, EmailError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .build()
            .map_err(|e| EmailError::ConnectionFailed(e.to_string()))?;

        Ok(Self { client, config })
    }

    fn endpoint(&self) -> String {
        format!("{}/emails", self.config.base_url.trim_end_matches('/'))
    }

    async fn post(&self, email: &TrackingUpdateEmail) -> Result<(), EmailError> {
        let rendered = render(email, &self.config.store_name);
        let body = SendEmailRequest {
            from: &self.config.from,
            to: [email.to.as_str()],
            subject: &rendered.subject,
            html: &rendered.html,
            text: &rendered.text,
        };

        debug!(order_id = %email.order_id, status = %email.status, "Sending tracking update email");

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    EmailError::Timeout
                } else if e.is_connect() {
                    EmailError::ConnectionFailed(e.to_string())
                } else {
                    EmailError::ApiError(e.to_string())
                }
            })?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let text = response.text().await.unwrap_or_default();
        let snippet: String = text.chars().take(200).collect();
        match status {
            StatusCode::TOO_MANY_REQUESTS => Err(EmailError::RateLimited),
            StatusCode::UNPROCESSABLE_ENTITY => Err(EmailError::InvalidRecipient(format!(
                "{}: {}",
                email.to, snippet
            ))),
            _ => Err(EmailError::ApiError(format!("HTTP {}: {}", status, snippet))),
        }
    }
}

#[async_trait]
impl EmailSender for HttpEmailSender {
    fn name(&self) -> &str {
        "http"
    }

    async fn send_tracking_update(&self, email: &TrackingUpdateEmail) -> Result<(), EmailError> {
        let start = Instant::now();
        let result = self.post(email).await;

        EXTERNAL_SERVICE_DURATION
            .with_label_values(&["email", "send"])
            .observe(start.elapsed().as_secs_f64());
        EXTERNAL_SERVICE_REQUESTS
            .with_label_values(&["email", "send", if result.is_ok() { "success" } else { "error" }])
            .inc();

        result
    }
}
