use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub auth: AuthConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub job: JobConfig,
    #[serde(default)]
    pub tracking: Option<TrackingConfig>,
    #[serde(default)]
    pub email: Option<EmailConfig>,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn default_port() -> u16 {
    8080
}

/// Authentication configuration.
///
/// With `api_key`, the same key is what the scheduler presents when it
/// triggers the reconciliation endpoint.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthConfig {
    pub method: AuthMethod,
    #[serde(default)]
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
    None,
    ApiKey,
}

impl AuthMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthMethod::None => "none",
            AuthMethod::ApiKey => "api_key",
        }
    }
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("shiptrack.db")
}

/// Reconciliation job tuning.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct JobConfig {
    /// Orders loaded per run.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Per-order pipelines allowed in flight at once.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    /// Orders not updated within this window are no longer polled.
    #[serde(default = "default_max_age_hours")]
    pub max_age_hours: u32,
    /// Best-effort wall-clock budget for one run.
    #[serde(default = "default_job_timeout")]
    pub timeout_secs: u64,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            max_concurrency: default_max_concurrency(),
            max_age_hours: default_max_age_hours(),
            timeout_secs: default_job_timeout(),
        }
    }
}

fn default_batch_size() -> usize {
    50
}

fn default_max_concurrency() -> usize {
    5
}

fn default_max_age_hours() -> u32 {
    72
}

fn default_job_timeout() -> u64 {
    50
}

/// Tracking provider configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TrackingConfig {
    /// Provider API root (e.g., "https://api.tracking.example.com/v4")
    pub base_url: String,
    pub api_key: String,
    #[serde(default = "default_http_timeout")]
    pub timeout_secs: u32,
    /// Client-side request budget, 0 disables limiting
    #[serde(default = "default_rate_limit_rpm")]
    pub rate_limit_rpm: u32,
}

fn default_http_timeout() -> u32 {
    10
}

fn default_rate_limit_rpm() -> u32 {
    60
}

/// Transactional email configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EmailConfig {
    /// Email API root (e.g., "https://api.resend.com")
    pub base_url: String,
    pub api_key: String,
    /// Sender address, e.g. "Shop <orders@shop.example>"
    pub from: String,
    #[serde(default = "default_http_timeout")]
    pub timeout_secs: u32,
    /// Shown in subjects and bodies
    #[serde(default = "default_store_name")]
    pub store_name: String,
}

fn default_store_name() -> String {
    "Our store".to_string()
}

/// Sanitized config for API responses (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub auth: SanitizedAuthConfig,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub job: JobConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tracking: Option<SanitizedTrackingConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<SanitizedEmailConfig>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedAuthConfig {
    pub method: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedTrackingConfig {
    pub base_url: String,
    pub api_key_configured: bool,
    pub timeout_secs: u32,
    pub rate_limit_rpm: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedEmailConfig {
    pub base_url: String,
    pub api_key_configured: bool,
    pub from: String,
    pub timeout_secs: u32,
    pub store_name: String,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            auth: SanitizedAuthConfig {
                method: config.auth.method.as_str().to_string(),
            },
            server: config.server.clone(),
            database: config.database.clone(),
            job: config.job.clone(),
            tracking: config.tracking.as_ref().map(|t| SanitizedTrackingConfig {
                base_url: t.base_url.clone(),
                api_key_configured: !t.api_key.is_empty(),
                timeout_secs: t.timeout_secs,
                rate_limit_rpm: t.rate_limit_rpm,
            }),
            email: config.email.as_ref().map(|e| SanitizedEmailConfig {
                base_url: e.base_url.clone(),
                api_key_configured: !e.api_key.is_empty(),
                from: e.from.clone(),
                timeout_secs: e.timeout_secs,
                store_name: e.store_name.clone(),
            }),
        }
    }
}
