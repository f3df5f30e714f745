use super::{types::Config, AuthMethod, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Auth section exists (enforced by serde) and api_key is set when required
/// - Server port is not 0
/// - Job batch size, concurrency, timeout and max age are positive
/// - Provider and email URLs are http(s) when those sections are present
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.auth.method == AuthMethod::ApiKey
        && config.auth.api_key.as_deref().map_or(true, str::is_empty)
    {
        return Err(ConfigError::ValidationError(
            "auth.api_key must be set when auth.method = \"api_key\"".to_string(),
        ));
    }

    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    if config.job.batch_size == 0 {
        return Err(ConfigError::ValidationError(
            "job.batch_size must be at least 1".to_string(),
        ));
    }

    if config.job.max_concurrency == 0 {
        return Err(ConfigError::ValidationError(
            "job.max_concurrency must be at least 1".to_string(),
        ));
    }

    if config.job.timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "job.timeout_secs must be at least 1".to_string(),
        ));
    }

    if config.job.max_age_hours == 0 {
        return Err(ConfigError::ValidationError(
            "job.max_age_hours must be at least 1".to_string(),
        ));
    }

    if let Some(ref tracking) = config.tracking {
        check_url("tracking.base_url", &tracking.base_url)?;
    }

    if let Some(ref email) = config.email {
        check_url("email.base_url", &email.base_url)?;
        if email.from.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "email.from cannot be empty".to_string(),
            ));
        }
    }

    Ok(())
}

fn check_url(field: &str, url: &str) -> Result<(), ConfigError> {
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(())
    } else {
        Err(ConfigError::ValidationError(format!(
            "{} must start with http:// or https://, got '{}'",
            field, url
        )))
    }
}
