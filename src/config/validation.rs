//! Configuration validation

use super::*;
use crate::error::{Result, TelemetryError};

/// Validate complete configuration
pub fn validate_config(config: &ObservabilityConfig) -> Result<()> {
    if config.service.trim().is_empty() {
        return Err(TelemetryError::Config(
            "Service name cannot be empty".to_string()
        ));
    }

    if config.health_check_interval_secs == 0 {
        return Err(TelemetryError::Config(
            "Health check interval must be greater than 0".to_string()
        ));
    }

    validate_metrics_config(&config.metrics)?;
    validate_remote_config(&config.remote)?;
    validate_alerting_config(&config.alerting)?;
    Ok(())
}

/// Validate metric buffer configuration
fn validate_metrics_config(config: &MetricsConfig) -> Result<()> {
    if config.buffer_capacity == 0 {
        return Err(TelemetryError::Config(
            "Metric buffer capacity must be greater than 0".to_string()
        ));
    }

    if config.window_secs == 0 {
        return Err(TelemetryError::Config(
            "Metrics window must be greater than 0".to_string()
        ));
    }

    Ok(())
}

/// Validate remote sink configuration
fn validate_remote_config(config: &RemoteConfig) -> Result<()> {
    for endpoint in [&config.log_endpoint, &config.error_endpoint].into_iter().flatten() {
        validate_http_url(endpoint, "Remote endpoint")?;
    }

    if config.timeout_secs == 0 {
        return Err(TelemetryError::Config(
            "Remote timeout must be greater than 0".to_string()
        ));
    }

    Ok(())
}

/// Validate alerting configuration
fn validate_alerting_config(config: &AlertingConfig) -> Result<()> {
    if config.error_rate_threshold < 0.0 {
        return Err(TelemetryError::Config(
            "Error rate threshold cannot be negative".to_string()
        ));
    }

    if let Some(webhook) = &config.slack_webhook {
        validate_http_url(webhook.expose_secret(), "Slack webhook")?;
    }

    if let Some(bad) = config.email_recipients.iter().find(|r| !r.contains('@')) {
        return Err(TelemetryError::Config(
            format!("Invalid email recipient: {}", bad)
        ));
    }

    if config.max_retries == 0 || config.max_retries > 10 {
        return Err(TelemetryError::Config(
            "Alert max retries must be between 1 and 10".to_string()
        ));
    }

    Ok(())
}

fn validate_http_url(url: &str, what: &str) -> Result<()> {
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(TelemetryError::Config(
            format!("{} must start with http:// or https://", what)
        ));
    }
    Ok(())
}
