//! Error types for the telemetry core

use thiserror::Error;

/// Result type alias for telemetry operations
pub type Result<T> = std::result::Result<T, TelemetryError>;

/// Main error type for the telemetry core
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Sink error: {0}")]
    Sink(#[from] SinkError),

    #[error("Alert error: {0}")]
    Alert(#[from] AlertError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Errors raised while writing to a log or error sink
#[derive(Error, Debug)]
pub enum SinkError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Remote endpoint rejected entry: HTTP {status}")]
    Rejected { status: u16 },

    #[error("Sink closed")]
    Closed,

    #[error("No async runtime available for remote delivery")]
    NoRuntime,
}

/// Errors raised while delivering alerts
#[derive(Error, Debug)]
pub enum AlertError {
    #[error("Alert delivery failed: {0}")]
    DeliveryFailed(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    #[error("Invalid alert configuration: {0}")]
    InvalidConfig(String),
}

impl From<config::ConfigError> for TelemetryError {
    fn from(err: config::ConfigError) -> Self {
        TelemetryError::Config(err.to_string())
    }
}
