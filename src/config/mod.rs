//! Configuration management for the telemetry core

use crate::logging::LogLevel;
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub mod loader;
pub mod validation;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Name of the service emitting telemetry
    pub service: String,

    /// Deployment environment, gates which sinks are enabled
    #[serde(default)]
    pub environment: Environment,

    /// Minimum level the logger emits
    #[serde(default)]
    pub log_level: LogLevel,

    /// Record metric samples
    #[serde(default = "default_enable_metrics")]
    pub enable_metrics: bool,

    /// Reserved
    #[serde(default)]
    pub enable_tracing: bool,

    /// Reserved
    #[serde(default)]
    pub enable_health_checks: bool,

    /// Directory for the per-service log file
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,

    /// Health check polling interval in seconds
    #[serde(default = "default_health_check_interval")]
    pub health_check_interval_secs: u64,

    /// Retention advertised to the error tracking backend
    #[serde(default = "default_error_retention_days")]
    pub error_retention_days: u32,

    #[serde(default)]
    pub metrics: MetricsConfig,

    #[serde(default)]
    pub remote: RemoteConfig,

    #[serde(default)]
    pub alerting: AlertingConfig,
}

/// Deployment environment
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Development => write!(f, "development"),
            Self::Staging => write!(f, "staging"),
            Self::Production => write!(f, "production"),
        }
    }
}

/// Metric buffer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Maximum samples kept per metric name
    #[serde(default = "default_buffer_capacity")]
    pub buffer_capacity: usize,

    /// Window used by service metric rollups, in seconds
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: default_buffer_capacity(),
            window_secs: default_window_secs(),
        }
    }
}

/// Remote sink endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Log ingestion endpoint
    pub log_endpoint: Option<String>,

    /// Error tracking endpoint
    pub error_endpoint: Option<String>,

    /// Request timeout in seconds
    #[serde(default = "default_remote_timeout")]
    pub timeout_secs: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            log_endpoint: None,
            error_endpoint: None,
            timeout_secs: default_remote_timeout(),
        }
    }
}

/// Alerting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertingConfig {
    #[serde(default)]
    pub enable_alerts: bool,

    /// Error rate (percent) above which operators should be paged
    #[serde(default = "default_error_rate_threshold")]
    pub error_rate_threshold: f64,

    /// Response time (ms) above which operators should be paged
    #[serde(default = "default_response_time_threshold")]
    pub response_time_threshold: u64,

    /// Slack incoming webhook URL (secured)
    #[serde(
        default,
        serialize_with = "serialize_optional_secret",
        deserialize_with = "deserialize_optional_secret"
    )]
    pub slack_webhook: Option<Secret<String>>,

    #[serde(default)]
    pub email_recipients: Vec<String>,

    /// Delivery attempts per alert channel
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for AlertingConfig {
    fn default() -> Self {
        Self {
            enable_alerts: false,
            error_rate_threshold: default_error_rate_threshold(),
            response_time_threshold: default_response_time_threshold(),
            slack_webhook: None,
            email_recipients: Vec::new(),
            max_retries: default_max_retries(),
        }
    }
}

// Default value functions
fn default_enable_metrics() -> bool { true }
fn default_log_dir() -> PathBuf { PathBuf::from("logs") }
fn default_health_check_interval() -> u64 { 30 }
fn default_error_retention_days() -> u32 { 90 }
fn default_buffer_capacity() -> usize { 1000 }
fn default_window_secs() -> u64 { 3600 } // 1 hour
fn default_remote_timeout() -> u64 { 10 }
fn default_error_rate_threshold() -> f64 { 5.0 }
fn default_response_time_threshold() -> u64 { 5000 }
fn default_max_retries() -> u32 { 3 }

impl ObservabilityConfig {
    /// Create a configuration with defaults for the given service
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            environment: Environment::default(),
            log_level: LogLevel::default(),
            enable_metrics: default_enable_metrics(),
            enable_tracing: false,
            enable_health_checks: false,
            log_dir: default_log_dir(),
            health_check_interval_secs: default_health_check_interval(),
            error_retention_days: default_error_retention_days(),
            metrics: MetricsConfig::default(),
            remote: RemoteConfig::default(),
            alerting: AlertingConfig::default(),
        }
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> crate::error::Result<Self> {
        let config = loader::load_config(path)?;
        validation::validate_config(&config)?;
        Ok(config)
    }

    /// Load configuration with environment variable overrides
    pub fn from_file_with_env<P: AsRef<Path>>(path: P) -> crate::error::Result<Self> {
        let config = loader::load_config_with_env(path)?;
        validation::validate_config(&config)?;
        Ok(config)
    }

    /// Validate this configuration
    pub fn validate(&self) -> crate::error::Result<()> {
        validation::validate_config(self)
    }

    pub fn with_environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }

    pub fn with_log_level(mut self, level: LogLevel) -> Self {
        self.log_level = level;
        self
    }

    pub fn with_alerting(mut self, alerting: AlertingConfig) -> Self {
        self.alerting = alerting;
        self
    }

    /// Per-service log file path
    pub fn log_file_path(&self) -> PathBuf {
        self.log_dir.join(format!("{}.log", self.service))
    }

    pub fn health_check_interval(&self) -> Duration {
        Duration::from_secs(self.health_check_interval_secs)
    }

    pub fn metrics_window(&self) -> Duration {
        Duration::from_secs(self.metrics.window_secs)
    }
}

/// Custom serializer for Option<Secret<String>>
fn serialize_optional_secret<S>(secret: &Option<Secret<String>>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    match secret {
        Some(s) => serializer.serialize_some(s.expose_secret()),
        None => serializer.serialize_none(),
    }
}

/// Custom deserializer for Option<Secret<String>>
fn deserialize_optional_secret<'de, D>(deserializer: D) -> Result<Option<Secret<String>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.map(Secret::new))
}
