//! Error logger: error sinks, specialized loggers and severity alerts

use super::error::{CircuitState, ErrorCategory, ErrorSeverity, IntegrationError};
use crate::alerting::{Alert, AlertDispatcher};
use crate::error::SinkError;
use crate::logging::sink::{RemoteSink, CONSOLE_TARGET};
use crate::logging::{sanitize_metadata, Metadata};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::warn;
use uuid::Uuid;

/// Sink-facing record of an [`IntegrationError`]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ErrorLogEntry {
    pub id: Uuid,
    pub code: String,
    pub message: String,
    pub severity: ErrorSeverity,
    pub category: ErrorCategory,
    pub metadata: Metadata,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
}

impl ErrorLogEntry {
    pub fn from_error(error: &IntegrationError, correlation_id: Option<&str>) -> Self {
        Self {
            id: Uuid::new_v4(),
            code: error.code().to_string(),
            message: error.message().to_string(),
            severity: error.severity(),
            category: error.category(),
            metadata: sanitize_metadata(error.metadata()),
            timestamp: error.timestamp(),
            correlation_id: correlation_id.map(str::to_string),
        }
    }
}

/// Destination for error entries
pub trait ErrorSink: Send + Sync {
    fn write(&self, entry: &ErrorLogEntry) -> Result<(), SinkError>;

    fn name(&self) -> &str;
}

/// Console error channel
#[derive(Debug, Default, Clone)]
pub struct ConsoleErrorSink;

impl ErrorSink for ConsoleErrorSink {
    fn write(&self, entry: &ErrorLogEntry) -> Result<(), SinkError> {
        tracing::error!(
            target: CONSOLE_TARGET,
            code = %entry.code,
            severity = %entry.severity,
            category = %entry.category,
            correlation_id = entry.correlation_id.as_deref().unwrap_or_default(),
            metadata = %serde_json::Value::Object(entry.metadata.clone()),
            "{}",
            entry.message
        );
        Ok(())
    }

    fn name(&self) -> &str {
        "console"
    }
}

impl ErrorSink for RemoteSink {
    fn write(&self, entry: &ErrorLogEntry) -> Result<(), SinkError> {
        self.submit(entry)
    }

    fn name(&self) -> &str {
        "remote"
    }
}

/// Captures error entries in memory
#[derive(Debug, Default, Clone)]
pub struct MemoryErrorSink {
    entries: Arc<Mutex<Vec<ErrorLogEntry>>>,
}

impl MemoryErrorSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<ErrorLogEntry> {
        self.entries.lock().map(|e| e.clone()).unwrap_or_default()
    }
}

impl ErrorSink for MemoryErrorSink {
    fn write(&self, entry: &ErrorLogEntry) -> Result<(), SinkError> {
        self.entries
            .lock()
            .map_err(|_| SinkError::Closed)?
            .push(entry.clone());
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}

/// Error logger configuration
#[derive(Debug, Clone)]
pub struct ErrorLoggerConfig {
    pub service: String,
    pub enable_remote: bool,
    pub remote_endpoint: Option<String>,
    pub remote_timeout: Duration,
    pub retention_days: u32,
    pub enable_alerts: bool,
}

impl ErrorLoggerConfig {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            enable_remote: false,
            remote_endpoint: None,
            remote_timeout: Duration::from_secs(10),
            retention_days: 90,
            enable_alerts: false,
        }
    }
}

/// Writes classified errors to a sink and raises alerts for HIGH/CRITICAL ones
pub struct ErrorLogger {
    config: ErrorLoggerConfig,
    sink: Arc<dyn ErrorSink>,
    dispatcher: Option<Arc<AlertDispatcher>>,
    alerts_raised: AtomicU64,
}

impl ErrorLogger {
    /// Remote sink when enabled and reachable, console otherwise
    pub fn new(config: ErrorLoggerConfig) -> Self {
        let sink: Arc<dyn ErrorSink> = match (config.enable_remote, &config.remote_endpoint) {
            (true, Some(endpoint)) => match RemoteSink::spawn(endpoint.clone(), config.remote_timeout) {
                Ok(sink) => Arc::new(sink),
                Err(e) => {
                    warn!("Remote error sink disabled: {}", e);
                    Arc::new(ConsoleErrorSink)
                }
            },
            (true, None) => {
                warn!("Remote error tracking enabled but no endpoint configured");
                Arc::new(ConsoleErrorSink)
            }
            (false, _) => Arc::new(ConsoleErrorSink),
        };
        Self::with_sink(config, sink)
    }

    pub fn with_sink(config: ErrorLoggerConfig, sink: Arc<dyn ErrorSink>) -> Self {
        Self {
            config,
            sink,
            dispatcher: None,
            alerts_raised: AtomicU64::new(0),
        }
    }

    /// Route severity alerts to operator channels instead of only the log
    pub fn with_alert_dispatcher(mut self, dispatcher: Arc<AlertDispatcher>) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    pub fn config(&self) -> &ErrorLoggerConfig {
        &self.config
    }

    pub fn sink_name(&self) -> &str {
        self.sink.name()
    }

    pub fn alerts_raised(&self) -> u64 {
        self.alerts_raised.load(Ordering::Relaxed)
    }

    pub fn log_error(&self, error: &IntegrationError, correlation_id: Option<&str>) -> ErrorLogEntry {
        let entry = ErrorLogEntry::from_error(error, correlation_id);

        if let Err(e) = self.sink.write(&entry) {
            warn!("Error sink '{}' failed for {}: {}", self.sink.name(), entry.code, e);
        }

        if self.config.enable_alerts && entry.severity.is_alertable() {
            self.trigger_alert(&entry);
        }

        entry
    }

    fn trigger_alert(&self, entry: &ErrorLogEntry) {
        self.alerts_raised.fetch_add(1, Ordering::Relaxed);
        warn!(
            code = %entry.code,
            category = %entry.category,
            "{} error alert: {}",
            entry.severity,
            entry.message
        );

        if let Some(dispatcher) = &self.dispatcher {
            let alert = Alert::new(
                format!("{} {} error", entry.severity, entry.category),
                format!("{} ({})", entry.message, entry.code),
                entry.severity,
                self.config.service.clone(),
            )
            .with_metadata(entry.metadata.clone())
            .with_correlation_id(entry.correlation_id.clone());
            dispatcher.dispatch(alert);
        }
    }

    /// OPEN transitions are HIGH, everything else MEDIUM
    pub fn log_circuit_breaker_event(
        &self,
        service_name: &str,
        state: CircuitState,
        metadata: Metadata,
        correlation_id: Option<&str>,
    ) -> ErrorLogEntry {
        let severity = if state == CircuitState::Open {
            ErrorSeverity::High
        } else {
            ErrorSeverity::Medium
        };

        let error = IntegrationError::new(
            format!("Circuit breaker {} for service {}", state, service_name),
            severity,
            ErrorCategory::CircuitBreaker,
        )
        .with_metadata(merge(
            json!({ "service": service_name, "state": state }),
            metadata,
        ));
        self.log_error(&error, correlation_id)
    }

    pub fn log_validation_error(
        &self,
        message: &str,
        validation_errors: &[String],
        metadata: Metadata,
        correlation_id: Option<&str>,
    ) -> ErrorLogEntry {
        let error = IntegrationError::new(message, ErrorSeverity::Medium, ErrorCategory::Validation)
            .with_metadata(merge(json!({ "validationErrors": validation_errors }), metadata));
        self.log_error(&error, correlation_id)
    }

    pub fn log_messaging_error(
        &self,
        message: &str,
        provider: &str,
        metadata: Metadata,
        correlation_id: Option<&str>,
    ) -> ErrorLogEntry {
        let error = IntegrationError::new(message, ErrorSeverity::Medium, ErrorCategory::Messaging)
            .with_metadata(merge(json!({ "provider": provider }), metadata));
        self.log_error(&error, correlation_id)
    }

    pub fn log_wearable_error(
        &self,
        message: &str,
        provider: &str,
        device_id: &str,
        metadata: Metadata,
        correlation_id: Option<&str>,
    ) -> ErrorLogEntry {
        let error = IntegrationError::new(message, ErrorSeverity::Medium, ErrorCategory::WearableSync)
            .with_metadata(merge(json!({ "provider": provider, "deviceId": device_id }), metadata));
        self.log_error(&error, correlation_id)
    }
}

/// Category fields first, caller metadata layered on top
fn merge(base: serde_json::Value, extra: Metadata) -> Metadata {
    let mut merged = match base {
        serde_json::Value::Object(map) => map,
        _ => Metadata::new(),
    };
    merged.extend(extra);
    merged
}
