//! Level-filtered structured logger with correlation support

use super::sanitize::sanitize_metadata;
use super::sink::{ConsoleSink, FileSink, LogSink, RemoteSink};
use super::{LogEntry, LogLevel, Metadata};
use chrono::Utc;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;
use uuid::Uuid;

/// Logger configuration
#[derive(Debug, Clone)]
pub struct LoggerConfig {
    pub service: String,
    pub level: LogLevel,
    pub enable_console: bool,
    pub enable_file: bool,
    pub file_path: Option<PathBuf>,
    pub enable_remote: bool,
    pub remote_endpoint: Option<String>,
    pub remote_timeout: Duration,
}

impl LoggerConfig {
    pub fn new(service: impl Into<String>, level: LogLevel) -> Self {
        Self {
            service: service.into(),
            level,
            enable_console: true,
            enable_file: false,
            file_path: None,
            enable_remote: false,
            remote_endpoint: None,
            remote_timeout: Duration::from_secs(10),
        }
    }
}

/// Structured logger.
///
/// Cloning is cheap: configuration and sinks are shared. A logger obtained
/// from [`Logger::with_correlation`] stamps its own correlation id and leaves
/// the parent untouched.
#[derive(Clone)]
pub struct Logger {
    service: Arc<str>,
    level: LogLevel,
    sinks: Arc<Vec<Arc<dyn LogSink>>>,
    correlation_id: Option<String>,
}

impl Logger {
    /// Build a logger with the sinks enabled in `config`
    pub fn new(config: LoggerConfig) -> Self {
        let mut sinks: Vec<Arc<dyn LogSink>> = Vec::new();

        if config.enable_console {
            sinks.push(Arc::new(ConsoleSink::new()));
        }

        if config.enable_file {
            let path = config
                .file_path
                .clone()
                .unwrap_or_else(|| PathBuf::from(format!("logs/{}.log", config.service)));
            sinks.push(Arc::new(FileSink::new(path)));
        }

        if config.enable_remote {
            match &config.remote_endpoint {
                Some(endpoint) => match RemoteSink::spawn(endpoint.clone(), config.remote_timeout) {
                    Ok(sink) => sinks.push(Arc::new(sink)),
                    Err(e) => warn!("Remote log sink disabled: {}", e),
                },
                None => warn!("Remote logging enabled but no endpoint configured"),
            }
        }

        Self::with_sinks(config.service, config.level, sinks)
    }

    /// Build a logger over explicit sinks
    pub fn with_sinks(service: impl Into<String>, level: LogLevel, sinks: Vec<Arc<dyn LogSink>>) -> Self {
        Self {
            service: Arc::from(service.into()),
            level,
            sinks: Arc::new(sinks),
            correlation_id: None,
        }
    }

    /// Child logger that stamps every entry with `correlation_id`
    pub fn with_correlation(&self, correlation_id: impl Into<String>) -> Self {
        Self {
            correlation_id: Some(correlation_id.into()),
            ..self.clone()
        }
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn level(&self) -> LogLevel {
        self.level
    }

    pub fn correlation_id(&self) -> Option<&str> {
        self.correlation_id.as_deref()
    }

    pub fn sink_names(&self) -> Vec<&str> {
        self.sinks.iter().map(|s| s.name()).collect()
    }

    pub fn debug(&self, message: impl Into<String>, metadata: Option<Metadata>) -> Option<LogEntry> {
        self.log(LogLevel::Debug, message.into(), metadata, None)
    }

    pub fn info(&self, message: impl Into<String>, metadata: Option<Metadata>) -> Option<LogEntry> {
        self.log(LogLevel::Info, message.into(), metadata, None)
    }

    pub fn warn(&self, message: impl Into<String>, metadata: Option<Metadata>) -> Option<LogEntry> {
        self.log(LogLevel::Warn, message.into(), metadata, None)
    }

    /// Log at error level, attaching the source chain of `error` as the stack
    pub fn error(
        &self,
        message: impl Into<String>,
        metadata: Option<Metadata>,
        error: Option<&(dyn std::error::Error + 'static)>,
    ) -> Option<LogEntry> {
        self.log(LogLevel::Error, message.into(), metadata, error.map(error_chain))
    }

    fn log(
        &self,
        level: LogLevel,
        message: String,
        metadata: Option<Metadata>,
        stack: Option<String>,
    ) -> Option<LogEntry> {
        if level < self.level {
            return None;
        }

        let entry = LogEntry {
            id: Uuid::new_v4(),
            level,
            message,
            service: self.service.to_string(),
            timestamp: Utc::now(),
            correlation_id: self.correlation_id.clone(),
            metadata: metadata.as_ref().map(sanitize_metadata),
            stack,
        };

        for sink in self.sinks.iter() {
            if let Err(e) = sink.write(&entry) {
                warn!("Log sink '{}' failed: {}", sink.name(), e);
            }
        }

        Some(entry)
    }
}

impl std::fmt::Debug for Logger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Logger")
            .field("service", &self.service)
            .field("level", &self.level)
            .field("sinks", &self.sink_names())
            .field("correlation_id", &self.correlation_id)
            .finish()
    }
}

/// Render an error and its sources, one per line
pub(crate) fn error_chain(error: &(dyn std::error::Error + 'static)) -> String {
    let mut chain = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        chain.push_str("\n  caused by: ");
        chain.push_str(&cause.to_string());
        source = cause.source();
    }
    chain
}
