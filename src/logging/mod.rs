//! Structured logging: level filtering, metadata sanitization and sink fan-out

pub mod logger;
pub mod sanitize;
pub mod sink;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use logger::{Logger, LoggerConfig};
pub use sanitize::{sanitize_metadata, REDACTED, SENSITIVE_KEYS};
pub use sink::{ConsoleSink, FileSink, LogSink, MemorySink, RemoteSink};

/// Free-form structured metadata attached to log and error entries
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// Log severity level, ordered `Debug < Info < Warn < Error`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    #[serde(alias = "DEBUG")]
    Debug,
    #[default]
    #[serde(alias = "INFO")]
    Info,
    #[serde(alias = "WARN")]
    Warn,
    #[serde(alias = "ERROR")]
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single emitted log record.
///
/// Entries are built by [`Logger`] after metadata has been sanitized and are
/// never mutated once handed to a sink.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub id: Uuid,
    pub level: LogLevel,
    pub message: String,
    pub service: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
    /// Error source chain, only set on `Error` entries
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_ordering() {
        assert!(LogLevel::Debug < LogLevel::Info);
        assert!(LogLevel::Info < LogLevel::Warn);
        assert!(LogLevel::Warn < LogLevel::Error);
    }

    #[test]
    fn test_level_parses_either_case() {
        let upper: LogLevel = serde_json::from_str("\"WARN\"").unwrap();
        let lower: LogLevel = serde_json::from_str("\"warn\"").unwrap();
        assert_eq!(upper, LogLevel::Warn);
        assert_eq!(lower, LogLevel::Warn);
        assert_eq!(LogLevel::Warn.to_string(), "WARN");
    }
}
