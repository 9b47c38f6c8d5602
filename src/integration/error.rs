//! Integration error taxonomy: severity crossed with category

use crate::logging::Metadata;
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Urgency of an error
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl ErrorSeverity {
    pub const ALL: [ErrorSeverity; 4] = [Self::Low, Self::Medium, Self::High, Self::Critical];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
            Self::Critical => "CRITICAL",
        }
    }

    /// Severities that page an operator
    pub fn is_alertable(&self) -> bool {
        matches!(self, Self::High | Self::Critical)
    }
}

impl std::fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Domain an error originated from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCategory {
    Validation,
    ExternalApi,
    CircuitBreaker,
    Messaging,
    WearableSync,
    Authentication,
    FhirProcessing,
    System,
}

impl ErrorCategory {
    pub const ALL: [ErrorCategory; 8] = [
        Self::Validation,
        Self::ExternalApi,
        Self::CircuitBreaker,
        Self::Messaging,
        Self::WearableSync,
        Self::Authentication,
        Self::FhirProcessing,
        Self::System,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validation => "VALIDATION",
            Self::ExternalApi => "EXTERNAL_API",
            Self::CircuitBreaker => "CIRCUIT_BREAKER",
            Self::Messaging => "MESSAGING",
            Self::WearableSync => "WEARABLE_SYNC",
            Self::Authentication => "AUTHENTICATION",
            Self::FhirProcessing => "FHIR_PROCESSING",
            Self::System => "SYSTEM",
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Circuit breaker state, driven by an external state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed => write!(f, "CLOSED"),
            Self::Open => write!(f, "OPEN"),
            Self::HalfOpen => write!(f, "HALF_OPEN"),
        }
    }
}

/// A classified integration failure.
///
/// The `code` is derived at construction and is meant for humans to
/// correlate reports, not as a unique key.
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq)]
#[error("{message}")]
pub struct IntegrationError {
    message: String,
    severity: ErrorSeverity,
    category: ErrorCategory,
    metadata: Metadata,
    code: String,
    timestamp: DateTime<Utc>,
}

impl IntegrationError {
    pub fn new(message: impl Into<String>, severity: ErrorSeverity, category: ErrorCategory) -> Self {
        Self::at(message, severity, category, Utc::now())
    }

    /// Construct with an explicit creation time
    pub fn at(
        message: impl Into<String>,
        severity: ErrorSeverity,
        category: ErrorCategory,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            message: message.into(),
            severity,
            category,
            metadata: Metadata::new(),
            code: generate_error_code(category, timestamp),
            timestamp,
        }
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn severity(&self) -> ErrorSeverity {
        self.severity
    }

    pub fn category(&self) -> ErrorCategory {
        self.category
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// `{CAT}-{last 6 digits of epoch millis}-{3 random base36 chars}`, uppercased
pub fn generate_error_code(category: ErrorCategory, timestamp: DateTime<Utc>) -> String {
    let prefix: String = category.as_str().chars().take(3).collect();
    let millis = timestamp.timestamp_millis().rem_euclid(1_000_000);

    let mut rng = rand::thread_rng();
    let suffix: String = (0..3)
        .map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char)
        .collect();

    format!("{}-{:06}-{}", prefix, millis, suffix).to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn matches_code_format(code: &str) -> bool {
        let parts: Vec<&str> = code.split('-').collect();
        parts.len() == 3
            && parts[0].len() == 3
            && parts[0].chars().all(|c| c.is_ascii_uppercase())
            && parts[1].len() == 6
            && parts[1].chars().all(|c| c.is_ascii_digit())
            && parts[2].len() == 3
            && parts[2].chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
    }

    #[test]
    fn test_code_format_for_every_category() {
        for category in ErrorCategory::ALL {
            for _ in 0..50 {
                let err = IntegrationError::new("boom", ErrorSeverity::Low, category);
                assert!(matches_code_format(err.code()), "bad code {}", err.code());
            }
        }
    }

    #[test]
    fn test_code_prefix_and_time_digits() {
        let ts = Utc.timestamp_millis_opt(1_700_000_123_456).unwrap();
        let err = IntegrationError::at("x", ErrorSeverity::Medium, ErrorCategory::FhirProcessing, ts);
        assert!(err.code().starts_with("FHI-123456-"));

        let ts = Utc.timestamp_millis_opt(1_700_000_000_042).unwrap();
        let err = IntegrationError::at("x", ErrorSeverity::Medium, ErrorCategory::ExternalApi, ts);
        assert!(err.code().starts_with("EXT-000042-"));
    }

    #[test]
    fn test_display_is_message() {
        let err = IntegrationError::new("Connection timeout", ErrorSeverity::High, ErrorCategory::ExternalApi);
        assert_eq!(err.to_string(), "Connection timeout");
    }

    #[test]
    fn test_serialized_names() {
        assert_eq!(serde_json::to_value(ErrorCategory::WearableSync).unwrap(), "WEARABLE_SYNC");
        assert_eq!(serde_json::to_value(ErrorSeverity::Critical).unwrap(), "CRITICAL");
        assert_eq!(serde_json::to_value(CircuitState::HalfOpen).unwrap(), "HALF_OPEN");
        assert_eq!(CircuitState::HalfOpen.to_string(), "HALF_OPEN");
    }

    #[test]
    fn test_alertable_severities() {
        assert!(!ErrorSeverity::Low.is_alertable());
        assert!(!ErrorSeverity::Medium.is_alertable());
        assert!(ErrorSeverity::High.is_alertable());
        assert!(ErrorSeverity::Critical.is_alertable());
    }
}
