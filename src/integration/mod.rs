//! Integration error taxonomy, error logging and error analytics

pub mod analytics;
pub mod error;
pub mod logger;

pub use analytics::{
    analyze_error_patterns, calculate_error_rates, generate_health_report, ErrorHealthReport,
    ErrorPattern, ReportOptions,
};
pub use error::{generate_error_code, CircuitState, ErrorCategory, ErrorSeverity, IntegrationError};
pub use logger::{
    ConsoleErrorSink, ErrorLogEntry, ErrorLogger, ErrorLoggerConfig, ErrorSink, MemoryErrorSink,
};
