//! Care Telemetry - observability core for healthcare integration services
//!
//! This library provides structured logging, a classified error taxonomy and
//! an observability facade for services that talk to FHIR servers, patient
//! messaging providers and wearable device APIs.
//!
//! ## Features
//!
//! - **Structured Logging**: Level filtering, correlation IDs and pluggable sinks
//! - **Metadata Sanitization**: Credentials and tokens are redacted at any depth
//! - **Error Taxonomy**: Severity and category on every error, with stable codes
//! - **Alerting**: HIGH and CRITICAL errors reach Slack or email channels
//! - **Metrics**: Bounded sample buffers with p95/p99 rollups
//! - **Health Checks**: Cancellable periodic probes of external dependencies
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use care_telemetry::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = ObservabilityConfig::new("fhir-gateway");
//!     let telemetry = ObservabilityService::new(config)?;
//!
//!     telemetry.register_health_check("ehr-api", || async {
//!         Ok::<_, ProbeError>(ProbeResult::healthy())
//!     })?;
//!
//!     let patient = telemetry
//!         .measure_operation("load-patient", async { Ok::<_, IntegrationError>("Patient/123") }, None, Some("req-1"))
//!         .await;
//!
//!     telemetry.log_circuit_breaker_state_change("ehr-api", CircuitState::Open, Metadata::new(), None);
//!     println!("{:?} {:?}", patient, telemetry.get_service_metrics());
//!
//!     telemetry.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod alerting;
pub mod config;
pub mod error;
pub mod integration;
pub mod logging;
pub mod observability;
pub mod server;
pub mod shutdown;

pub use config::ObservabilityConfig;
pub use error::{Result, TelemetryError};
pub use observability::ObservabilityService;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::alerting::{Alert, AlertDispatcher, AlertSender};
    pub use crate::config::{Environment, ObservabilityConfig};
    pub use crate::error::{Result, TelemetryError};
    pub use crate::integration::{
        analyze_error_patterns, calculate_error_rates, generate_health_report, CircuitState,
        ErrorCategory, ErrorLogger, ErrorSeverity, IntegrationError,
    };
    pub use crate::logging::{LogLevel, Logger, Metadata};
    pub use crate::observability::{
        FhirOperation, HealthProbe, HealthStatus, MessageEvent, ObservabilityService, ProbeError,
        ProbeResult, WearableSync,
    };
}
