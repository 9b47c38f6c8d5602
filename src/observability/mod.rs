//! Observability service, metrics, health checks and tracing setup

pub mod events;
pub mod health;
pub mod metrics;
pub mod service;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub use events::{FhirOperation, MessageEvent, WearableSync};
pub use health::{HealthCheck, HealthCheckHandle, HealthProbe, HealthStatus, ProbeError, ProbeResult};
pub use metrics::{MetricBuffer, MetricSample, ServiceMetrics};
pub use service::{ObservabilityService, ObservabilityServiceBuilder};

/// Initialize the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over `log_level`. `format` is `json` or
/// anything else for human-readable output. Calling this twice is harmless.
pub fn init_tracing(log_level: &str, format: &str) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level));

    let result = match format {
        "json" => tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .try_init(),
        _ => tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .try_init(),
    };

    if let Err(e) = result {
        tracing::debug!("Tracing subscriber already installed: {}", e);
    }
}
