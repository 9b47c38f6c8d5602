//! Care Telemetry demo server
//!
//! Loads configuration, registers a sample health check, emits a few domain
//! events and serves the health and metrics endpoints until Ctrl+C or SIGTERM.

use anyhow::Context;
use care_telemetry::{
    config::ObservabilityConfig,
    integration::CircuitState,
    logging::Metadata,
    observability::{init_tracing, FhirOperation, ObservabilityService, ProbeError, ProbeResult},
    server::start_server,
    shutdown::ShutdownCoordinator,
};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config_path =
        std::env::var("CARE_TELEMETRY_CONFIG").unwrap_or_else(|_| "telemetry.toml".to_string());
    let log_format = std::env::var("CARE_TELEMETRY_LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string());

    let config = if Path::new(&config_path).exists() {
        ObservabilityConfig::from_file_with_env(&config_path)
            .with_context(|| format!("loading {}", config_path))?
    } else {
        ObservabilityConfig::new("care-telemetry-demo")
    };

    init_tracing(&config.log_level.as_str().to_lowercase(), &log_format);
    info!("Starting Care Telemetry demo for '{}' ({})", config.service, config.environment);
    if !Path::new(&config_path).exists() {
        warn!("{} not found, using default configuration", config_path);
    }

    let telemetry = ObservabilityService::new(config)?;

    let probe_client = reqwest::Client::new();
    let probe_url = std::env::var("CARE_TELEMETRY_PROBE_URL").ok();
    telemetry.register_health_check("upstream", move || {
        let client = probe_client.clone();
        let url = probe_url.clone();
        async move {
            let Some(url) = url else {
                return Ok::<_, ProbeError>(ProbeResult::healthy());
            };
            let response = client.get(&url).send().await?;
            Ok(ProbeResult {
                healthy: response.status().is_success(),
                ..ProbeResult::default()
            })
        }
    })?;

    telemetry.log_fhir_operation(
        &FhirOperation::new("read", "Patient", true)
            .with_resource_id("example")
            .with_duration(12.0),
        Some("demo-startup"),
    );
    telemetry.log_circuit_breaker_state_change("upstream", CircuitState::Closed, Metadata::new(), None);

    let coordinator = Arc::new(ShutdownCoordinator::new());
    let mut notifier = coordinator.subscribe();
    let signals = coordinator.clone();
    tokio::spawn(async move { signals.wait_for_signal().await });

    let addr = std::env::var("CARE_TELEMETRY_ADDR").unwrap_or_else(|_| "0.0.0.0:9090".to_string());
    start_server(&addr, telemetry.clone(), async move { notifier.wait().await })
        .await
        .with_context(|| format!("serving on {}", addr))?;

    telemetry.shutdown().await;
    info!("Care Telemetry demo shut down");

    Ok(())
}
