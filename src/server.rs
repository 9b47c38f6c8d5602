//! HTTP server for health checks and metrics

use crate::observability::{HealthCheck, HealthStatus, ObservabilityService, ServiceMetrics};
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::future::Future;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Aggregated health response
#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub service: String,
    pub checks: BTreeMap<String, HealthCheck>,
    pub timestamp: DateTime<Utc>,
}

impl HealthReport {
    fn from_checks(service: &str, checks: BTreeMap<String, HealthCheck>) -> Self {
        let status = if checks.values().any(|c| c.status == HealthStatus::Unhealthy) {
            HealthStatus::Unhealthy
        } else if checks.values().any(|c| c.status == HealthStatus::Degraded) {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        };

        Self {
            status,
            service: service.to_string(),
            checks,
            timestamp: Utc::now(),
        }
    }
}

/// Create HTTP server router
pub fn create_router(service: ObservabilityService) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/health/live", get(liveness_check))
        .route("/metrics", get(metrics))
        .route("/metrics/prometheus", get(prometheus_metrics))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(service)
}

/// Full health check endpoint, 503 when any check is unhealthy
async fn health_check(State(service): State<ObservabilityService>) -> impl IntoResponse {
    let report = HealthReport::from_checks(&service.config().service, service.get_all_health_checks());
    let status_code = match report.status {
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
    };
    (status_code, Json(report))
}

/// Liveness probe, 503 once shutdown has started
async fn liveness_check(State(service): State<ObservabilityService>) -> StatusCode {
    if service.is_shutdown() {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    }
}

async fn metrics(State(service): State<ObservabilityService>) -> Json<ServiceMetrics> {
    Json(service.get_service_metrics())
}

/// Metrics endpoint (Prometheus format)
async fn prometheus_metrics(State(service): State<ObservabilityService>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        service.export_prometheus(),
    )
}

/// Serve the router until `shutdown` resolves
pub async fn start_server<F>(
    addr: &str,
    service: ObservabilityService,
    shutdown: F,
) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = create_router(service);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Starting HTTP server on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
}
