//! Observability service facade
//!
//! Composes the structured [`Logger`], the [`ErrorLogger`] and the alert
//! dispatcher, and owns the metric buffers and the health-check registry.

use super::events::{object, FhirOperation, MessageEvent, WearableSync};
use super::health::{HealthCheck, HealthCheckHandle, HealthProbe, HealthStatus};
use super::metrics::{
    MetricBuffer, MetricSample, ServiceMetrics, FHIR_OPERATIONS, MESSAGE_EVENTS,
    OPERATION_PERFORMANCE, WEARABLE_SYNCS,
};
use crate::alerting::{Alert, AlertDispatcher, AlertSender, MailTransport};
use crate::config::{Environment, ObservabilityConfig};
use crate::error::{Result, TelemetryError};
use crate::integration::{
    CircuitState, ErrorCategory, ErrorLogEntry, ErrorLogger, ErrorLoggerConfig, ErrorSeverity,
    ErrorSink, IntegrationError,
};
use crate::logging::{sanitize_metadata, LogEntry, LogSink, Logger, LoggerConfig, Metadata};
use crate::shutdown::ShutdownCoordinator;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use futures::future::join_all;
use serde_json::json;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// How long `shutdown` waits for health-check tasks before aborting them
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

struct Inner {
    config: ObservabilityConfig,
    logger: Logger,
    error_logger: ErrorLogger,
    alerts: Arc<AlertDispatcher>,
    metrics: MetricBuffer,
    health: DashMap<String, HealthCheck>,
    health_tasks: Mutex<Vec<JoinHandle<()>>>,
    circuit_states: DashMap<String, CircuitState>,
    shutdown: ShutdownCoordinator,
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.shutdown.shutdown();
        let tasks = self
            .health_tasks
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);
        for task in tasks.drain(..) {
            task.abort();
        }
    }
}

/// Observability service.
///
/// Cloning is cheap and every clone shares the same buffers, health checks
/// and sinks. Background health-check tasks stop when the last clone is
/// dropped or [`ObservabilityService::shutdown`] is called.
#[derive(Clone)]
pub struct ObservabilityService {
    inner: Arc<Inner>,
}

/// Builder for [`ObservabilityService`] with injectable sinks and channels
pub struct ObservabilityServiceBuilder {
    config: ObservabilityConfig,
    log_sinks: Option<Vec<Arc<dyn LogSink>>>,
    error_sink: Option<Arc<dyn ErrorSink>>,
    alert_senders: Vec<Arc<dyn AlertSender>>,
    mail_transport: Option<Arc<dyn MailTransport>>,
}

impl ObservabilityServiceBuilder {
    /// Replace the environment-derived log sinks
    pub fn log_sinks(mut self, sinks: Vec<Arc<dyn LogSink>>) -> Self {
        self.log_sinks = Some(sinks);
        self
    }

    /// Replace the environment-derived error sink
    pub fn error_sink(mut self, sink: Arc<dyn ErrorSink>) -> Self {
        self.error_sink = Some(sink);
        self
    }

    /// Add an alert channel on top of the configured ones
    pub fn alert_sender(mut self, sender: Arc<dyn AlertSender>) -> Self {
        self.alert_senders.push(sender);
        self
    }

    /// Transport used to reach `alerting.email_recipients`
    pub fn mail_transport(mut self, transport: Arc<dyn MailTransport>) -> Self {
        self.mail_transport = Some(transport);
        self
    }

    pub fn build(self) -> Result<ObservabilityService> {
        let config = self.config;
        config.validate()?;

        let production = config.environment == Environment::Production;
        let remote_timeout = Duration::from_secs(config.remote.timeout_secs);

        let logger = match self.log_sinks {
            Some(sinks) => Logger::with_sinks(config.service.clone(), config.log_level, sinks),
            None => Logger::new(LoggerConfig {
                service: config.service.clone(),
                level: config.log_level,
                enable_console: config.environment == Environment::Development,
                enable_file: true,
                file_path: Some(config.log_file_path()),
                enable_remote: production,
                remote_endpoint: config.remote.log_endpoint.clone(),
                remote_timeout,
            }),
        };

        let mut alerts = AlertDispatcher::from_config(&config.alerting, self.mail_transport);
        for sender in self.alert_senders {
            alerts = alerts.with_sender(sender);
        }
        let alerts = Arc::new(alerts);

        let error_config = ErrorLoggerConfig {
            service: config.service.clone(),
            enable_remote: production,
            remote_endpoint: config.remote.error_endpoint.clone(),
            remote_timeout,
            retention_days: config.error_retention_days,
            enable_alerts: config.alerting.enable_alerts,
        };
        let error_logger = match self.error_sink {
            Some(sink) => ErrorLogger::with_sink(error_config, sink),
            None => ErrorLogger::new(error_config),
        }
        .with_alert_dispatcher(alerts.clone());

        info!(
            "Observability service '{}' initialized: environment={}, log sinks={:?}, error sink={}, alert channels={:?}",
            config.service,
            config.environment,
            logger.sink_names(),
            error_logger.sink_name(),
            alerts.channel_names()
        );

        Ok(ObservabilityService {
            inner: Arc::new(Inner {
                metrics: MetricBuffer::new(config.metrics.buffer_capacity),
                config,
                logger,
                error_logger,
                alerts,
                health: DashMap::new(),
                health_tasks: Mutex::new(Vec::new()),
                circuit_states: DashMap::new(),
                shutdown: ShutdownCoordinator::new(),
            }),
        })
    }
}

impl ObservabilityService {
    /// Build a service with sinks derived from the configured environment
    pub fn new(config: ObservabilityConfig) -> Result<Self> {
        Self::builder(config).build()
    }

    pub fn builder(config: ObservabilityConfig) -> ObservabilityServiceBuilder {
        ObservabilityServiceBuilder {
            config,
            log_sinks: None,
            error_sink: None,
            alert_senders: Vec::new(),
            mail_transport: None,
        }
    }

    pub fn config(&self) -> &ObservabilityConfig {
        &self.inner.config
    }

    pub fn logger(&self) -> &Logger {
        &self.inner.logger
    }

    pub fn error_logger(&self) -> &ErrorLogger {
        &self.inner.error_logger
    }

    /// Alerts accepted by the dispatcher so far
    pub fn alerts_dispatched(&self) -> u64 {
        self.inner.alerts.dispatched_count()
    }

    fn scoped_logger(&self, correlation_id: Option<&str>) -> Logger {
        match correlation_id {
            Some(id) => self.inner.logger.with_correlation(id),
            None => self.inner.logger.clone(),
        }
    }

    pub fn log_debug(&self, message: impl Into<String>, metadata: Option<Metadata>, correlation_id: Option<&str>) -> Option<LogEntry> {
        self.scoped_logger(correlation_id).debug(message, metadata)
    }

    pub fn log_info(&self, message: impl Into<String>, metadata: Option<Metadata>, correlation_id: Option<&str>) -> Option<LogEntry> {
        self.scoped_logger(correlation_id).info(message, metadata)
    }

    pub fn log_warn(&self, message: impl Into<String>, metadata: Option<Metadata>, correlation_id: Option<&str>) -> Option<LogEntry> {
        self.scoped_logger(correlation_id).warn(message, metadata)
    }

    /// Record an error through the error logger and the plain logger.
    ///
    /// An [`IntegrationError`] keeps its classification; anything else is
    /// recorded as SYSTEM / MEDIUM with `metadata` attached.
    pub fn log_error(
        &self,
        error: &(dyn std::error::Error + 'static),
        metadata: Option<Metadata>,
        correlation_id: Option<&str>,
    ) -> ErrorLogEntry {
        let entry = match error.downcast_ref::<IntegrationError>() {
            Some(integration) => self.inner.error_logger.log_error(integration, correlation_id),
            None => {
                let wrapped = IntegrationError::new(error.to_string(), ErrorSeverity::Medium, ErrorCategory::System)
                    .with_metadata(metadata.clone().unwrap_or_default());
                self.inner.error_logger.log_error(&wrapped, correlation_id)
            }
        };

        self.scoped_logger(correlation_id)
            .error(error.to_string(), metadata, Some(error));

        entry
    }

    pub fn log_fhir_operation(&self, operation: &FhirOperation, correlation_id: Option<&str>) {
        let metadata = operation.to_metadata();

        if operation.success {
            self.log_info(
                format!("FHIR {} {} completed", operation.operation, operation.resource_type),
                Some(metadata.clone()),
                correlation_id,
            );
        } else {
            let error = IntegrationError::new(
                operation.failure_message(),
                ErrorSeverity::Medium,
                ErrorCategory::FhirProcessing,
            )
            .with_metadata(metadata.clone());
            self.inner.error_logger.log_error(&error, correlation_id);
        }

        self.record_metric(FHIR_OPERATIONS, sanitize_metadata(&metadata));
    }

    pub fn log_message_event(&self, event: &MessageEvent, correlation_id: Option<&str>) {
        let metadata = event.to_metadata();

        if event.success {
            self.log_info(
                format!("Message {} via {}", event.event_type, event.channel),
                Some(metadata.clone()),
                correlation_id,
            );
        } else {
            self.inner.error_logger.log_messaging_error(
                &event.failure_message(),
                &event.provider,
                metadata.clone(),
                correlation_id,
            );
        }

        self.record_metric(MESSAGE_EVENTS, sanitize_metadata(&metadata));
    }

    pub fn log_wearable_sync(&self, sync: &WearableSync, correlation_id: Option<&str>) {
        let metadata = sync.to_metadata();

        if sync.success {
            self.log_info(
                format!("Wearable sync completed for {} ({} records)", sync.provider, sync.records_synced),
                Some(metadata.clone()),
                correlation_id,
            );
        } else {
            self.inner.error_logger.log_wearable_error(
                &sync.failure_message(),
                &sync.provider,
                &sync.device_id,
                metadata.clone(),
                correlation_id,
            );
        }

        self.record_metric(WEARABLE_SYNCS, sanitize_metadata(&metadata));
    }

    /// Log a circuit transition and page operators when it opened
    pub fn log_circuit_breaker_state_change(
        &self,
        service_name: &str,
        state: CircuitState,
        metadata: Metadata,
        correlation_id: Option<&str>,
    ) -> ErrorLogEntry {
        self.inner.circuit_states.insert(service_name.to_string(), state);

        let entry = self.inner.error_logger.log_circuit_breaker_event(
            service_name,
            state,
            metadata.clone(),
            correlation_id,
        );

        if state == CircuitState::Open {
            self.trigger_alert(
                format!("Circuit breaker OPEN for {}", service_name),
                format!("Circuit breaker for service {} opened, requests are short-circuited", service_name),
                ErrorSeverity::High,
                metadata,
                correlation_id,
            );
        }

        entry
    }

    /// Poll `probe` every health-check interval, first one interval from now.
    ///
    /// The returned handle cancels this registration only. A name that is
    /// registered twice is polled by both tasks, last write wins.
    pub fn register_health_check<P>(&self, name: impl Into<String>, probe: P) -> Result<HealthCheckHandle>
    where
        P: HealthProbe + 'static,
    {
        let name = name.into();
        if self.inner.shutdown.is_shutdown() {
            return Err(TelemetryError::Internal(format!(
                "cannot register health check '{}' after shutdown",
                name
            )));
        }

        let runtime = tokio::runtime::Handle::try_current().map_err(|_| {
            TelemetryError::Internal(format!("health check '{}' requires a tokio runtime", name))
        })?;

        let period = self.inner.config.health_check_interval();
        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        let mut shutdown = self.inner.shutdown.subscribe();
        let task_name = name.clone();

        let task = runtime.spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = shutdown.wait() => break,
                    _ = ticker.tick() => {
                        let Some(inner) = weak.upgrade() else { break };
                        let service = ObservabilityService { inner };
                        service.poll_health_check(&task_name, &probe).await;
                    }
                }
            }

            debug!("Health check '{}' stopped", task_name);
        });

        let handle = HealthCheckHandle::new(name.clone(), task.abort_handle());
        let mut tasks = self
            .inner
            .health_tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        tasks.retain(|t| !t.is_finished());
        tasks.push(task);
        drop(tasks);

        debug!("Registered health check '{}' every {:?}", name, period);
        Ok(handle)
    }

    /// Health-check tasks still held by the service
    pub(crate) fn tracked_health_tasks(&self) -> usize {
        self.inner
            .health_tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Run `probe` once and store the result under `name`
    pub async fn poll_health_check(&self, name: &str, probe: &dyn HealthProbe) -> HealthCheck {
        let started = Instant::now();

        let check = match probe.check().await {
            Ok(result) => {
                let elapsed = started.elapsed().as_millis() as u64;
                HealthCheck {
                    status: if result.healthy {
                        HealthStatus::Healthy
                    } else {
                        HealthStatus::Unhealthy
                    },
                    timestamp: Utc::now(),
                    response_time: result.response_time.unwrap_or(elapsed),
                    metadata: result.metadata,
                }
            }
            Err(e) => {
                let metadata = object(json!({ "error": e.to_string() }));
                let mut error_metadata = metadata.clone();
                error_metadata.insert("service".to_string(), json!(name));

                let err: &(dyn std::error::Error + 'static) = &*e;
                self.log_error(err, Some(error_metadata), None);

                HealthCheck {
                    status: HealthStatus::Unhealthy,
                    timestamp: Utc::now(),
                    response_time: 0,
                    metadata: Some(metadata),
                }
            }
        };

        if check.status == HealthStatus::Unhealthy {
            self.log_warn(
                format!("Health check failed for {}", name),
                Some(object(json!({ "service": name, "responseTime": check.response_time }))),
                None,
            );
        }

        self.inner.health.insert(name.to_string(), check.clone());
        check
    }

    /// Latest result per registered check
    pub fn get_all_health_checks(&self) -> BTreeMap<String, HealthCheck> {
        self.inner
            .health
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    pub fn get_health_check(&self, name: &str) -> Option<HealthCheck> {
        self.inner.health.get(name).map(|c| c.value().clone())
    }

    /// Append a sample to the named buffer. No-op when metrics are disabled.
    pub fn record_metric(&self, name: &str, data: Metadata) {
        if !self.inner.config.enable_metrics {
            return;
        }
        self.inner.metrics.record(name, data);
    }

    pub fn metric_samples(&self, name: &str) -> Vec<MetricSample> {
        self.inner.metrics.samples(name)
    }

    /// Await `operation`, recording one `operation_performance` sample.
    ///
    /// The error is logged and returned unchanged. The sample is recorded
    /// even when the future is dropped before completing.
    pub async fn measure_operation<T, E, Fut>(
        &self,
        name: &str,
        operation: Fut,
        metadata: Option<Metadata>,
        correlation_id: Option<&str>,
    ) -> std::result::Result<T, E>
    where
        Fut: Future<Output = std::result::Result<T, E>>,
        E: std::error::Error + 'static,
    {
        let metadata = metadata.unwrap_or_default();
        let mut guard = OperationGuard {
            service: self,
            name,
            started: Instant::now(),
            success: false,
            metadata: &metadata,
        };

        let result = operation.await;
        guard.success = result.is_ok();

        let mut details = object(json!({
            "operation": name,
            "duration": guard.elapsed_ms(),
        }));
        details.extend(metadata.clone());

        match &result {
            Ok(_) => {
                self.log_info(format!("Operation {} completed", name), Some(details), correlation_id);
            }
            Err(e) => {
                self.log_error(e, Some(details), correlation_id);
            }
        }

        drop(guard);
        result
    }

    /// Rollup over the configured window of operation and FHIR samples
    pub fn get_service_metrics(&self) -> ServiceMetrics {
        // A window reaching past the representable range covers all samples
        let since = chrono::Duration::from_std(self.inner.config.metrics_window())
            .ok()
            .and_then(|window| Utc::now().checked_sub_signed(window))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);

        let circuit_states = self
            .inner
            .circuit_states
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect();

        self.inner
            .metrics
            .rollup(&[OPERATION_PERFORMANCE, FHIR_OPERATIONS], since, circuit_states)
    }

    /// Prometheus text exposition of the rollup and per-buffer sample counts
    pub fn export_prometheus(&self) -> String {
        let prefix = metric_prefix(&self.inner.config.service);
        let mut output = self.get_service_metrics().export_prometheus(&prefix);

        let sizes = self.inner.metrics.sizes();
        if !sizes.is_empty() {
            output.push_str(&format!(
                "\n# HELP {p}_metric_samples Samples currently buffered per metric\n\
                 # TYPE {p}_metric_samples gauge\n",
                p = prefix
            ));
            for (name, count) in sizes {
                output.push_str(&format!("{}_metric_samples{{metric=\"{}\"}} {}\n", prefix, name, count));
            }
        }

        output
    }

    /// Warn and dispatch to the configured channels. No-op unless alerts are enabled.
    pub fn trigger_alert(
        &self,
        title: impl Into<String>,
        message: impl Into<String>,
        severity: ErrorSeverity,
        metadata: Metadata,
        correlation_id: Option<&str>,
    ) -> bool {
        let alert = Alert::new(title, message, severity, self.inner.config.service.clone())
            .with_metadata(sanitize_metadata(&metadata))
            .with_correlation_id(correlation_id.map(str::to_string));
        self.inner.alerts.dispatch(alert)
    }

    /// Compare the current rollup against the alerting thresholds.
    ///
    /// Returns the number of alerts raised.
    pub fn check_alert_thresholds(&self) -> usize {
        let metrics = self.get_service_metrics();
        let thresholds = &self.inner.config.alerting;
        let mut raised = 0;

        if metrics.request_count > 0 {
            let error_rate = metrics.error_count as f64 / metrics.request_count as f64 * 100.0;
            if error_rate > thresholds.error_rate_threshold
                && self.trigger_alert(
                    "Error rate threshold exceeded",
                    format!(
                        "Error rate {:.2}% over {} requests exceeds {:.2}%",
                        error_rate, metrics.request_count, thresholds.error_rate_threshold
                    ),
                    ErrorSeverity::High,
                    object(json!({ "errorRate": error_rate, "threshold": thresholds.error_rate_threshold })),
                    None,
                )
            {
                raised += 1;
            }
        }

        if metrics.average_response_time > thresholds.response_time_threshold as f64
            && self.trigger_alert(
                "Response time threshold exceeded",
                format!(
                    "Average response time {:.0}ms exceeds {}ms",
                    metrics.average_response_time, thresholds.response_time_threshold
                ),
                ErrorSeverity::Medium,
                object(json!({
                    "averageResponseTime": metrics.average_response_time,
                    "p95ResponseTime": metrics.p95_response_time,
                    "threshold": thresholds.response_time_threshold,
                })),
                None,
            )
        {
            raised += 1;
        }

        raised
    }

    /// Whether shutdown has been requested
    pub fn is_shutdown(&self) -> bool {
        self.inner.shutdown.is_shutdown()
    }

    /// Stop every health-check task, waiting briefly for in-flight probes
    pub async fn shutdown(&self) {
        self.inner.shutdown.shutdown();

        let tasks: Vec<JoinHandle<()>> = self
            .inner
            .health_tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();
        let count = tasks.len();
        let aborts: Vec<_> = tasks.iter().map(|t| t.abort_handle()).collect();

        if tokio::time::timeout(SHUTDOWN_GRACE, join_all(tasks)).await.is_err() {
            warn!("Health checks did not stop within {:?}, aborting", SHUTDOWN_GRACE);
            for abort in aborts {
                abort.abort();
            }
        }

        info!(
            "Observability service '{}' shut down ({} health checks stopped)",
            self.inner.config.service, count
        );
    }
}

impl std::fmt::Debug for ObservabilityService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObservabilityService")
            .field("service", &self.inner.config.service)
            .field("environment", &self.inner.config.environment)
            .field("logger", &self.inner.logger)
            .field("alerts", &self.inner.alerts)
            .field("health_checks", &self.inner.health.len())
            .finish()
    }
}

/// Records the `operation_performance` sample on every exit path
struct OperationGuard<'a> {
    service: &'a ObservabilityService,
    name: &'a str,
    started: Instant,
    success: bool,
    metadata: &'a Metadata,
}

impl OperationGuard<'_> {
    fn elapsed_ms(&self) -> f64 {
        self.started.elapsed().as_secs_f64() * 1000.0
    }
}

impl Drop for OperationGuard<'_> {
    fn drop(&mut self) {
        let mut sample = sanitize_metadata(self.metadata);
        sample.insert("operation".to_string(), json!(self.name));
        sample.insert("duration".to_string(), json!(self.elapsed_ms()));
        sample.insert("success".to_string(), json!(self.success));
        self.service.record_metric(OPERATION_PERFORMANCE, sample);
    }
}

/// Service name as a Prometheus metric prefix
fn metric_prefix(service: &str) -> String {
    let prefix: String = service
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
        .collect();
    match prefix.chars().next() {
        Some(c) if c.is_ascii_digit() => format!("_{}", prefix),
        _ => prefix,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerting::testing::ChannelSender;
    use crate::config::AlertingConfig;
    use crate::integration::MemoryErrorSink;
    use crate::logging::sink::MemorySink;
    use crate::logging::LogLevel;
    use crate::observability::health::{ProbeError, ProbeResult};
    use tokio::sync::mpsc;

    struct Harness {
        service: ObservabilityService,
        logs: MemorySink,
        errors: MemoryErrorSink,
        alerts: mpsc::UnboundedReceiver<Alert>,
    }

    fn harness(enable_alerts: bool) -> Harness {
        let logs = MemorySink::new();
        let errors = MemoryErrorSink::new();
        let (tx, alerts) = mpsc::unbounded_channel();

        let config = ObservabilityConfig::new("fhir-gateway")
            .with_log_level(LogLevel::Debug)
            .with_alerting(AlertingConfig {
                enable_alerts,
                ..AlertingConfig::default()
            });

        let service = ObservabilityService::builder(config)
            .log_sinks(vec![Arc::new(logs.clone())])
            .error_sink(Arc::new(errors.clone()))
            .alert_sender(Arc::new(ChannelSender(tx)))
            .build()
            .unwrap();

        Harness { service, logs, errors, alerts }
    }

    #[derive(Debug, thiserror::Error, PartialEq)]
    #[error("upstream returned 502")]
    struct UpstreamError;

    #[test]
    fn test_build_rejects_invalid_config() {
        let result = ObservabilityService::builder(ObservabilityConfig::new(""))
            .log_sinks(Vec::new())
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_log_error_wraps_plain_errors() {
        let h = harness(false);
        let meta = object(json!({ "endpoint": "/Patient" }));

        let entry = h.service.log_error(&UpstreamError, Some(meta), Some("req-7"));

        assert_eq!(entry.severity, ErrorSeverity::Medium);
        assert_eq!(entry.category, ErrorCategory::System);
        assert_eq!(entry.message, "upstream returned 502");
        assert_eq!(entry.metadata["endpoint"], json!("/Patient"));

        let logged = h.logs.entries();
        assert_eq!(logged.len(), 1);
        assert_eq!(logged[0].level, LogLevel::Error);
        assert_eq!(logged[0].correlation_id.as_deref(), Some("req-7"));
    }

    #[test]
    fn test_log_error_keeps_integration_classification() {
        let h = harness(false);
        let err = IntegrationError::new("token expired", ErrorSeverity::High, ErrorCategory::Authentication);

        let entry = h.service.log_error(&err, None, None);

        assert_eq!(entry.code, err.code());
        assert_eq!(entry.category, ErrorCategory::Authentication);
        assert_eq!(h.errors.entries().len(), 1);
    }

    #[test]
    fn test_domain_helpers_record_metrics_on_both_branches() {
        let h = harness(false);

        h.service.log_fhir_operation(&FhirOperation::new("read", "Patient", true).with_duration(20.0), None);
        h.service.log_fhir_operation(
            &FhirOperation::new("create", "Observation", false).with_error("422"),
            Some("req-1"),
        );
        h.service.log_message_event(&MessageEvent::new("sent", "m-1", "sms", "twilio", false), None);
        h.service.log_wearable_sync(&WearableSync::new("fitbit", "dev-1", true).with_records(12), None);

        assert_eq!(h.service.metric_samples(FHIR_OPERATIONS).len(), 2);
        assert_eq!(h.service.metric_samples(MESSAGE_EVENTS).len(), 1);
        assert_eq!(h.service.metric_samples(WEARABLE_SYNCS).len(), 1);

        let errors = h.errors.entries();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].category, ErrorCategory::FhirProcessing);
        assert_eq!(errors[0].severity, ErrorSeverity::Medium);
        assert_eq!(errors[0].correlation_id.as_deref(), Some("req-1"));
        assert_eq!(errors[1].category, ErrorCategory::Messaging);
        assert_eq!(errors[1].metadata["provider"], json!("twilio"));

        assert_eq!(h.logs.len(), 2);
    }

    #[test]
    fn test_metrics_disabled_is_noop() {
        let mut config = ObservabilityConfig::new("fhir-gateway");
        config.enable_metrics = false;
        let service = ObservabilityService::builder(config)
            .log_sinks(Vec::new())
            .error_sink(Arc::new(MemoryErrorSink::new()))
            .build()
            .unwrap();

        service.record_metric("custom", Metadata::new());
        service.log_fhir_operation(&FhirOperation::new("read", "Patient", true), None);

        assert!(service.metric_samples("custom").is_empty());
        assert_eq!(service.get_service_metrics().request_count, 0);
    }

    #[tokio::test]
    async fn test_measure_operation_success() {
        let h = harness(false);

        let value = h
            .service
            .measure_operation("load-patient", async { Ok::<_, UpstreamError>(7) }, None, None)
            .await
            .unwrap();

        assert_eq!(value, 7);
        let samples = h.service.metric_samples(OPERATION_PERFORMANCE);
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].data["success"], json!(true));
        assert_eq!(samples[0].data["operation"], json!("load-patient"));
        assert!(samples[0].data["duration"].is_number());
    }

    #[tokio::test]
    async fn test_measure_operation_dropped_future_records_failure() {
        let h = harness(false);

        let pending = h.service.measure_operation(
            "never-finishes",
            std::future::pending::<std::result::Result<(), UpstreamError>>(),
            None,
            None,
        );
        let _ = tokio::time::timeout(Duration::from_millis(10), pending).await;

        let samples = h.service.metric_samples(OPERATION_PERFORMANCE);
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].data["success"], json!(false));
    }

    #[tokio::test]
    async fn test_circuit_open_alerts_and_snapshots_state() {
        let mut h = harness(true);

        h.service.log_circuit_breaker_state_change("ehr-api", CircuitState::HalfOpen, Metadata::new(), None);
        assert_eq!(h.service.alerts_dispatched(), 0);

        h.service.log_circuit_breaker_state_change("ehr-api", CircuitState::Open, Metadata::new(), Some("req-9"));
        assert!(h.service.alerts_dispatched() >= 1);

        let mut titles = Vec::new();
        for _ in 0..2 {
            let alert = tokio::time::timeout(Duration::from_secs(1), h.alerts.recv())
                .await
                .unwrap()
                .unwrap();
            titles.push(alert.title);
        }
        assert!(titles.iter().any(|t| t == "Circuit breaker OPEN for ehr-api"));

        let metrics = h.service.get_service_metrics();
        assert_eq!(metrics.circuit_breaker_states.get("ehr-api"), Some(&CircuitState::Open));
    }

    #[tokio::test]
    async fn test_failing_probe_recorded_unhealthy() {
        let h = harness(false);
        let probe = || async { Err::<ProbeResult, ProbeError>("connection refused".into()) };

        let check = h.service.poll_health_check("redis", &probe).await;

        assert_eq!(check.status, HealthStatus::Unhealthy);
        assert_eq!(check.response_time, 0);
        assert_eq!(check.metadata.as_ref().unwrap()["error"], json!("connection refused"));
        assert_eq!(h.errors.entries()[0].category, ErrorCategory::System);
        assert_eq!(h.service.get_health_check("redis"), Some(check));
    }

    #[tokio::test]
    async fn test_threshold_alerts() {
        let h = harness(true);
        for success in [true, false] {
            h.service.record_metric(
                OPERATION_PERFORMANCE,
                object(json!({ "duration": 9000.0, "success": success })),
            );
        }

        assert_eq!(h.service.check_alert_thresholds(), 2);
    }

    #[test]
    fn test_prometheus_export_includes_buffers() {
        let h = harness(false);
        h.service.record_metric(MESSAGE_EVENTS, object(json!({ "success": true })));

        let text = h.service.export_prometheus();
        assert!(text.contains("fhir_gateway_requests 0"));
        assert!(text.contains("fhir_gateway_metric_samples{metric=\"message_events\"} 1"));
    }

    #[test]
    fn test_oversized_window_covers_all_samples() {
        let mut config = ObservabilityConfig::new("fhir-gateway");
        config.metrics.window_secs = 10_000_000_000_000;
        let service = ObservabilityService::builder(config)
            .log_sinks(Vec::new())
            .error_sink(Arc::new(MemoryErrorSink::new()))
            .build()
            .unwrap();

        service.record_metric(OPERATION_PERFORMANCE, object(json!({ "duration": 5.0, "success": false })));

        let metrics = service.get_service_metrics();
        assert_eq!(metrics.request_count, 1);
        assert_eq!(metrics.error_count, 1);
        assert!(service.export_prometheus().contains("fhir_gateway_errors 1"));
    }

    #[test]
    fn test_failed_fhir_operation_counts_as_error() {
        let h = harness(false);
        let op = FhirOperation::new("read", "Patient", false)
            .with_metadata(object(json!({ "success": true, "duration": 1.0 })));

        h.service.log_fhir_operation(&op, None);

        let metrics = h.service.get_service_metrics();
        assert_eq!(metrics.request_count, 1);
        assert_eq!(metrics.error_count, 1);
        assert_eq!(h.service.metric_samples(FHIR_OPERATIONS)[0].data["success"], json!(false));
    }

    fn environment_config(environment: Environment, log_dir: &std::path::Path) -> ObservabilityConfig {
        let mut config = ObservabilityConfig::new("fhir-gateway").with_environment(environment);
        config.log_dir = log_dir.to_path_buf();
        config.remote.log_endpoint = Some("http://localhost:1/logs".to_string());
        config.remote.error_endpoint = Some("http://localhost:1/errors".to_string());
        config
    }

    #[tokio::test]
    async fn test_environment_gates_default_sinks() {
        let log_dir = std::env::temp_dir().join(format!("care-telemetry-{}", uuid::Uuid::new_v4()));

        let dev = ObservabilityService::new(environment_config(Environment::Development, &log_dir)).unwrap();
        assert_eq!(dev.logger().sink_names(), vec!["console", "file"]);
        assert_eq!(dev.error_logger().sink_name(), "console");

        let staging = ObservabilityService::new(environment_config(Environment::Staging, &log_dir)).unwrap();
        assert_eq!(staging.logger().sink_names(), vec!["file"]);
        assert_eq!(staging.error_logger().sink_name(), "console");

        let prod = ObservabilityService::new(environment_config(Environment::Production, &log_dir)).unwrap();
        assert_eq!(prod.logger().sink_names(), vec!["file", "remote"]);
        assert_eq!(prod.error_logger().sink_name(), "remote");
        assert_eq!(prod.error_logger().config().retention_days, 90);

        let _ = std::fs::remove_dir_all(&log_dir);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_health_tasks_are_pruned() {
        let h = harness(false);
        let healthy = || async { Ok::<_, ProbeError>(ProbeResult::healthy()) };

        for _ in 0..3 {
            let handle = h.service.register_health_check("ehr-api", healthy).unwrap();
            handle.cancel();
            tokio::time::sleep(Duration::from_millis(1)).await;
            assert!(handle.is_finished());
        }

        h.service.register_health_check("redis", healthy).unwrap();
        assert_eq!(h.service.tracked_health_tasks(), 1);
    }

    #[test]
    fn test_metric_prefix() {
        assert_eq!(metric_prefix("fhir-gateway"), "fhir_gateway");
        assert_eq!(metric_prefix("9lives"), "_9lives");
    }
}
