//! Health check probes and their latest results

use crate::logging::Metadata;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::future::Future;
use tokio::task::AbortHandle;

/// Health status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

/// Latest poll result for one registered service
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HealthCheck {
    pub status: HealthStatus,
    pub timestamp: DateTime<Utc>,

    /// Response time in milliseconds
    pub response_time: u64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

/// What a probe reports back
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProbeResult {
    pub healthy: bool,

    /// Probe-reported response time; the measured elapsed time is used when absent
    pub response_time: Option<u64>,

    pub metadata: Option<Metadata>,
}

impl ProbeResult {
    pub fn healthy() -> Self {
        Self { healthy: true, ..Self::default() }
    }

    pub fn unhealthy() -> Self {
        Self::default()
    }

    pub fn with_response_time(mut self, millis: u64) -> Self {
        self.response_time = Some(millis);
        self
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

pub type ProbeError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A dependency check polled on an interval
#[async_trait]
pub trait HealthProbe: Send + Sync {
    async fn check(&self) -> Result<ProbeResult, ProbeError>;
}

#[async_trait]
impl<F, Fut> HealthProbe for F
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<ProbeResult, ProbeError>> + Send + 'static,
{
    async fn check(&self) -> Result<ProbeResult, ProbeError> {
        (self)().await
    }
}

/// Cancels one registered health check
#[derive(Debug, Clone)]
pub struct HealthCheckHandle {
    name: String,
    abort: AbortHandle,
}

impl HealthCheckHandle {
    pub(crate) fn new(name: String, abort: AbortHandle) -> Self {
        Self { name, abort }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stop polling. The last recorded result stays in place.
    pub fn cancel(&self) {
        self.abort.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.abort.is_finished()
    }
}
