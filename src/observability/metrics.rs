//! Bounded metric sample buffers and service-level rollups

use crate::integration::CircuitState;
use crate::logging::Metadata;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};

/// Metric names written by the service facade
pub const OPERATION_PERFORMANCE: &str = "operation_performance";
pub const FHIR_OPERATIONS: &str = "fhir_operations";
pub const MESSAGE_EVENTS: &str = "message_events";
pub const WEARABLE_SYNCS: &str = "wearable_syncs";

/// One timestamped metric record
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetricSample {
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub data: Metadata,
}

impl MetricSample {
    fn success(&self) -> Option<bool> {
        self.data.get("success").and_then(|v| v.as_bool())
    }

    fn duration(&self) -> Option<f64> {
        self.data.get("duration").and_then(|v| v.as_f64())
    }
}

/// Rollup over the recent metrics window
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ServiceMetrics {
    pub request_count: usize,
    pub error_count: usize,
    pub average_response_time: f64,
    pub p95_response_time: f64,
    pub p99_response_time: f64,
    /// Last state reported per circuit, empty until a transition is logged
    pub circuit_breaker_states: BTreeMap<String, CircuitState>,
    pub timestamp: DateTime<Utc>,
}

impl ServiceMetrics {
    /// Export in Prometheus text format
    pub fn export_prometheus(&self, prefix: &str) -> String {
        let mut output = format!(
            "# HELP {p}_requests Requests in the metrics window\n\
             # TYPE {p}_requests gauge\n\
             {p}_requests {}\n\
             \n\
             # HELP {p}_errors Failed requests in the metrics window\n\
             # TYPE {p}_errors gauge\n\
             {p}_errors {}\n\
             \n\
             # HELP {p}_response_time_ms Response time in milliseconds\n\
             # TYPE {p}_response_time_ms gauge\n\
             {p}_response_time_ms{{stat=\"avg\"}} {:.2}\n\
             {p}_response_time_ms{{stat=\"p95\"}} {:.2}\n\
             {p}_response_time_ms{{stat=\"p99\"}} {:.2}\n",
            self.request_count,
            self.error_count,
            self.average_response_time,
            self.p95_response_time,
            self.p99_response_time,
            p = prefix,
        );

        if !self.circuit_breaker_states.is_empty() {
            output.push_str(&format!(
                "\n# HELP {p}_circuit_breaker_open Whether the circuit is open (1) or not (0)\n\
                 # TYPE {p}_circuit_breaker_open gauge\n",
                p = prefix
            ));
            for (service, state) in &self.circuit_breaker_states {
                output.push_str(&format!(
                    "{}_circuit_breaker_open{{service=\"{}\",state=\"{}\"}} {}\n",
                    prefix,
                    service,
                    state,
                    u8::from(*state == CircuitState::Open)
                ));
            }
        }

        output
    }
}

/// Per-name FIFO buffers, each capped at `capacity` samples.
///
/// Appends and trims for one name are serialized by the map shard lock.
#[derive(Debug)]
pub struct MetricBuffer {
    capacity: usize,
    buffers: DashMap<String, VecDeque<MetricSample>>,
}

impl MetricBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            buffers: DashMap::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn record(&self, name: &str, data: Metadata) {
        self.record_at(name, data, Utc::now());
    }

    /// A `timestamp` key in `data` is dropped, the sample's own timestamp wins
    pub(crate) fn record_at(&self, name: &str, mut data: Metadata, timestamp: DateTime<Utc>) {
        data.remove("timestamp");
        let mut buffer = self.buffers.entry(name.to_string()).or_default();
        buffer.push_back(MetricSample { timestamp, data });
        while buffer.len() > self.capacity {
            buffer.pop_front();
        }
    }

    /// Snapshot of one buffer, oldest first
    pub fn samples(&self, name: &str) -> Vec<MetricSample> {
        self.buffers
            .get(name)
            .map(|b| b.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn len(&self, name: &str) -> usize {
        self.buffers.get(name).map(|b| b.len()).unwrap_or(0)
    }

    /// Sample count per metric name
    pub fn sizes(&self) -> BTreeMap<String, usize> {
        self.buffers
            .iter()
            .map(|b| (b.key().clone(), b.value().len()))
            .collect()
    }

    /// Aggregate samples of `names` recorded at or after `since`
    pub fn rollup(
        &self,
        names: &[&str],
        since: DateTime<Utc>,
        circuit_breaker_states: BTreeMap<String, CircuitState>,
    ) -> ServiceMetrics {
        let recent: Vec<MetricSample> = names
            .iter()
            .flat_map(|name| self.samples(name))
            .filter(|s| s.timestamp >= since)
            .collect();

        let error_count = recent.iter().filter(|s| s.success() == Some(false)).count();

        let mut durations: Vec<f64> = recent.iter().filter_map(MetricSample::duration).collect();
        durations.sort_by(|a, b| a.total_cmp(b));

        let average_response_time = if durations.is_empty() {
            0.0
        } else {
            durations.iter().sum::<f64>() / durations.len() as f64
        };

        ServiceMetrics {
            request_count: recent.len(),
            error_count,
            average_response_time,
            p95_response_time: percentile(&durations, 0.95),
            p99_response_time: percentile(&durations, 0.99),
            circuit_breaker_states,
            timestamp: Utc::now(),
        }
    }
}

/// Value at index `floor(n * q)` of an ascending slice, 0 when empty
pub fn percentile(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let idx = ((sorted.len() as f64 * q).floor() as usize).min(sorted.len() - 1);
    sorted[idx]
}
