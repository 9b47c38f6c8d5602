//! Log sinks: console, file, remote and in-memory capture

use super::{LogEntry, LogLevel};
use crate::error::SinkError;
use reqwest::Client;
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Target used for console output so it can be filtered separately from
/// the crate's own diagnostics
pub const CONSOLE_TARGET: &str = "care_telemetry::console";

/// Destination for sanitized log entries
pub trait LogSink: Send + Sync {
    /// Write one entry. Called in emission order for a given logger.
    fn write(&self, entry: &LogEntry) -> Result<(), SinkError>;

    /// Sink name used in diagnostics
    fn name(&self) -> &str;
}

/// Console sink routing each level to the matching `tracing` macro
#[derive(Debug, Default, Clone)]
pub struct ConsoleSink;

impl ConsoleSink {
    pub fn new() -> Self {
        Self
    }

    /// `[ISO-timestamp] LEVEL [service] message`
    pub fn format_line(entry: &LogEntry) -> String {
        format!(
            "[{}] {} [{}] {}",
            entry.timestamp.to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            entry.level,
            entry.service,
            entry.message
        )
    }
}

impl LogSink for ConsoleSink {
    fn write(&self, entry: &LogEntry) -> Result<(), SinkError> {
        let line = Self::format_line(entry);
        let metadata = entry
            .metadata
            .as_ref()
            .map(|m| serde_json::Value::Object(m.clone()).to_string())
            .unwrap_or_default();

        match entry.level {
            LogLevel::Debug => tracing::debug!(target: CONSOLE_TARGET, metadata = %metadata, "{}", line),
            LogLevel::Info => tracing::info!(target: CONSOLE_TARGET, metadata = %metadata, "{}", line),
            LogLevel::Warn => tracing::warn!(target: CONSOLE_TARGET, metadata = %metadata, "{}", line),
            LogLevel::Error => {
                let stack = entry.stack.as_deref().unwrap_or_default();
                tracing::error!(target: CONSOLE_TARGET, metadata = %metadata, stack = %stack, "{}", line)
            }
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "console"
    }
}

/// Appends entries as JSON lines to a file, opened on first write
pub struct FileSink {
    path: PathBuf,
    file: Mutex<Option<File>>,
}

impl FileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            file: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open(&self) -> Result<File, SinkError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        debug!("Opened log file {}", self.path.display());
        Ok(file)
    }
}

impl LogSink for FileSink {
    fn write(&self, entry: &LogEntry) -> Result<(), SinkError> {
        let mut line = serde_json::to_vec(entry)?;
        line.push(b'\n');

        let mut guard = self.file.lock().map_err(|_| SinkError::Closed)?;
        if guard.is_none() {
            *guard = Some(self.open()?);
        }
        if let Some(file) = guard.as_mut() {
            file.write_all(&line)?;
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "file"
    }
}

/// Ships entries to an HTTP endpoint from a background task.
///
/// `write` only enqueues, so callers never wait on the network. Delivery
/// failures are logged and dropped.
#[derive(Clone)]
pub struct RemoteSink {
    endpoint: String,
    tx: mpsc::UnboundedSender<serde_json::Value>,
}

impl RemoteSink {
    /// Spawn the delivery task on the current tokio runtime
    pub fn spawn(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, SinkError> {
        let handle = tokio::runtime::Handle::try_current().map_err(|_| SinkError::NoRuntime)?;
        let endpoint = endpoint.into();
        let client = Client::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(2)
            .build()?;

        let (tx, mut rx) = mpsc::unbounded_channel::<serde_json::Value>();
        let target = endpoint.clone();
        handle.spawn(async move {
            while let Some(body) = rx.recv().await {
                if let Err(e) = post_json(&client, &target, &body).await {
                    warn!("Remote sink delivery to {} failed: {}", target, e);
                }
            }
            debug!("Remote sink for {} stopped", target);
        });

        Ok(Self { endpoint, tx })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Enqueue any serializable record for delivery
    pub fn submit<T: Serialize>(&self, record: &T) -> Result<(), SinkError> {
        let body = serde_json::to_value(record)?;
        self.tx.send(body).map_err(|_| SinkError::Closed)
    }
}

async fn post_json(client: &Client, url: &str, body: &serde_json::Value) -> Result<(), SinkError> {
    let response = client.post(url).json(body).send().await?;
    let status = response.status();
    if status.is_success() {
        Ok(())
    } else {
        Err(SinkError::Rejected { status: status.as_u16() })
    }
}

impl LogSink for RemoteSink {
    fn write(&self, entry: &LogEntry) -> Result<(), SinkError> {
        self.submit(entry)
    }

    fn name(&self) -> &str {
        "remote"
    }
}

/// Captures entries in memory
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    entries: Arc<Mutex<Vec<LogEntry>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl LogSink for MemorySink {
    fn write(&self, entry: &LogEntry) -> Result<(), SinkError> {
        self.entries
            .lock()
            .map_err(|_| SinkError::Closed)?
            .push(entry.clone());
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}
