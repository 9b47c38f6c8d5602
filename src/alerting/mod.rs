//! Alert dispatch to operator channels

pub mod email;
pub mod slack;

use crate::config::AlertingConfig;
use crate::error::AlertError;
use crate::integration::ErrorSeverity;
use crate::logging::Metadata;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

pub use email::{EmailAlertSender, MailTransport};
pub use slack::SlackWebhookSender;

/// An operator-facing alert
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    pub title: String,
    pub message: String,
    pub severity: ErrorSeverity,
    pub service: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    #[serde(default)]
    pub metadata: Metadata,
    pub timestamp: DateTime<Utc>,
}

impl Alert {
    pub fn new(
        title: impl Into<String>,
        message: impl Into<String>,
        severity: ErrorSeverity,
        service: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            severity,
            service: service.into(),
            correlation_id: None,
            metadata: Metadata::new(),
            timestamp: Utc::now(),
        }
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_correlation_id(mut self, correlation_id: Option<String>) -> Self {
        self.correlation_id = correlation_id;
        self
    }
}

/// A channel that can deliver alerts
#[async_trait]
pub trait AlertSender: Send + Sync {
    async fn send(&self, alert: &Alert) -> Result<(), AlertError>;

    fn name(&self) -> &str;
}

/// Fans alerts out to every configured sender without blocking the caller
pub struct AlertDispatcher {
    enabled: bool,
    senders: Vec<Arc<dyn AlertSender>>,
    dispatched: AtomicU64,
}

impl AlertDispatcher {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            senders: Vec::new(),
            dispatched: AtomicU64::new(0),
        }
    }

    /// Build a dispatcher with the channels named in `config`.
    ///
    /// Email recipients only take effect once a transport is supplied.
    pub fn from_config(config: &AlertingConfig, mail: Option<Arc<dyn MailTransport>>) -> Self {
        let mut dispatcher = Self::new(config.enable_alerts);

        if let Some(webhook) = &config.slack_webhook {
            match SlackWebhookSender::new(webhook.clone(), config.max_retries) {
                Ok(sender) => dispatcher = dispatcher.with_sender(Arc::new(sender)),
                Err(e) => warn!("Slack alerts disabled: {}", e),
            }
        }

        if !config.email_recipients.is_empty() {
            match mail {
                Some(transport) => {
                    let sender = EmailAlertSender::new(config.email_recipients.clone(), transport);
                    dispatcher = dispatcher.with_sender(Arc::new(sender));
                }
                None => debug!(
                    "{} email recipients configured without a mail transport",
                    config.email_recipients.len()
                ),
            }
        }

        info!(
            "Alert dispatcher initialized with enabled={}, channels={}",
            dispatcher.enabled,
            dispatcher.senders.len()
        );
        dispatcher
    }

    pub fn with_sender(mut self, sender: Arc<dyn AlertSender>) -> Self {
        self.senders.push(sender);
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn channel_names(&self) -> Vec<&str> {
        self.senders.iter().map(|s| s.name()).collect()
    }

    /// Number of alerts accepted for delivery so far
    pub fn dispatched_count(&self) -> u64 {
        self.dispatched.load(Ordering::Relaxed)
    }

    /// Fire-and-forget dispatch. Returns `false` when alerting is disabled.
    pub fn dispatch(&self, alert: Alert) -> bool {
        if !self.enabled {
            return false;
        }

        self.dispatched.fetch_add(1, Ordering::Relaxed);
        warn!(
            severity = %alert.severity,
            service = %alert.service,
            "ALERT: {} - {}",
            alert.title,
            alert.message
        );

        if self.senders.is_empty() {
            return true;
        }

        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                warn!("No async runtime, alert '{}' not delivered to channels", alert.title);
                return true;
            }
        };

        let alert = Arc::new(alert);
        for sender in &self.senders {
            let sender = sender.clone();
            let alert = alert.clone();
            handle.spawn(async move {
                match sender.send(&alert).await {
                    Ok(()) => debug!("Alert '{}' delivered via {}", alert.title, sender.name()),
                    Err(e) => error!("Alert '{}' delivery via {} failed: {}", alert.title, sender.name(), e),
                }
            });
        }
        true
    }
}

impl std::fmt::Debug for AlertDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlertDispatcher")
            .field("enabled", &self.enabled)
            .field("channels", &self.channel_names())
            .field("dispatched", &self.dispatched_count())
            .finish()
    }
}
