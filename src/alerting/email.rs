//! Email alert channel over a pluggable mail transport

use super::{Alert, AlertSender};
use crate::error::AlertError;
use async_trait::async_trait;
use std::sync::Arc;

/// Delivers a rendered email. Implemented by the hosting application
/// (SMTP relay, provider API, ...).
#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn deliver(&self, recipients: &[String], subject: &str, body: &str) -> Result<(), AlertError>;
}

pub struct EmailAlertSender {
    recipients: Vec<String>,
    transport: Arc<dyn MailTransport>,
}

impl EmailAlertSender {
    pub fn new(recipients: Vec<String>, transport: Arc<dyn MailTransport>) -> Self {
        Self { recipients, transport }
    }

    pub fn subject(alert: &Alert) -> String {
        format!("[{}] {} - {}", alert.severity, alert.service, alert.title)
    }

    pub fn body(alert: &Alert) -> String {
        let mut body = format!(
            "{}\n\nService: {}\nSeverity: {}\nTime: {}\n",
            alert.message,
            alert.service,
            alert.severity,
            alert.timestamp.to_rfc3339()
        );
        if let Some(cid) = &alert.correlation_id {
            body.push_str(&format!("Correlation ID: {}\n", cid));
        }
        if !alert.metadata.is_empty() {
            let details = serde_json::to_string_pretty(&alert.metadata).unwrap_or_default();
            body.push_str(&format!("\nDetails:\n{}\n", details));
        }
        body
    }
}

#[async_trait]
impl AlertSender for EmailAlertSender {
    async fn send(&self, alert: &Alert) -> Result<(), AlertError> {
        if self.recipients.is_empty() {
            return Err(AlertError::InvalidConfig("No email recipients".to_string()));
        }
        self.transport
            .deliver(&self.recipients, &Self::subject(alert), &Self::body(alert))
            .await
    }

    fn name(&self) -> &str {
        "email"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integration::ErrorSeverity;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingTransport {
        sent: Mutex<Vec<(Vec<String>, String, String)>>,
    }

    #[async_trait]
    impl MailTransport for RecordingTransport {
        async fn deliver(&self, recipients: &[String], subject: &str, body: &str) -> Result<(), AlertError> {
            self.sent
                .lock()
                .unwrap()
                .push((recipients.to_vec(), subject.to_string(), body.to_string()));
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_send_renders_and_delivers() {
        let transport = Arc::new(RecordingTransport::default());
        let sender = EmailAlertSender::new(vec!["oncall@example.org".to_string()], transport.clone());

        let alert = Alert::new("Wearable sync failing", "Fitbit returned 503", ErrorSeverity::Critical, "device-hub")
            .with_correlation_id(Some("sync-7".to_string()));
        sender.send(&alert).await.unwrap();

        let sent = transport.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, vec!["oncall@example.org"]);
        assert_eq!(sent[0].1, "[CRITICAL] device-hub - Wearable sync failing");
        assert!(sent[0].2.contains("Correlation ID: sync-7"));
    }

    #[tokio::test]
    async fn test_no_recipients_is_error() {
        let sender = EmailAlertSender::new(Vec::new(), Arc::new(RecordingTransport::default()));
        let alert = Alert::new("t", "m", ErrorSeverity::High, "svc");
        assert!(sender.send(&alert).await.is_err());
    }
}
