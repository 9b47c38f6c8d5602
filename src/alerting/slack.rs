//! Slack incoming-webhook alert channel

use super::{Alert, AlertSender};
use crate::error::AlertError;
use crate::integration::ErrorSeverity;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, Secret};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Posts alerts to a Slack incoming webhook, retrying with backoff
pub struct SlackWebhookSender {
    webhook: Secret<String>,
    client: Client,
    max_retries: u32,
}

impl SlackWebhookSender {
    pub fn new(webhook: Secret<String>, max_retries: u32) -> Result<Self, AlertError> {
        if webhook.expose_secret().is_empty() {
            return Err(AlertError::InvalidConfig("Slack webhook URL is empty".to_string()));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            webhook,
            client,
            max_retries: max_retries.max(1),
        })
    }

    /// Render the Slack message text for an alert
    pub fn format_message(alert: &Alert) -> String {
        let icon = match alert.severity {
            ErrorSeverity::Critical => ":rotating_light:",
            ErrorSeverity::High => ":red_circle:",
            ErrorSeverity::Medium => ":large_orange_circle:",
            ErrorSeverity::Low => ":large_blue_circle:",
        };

        let mut text = format!(
            "{} *{}* [{}] ({})\n{}",
            icon, alert.title, alert.severity, alert.service, alert.message
        );
        if let Some(cid) = &alert.correlation_id {
            text.push_str(&format!("\nCorrelation: `{}`", cid));
        }
        text.push_str(&format!("\n_{}_", alert.timestamp.format("%Y-%m-%d %H:%M:%S UTC")));
        text
    }

    async fn try_send(&self, payload: &serde_json::Value) -> Result<(), AlertError> {
        let response = self
            .client
            .post(self.webhook.expose_secret())
            .json(payload)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok())
                .unwrap_or(60);
            return Err(AlertError::RateLimited(retry_after));
        }

        let body = response.text().await.unwrap_or_default();
        Err(AlertError::DeliveryFailed(format!("HTTP {}: {}", status, body)))
    }
}

#[async_trait]
impl AlertSender for SlackWebhookSender {
    async fn send(&self, alert: &Alert) -> Result<(), AlertError> {
        let payload = serde_json::json!({ "text": Self::format_message(alert) });
        let mut attempts = 0;

        loop {
            attempts += 1;

            match self.try_send(&payload).await {
                Ok(()) => {
                    info!("Slack alert sent on attempt {}", attempts);
                    return Ok(());
                }
                // Slack tells us how long to back off; don't burn retries on it
                Err(e @ AlertError::RateLimited(_)) => return Err(e),
                Err(e) if attempts >= self.max_retries => return Err(e),
                Err(e) => {
                    warn!("Slack alert failed on attempt {}: {}", attempts, e);

                    // Exponential backoff with jitter
                    let delay = backoff_delay_ms(attempts);
                    let jitter = (delay as f64 * 0.25 * (rand::random::<f64>() - 0.5)) as i64;
                    let final_delay = Duration::from_millis((delay as i64 + jitter).max(0) as u64);

                    debug!("Retrying Slack alert after {}ms", final_delay.as_millis());
                    tokio::time::sleep(final_delay).await;
                }
            }
        }
    }

    fn name(&self) -> &str {
        "slack"
    }
}

/// Base delay before retry `attempt` (1-based), capped at 30s
fn backoff_delay_ms(attempt: u32) -> u64 {
    100_u64
        .saturating_mul(2_u64.saturating_pow(attempt.saturating_sub(1)))
        .min(30_000)
}
