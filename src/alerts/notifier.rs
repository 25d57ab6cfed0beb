//! Alert delivery.

use std::time::Duration;

use serde_json::json;

use crate::alerts::Alert;
use crate::config::AlertConfig;

const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(5);

/// Where alerts go: a Slack incoming webhook, or the log when none is configured.
#[derive(Debug, Clone)]
pub enum Notifier {
    Log,
    Slack { client: reqwest::Client, webhook_url: String },
}

impl Notifier {
    pub fn from_config(config: &AlertConfig) -> Result<Self, reqwest::Error> {
        if config.slack_webhook_url.is_empty() {
            return Ok(Notifier::Log);
        }
        let client = reqwest::Client::builder().timeout(WEBHOOK_TIMEOUT).build()?;
        Ok(Notifier::Slack {
            client,
            webhook_url: config.slack_webhook_url.clone(),
        })
    }

    /// Deliver one alert. Returns whether it was accepted; failures are logged, never propagated.
    pub async fn send(&self, alert: &Alert) -> bool {
        match self {
            Notifier::Log => {
                tracing::warn!(kind = alert.kind.as_str(), "[ALERT] {}", alert.message);
                true
            }
            Notifier::Slack { client, webhook_url } => {
                let payload = json!({ "text": slack_text(alert) });
                match client.post(webhook_url).json(&payload).send().await {
                    Ok(res) if res.status().is_success() => {
                        tracing::info!(kind = alert.kind.as_str(), "Alert sent to Slack");
                        true
                    }
                    Ok(res) => {
                        tracing::error!(kind = alert.kind.as_str(), status = %res.status(), "Slack rejected alert");
                        false
                    }
                    Err(e) => {
                        tracing::error!(kind = alert.kind.as_str(), error = %e, "Failed to send alert to Slack");
                        false
                    }
                }
            }
        }
    }
}

fn slack_text(alert: &Alert) -> String {
    format!("*{}*\n{}", alert.kind.title(), alert.message)
}
