// =====================================================================================
// NOTIFICATION CHANNELS
// =====================================================================================

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::Serialize;
use serde_json::json;
use tracing::debug;

use crate::models::{Alert, AlertLevel, MonitoringError};
use shared_config::{EmailChannelConfig, SlackChannelConfig, SmsChannelConfig, WebhookChannelConfig};

/// An outbound delivery target for alerts.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    fn name(&self) -> &str;

    fn accepts(&self, _level: AlertLevel) -> bool {
        true
    }

    async fn send(&self, alert: &Alert) -> Result<(), MonitoringError>;
}

async fn send_checked(channel: &str, request: RequestBuilder) -> Result<(), MonitoringError> {
    let response = request
        .send()
        .await
        .map_err(|e| MonitoringError::Notification(format!("{} request failed: {}", channel, e)))?;

    let status = response.status();
    if status.is_success() {
        debug!(channel, "notification delivered");
        Ok(())
    } else {
        let body = response.text().await.unwrap_or_default();
        Err(MonitoringError::Notification(format!("{} returned HTTP {}: {}", channel, status, body)))
    }
}

// =====================================================================================
// EMAIL
// =====================================================================================

#[derive(Serialize)]
struct EmailMessage<'a> {
    from: &'a str,
    to: Vec<String>,
    subject: String,
    text: String,
}

/// Delivers through a transactional email HTTP API. Escalations also reach the escalation list.
pub struct EmailChannel {
    client: Client,
    config: EmailChannelConfig,
}

impl EmailChannel {
    pub fn new(client: Client, config: EmailChannelConfig) -> Self {
        Self { client, config }
    }

    fn recipients(&self, alert: &Alert) -> Vec<String> {
        let mut to = self.config.to.clone();
        if alert.is_escalation() {
            for address in &self.config.escalation_to {
                if !to.contains(address) {
                    to.push(address.clone());
                }
            }
        }
        to
    }
}

#[async_trait]
impl NotificationChannel for EmailChannel {
    fn name(&self) -> &str {
        "email"
    }

    async fn send(&self, alert: &Alert) -> Result<(), MonitoringError> {
        let prefix = if alert.is_escalation() { "[ESCALATED] " } else { "" };
        let message = EmailMessage {
            from: &self.config.from,
            to: self.recipients(alert),
            subject: format!(
                "{}[{}] {}",
                prefix,
                alert.level.as_str().to_uppercase(),
                alert.title
            ),
            text: alert.format_text(),
        };

        let request = self
            .client
            .post(&self.config.api_url)
            .bearer_auth(&self.config.api_key)
            .json(&message);

        send_checked(self.name(), request).await
    }
}

// =====================================================================================
// SLACK
// =====================================================================================

#[derive(Serialize)]
struct SlackMessage<'a> {
    #[serde(skip_serializing_if = "str::is_empty")]
    channel: &'a str,
    text: String,
}

pub struct SlackChannel {
    client: Client,
    config: SlackChannelConfig,
}

impl SlackChannel {
    pub fn new(client: Client, config: SlackChannelConfig) -> Self {
        Self { client, config }
    }
}

#[async_trait]
impl NotificationChannel for SlackChannel {
    fn name(&self) -> &str {
        "slack"
    }

    async fn send(&self, alert: &Alert) -> Result<(), MonitoringError> {
        let message = SlackMessage {
            channel: &self.config.channel,
            text: alert.format_text(),
        };

        let request = self.client.post(&self.config.webhook_url).json(&message);
        send_checked(self.name(), request).await
    }
}

// =====================================================================================
// GENERIC WEBHOOK
// =====================================================================================

/// Posts the alert record itself for downstream automation.
pub struct WebhookChannel {
    client: Client,
    config: WebhookChannelConfig,
}

impl WebhookChannel {
    pub fn new(client: Client, config: WebhookChannelConfig) -> Self {
        Self { client, config }
    }
}

#[async_trait]
impl NotificationChannel for WebhookChannel {
    fn name(&self) -> &str {
        "webhook"
    }

    async fn send(&self, alert: &Alert) -> Result<(), MonitoringError> {
        let payload = json!({
            "event": "backup_alert",
            "escalated": alert.is_escalation(),
            "alert": alert,
        });

        let request = self.client.post(&self.config.url).json(&payload);
        send_checked(self.name(), request).await
    }
}

// =====================================================================================
// SMS
// =====================================================================================

/// Text-message provider channel; pages only for critical alerts.
pub struct SmsChannel {
    client: Client,
    config: SmsChannelConfig,
}

impl SmsChannel {
    pub fn new(client: Client, config: SmsChannelConfig) -> Self {
        Self { client, config }
    }

    fn body(alert: &Alert) -> String {
        let mut body = format!("[{}] {}", alert.level.as_str().to_uppercase(), alert.title);
        if alert.is_escalation() {
            body.push_str(&format!(" (escalation #{})", alert.escalation_count));
        }
        body
    }
}

#[async_trait]
impl NotificationChannel for SmsChannel {
    fn name(&self) -> &str {
        "sms"
    }

    fn accepts(&self, level: AlertLevel) -> bool {
        level == AlertLevel::Critical
    }

    async fn send(&self, alert: &Alert) -> Result<(), MonitoringError> {
        if self.config.to.is_empty() {
            return Err(MonitoringError::Notification("sms has no recipients".to_string()));
        }

        let body = Self::body(alert);
        let mut failures = Vec::new();

        for recipient in &self.config.to {
            let form = [
                ("From", self.config.from.as_str()),
                ("To", recipient.as_str()),
                ("Body", body.as_str()),
            ];
            let request = self
                .client
                .post(&self.config.api_url)
                .basic_auth(&self.config.account_sid, Some(&self.config.auth_token))
                .form(&form);

            if let Err(e) = send_checked(self.name(), request).await {
                failures.push(format!("{}: {}", recipient, e));
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(MonitoringError::Notification(failures.join("; ")))
        }
    }
}
