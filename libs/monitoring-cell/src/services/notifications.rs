// =====================================================================================
// NOTIFICATION DISPATCHER
// =====================================================================================

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use reqwest::Client;
use tracing::{error, info, instrument, warn};

use crate::models::{Alert, ChannelResult, DispatchSummary};
use crate::services::channels::{EmailChannel, NotificationChannel, SlackChannel, SmsChannel, WebhookChannel};
use shared_config::NotificationConfig;

/// Fans an alert out to every enabled channel concurrently. Delivery failures
/// are counted and logged, never retried and never raised.
pub struct NotificationDispatcher {
    channels: Vec<Arc<dyn NotificationChannel>>,
    timeout: Duration,
}

impl NotificationDispatcher {
    pub fn new(channels: Vec<Arc<dyn NotificationChannel>>, timeout: Duration) -> Self {
        Self { channels, timeout }
    }

    pub fn from_config(config: &NotificationConfig) -> Self {
        let client = Client::new();
        let mut channels: Vec<Arc<dyn NotificationChannel>> = Vec::new();

        if config.email.enabled {
            channels.push(Arc::new(EmailChannel::new(client.clone(), config.email.clone())));
        }
        if config.slack.enabled {
            channels.push(Arc::new(SlackChannel::new(client.clone(), config.slack.clone())));
        }
        if config.webhook.enabled {
            channels.push(Arc::new(WebhookChannel::new(client.clone(), config.webhook.clone())));
        }
        if config.sms.enabled {
            channels.push(Arc::new(SmsChannel::new(client, config.sms.clone())));
        }

        if channels.is_empty() {
            warn!("No notification channels enabled; alerts will only be recorded");
        } else {
            info!(channels = ?channels.iter().map(|c| c.name()).collect::<Vec<_>>(), "Notification channels configured");
        }

        Self::new(channels, config.timeout())
    }

    pub fn channel_names(&self) -> Vec<String> {
        self.channels.iter().map(|c| c.name().to_string()).collect()
    }

    #[instrument(skip(self, alert), fields(alert_id = %alert.id, level = %alert.level))]
    pub async fn dispatch(&self, alert: &Alert) -> DispatchSummary {
        let targets: Vec<&Arc<dyn NotificationChannel>> = self
            .channels
            .iter()
            .filter(|channel| channel.accepts(alert.level))
            .collect();

        let deliveries = targets.into_iter().map(|channel| async move {
            let outcome = tokio::time::timeout(self.timeout, channel.send(alert)).await;
            let error = match outcome {
                Ok(Ok(())) => None,
                Ok(Err(e)) => Some(e.to_string()),
                Err(_) => Some(format!("timed out after {}s", self.timeout.as_secs())),
            };

            if let Some(message) = &error {
                error!(channel = channel.name(), error = %message, "Alert notification failed");
            }

            ChannelResult {
                channel: channel.name().to_string(),
                success: error.is_none(),
                error,
            }
        });

        let summary = DispatchSummary::from_results(join_all(deliveries).await);

        info!(
            successful = summary.successful,
            failed = summary.failed,
            total = summary.total,
            "Alert dispatched"
        );

        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AlertLevel, MonitoringError};
    use async_trait::async_trait;

    struct StubChannel {
        name: &'static str,
        delay: Duration,
        fail: bool,
        critical_only: bool,
    }

    #[async_trait]
    impl NotificationChannel for StubChannel {
        fn name(&self) -> &str {
            self.name
        }

        fn accepts(&self, level: AlertLevel) -> bool {
            !self.critical_only || level == AlertLevel::Critical
        }

        async fn send(&self, _alert: &Alert) -> Result<(), MonitoringError> {
            tokio::time::sleep(self.delay).await;
            if self.fail {
                Err(MonitoringError::Notification("boom".to_string()))
            } else {
                Ok(())
            }
        }
    }

    fn stub(name: &'static str, delay_ms: u64, fail: bool, critical_only: bool) -> Arc<dyn NotificationChannel> {
        Arc::new(StubChannel {
            name,
            delay: Duration::from_millis(delay_ms),
            fail,
            critical_only,
        })
    }

    #[tokio::test]
    async fn test_timeout_counts_as_failure() {
        let dispatcher = NotificationDispatcher::new(
            vec![stub("a", 0, false, false), stub("b", 500, false, false), stub("c", 0, false, false)],
            Duration::from_millis(50),
        );
        let alert = Alert::new(AlertLevel::Error, "health_check_failed", "Store down", serde_json::Value::Null);

        let summary = dispatcher.dispatch(&alert).await;
        assert_eq!((summary.successful, summary.failed, summary.total), (2, 1, 3));
        let failed = summary.results.iter().find(|r| !r.success).unwrap();
        assert_eq!(failed.channel, "b");
        assert!(failed.error.as_deref().unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn test_channel_filter_by_level() {
        let dispatcher = NotificationDispatcher::new(
            vec![stub("chat", 0, false, false), stub("pager", 0, true, true)],
            Duration::from_secs(1),
        );

        let warning = Alert::new(AlertLevel::Warning, "storage_usage_high", "Disk filling", serde_json::Value::Null);
        let summary = dispatcher.dispatch(&warning).await;
        assert_eq!((summary.successful, summary.failed, summary.total), (1, 0, 1));

        let critical = Alert::new(AlertLevel::Critical, "backup_stale", "Backup stale", serde_json::Value::Null);
        let summary = dispatcher.dispatch(&critical).await;
        assert_eq!((summary.successful, summary.failed, summary.total), (1, 1, 2));
    }

    #[tokio::test]
    async fn test_no_channels_is_empty_summary() {
        let dispatcher = NotificationDispatcher::new(Vec::new(), Duration::from_secs(1));
        let alert = Alert::new(AlertLevel::Critical, "backup_stale", "Backup stale", serde_json::Value::Null);
        assert_eq!(dispatcher.dispatch(&alert).await, DispatchSummary::default());
    }
}
