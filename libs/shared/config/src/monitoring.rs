use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{env_list, env_or, env_string, split_list};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    pub intervals: MonitoringIntervals,
    pub thresholds: AlertThresholds,
    pub backups: BackupSettings,
    pub notifications: NotificationConfig,
    pub escalation: EscalationConfig,
    pub objectives: RecoveryObjectives,
    pub services: Vec<MonitoredService>,
    pub check_timeout_seconds: u64,
}

/// Tick periods, all in minutes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringIntervals {
    pub health_check_minutes: u64,
    pub backup_status_minutes: u64,
    pub alert_processing_minutes: u64,
    pub report_minutes: u64,
}

impl MonitoringIntervals {
    pub fn health_check(&self) -> Duration {
        minutes(self.health_check_minutes)
    }

    pub fn backup_status(&self) -> Duration {
        minutes(self.backup_status_minutes)
    }

    pub fn alert_processing(&self) -> Duration {
        minutes(self.alert_processing_minutes)
    }

    pub fn report(&self) -> Duration {
        minutes(self.report_minutes)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ThresholdPair {
    pub warning: f64,
    pub critical: f64,
}

impl ThresholdPair {
    pub fn new(warning: f64, critical: f64) -> Self {
        if critical < warning {
            warn!(warning, critical, "critical threshold below warning threshold");
        }
        Self { warning, critical }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertThresholds {
    /// Hours since the last successful backup.
    pub backup_age_hours: ThresholdPair,
    /// Failed / total operations in the lookback window, 0.0..=1.0.
    pub failure_rate: ThresholdPair,
    pub disk_usage_percent: ThresholdPair,
    pub response_time_ms: ThresholdPair,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupSettings {
    pub backup_types: Vec<String>,
    pub lookback_hours: u64,
    pub storage_capacity_gb: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    pub email: EmailChannelConfig,
    pub slack: SlackChannelConfig,
    pub webhook: WebhookChannelConfig,
    pub sms: SmsChannelConfig,
    pub timeout_seconds: u64,
}

impl NotificationConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EmailChannelConfig {
    pub enabled: bool,
    pub api_url: String,
    pub api_key: String,
    pub from: String,
    pub to: Vec<String>,
    pub escalation_to: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SlackChannelConfig {
    pub enabled: bool,
    pub webhook_url: String,
    pub channel: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WebhookChannelConfig {
    pub enabled: bool,
    pub url: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SmsChannelConfig {
    pub enabled: bool,
    pub api_url: String,
    pub account_sid: String,
    pub auth_token: String,
    pub from: String,
    pub to: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscalationConfig {
    pub enabled: bool,
    pub escalate_after_minutes: u64,
    pub max_escalations: u32,
    pub escalation_interval_minutes: u64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ResourceObjective {
    pub rto_minutes: u64,
    pub rpo_minutes: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoveryObjectives {
    pub database: ResourceObjective,
    pub files: ResourceObjective,
    pub application: ResourceObjective,
}

impl RecoveryObjectives {
    pub fn for_resource(&self, resource: &str) -> Option<ResourceObjective> {
        match resource {
            "database" => Some(self.database),
            "files" => Some(self.files),
            "application" | "configuration" => Some(self.application),
            _ => None,
        }
    }

    pub fn total_rto_minutes(&self) -> u64 {
        self.database.rto_minutes + self.files.rto_minutes + self.application.rto_minutes
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MonitoredService {
    pub name: String,
    pub url: String,
}

impl MonitoredService {
    /// Parses `name=url` pairs; entries without `=` are named after their URL.
    pub fn parse_list(raw: &str) -> Vec<Self> {
        split_list(raw)
            .into_iter()
            .map(|entry| match entry.split_once('=') {
                Some((name, url)) => Self {
                    name: name.trim().to_string(),
                    url: url.trim().to_string(),
                },
                None => Self {
                    name: entry.clone(),
                    url: entry,
                },
            })
            .collect()
    }
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            intervals: MonitoringIntervals {
                health_check_minutes: 5,
                backup_status_minutes: 15,
                alert_processing_minutes: 1,
                report_minutes: 1440,
            },
            thresholds: AlertThresholds {
                backup_age_hours: ThresholdPair { warning: 25.0, critical: 49.0 },
                failure_rate: ThresholdPair { warning: 0.1, critical: 0.25 },
                disk_usage_percent: ThresholdPair { warning: 80.0, critical: 95.0 },
                response_time_ms: ThresholdPair { warning: 1000.0, critical: 5000.0 },
            },
            backups: BackupSettings {
                backup_types: vec![
                    "database".to_string(),
                    "files".to_string(),
                    "configuration".to_string(),
                ],
                lookback_hours: 168,
                storage_capacity_gb: 100.0,
            },
            notifications: NotificationConfig {
                email: EmailChannelConfig::default(),
                slack: SlackChannelConfig::default(),
                webhook: WebhookChannelConfig::default(),
                sms: SmsChannelConfig::default(),
                timeout_seconds: 10,
            },
            escalation: EscalationConfig {
                enabled: true,
                escalate_after_minutes: 30,
                max_escalations: 3,
                escalation_interval_minutes: 60,
            },
            objectives: RecoveryObjectives {
                database: ResourceObjective { rto_minutes: 60, rpo_minutes: 1440 },
                files: ResourceObjective { rto_minutes: 120, rpo_minutes: 1440 },
                application: ResourceObjective { rto_minutes: 30, rpo_minutes: 10080 },
            },
            services: Vec::new(),
            check_timeout_seconds: 30,
        }
    }
}

impl MonitoringConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let backup_types = match env_list("BACKUP_TYPES") {
            types if types.is_empty() => defaults.backups.backup_types.clone(),
            types => types,
        };

        let config = Self {
            intervals: MonitoringIntervals {
                health_check_minutes: env_or("HEALTH_CHECK_INTERVAL_MINUTES", defaults.intervals.health_check_minutes),
                backup_status_minutes: env_or("BACKUP_STATUS_INTERVAL_MINUTES", defaults.intervals.backup_status_minutes),
                alert_processing_minutes: env_or("ALERT_PROCESSING_INTERVAL_MINUTES", defaults.intervals.alert_processing_minutes),
                report_minutes: env_or("REPORT_INTERVAL_MINUTES", defaults.intervals.report_minutes),
            },
            thresholds: AlertThresholds {
                backup_age_hours: ThresholdPair::new(
                    env_or("BACKUP_AGE_WARNING_HOURS", defaults.thresholds.backup_age_hours.warning),
                    env_or("BACKUP_AGE_CRITICAL_HOURS", defaults.thresholds.backup_age_hours.critical),
                ),
                failure_rate: ThresholdPair::new(
                    env_or("FAILURE_RATE_WARNING", defaults.thresholds.failure_rate.warning),
                    env_or("FAILURE_RATE_CRITICAL", defaults.thresholds.failure_rate.critical),
                ),
                disk_usage_percent: ThresholdPair::new(
                    env_or("DISK_USAGE_WARNING_PERCENT", defaults.thresholds.disk_usage_percent.warning),
                    env_or("DISK_USAGE_CRITICAL_PERCENT", defaults.thresholds.disk_usage_percent.critical),
                ),
                response_time_ms: ThresholdPair::new(
                    env_or("RESPONSE_TIME_WARNING_MS", defaults.thresholds.response_time_ms.warning),
                    env_or("RESPONSE_TIME_CRITICAL_MS", defaults.thresholds.response_time_ms.critical),
                ),
            },
            backups: BackupSettings {
                backup_types,
                lookback_hours: env_or("BACKUP_LOOKBACK_HOURS", defaults.backups.lookback_hours),
                storage_capacity_gb: env_or("STORAGE_CAPACITY_GB", defaults.backups.storage_capacity_gb),
            },
            notifications: NotificationConfig {
                email: EmailChannelConfig {
                    enabled: env_or("ALERT_EMAIL_ENABLED", false),
                    api_url: env_string("ALERT_EMAIL_API_URL"),
                    api_key: env_string("ALERT_EMAIL_API_KEY"),
                    from: env_string("ALERT_EMAIL_FROM"),
                    to: env_list("ALERT_EMAIL_TO"),
                    escalation_to: env_list("ALERT_EMAIL_ESCALATION_TO"),
                },
                slack: SlackChannelConfig {
                    enabled: env_or("SLACK_ALERTS_ENABLED", false),
                    webhook_url: env_string("SLACK_WEBHOOK_URL"),
                    channel: env_string("SLACK_CHANNEL"),
                },
                webhook: WebhookChannelConfig {
                    enabled: env_or("ALERT_WEBHOOK_ENABLED", false),
                    url: env_string("ALERT_WEBHOOK_URL"),
                },
                sms: SmsChannelConfig {
                    enabled: env_or("SMS_ALERTS_ENABLED", false),
                    api_url: env_string("SMS_API_URL"),
                    account_sid: env_string("SMS_ACCOUNT_SID"),
                    auth_token: env_string("SMS_AUTH_TOKEN"),
                    from: env_string("SMS_FROM"),
                    to: env_list("SMS_TO"),
                },
                timeout_seconds: env_or("NOTIFICATION_TIMEOUT_SECONDS", defaults.notifications.timeout_seconds),
            },
            escalation: EscalationConfig {
                enabled: env_or("ESCALATION_ENABLED", defaults.escalation.enabled),
                escalate_after_minutes: env_or("ESCALATE_AFTER_MINUTES", defaults.escalation.escalate_after_minutes),
                max_escalations: env_or("MAX_ESCALATIONS", defaults.escalation.max_escalations),
                escalation_interval_minutes: env_or("ESCALATION_INTERVAL_MINUTES", defaults.escalation.escalation_interval_minutes),
            },
            objectives: RecoveryObjectives {
                database: ResourceObjective {
                    rto_minutes: env_or("RTO_DATABASE_MINUTES", defaults.objectives.database.rto_minutes),
                    rpo_minutes: env_or("RPO_DATABASE_MINUTES", defaults.objectives.database.rpo_minutes),
                },
                files: ResourceObjective {
                    rto_minutes: env_or("RTO_FILES_MINUTES", defaults.objectives.files.rto_minutes),
                    rpo_minutes: env_or("RPO_FILES_MINUTES", defaults.objectives.files.rpo_minutes),
                },
                application: ResourceObjective {
                    rto_minutes: env_or("RTO_APPLICATION_MINUTES", defaults.objectives.application.rto_minutes),
                    rpo_minutes: env_or("RPO_APPLICATION_MINUTES", defaults.objectives.application.rpo_minutes),
                },
            },
            services: MonitoredService::parse_list(&env_string("MONITORED_SERVICES")),
            check_timeout_seconds: env_or("HEALTH_CHECK_TIMEOUT_SECONDS", defaults.check_timeout_seconds),
        };

        config.warn_on_incomplete_channels();
        config
    }

    pub fn check_timeout(&self) -> Duration {
        Duration::from_secs(self.check_timeout_seconds)
    }

    fn warn_on_incomplete_channels(&self) {
        let n = &self.notifications;
        if n.email.enabled && (n.email.api_url.is_empty() || n.email.to.is_empty()) {
            warn!("Email alerts enabled but ALERT_EMAIL_API_URL or ALERT_EMAIL_TO is missing");
        }
        if n.slack.enabled && n.slack.webhook_url.is_empty() {
            warn!("Slack alerts enabled but SLACK_WEBHOOK_URL is missing");
        }
        if n.webhook.enabled && n.webhook.url.is_empty() {
            warn!("Webhook alerts enabled but ALERT_WEBHOOK_URL is missing");
        }
        if n.sms.enabled && (n.sms.api_url.is_empty() || n.sms.to.is_empty()) {
            warn!("SMS alerts enabled but SMS_API_URL or SMS_TO is missing");
        }
    }
}

fn minutes(value: u64) -> Duration {
    Duration::from_secs(value.max(1) * 60)
}
