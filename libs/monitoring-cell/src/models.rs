// =====================================================================================
// MONITORING CELL MODELS
// =====================================================================================

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

// =====================================================================================
// HEALTH
// =====================================================================================

/// Ordered so that `max` yields the worst status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Warning,
    Unhealthy,
}

impl HealthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Healthy => "healthy",
            HealthStatus::Warning => "warning",
            HealthStatus::Unhealthy => "unhealthy",
        }
    }

    pub fn worst<I>(statuses: I) -> HealthStatus
    where
        I: IntoIterator<Item = HealthStatus>,
    {
        statuses.into_iter().max().unwrap_or(HealthStatus::Healthy)
    }
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckCategory {
    Connectivity,
    BackupFreshness,
    StorageUsage,
    ServiceAvailability,
    Performance,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckResult {
    pub category: CheckCategory,
    /// Backup type or service name the check is about, when it has one.
    pub subject: Option<String>,
    pub status: HealthStatus,
    pub detail: String,
    pub response_time_ms: u64,
    #[serde(default)]
    pub data: Value,
}

impl CheckResult {
    pub fn new(category: CheckCategory, status: HealthStatus, detail: impl Into<String>) -> Self {
        Self {
            category,
            subject: None,
            status,
            detail: detail.into(),
            response_time_ms: 0,
            data: Value::Null,
        }
    }

    pub fn healthy(category: CheckCategory, detail: impl Into<String>) -> Self {
        Self::new(category, HealthStatus::Healthy, detail)
    }

    pub fn warning(category: CheckCategory, detail: impl Into<String>) -> Self {
        Self::new(category, HealthStatus::Warning, detail)
    }

    pub fn unhealthy(category: CheckCategory, detail: impl Into<String>) -> Self {
        Self::new(category, HealthStatus::Unhealthy, detail)
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = data;
        self
    }

    pub fn with_response_time(mut self, response_time_ms: u64) -> Self {
        self.response_time_ms = response_time_ms;
        self
    }
}

/// One point-in-time aggregate of every registered check. Immutable once built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthSnapshot {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub checks: BTreeMap<String, CheckResult>,
    pub overall_status: HealthStatus,
    pub backups: Vec<BackupOperationSummary>,
}

impl HealthSnapshot {
    pub fn new(
        timestamp: DateTime<Utc>,
        checks: BTreeMap<String, CheckResult>,
        backups: Vec<BackupOperationSummary>,
    ) -> Self {
        let overall_status = HealthStatus::worst(checks.values().map(|c| c.status));
        Self {
            id: Uuid::new_v4().to_string(),
            timestamp,
            checks,
            overall_status,
            backups,
        }
    }

    pub fn count_with_status(&self, status: HealthStatus) -> usize {
        self.checks.values().filter(|c| c.status == status).count()
    }

    pub fn to_row(&self, alert_count: usize) -> Value {
        json!({
            "id": self.id,
            "timestamp": self.timestamp,
            "checks": self.checks,
            "backups": self.backups,
            "overall_status": self.overall_status,
            "alert_count": alert_count,
        })
    }
}

// =====================================================================================
// BACKUPS
// =====================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackupOperationStatus {
    Running,
    Completed,
    Failed,
}

/// Row of the `backup_operations` table written by the backup jobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupOperation {
    pub id: String,
    pub backup_type: String,
    pub status: BackupOperationStatus,
    #[serde(default)]
    pub size_bytes: u64,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupOperationSummary {
    pub backup_type: String,
    pub last_success_at: Option<DateTime<Utc>>,
    pub age_hours: Option<f64>,
    pub is_stale: bool,
    pub successful_count: u32,
    pub failed_count: u32,
    pub total_count: u32,
    pub total_size_bytes: u64,
}

impl BackupOperationSummary {
    /// Summarises the operations of one backup type observed in the lookback window.
    pub fn from_operations(
        backup_type: &str,
        operations: &[BackupOperation],
        now: DateTime<Utc>,
        stale_after_hours: f64,
    ) -> Self {
        let of_type: Vec<&BackupOperation> = operations
            .iter()
            .filter(|op| op.backup_type == backup_type)
            .collect();

        let successful: Vec<&&BackupOperation> = of_type
            .iter()
            .filter(|op| op.status == BackupOperationStatus::Completed)
            .collect();

        let last_success_at = successful
            .iter()
            .map(|op| op.completed_at.unwrap_or(op.started_at))
            .max();

        let age_hours = last_success_at
            .map(|at| (now - at).num_seconds().max(0) as f64 / 3600.0);

        Self {
            backup_type: backup_type.to_string(),
            last_success_at,
            age_hours,
            is_stale: age_hours.map_or(true, |age| age >= stale_after_hours),
            successful_count: successful.len() as u32,
            failed_count: of_type
                .iter()
                .filter(|op| op.status == BackupOperationStatus::Failed)
                .count() as u32,
            total_count: of_type.len() as u32,
            total_size_bytes: successful.iter().map(|op| op.size_bytes).sum(),
        }
    }

    /// Failed share of finished operations; `None` when nothing finished.
    pub fn failure_rate(&self) -> Option<f64> {
        let finished = self.successful_count + self.failed_count;
        if finished == 0 {
            None
        } else {
            Some(self.failed_count as f64 / finished as f64)
        }
    }
}

// =====================================================================================
// ALERTS
// =====================================================================================

pub mod alert_types {
    pub const BACKUP_STALE: &str = "backup_stale";
    pub const BACKUP_MISSING: &str = "backup_missing";
    pub const BACKUP_FAILURE_RATE: &str = "backup_failure_rate";
    pub const STORAGE_USAGE_HIGH: &str = "storage_usage_high";
    pub const STORAGE_USAGE_CRITICAL: &str = "storage_usage_critical";
    pub const HEALTH_CHECK_FAILED: &str = "health_check_failed";
    pub const HEALTH_CHECK_DEGRADED: &str = "health_check_degraded";
    pub const MONITORING_FAILURE: &str = "monitoring_failure";
    pub const RECOVERY_COMPLETED: &str = "recovery_completed";
    pub const RECOVERY_FAILED: &str = "recovery_failed";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertLevel {
    Info,
    Warning,
    Error,
    Critical,
}

impl AlertLevel {
    pub fn emoji(&self) -> &'static str {
        match self {
            AlertLevel::Info => "\u{2139}\u{fe0f}",
            AlertLevel::Warning => "\u{26a0}\u{fe0f}",
            AlertLevel::Error => "\u{274c}",
            AlertLevel::Critical => "\u{1f6a8}",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AlertLevel::Info => "info",
            AlertLevel::Warning => "warning",
            AlertLevel::Error => "error",
            AlertLevel::Critical => "critical",
        }
    }

    /// Levels that are dispatched before `create_alert` returns.
    pub fn notifies_immediately(&self) -> bool {
        matches!(self, AlertLevel::Error | AlertLevel::Critical)
    }
}

impl std::fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertStatus {
    Active,
    Notified,
    Resolved,
    Ignored,
}

impl AlertStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertStatus::Active => "active",
            AlertStatus::Notified => "notified",
            AlertStatus::Resolved => "resolved",
            AlertStatus::Ignored => "ignored",
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self, AlertStatus::Active | AlertStatus::Notified)
    }
}

impl std::fmt::Display for AlertStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AlertStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(AlertStatus::Active),
            "notified" => Ok(AlertStatus::Notified),
            "resolved" => Ok(AlertStatus::Resolved),
            "ignored" => Ok(AlertStatus::Ignored),
            other => Err(format!("unknown alert status: {}", other)),
        }
    }
}

/// Row of `backup_monitoring_alerts`. Never deleted, only status-transitioned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    #[serde(rename = "alert_id")]
    pub id: String,
    pub level: AlertLevel,
    #[serde(rename = "type")]
    pub alert_type: String,
    pub title: String,
    #[serde(default)]
    pub data: Value,
    pub status: AlertStatus,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
    pub escalated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub escalation_count: u32,
}

impl Alert {
    pub fn new(level: AlertLevel, alert_type: &str, title: &str, data: Value) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            level,
            alert_type: alert_type.to_string(),
            title: title.to_string(),
            data,
            status: AlertStatus::Active,
            created_at: Utc::now(),
            processed_at: None,
            escalated_at: None,
            escalation_count: 0,
        }
    }

    pub fn is_escalation(&self) -> bool {
        self.escalation_count > 0
    }

    /// Plain-text rendering shared by the chat, email and SMS channels.
    pub fn format_text(&self) -> String {
        let escalation = if self.is_escalation() {
            format!(" (escalation #{})", self.escalation_count)
        } else {
            String::new()
        };

        let mut text = format!(
            "{} [{}] {}{}\nType: {}\nTime: {}",
            self.level.emoji(),
            self.level.as_str().to_uppercase(),
            self.title,
            escalation,
            self.alert_type,
            self.created_at.format("%Y-%m-%d %H:%M:%S UTC"),
        );

        if let Some(fields) = self.data.as_object() {
            for (key, value) in fields {
                let rendered = match value {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                text.push_str(&format!("\n{}: {}", key, rendered));
            }
        }

        text
    }
}

// =====================================================================================
// NOTIFICATIONS
// =====================================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelResult {
    pub channel: String,
    pub success: bool,
    pub error: Option<String>,
}

/// Aggregate of one dispatch call. `successful + failed == total` always holds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DispatchSummary {
    pub successful: usize,
    pub failed: usize,
    pub total: usize,
    pub results: Vec<ChannelResult>,
}

impl DispatchSummary {
    pub fn from_results(results: Vec<ChannelResult>) -> Self {
        let successful = results.iter().filter(|r| r.success).count();
        Self {
            successful,
            failed: results.len() - successful,
            total: results.len(),
            results,
        }
    }
}

// =====================================================================================
// REPORTS
// =====================================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpoCompliance {
    pub resource: String,
    pub rpo_minutes: u64,
    pub last_success_at: Option<DateTime<Utc>>,
    pub data_loss_window_minutes: Option<u64>,
    pub compliant: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoveryTimeSummary {
    pub last_recovery_status: String,
    pub last_recovery_at: DateTime<Utc>,
    pub duration_minutes: u64,
    pub rto_minutes: u64,
    pub within_rto: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReliabilityReport {
    pub report_id: String,
    pub generated_at: DateTime<Utc>,
    pub rpo: Vec<RpoCompliance>,
    pub open_alerts_by_level: HashMap<String, u32>,
    pub backups: Vec<BackupOperationSummary>,
    pub last_recovery: Option<RecoveryTimeSummary>,
}

impl ReliabilityReport {
    pub fn all_rpo_met(&self) -> bool {
        self.rpo.iter().all(|r| r.compliant)
    }
}

// =====================================================================================
// REQUEST / RESPONSE MODELS
// =====================================================================================

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct HealthCheckRequest {
    pub include_details: Option<bool>,
    pub refresh: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct HealthCheckResponse {
    pub status: HealthStatus,
    pub healthy_checks: usize,
    pub warning_checks: usize,
    pub unhealthy_checks: usize,
    pub last_check: DateTime<Utc>,
    pub details: Option<HealthSnapshot>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct AlertListRequest {
    pub status: Option<AlertStatus>,
    pub limit: Option<usize>,
}

// =====================================================================================
// ERRORS
// =====================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Store,
    Check,
    Timeout,
    Notification,
    NotFound,
    InvalidTransition,
    Serialization,
}

impl ErrorKind {
    /// Level of the self-referential alert raised when monitoring itself fails.
    pub fn severity(&self) -> AlertLevel {
        match self {
            ErrorKind::Store => AlertLevel::Critical,
            ErrorKind::NotFound | ErrorKind::InvalidTransition => AlertLevel::Warning,
            ErrorKind::Check
            | ErrorKind::Timeout
            | ErrorKind::Notification
            | ErrorKind::Serialization => AlertLevel::Error,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MonitoringError {
    #[error("Store operation failed: {0}")]
    Store(String),
    #[error("Health check failed: {0}")]
    HealthCheckFailed(String),
    #[error("Check {check} timed out after {timeout_secs}s")]
    CheckTimeout { check: String, timeout_secs: u64 },
    #[error("Notification delivery failed: {0}")]
    Notification(String),
    #[error("Alert not found: {0}")]
    AlertNotFound(String),
    #[error("Alert {alert_id} cannot move from {from} to {to}")]
    InvalidTransition {
        alert_id: String,
        from: AlertStatus,
        to: AlertStatus,
    },
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl MonitoringError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            MonitoringError::Store(_) => ErrorKind::Store,
            MonitoringError::HealthCheckFailed(_) => ErrorKind::Check,
            MonitoringError::CheckTimeout { .. } => ErrorKind::Timeout,
            MonitoringError::Notification(_) => ErrorKind::Notification,
            MonitoringError::AlertNotFound(_) => ErrorKind::NotFound,
            MonitoringError::InvalidTransition { .. } => ErrorKind::InvalidTransition,
            MonitoringError::Serialization(_) => ErrorKind::Serialization,
        }
    }

    pub fn store(err: anyhow::Error) -> Self {
        MonitoringError::Store(format!("{:#}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn operation(backup_type: &str, status: BackupOperationStatus, hours_ago: i64, now: DateTime<Utc>) -> BackupOperation {
        let at = now - Duration::hours(hours_ago);
        BackupOperation {
            id: Uuid::new_v4().to_string(),
            backup_type: backup_type.to_string(),
            status,
            size_bytes: 1024,
            started_at: at,
            completed_at: Some(at),
        }
    }

    #[test]
    fn test_worst_status() {
        assert_eq!(HealthStatus::worst(vec![]), HealthStatus::Healthy);
        assert_eq!(
            HealthStatus::worst(vec![HealthStatus::Healthy, HealthStatus::Warning]),
            HealthStatus::Warning
        );
        assert_eq!(
            HealthStatus::worst(vec![HealthStatus::Unhealthy, HealthStatus::Warning]),
            HealthStatus::Unhealthy
        );
    }

    #[test]
    fn test_summary_uses_latest_success() {
        let now = Utc::now();
        let ops = vec![
            operation("database", BackupOperationStatus::Completed, 30, now),
            operation("database", BackupOperationStatus::Completed, 6, now),
            operation("database", BackupOperationStatus::Failed, 2, now),
            operation("files", BackupOperationStatus::Completed, 1, now),
        ];

        let summary = BackupOperationSummary::from_operations("database", &ops, now, 25.0);
        assert_eq!(summary.total_count, 3);
        assert_eq!(summary.successful_count, 2);
        assert_eq!(summary.failed_count, 1);
        assert_eq!(summary.age_hours, Some(6.0));
        assert!(!summary.is_stale);
        assert_eq!(summary.total_size_bytes, 2048);
        assert!((summary.failure_rate().unwrap() - 1.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_summary_without_success_is_stale() {
        let now = Utc::now();
        let ops = vec![operation("database", BackupOperationStatus::Failed, 2, now)];

        let summary = BackupOperationSummary::from_operations("database", &ops, now, 25.0);
        assert!(summary.last_success_at.is_none());
        assert!(summary.age_hours.is_none());
        assert!(summary.is_stale);
        assert_eq!(summary.failure_rate(), Some(1.0));

        let empty = BackupOperationSummary::from_operations("files", &ops, now, 25.0);
        assert_eq!(empty.total_count, 0);
        assert_eq!(empty.failure_rate(), None);
    }

    #[test]
    fn test_alert_row_uses_table_column_names() {
        let alert = Alert::new(AlertLevel::Critical, alert_types::BACKUP_STALE, "Backup stale", json!({"backup_type": "database"}));
        let row = serde_json::to_value(&alert).unwrap();

        assert_eq!(row["alert_id"], alert.id);
        assert_eq!(row["type"], "backup_stale");
        assert_eq!(row["level"], "critical");
        assert_eq!(row["status"], "active");
        assert!(row["processed_at"].is_null());
        assert_eq!(row["escalation_count"], 0);

        let back: Alert = serde_json::from_value(row).unwrap();
        assert_eq!(back, alert);
    }

    #[test]
    fn test_alert_text_mentions_escalation() {
        let mut alert = Alert::new(AlertLevel::Error, alert_types::HEALTH_CHECK_FAILED, "Store unreachable", json!({"check": "connectivity"}));
        assert!(!alert.format_text().contains("escalation"));

        alert.escalation_count = 2;
        let text = alert.format_text();
        assert!(text.contains("[ERROR] Store unreachable (escalation #2)"));
        assert!(text.contains("check: connectivity"));
    }

    #[test]
    fn test_error_kind_severity() {
        let store = MonitoringError::store(anyhow::anyhow!("connection refused"));
        assert_eq!(store.kind(), ErrorKind::Store);
        assert_eq!(store.kind().severity(), AlertLevel::Critical);

        let timeout = MonitoringError::CheckTimeout { check: "connectivity".into(), timeout_secs: 30 };
        assert_eq!(timeout.kind().severity(), AlertLevel::Error);
        assert_eq!(MonitoringError::AlertNotFound("x".into()).kind().severity(), AlertLevel::Warning);
    }

    #[test]
    fn test_dispatch_summary_counts() {
        let summary = DispatchSummary::from_results(vec![
            ChannelResult { channel: "email".into(), success: true, error: None },
            ChannelResult { channel: "slack".into(), success: false, error: Some("timeout".into()) },
            ChannelResult { channel: "webhook".into(), success: true, error: None },
        ]);
        assert_eq!((summary.successful, summary.failed, summary.total), (2, 1, 3));
    }
}
