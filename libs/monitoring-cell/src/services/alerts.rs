// =====================================================================================
// ALERT MANAGER SERVICE
// =====================================================================================

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde_json::{json, Value};
use tracing::{error, info, instrument, warn};

use crate::models::{
    alert_types, Alert, AlertLevel, AlertStatus, BackupOperationSummary, CheckCategory, CheckResult,
    DispatchSummary, HealthSnapshot, HealthStatus, MonitoringError,
};
use crate::services::checks::classify;
use crate::services::NotificationDispatcher;
use shared_config::{AlertThresholds, EscalationConfig, MonitoringConfig};
use shared_database::{tables, Query, Store};

/// An alert that evaluation decided to raise, before it has an id.
#[derive(Debug, Clone, PartialEq)]
pub struct AlertDraft {
    pub level: AlertLevel,
    pub alert_type: String,
    pub title: String,
    pub data: Value,
}

impl AlertDraft {
    fn new(level: AlertLevel, alert_type: &str, title: String, data: Value) -> Self {
        Self {
            level,
            alert_type: alert_type.to_string(),
            title,
            data,
        }
    }

    fn dedup_key(&self) -> (String, String) {
        let subject = self
            .data
            .get("subject")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        (self.alert_type.clone(), subject)
    }
}

/// Rules turning a snapshot into alerts. One alert per condition per snapshot.
pub fn drafts_for_snapshot(snapshot: &HealthSnapshot) -> Vec<AlertDraft> {
    let mut drafts = Vec::new();

    for (name, check) in &snapshot.checks {
        if let Some(draft) = draft_for_check(name, check) {
            drafts.push(draft);
        }
    }

    dedup(drafts)
}

fn draft_for_check(name: &str, check: &CheckResult) -> Option<AlertDraft> {
    let subject = check.subject.clone().unwrap_or_else(|| name.to_string());
    let data = json!({
        "check": name,
        "subject": subject,
        "detail": check.detail,
        "status": check.status,
        "measurements": check.data,
    });

    match (check.category, check.status) {
        (_, HealthStatus::Healthy) => None,
        (CheckCategory::BackupFreshness, HealthStatus::Unhealthy) if check.data.get("age_hours").is_some() => {
            let (alert_type, title) = if check.data["age_hours"].is_null() {
                (alert_types::BACKUP_MISSING, format!("No {} backups found", subject))
            } else {
                (alert_types::BACKUP_STALE, format!("{} backup is stale", subject))
            };
            Some(AlertDraft::new(AlertLevel::Critical, alert_type, title, data))
        }
        // freshness warnings are visible in the snapshot but do not alert
        (CheckCategory::BackupFreshness, HealthStatus::Warning) => None,
        (CheckCategory::StorageUsage, HealthStatus::Unhealthy) => Some(AlertDraft::new(
            AlertLevel::Critical,
            alert_types::STORAGE_USAGE_CRITICAL,
            "Backup storage critically full".to_string(),
            data,
        )),
        (CheckCategory::StorageUsage, HealthStatus::Warning) => Some(AlertDraft::new(
            AlertLevel::Warning,
            alert_types::STORAGE_USAGE_HIGH,
            "Backup storage usage high".to_string(),
            data,
        )),
        (_, HealthStatus::Unhealthy) => Some(AlertDraft::new(
            AlertLevel::Error,
            alert_types::HEALTH_CHECK_FAILED,
            format!("Health check {} failed", name),
            data,
        )),
        (_, HealthStatus::Warning) => Some(AlertDraft::new(
            AlertLevel::Warning,
            alert_types::HEALTH_CHECK_DEGRADED,
            format!("Health check {} degraded", name),
            data,
        )),
    }
}

pub fn drafts_for_backup_status(summaries: &[BackupOperationSummary], thresholds: &AlertThresholds) -> Vec<AlertDraft> {
    let drafts = summaries
        .iter()
        .filter_map(|summary| {
            let rate = summary.failure_rate()?;
            let level = match classify(rate, &thresholds.failure_rate) {
                HealthStatus::Healthy => return None,
                HealthStatus::Warning => AlertLevel::Warning,
                HealthStatus::Unhealthy => AlertLevel::Critical,
            };

            Some(AlertDraft::new(
                level,
                alert_types::BACKUP_FAILURE_RATE,
                format!("{} backups failing ({:.0}%)", summary.backup_type, rate * 100.0),
                json!({
                    "subject": summary.backup_type,
                    "backup_type": summary.backup_type,
                    "failure_rate": rate,
                    "failed_count": summary.failed_count,
                    "total_count": summary.total_count,
                }),
            ))
        })
        .collect();

    dedup(drafts)
}

fn dedup(drafts: Vec<AlertDraft>) -> Vec<AlertDraft> {
    let mut seen = HashSet::new();
    drafts
        .into_iter()
        .filter(|draft| seen.insert(draft.dedup_key()))
        .collect()
}

/// First escalation waits for both the initial delay and one interval; later
/// ones wait one interval after the previous escalation.
pub fn is_escalation_due(alert: &Alert, now: DateTime<Utc>, config: &EscalationConfig) -> bool {
    if !config.enabled || !alert.status.is_open() || alert.escalation_count >= config.max_escalations {
        return false;
    }

    let interval = Duration::minutes(config.escalation_interval_minutes as i64);
    let (since, wait) = match alert.escalated_at {
        Some(previous) => (previous, interval),
        None => (
            alert.created_at,
            Duration::minutes(config.escalate_after_minutes as i64).max(interval),
        ),
    };

    now - since >= wait
}

pub struct AlertManagerService {
    store: Arc<dyn Store>,
    dispatcher: Arc<NotificationDispatcher>,
    thresholds: AlertThresholds,
    escalation: EscalationConfig,
}

impl AlertManagerService {
    pub fn new(config: &MonitoringConfig, store: Arc<dyn Store>, dispatcher: Arc<NotificationDispatcher>) -> Self {
        Self {
            store,
            dispatcher,
            thresholds: config.thresholds.clone(),
            escalation: config.escalation.clone(),
        }
    }

    pub fn dispatcher(&self) -> Arc<NotificationDispatcher> {
        self.dispatcher.clone()
    }

    /// Records an alert. Error and critical alerts are dispatched before returning,
    /// even when the store write fails.
    #[instrument(skip(self, data))]
    pub async fn create_alert(
        &self,
        level: AlertLevel,
        alert_type: &str,
        title: &str,
        data: Value,
    ) -> Result<String, MonitoringError> {
        let mut alert = Alert::new(level, alert_type, title, data);
        let row = serde_json::to_value(&alert)?;

        let persisted = self.store.insert(tables::ALERTS, row).await;

        match level {
            AlertLevel::Critical | AlertLevel::Error => {
                error!(alert_id = %alert.id, alert_type, level = %level, "ALERT RAISED: {}", title);
            }
            AlertLevel::Warning => {
                warn!(alert_id = %alert.id, alert_type, "Alert raised: {}", title);
            }
            AlertLevel::Info => {
                info!(alert_id = %alert.id, alert_type, "Alert raised: {}", title);
            }
        }

        if level.notifies_immediately() {
            self.dispatcher.dispatch(&alert).await;
            alert.status = AlertStatus::Notified;
            alert.processed_at = Some(Utc::now());
        }

        if let Err(e) = persisted {
            error!(alert_id = %alert.id, error = %e, "Failed to persist alert");
            return Err(MonitoringError::store(e));
        }

        if alert.status == AlertStatus::Notified {
            self.mark_notified(&alert.id, Utc::now()).await?;
        }

        Ok(alert.id)
    }

    #[instrument(skip(self, snapshot), fields(snapshot_id = %snapshot.id))]
    pub async fn evaluate(&self, snapshot: &HealthSnapshot) -> Vec<String> {
        self.raise_all(drafts_for_snapshot(snapshot), "health snapshot").await
    }

    #[instrument(skip(self, summaries))]
    pub async fn evaluate_backup_status(&self, summaries: &[BackupOperationSummary]) -> Vec<String> {
        self.raise_all(drafts_for_backup_status(summaries, &self.thresholds), "backup status")
            .await
    }

    async fn raise_all(&self, drafts: Vec<AlertDraft>, source: &str) -> Vec<String> {
        let mut created = Vec::new();
        let mut failures = Vec::new();

        for draft in drafts {
            match self
                .create_alert(draft.level, &draft.alert_type, &draft.title, draft.data)
                .await
            {
                Ok(id) => created.push(id),
                Err(e) => failures.push(e),
            }
        }

        if let Some(first) = failures.first() {
            error!(source, failures = failures.len(), error = %first, "Alert evaluation failed");
            self.report_failure(source, first).await;
        }

        created
    }

    /// Raises a self-referential alert about a monitoring failure. Never fails.
    pub async fn report_failure(&self, operation: &str, failure: &MonitoringError) {
        let level = failure.kind().severity().max(AlertLevel::Error);
        let data = json!({
            "subject": operation,
            "operation": operation,
            "error": failure.to_string(),
        });

        if let Err(e) = self
            .create_alert(
                level,
                alert_types::MONITORING_FAILURE,
                &format!("Backup monitoring failure during {}", operation),
                data,
            )
            .await
        {
            error!(operation, error = %e, "Could not record monitoring failure alert");
        }
    }

    /// Dispatches every active alert that has not been processed yet.
    #[instrument(skip(self))]
    pub async fn process_alerts(&self) -> Result<usize, MonitoringError> {
        let query = Query::new()
            .eq("status", AlertStatus::Active.as_str())
            .is_null("processed_at")
            .order_by("created_at", false);

        let pending = self.load_alerts(&query).await?;
        let mut processed = 0;

        for alert in pending {
            self.dispatcher.dispatch(&alert).await;
            self.mark_notified(&alert.id, Utc::now()).await?;
            processed += 1;
        }

        if processed > 0 {
            info!(processed, "Processed pending alerts");
        }
        Ok(processed)
    }

    pub async fn escalate_alerts(&self) -> Result<usize, MonitoringError> {
        self.escalate_alerts_at(Utc::now()).await
    }

    #[instrument(skip(self))]
    pub async fn escalate_alerts_at(&self, now: DateTime<Utc>) -> Result<usize, MonitoringError> {
        if !self.escalation.enabled {
            return Ok(0);
        }

        let query = Query::new()
            .one_of(
                "status",
                vec![json!(AlertStatus::Active.as_str()), json!(AlertStatus::Notified.as_str())],
            )
            .lt("escalation_count", self.escalation.max_escalations);

        let candidates = self.load_alerts(&query).await?;
        let mut escalated = 0;

        for mut alert in candidates
            .into_iter()
            .filter(|alert| is_escalation_due(alert, now, &self.escalation))
        {
            let previous_count = alert.escalation_count;
            alert.escalation_count += 1;
            alert.escalated_at = Some(now);

            // guarded on the previous count so a concurrent tick cannot double-escalate
            let claimed = self
                .store
                .update(
                    tables::ALERTS,
                    &Query::new()
                        .eq("alert_id", alert.id.as_str())
                        .eq("escalation_count", previous_count),
                    json!({
                        "escalation_count": alert.escalation_count,
                        "escalated_at": now,
                    }),
                )
                .await
                .map_err(MonitoringError::store)?;

            if claimed == 0 {
                continue;
            }

            warn!(
                alert_id = %alert.id,
                escalation = alert.escalation_count,
                max = self.escalation.max_escalations,
                "Escalating unresolved alert: {}",
                alert.title
            );
            self.dispatcher.dispatch(&alert).await;
            escalated += 1;
        }

        Ok(escalated)
    }

    /// Scheduler entry point: processing then escalation, failures turned into alerts.
    pub async fn run_processing_tick(&self) {
        if let Err(e) = self.process_alerts().await {
            self.report_failure("alert processing", &e).await;
        }
        if let Err(e) = self.escalate_alerts().await {
            self.report_failure("alert escalation", &e).await;
        }
    }

    /// Dispatches an alert outside the stored lifecycle, e.g. for recovery events.
    pub async fn notify(&self, alert: &Alert) -> DispatchSummary {
        self.dispatcher.dispatch(alert).await
    }

    pub async fn resolve_alert(&self, alert_id: &str) -> Result<Alert, MonitoringError> {
        self.close_alert(alert_id, AlertStatus::Resolved).await
    }

    pub async fn ignore_alert(&self, alert_id: &str) -> Result<Alert, MonitoringError> {
        self.close_alert(alert_id, AlertStatus::Ignored).await
    }

    #[instrument(skip(self))]
    async fn close_alert(&self, alert_id: &str, target: AlertStatus) -> Result<Alert, MonitoringError> {
        let updated = self
            .store
            .update(
                tables::ALERTS,
                &Query::new().eq("alert_id", alert_id).one_of(
                    "status",
                    vec![json!(AlertStatus::Active.as_str()), json!(AlertStatus::Notified.as_str())],
                ),
                json!({ "status": target.as_str() }),
            )
            .await
            .map_err(MonitoringError::store)?;

        let alert = self.get_alert(alert_id).await?;

        if updated == 0 {
            return Err(MonitoringError::InvalidTransition {
                alert_id: alert_id.to_string(),
                from: alert.status,
                to: target,
            });
        }

        info!(alert_id, status = %target, "Alert closed");
        Ok(alert)
    }

    pub async fn get_alert(&self, alert_id: &str) -> Result<Alert, MonitoringError> {
        self.load_alerts(&Query::new().eq("alert_id", alert_id).limit(1))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| MonitoringError::AlertNotFound(alert_id.to_string()))
    }

    pub async fn list_alerts(&self, status: Option<AlertStatus>, limit: usize) -> Result<Vec<Alert>, MonitoringError> {
        let mut query = Query::new().order_by("created_at", true).limit(limit);
        if let Some(status) = status {
            query = query.eq("status", status.as_str());
        }
        self.load_alerts(&query).await
    }

    /// Open alert counts keyed by level.
    pub async fn alert_summary(&self) -> Result<HashMap<String, u32>, MonitoringError> {
        let open = self
            .load_alerts(&Query::new().one_of(
                "status",
                vec![json!(AlertStatus::Active.as_str()), json!(AlertStatus::Notified.as_str())],
            ))
            .await?;

        let mut summary: HashMap<String, u32> = [
            AlertLevel::Info,
            AlertLevel::Warning,
            AlertLevel::Error,
            AlertLevel::Critical,
        ]
        .iter()
        .map(|level| (level.as_str().to_string(), 0))
        .collect();

        for alert in open {
            *summary.entry(alert.level.as_str().to_string()).or_insert(0) += 1;
        }

        Ok(summary)
    }

    async fn mark_notified(&self, alert_id: &str, at: DateTime<Utc>) -> Result<(), MonitoringError> {
        // an alert resolved in the meantime keeps its terminal status
        self.store
            .update(
                tables::ALERTS,
                &Query::new()
                    .eq("alert_id", alert_id)
                    .eq("status", AlertStatus::Active.as_str()),
                json!({
                    "status": AlertStatus::Notified.as_str(),
                    "processed_at": at,
                }),
            )
            .await
            .map_err(MonitoringError::store)?;
        Ok(())
    }

    async fn load_alerts(&self, query: &Query) -> Result<Vec<Alert>, MonitoringError> {
        let rows = self
            .store
            .select(tables::ALERTS, query)
            .await
            .map_err(MonitoringError::store)?;

        rows.into_iter()
            .map(|row| serde_json::from_value(row).map_err(MonitoringError::from))
            .collect()
    }
}
