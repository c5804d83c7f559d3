// =====================================================================================
// RELIABILITY REPORT SERVICE
// =====================================================================================

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::models::{BackupOperationSummary, MonitoringError, RecoveryTimeSummary, ReliabilityReport, RpoCompliance};
use crate::services::{AlertManagerService, BackupStatusReader};
use shared_config::RecoveryObjectives;
use shared_database::{tables, Query, Store};

const RECOVERY_OUTCOME_EVENTS: [&str; 2] = ["recovery_completed", "recovery_failed"];

pub fn rpo_compliance(summary: &BackupOperationSummary, objectives: &RecoveryObjectives) -> Option<RpoCompliance> {
    let objective = objectives.for_resource(&summary.backup_type)?;
    let window = summary.age_hours.map(|hours| (hours * 60.0).round() as u64);

    Some(RpoCompliance {
        resource: summary.backup_type.clone(),
        rpo_minutes: objective.rpo_minutes,
        last_success_at: summary.last_success_at,
        data_loss_window_minutes: window,
        compliant: window.map_or(false, |minutes| minutes <= objective.rpo_minutes),
    })
}

fn recovery_summary(row: &Value, total_rto_minutes: u64) -> Option<RecoveryTimeSummary> {
    let status = row.get("event_type")?.as_str()?.trim_start_matches("recovery_").to_string();
    let at: DateTime<Utc> = serde_json::from_value(row.get("created_at")?.clone()).ok()?;
    let duration_minutes = row.get("data")?.get("duration_minutes")?.as_u64()?;

    Some(RecoveryTimeSummary {
        last_recovery_status: status,
        last_recovery_at: at,
        duration_minutes,
        rto_minutes: total_rto_minutes,
        within_rto: duration_minutes <= total_rto_minutes,
    })
}

pub struct ReportService {
    store: Arc<dyn Store>,
    backups: Arc<BackupStatusReader>,
    alert_manager: Arc<AlertManagerService>,
    objectives: RecoveryObjectives,
}

impl ReportService {
    pub fn new(
        store: Arc<dyn Store>,
        backups: Arc<BackupStatusReader>,
        alert_manager: Arc<AlertManagerService>,
        objectives: RecoveryObjectives,
    ) -> Self {
        Self {
            store,
            backups,
            alert_manager,
            objectives,
        }
    }

    #[instrument(skip(self))]
    pub async fn generate_report(&self) -> Result<ReliabilityReport, MonitoringError> {
        let now = Utc::now();
        let backups = self.backups.summaries_at(now).await?;
        let rpo = backups
            .iter()
            .filter_map(|summary| rpo_compliance(summary, &self.objectives))
            .collect();

        let report = ReliabilityReport {
            report_id: Uuid::new_v4().to_string(),
            generated_at: now,
            rpo,
            open_alerts_by_level: self.alert_manager.alert_summary().await?,
            backups,
            last_recovery: self.last_recovery().await?,
        };

        self.store
            .insert(
                tables::RELIABILITY_REPORTS,
                json!({
                    "report_id": report.report_id,
                    "generated_at": report.generated_at,
                    "report": report,
                }),
            )
            .await
            .map_err(MonitoringError::store)?;

        if report.all_rpo_met() {
            info!(report_id = %report.report_id, "Reliability report generated");
        } else {
            warn!(
                report_id = %report.report_id,
                breaches = report.rpo.iter().filter(|r| !r.compliant).count(),
                "Reliability report generated with RPO breaches"
            );
        }

        Ok(report)
    }

    /// Scheduler entry point.
    pub async fn run_report_tick(&self) {
        if let Err(e) = self.generate_report().await {
            self.alert_manager.report_failure("reliability report", &e).await;
        }
    }

    async fn last_recovery(&self) -> Result<Option<RecoveryTimeSummary>, MonitoringError> {
        let rows = self
            .store
            .select(
                tables::RECOVERY_EVENTS,
                &Query::new()
                    .one_of(
                        "event_type",
                        RECOVERY_OUTCOME_EVENTS.iter().map(|e| json!(e)).collect(),
                    )
                    .order_by("created_at", true)
                    .limit(1),
            )
            .await
            .map_err(MonitoringError::store)?;

        Ok(rows
            .first()
            .and_then(|row| recovery_summary(row, self.objectives.total_rto_minutes())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_config::MonitoringConfig;

    fn summary(backup_type: &str, age_hours: Option<f64>) -> BackupOperationSummary {
        BackupOperationSummary {
            backup_type: backup_type.to_string(),
            last_success_at: None,
            age_hours,
            is_stale: false,
            successful_count: 0,
            failed_count: 0,
            total_count: 0,
            total_size_bytes: 0,
        }
    }

    #[test]
    fn test_rpo_compliance() {
        let objectives = MonitoringConfig::default().objectives;

        let fresh = rpo_compliance(&summary("database", Some(2.0)), &objectives).unwrap();
        assert!(fresh.compliant);
        assert_eq!(fresh.data_loss_window_minutes, Some(120));

        let stale = rpo_compliance(&summary("database", Some(30.0)), &objectives).unwrap();
        assert!(!stale.compliant);

        let missing = rpo_compliance(&summary("files", None), &objectives).unwrap();
        assert!(!missing.compliant);

        assert!(rpo_compliance(&summary("unknown", Some(1.0)), &objectives).is_none());
    }

    #[test]
    fn test_recovery_summary_against_total_rto() {
        let row = json!({
            "event_type": "recovery_completed",
            "created_at": "2025-01-01T00:00:00Z",
            "data": {"duration_minutes": 95}
        });
        let summary = recovery_summary(&row, 210).unwrap();
        assert_eq!(summary.last_recovery_status, "completed");
        assert!(summary.within_rto);

        let slow = recovery_summary(&row, 60).unwrap();
        assert!(!slow.within_rto);
    }
}
