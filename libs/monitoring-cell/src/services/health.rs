// =====================================================================================
// HEALTH MONITORING SERVICE
// =====================================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use futures::future::join_all;
use reqwest::Client;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info, instrument, warn};

use crate::models::{BackupOperationSummary, CheckCategory, CheckResult, HealthSnapshot, HealthStatus, MonitoringError};
use crate::services::checks::{
    backup_freshness, freshness_check_name, storage_usage, HealthCheck, ServiceAvailabilityCheck,
    StoreConnectivityCheck, StorePerformanceCheck,
};
use crate::services::{AlertManagerService, BackupStatusReader};
use shared_config::MonitoringConfig;
use shared_database::{tables, Query, Store};

pub struct HealthMonitorService {
    start_time: Instant,
    store: Arc<dyn Store>,
    alert_manager: Arc<AlertManagerService>,
    backups: Arc<BackupStatusReader>,
    checks: Vec<Arc<dyn HealthCheck>>,
    config: MonitoringConfig,
    latest: RwLock<Option<HealthSnapshot>>,
    in_flight: Mutex<()>,
}

impl HealthMonitorService {
    /// Builds the monitor with the store probes and one probe per monitored service.
    pub fn new(
        config: &MonitoringConfig,
        store: Arc<dyn Store>,
        alert_manager: Arc<AlertManagerService>,
        backups: Arc<BackupStatusReader>,
    ) -> Self {
        let client = Client::new();
        let latency = config.thresholds.response_time_ms;

        let mut checks: Vec<Arc<dyn HealthCheck>> = vec![
            Arc::new(StoreConnectivityCheck::new(store.clone())),
            Arc::new(StorePerformanceCheck::new(store.clone(), latency)),
        ];
        for service in &config.services {
            checks.push(Arc::new(ServiceAvailabilityCheck::new(client.clone(), service.clone(), latency)));
        }

        Self {
            start_time: Instant::now(),
            store,
            alert_manager,
            backups,
            checks,
            config: config.clone(),
            latest: RwLock::new(None),
            in_flight: Mutex::new(()),
        }
    }

    pub fn with_check(mut self, check: Arc<dyn HealthCheck>) -> Self {
        self.checks.push(check);
        self
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    pub async fn latest_snapshot(&self) -> Option<HealthSnapshot> {
        self.latest.read().await.clone()
    }

    /// Runs every check, persists the snapshot and hands it to the alert manager.
    /// Individual check failures become unhealthy entries rather than errors.
    /// A caller arriving while a run is in flight waits for it and shares its snapshot.
    #[instrument(skip(self))]
    pub async fn run_check(&self) -> HealthSnapshot {
        let _guard = match self.in_flight.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                let seen = self.latest.read().await.as_ref().map(|s| s.id.clone());
                let guard = self.in_flight.lock().await;
                if let Some(snapshot) = self.latest_snapshot().await {
                    if Some(&snapshot.id) != seen.as_ref() {
                        debug!(snapshot_id = %snapshot.id, "Joined in-flight health check");
                        return snapshot;
                    }
                }
                guard
            }
        };

        self.collect_snapshot().await
    }

    async fn collect_snapshot(&self) -> HealthSnapshot {
        let now = Utc::now();
        let mut checks = BTreeMap::new();

        let summaries = match self.read_summaries(now).await {
            Ok(summaries) => {
                for summary in &summaries {
                    checks.insert(
                        freshness_check_name(&summary.backup_type),
                        backup_freshness(summary, &self.config.thresholds.backup_age_hours),
                    );
                }
                checks.insert(
                    "storage_usage".to_string(),
                    storage_usage(
                        &summaries,
                        self.config.backups.storage_capacity_gb,
                        &self.config.thresholds.disk_usage_percent,
                    ),
                );
                summaries
            }
            Err(e) => {
                error!(error = %e, "Could not read backup operations");
                for backup_type in self.backups.backup_types() {
                    checks.insert(
                        freshness_check_name(backup_type),
                        CheckResult::unhealthy(
                            CheckCategory::BackupFreshness,
                            format!("backup status unavailable: {}", e),
                        )
                        .with_subject(backup_type.clone()),
                    );
                }
                Vec::new()
            }
        };

        let probes = join_all(self.checks.iter().map(|check| self.run_probe(check.clone()))).await;
        checks.extend(probes);

        let snapshot = HealthSnapshot::new(now, checks, summaries);

        if let Err(e) = self.persist(&snapshot).await {
            error!(snapshot_id = %snapshot.id, error = %e, "Failed to persist health snapshot");
            self.alert_manager.report_failure("health snapshot persistence", &e).await;
        }

        let raised = self.alert_manager.evaluate(&snapshot).await;
        if !raised.is_empty() {
            self.record_alert_count(&snapshot.id, raised.len()).await;
        }

        match snapshot.overall_status {
            HealthStatus::Healthy => info!(snapshot_id = %snapshot.id, "Backup health check passed"),
            status => warn!(
                snapshot_id = %snapshot.id,
                status = %status,
                unhealthy = snapshot.count_with_status(HealthStatus::Unhealthy),
                warning = snapshot.count_with_status(HealthStatus::Warning),
                alerts = raised.len(),
                "Backup health check found problems"
            ),
        }

        *self.latest.write().await = Some(snapshot.clone());
        snapshot
    }

    /// Backup-status tick: failure-rate evaluation over the lookback window.
    #[instrument(skip(self))]
    pub async fn check_backup_status(&self) -> Vec<BackupOperationSummary> {
        match self.read_summaries(Utc::now()).await {
            Ok(summaries) => {
                let raised = self.alert_manager.evaluate_backup_status(&summaries).await;
                debug!(types = summaries.len(), alerts = raised.len(), "Backup status evaluated");
                summaries
            }
            Err(e) => {
                error!(error = %e, "Backup status check failed");
                self.alert_manager.report_failure("backup status check", &e).await;
                Vec::new()
            }
        }
    }

    /// Backup summaries bounded by the per-check timeout.
    async fn read_summaries(&self, now: DateTime<Utc>) -> Result<Vec<BackupOperationSummary>, MonitoringError> {
        let timeout = self.config.check_timeout();
        match tokio::time::timeout(timeout, self.backups.summaries_at(now)).await {
            Ok(result) => result,
            Err(_) => Err(MonitoringError::CheckTimeout {
                check: "backup_operations".to_string(),
                timeout_secs: timeout.as_secs(),
            }),
        }
    }

    async fn run_probe(&self, check: Arc<dyn HealthCheck>) -> (String, CheckResult) {
        let name = check.name();
        let timeout = self.config.check_timeout();
        let start = Instant::now();

        let result = match tokio::time::timeout(timeout, check.run()).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                warn!(check = %name, error = %e, "Health check errored");
                CheckResult::unhealthy(check.category(), e.to_string())
            }
            Err(_) => {
                let e = MonitoringError::CheckTimeout {
                    check: name.clone(),
                    timeout_secs: timeout.as_secs(),
                };
                warn!(check = %name, "Health check timed out");
                CheckResult::unhealthy(check.category(), e.to_string())
            }
        };

        let elapsed = elapsed_ms(start.elapsed());
        let result = if result.response_time_ms == 0 {
            result.with_response_time(elapsed)
        } else {
            result
        };

        (name, result)
    }

    async fn persist(&self, snapshot: &HealthSnapshot) -> Result<(), MonitoringError> {
        self.store
            .insert(tables::HEALTH_DATA, snapshot.to_row(0))
            .await
            .map_err(MonitoringError::store)
    }

    async fn record_alert_count(&self, snapshot_id: &str, count: usize) {
        if let Err(e) = self
            .store
            .update(
                tables::HEALTH_DATA,
                &Query::new().eq("id", snapshot_id),
                serde_json::json!({ "alert_count": count }),
            )
            .await
        {
            warn!(snapshot_id, error = %e, "Failed to record snapshot alert count");
        }
    }
}

fn elapsed_ms(elapsed: Duration) -> u64 {
    elapsed.as_millis() as u64
}
