// =====================================================================================
// HEALTH CHECK PROBES
// =====================================================================================

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use tracing::debug;

use crate::models::{BackupOperationSummary, CheckCategory, CheckResult, HealthStatus, MonitoringError};
use shared_config::{MonitoredService, ThresholdPair};
use shared_database::{tables, Query, Store};

const BYTES_PER_GB: f64 = 1024.0 * 1024.0 * 1024.0;

/// A named probe contributing one entry to a health snapshot.
#[async_trait]
pub trait HealthCheck: Send + Sync {
    fn name(&self) -> String;

    fn category(&self) -> CheckCategory;

    async fn run(&self) -> Result<CheckResult, MonitoringError>;
}

/// Maps a measured value onto the warning/critical pair. Boundaries are inclusive.
pub fn classify(value: f64, thresholds: &ThresholdPair) -> HealthStatus {
    if value >= thresholds.critical {
        HealthStatus::Unhealthy
    } else if value >= thresholds.warning {
        HealthStatus::Warning
    } else {
        HealthStatus::Healthy
    }
}

pub fn freshness_check_name(backup_type: &str) -> String {
    format!("backup_freshness.{}", backup_type)
}

pub fn backup_freshness(summary: &BackupOperationSummary, thresholds: &ThresholdPair) -> CheckResult {
    let base = match summary.age_hours {
        None => CheckResult::unhealthy(
            CheckCategory::BackupFreshness,
            format!("no backups found for {}", summary.backup_type),
        ),
        Some(age) => {
            let status = classify(age, thresholds);
            let detail = match status {
                HealthStatus::Healthy => format!("last {} backup {:.1}h ago", summary.backup_type, age),
                _ => format!(
                    "last {} backup {:.1}h ago exceeds {:.0}h threshold",
                    summary.backup_type,
                    age,
                    if status == HealthStatus::Unhealthy { thresholds.critical } else { thresholds.warning }
                ),
            };
            CheckResult::new(CheckCategory::BackupFreshness, status, detail)
        }
    };

    base.with_subject(summary.backup_type.clone()).with_data(json!({
        "backup_type": summary.backup_type,
        "age_hours": summary.age_hours,
        "last_success_at": summary.last_success_at,
        "successful_count": summary.successful_count,
        "failed_count": summary.failed_count,
    }))
}

pub fn storage_usage(summaries: &[BackupOperationSummary], capacity_gb: f64, thresholds: &ThresholdPair) -> CheckResult {
    let used_bytes: u64 = summaries.iter().map(|s| s.total_size_bytes).sum();
    let used_gb = used_bytes as f64 / BYTES_PER_GB;

    if capacity_gb <= 0.0 {
        return CheckResult::warning(CheckCategory::StorageUsage, "storage capacity not configured")
            .with_data(json!({ "used_gb": used_gb }));
    }

    let percent = used_gb / capacity_gb * 100.0;
    let status = classify(percent, thresholds);

    CheckResult::new(
        CheckCategory::StorageUsage,
        status,
        format!("{:.1}% of {:.0}GB backup storage used", percent, capacity_gb),
    )
    .with_data(json!({
        "used_gb": used_gb,
        "capacity_gb": capacity_gb,
        "usage_percent": percent,
    }))
}

// =====================================================================================
// STORE PROBES
// =====================================================================================

pub struct StoreConnectivityCheck {
    store: Arc<dyn Store>,
}

impl StoreConnectivityCheck {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl HealthCheck for StoreConnectivityCheck {
    fn name(&self) -> String {
        "store_connectivity".to_string()
    }

    fn category(&self) -> CheckCategory {
        CheckCategory::Connectivity
    }

    async fn run(&self) -> Result<CheckResult, MonitoringError> {
        self.store
            .select(tables::HEALTH_DATA, &Query::new().limit(1))
            .await
            .map_err(MonitoringError::store)?;

        Ok(CheckResult::healthy(CheckCategory::Connectivity, "store reachable"))
    }
}

/// Round-trip latency of a small alert-table read.
pub struct StorePerformanceCheck {
    store: Arc<dyn Store>,
    thresholds: ThresholdPair,
}

impl StorePerformanceCheck {
    pub fn new(store: Arc<dyn Store>, thresholds: ThresholdPair) -> Self {
        Self { store, thresholds }
    }
}

#[async_trait]
impl HealthCheck for StorePerformanceCheck {
    fn name(&self) -> String {
        "store_performance".to_string()
    }

    fn category(&self) -> CheckCategory {
        CheckCategory::Performance
    }

    async fn run(&self) -> Result<CheckResult, MonitoringError> {
        let start = Instant::now();
        self.store
            .select(tables::ALERTS, &Query::new().order_by("created_at", true).limit(10))
            .await
            .map_err(MonitoringError::store)?;
        let elapsed_ms = start.elapsed().as_millis() as u64;

        let status = classify(elapsed_ms as f64, &self.thresholds);
        Ok(CheckResult::new(
            CheckCategory::Performance,
            status,
            format!("store query took {}ms", elapsed_ms),
        )
        .with_response_time(elapsed_ms))
    }
}

// =====================================================================================
// SERVICE PROBES
// =====================================================================================

pub struct ServiceAvailabilityCheck {
    client: Client,
    service: MonitoredService,
    thresholds: ThresholdPair,
}

impl ServiceAvailabilityCheck {
    pub fn new(client: Client, service: MonitoredService, thresholds: ThresholdPair) -> Self {
        Self {
            client,
            service,
            thresholds,
        }
    }
}

#[async_trait]
impl HealthCheck for ServiceAvailabilityCheck {
    fn name(&self) -> String {
        format!("service.{}", self.service.name)
    }

    fn category(&self) -> CheckCategory {
        CheckCategory::ServiceAvailability
    }

    async fn run(&self) -> Result<CheckResult, MonitoringError> {
        let start = Instant::now();
        let response = self
            .client
            .get(&self.service.url)
            .send()
            .await
            .map_err(|e| MonitoringError::HealthCheckFailed(format!("{} unreachable: {}", self.service.name, e)))?;
        let elapsed_ms = start.elapsed().as_millis() as u64;

        debug!(service = %self.service.name, status = %response.status(), elapsed_ms, "service probe finished");

        let result = if response.status().is_success() {
            let status = classify(elapsed_ms as f64, &self.thresholds);
            CheckResult::new(
                CheckCategory::ServiceAvailability,
                status,
                format!("{} responded in {}ms", self.service.name, elapsed_ms),
            )
        } else {
            CheckResult::unhealthy(
                CheckCategory::ServiceAvailability,
                format!("{} returned {}", self.service.name, response.status()),
            )
        };

        Ok(result
            .with_subject(self.service.name.clone())
            .with_response_time(elapsed_ms)
            .with_data(json!({ "url": self.service.url })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn summary(age_hours: Option<f64>, size_bytes: u64) -> BackupOperationSummary {
        BackupOperationSummary {
            backup_type: "database".to_string(),
            last_success_at: age_hours.map(|_| Utc::now()),
            age_hours,
            is_stale: false,
            successful_count: 1,
            failed_count: 0,
            total_count: 1,
            total_size_bytes: size_bytes,
        }
    }

    #[test]
    fn test_classify_boundaries_inclusive() {
        let pair = ThresholdPair { warning: 25.0, critical: 49.0 };
        assert_eq!(classify(24.9, &pair), HealthStatus::Healthy);
        assert_eq!(classify(25.0, &pair), HealthStatus::Warning);
        assert_eq!(classify(49.0, &pair), HealthStatus::Unhealthy);
    }

    #[test]
    fn test_freshness_levels() {
        let pair = ThresholdPair { warning: 25.0, critical: 49.0 };

        assert_eq!(backup_freshness(&summary(Some(26.0), 0), &pair).status, HealthStatus::Warning);
        assert_eq!(backup_freshness(&summary(Some(50.0), 0), &pair).status, HealthStatus::Unhealthy);

        let missing = backup_freshness(&summary(None, 0), &pair);
        assert_eq!(missing.status, HealthStatus::Unhealthy);
        assert!(missing.detail.contains("no backups found"));
        assert_eq!(missing.subject.as_deref(), Some("database"));
    }

    #[test]
    fn test_storage_usage_levels() {
        let pair = ThresholdPair { warning: 80.0, critical: 95.0 };
        let gb = BYTES_PER_GB as u64;

        assert_eq!(storage_usage(&[summary(Some(1.0), 50 * gb)], 100.0, &pair).status, HealthStatus::Healthy);
        assert_eq!(storage_usage(&[summary(Some(1.0), 85 * gb)], 100.0, &pair).status, HealthStatus::Warning);
        assert_eq!(
            storage_usage(&[summary(Some(1.0), 60 * gb), summary(Some(1.0), 36 * gb)], 100.0, &pair).status,
            HealthStatus::Unhealthy
        );
    }
}
