use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, warn};

use crate::models::{BackupOperation, BackupOperationSummary, MonitoringError};
use shared_config::{AlertThresholds, BackupSettings};
use shared_database::{tables, Query, Store};

/// Reads `backup_operations` and summarises each configured backup type.
pub struct BackupStatusReader {
    store: Arc<dyn Store>,
    settings: BackupSettings,
    thresholds: AlertThresholds,
}

impl BackupStatusReader {
    pub fn new(store: Arc<dyn Store>, settings: BackupSettings, thresholds: AlertThresholds) -> Self {
        Self {
            store,
            settings,
            thresholds,
        }
    }

    pub fn backup_types(&self) -> &[String] {
        &self.settings.backup_types
    }

    pub async fn summaries_at(&self, now: DateTime<Utc>) -> Result<Vec<BackupOperationSummary>, MonitoringError> {
        let since = now - Duration::hours(self.settings.lookback_hours as i64);
        let rows = self
            .store
            .select(
                tables::BACKUP_OPERATIONS,
                &Query::new()
                    .gte("started_at", since.to_rfc3339())
                    .order_by("started_at", true),
            )
            .await
            .map_err(MonitoringError::store)?;

        let mut operations = Vec::with_capacity(rows.len());
        for row in rows {
            match serde_json::from_value::<BackupOperation>(row) {
                Ok(op) => operations.push(op),
                Err(e) => warn!(error = %e, "Skipping malformed backup operation row"),
            }
        }

        debug!(operations = operations.len(), "Loaded backup operations");

        Ok(self
            .settings
            .backup_types
            .iter()
            .map(|backup_type| {
                BackupOperationSummary::from_operations(
                    backup_type,
                    &operations,
                    now,
                    self.thresholds.backup_age_hours.warning,
                )
            })
            .collect())
    }
}
