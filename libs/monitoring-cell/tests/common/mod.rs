#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use serde_json::{json, Value};
use uuid::Uuid;

use monitoring_cell::services::BackupStatusReader;
use monitoring_cell::{
    Alert, AlertManagerService, HealthMonitorService, MonitoringError, MonitoringHandlers, NotificationChannel,
    NotificationDispatcher,
};
use shared_config::MonitoringConfig;
use shared_database::{tables, InMemoryStore, Query, Store};

/// Channel that records every alert it is asked to deliver.
#[derive(Default)]
pub struct RecordingChannel {
    delivered: Mutex<Vec<Alert>>,
}

impl RecordingChannel {
    pub fn delivered(&self) -> Vec<Alert> {
        self.delivered.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationChannel for RecordingChannel {
    fn name(&self) -> &str {
        "recording"
    }

    async fn send(&self, alert: &Alert) -> Result<(), MonitoringError> {
        self.delivered.lock().unwrap().push(alert.clone());
        Ok(())
    }
}

/// Store whose every call fails, standing in for an unreachable database.
pub struct UnavailableStore;

#[async_trait]
impl Store for UnavailableStore {
    async fn insert(&self, _table: &str, _row: Value) -> Result<()> {
        Err(anyhow!("connection refused"))
    }

    async fn select(&self, _table: &str, _query: &Query) -> Result<Vec<Value>> {
        Err(anyhow!("connection refused"))
    }

    async fn update(&self, _table: &str, _query: &Query, _patch: Value) -> Result<usize> {
        Err(anyhow!("connection refused"))
    }
}

/// Delegates to an in-memory store but stalls every read of one table.
pub struct SlowTableStore {
    pub inner: Arc<InMemoryStore>,
    pub table: &'static str,
    pub delay: Duration,
}

#[async_trait]
impl Store for SlowTableStore {
    async fn insert(&self, table: &str, row: Value) -> Result<()> {
        self.inner.insert(table, row).await
    }

    async fn select(&self, table: &str, query: &Query) -> Result<Vec<Value>> {
        if table == self.table {
            tokio::time::sleep(self.delay).await;
        }
        self.inner.select(table, query).await
    }

    async fn update(&self, table: &str, query: &Query, patch: Value) -> Result<usize> {
        self.inner.update(table, query, patch).await
    }
}

/// Health monitor over `store` with no notification channels.
pub fn health_monitor(config: &MonitoringConfig, store: Arc<dyn Store>) -> HealthMonitorService {
    let dispatcher = Arc::new(NotificationDispatcher::new(Vec::new(), Duration::from_secs(1)));
    let alerts = Arc::new(AlertManagerService::new(config, store.clone(), dispatcher));
    let backups = Arc::new(BackupStatusReader::new(
        store.clone(),
        config.backups.clone(),
        config.thresholds.clone(),
    ));
    HealthMonitorService::new(config, store, alerts, backups)
}

pub struct Fixture {
    pub store: Arc<InMemoryStore>,
    pub channel: Arc<RecordingChannel>,
    pub handlers: Arc<MonitoringHandlers>,
}

pub fn test_monitoring_config() -> MonitoringConfig {
    let mut config = MonitoringConfig::default();
    config.check_timeout_seconds = 5;
    config
}

pub fn fixture() -> Fixture {
    fixture_with(test_monitoring_config())
}

pub fn fixture_with(config: MonitoringConfig) -> Fixture {
    let store = Arc::new(InMemoryStore::new());
    let channel = Arc::new(RecordingChannel::default());
    let dispatcher = Arc::new(NotificationDispatcher::new(
        vec![channel.clone() as Arc<dyn NotificationChannel>],
        Duration::from_secs(1),
    ));
    let handlers = Arc::new(MonitoringHandlers::with_dispatcher(
        &config,
        store.clone() as Arc<dyn Store>,
        dispatcher,
    ));

    Fixture {
        store,
        channel,
        handlers,
    }
}

pub async fn insert_backup(store: &InMemoryStore, backup_type: &str, status: &str, hours_ago: i64) {
    let at = Utc::now() - ChronoDuration::hours(hours_ago);
    store
        .insert(
            tables::BACKUP_OPERATIONS,
            json!({
                "id": Uuid::new_v4().to_string(),
                "backup_type": backup_type,
                "status": status,
                "size_bytes": 1_048_576,
                "started_at": at,
                "completed_at": at,
            }),
        )
        .await
        .unwrap();
}

/// Recent successful backups for every default backup type.
pub async fn insert_fresh_backups(store: &InMemoryStore) {
    for backup_type in ["database", "files", "configuration"] {
        insert_backup(store, backup_type, "completed", 1).await;
    }
}

pub async fn stored_alerts(store: &InMemoryStore) -> Vec<Alert> {
    store
        .all_rows(tables::ALERTS)
        .await
        .into_iter()
        .map(|row| serde_json::from_value(row).unwrap())
        .collect()
}
