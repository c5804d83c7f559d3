#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Notify;

use monitoring_cell::{Alert, MonitoringError, NotificationChannel, NotificationDispatcher};
use recovery_cell::{
    ProcedureDefinition, RecoveryOrchestrator, StepContext, StepError, StepErrorKind, StepExecutor, StepId,
};
use shared_config::{MonitoringConfig, RecoveryObjectives};
use shared_database::{InMemoryStore, Query, Store};

/// Executor whose outcome per step is scripted by the test.
#[derive(Default)]
pub struct ScriptedExecutor {
    failures: HashMap<StepId, StepError>,
    delays: HashMap<StepId, Duration>,
    gate: Option<(StepId, Arc<Notify>)>,
    panics_at: Option<StepId>,
    executed: Mutex<Vec<(StepId, ProcedureDefinition)>>,
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(mut self, step: StepId, kind: StepErrorKind) -> Self {
        self.failures
            .insert(step, StepError::new(kind, format!("{} failed in test", step)));
        self
    }

    pub fn delayed(mut self, step: StepId, delay: Duration) -> Self {
        self.delays.insert(step, delay);
        self
    }

    pub fn panicking(mut self, step: StepId) -> Self {
        self.panics_at = Some(step);
        self
    }

    pub fn delay_every_step(mut self, delay: Duration) -> Self {
        for step in StepId::execution_order() {
            self.delays.insert(step, delay);
        }
        self
    }

    /// Blocks `step` until the returned handle is notified.
    pub fn gated(mut self, step: StepId) -> (Self, Arc<Notify>) {
        let gate = Arc::new(Notify::new());
        self.gate = Some((step, gate.clone()));
        (self, gate)
    }

    pub fn executed_steps(&self) -> Vec<StepId> {
        self.executed.lock().unwrap().iter().map(|(step, _)| *step).collect()
    }

    pub fn procedure_for(&self, step: StepId) -> Option<ProcedureDefinition> {
        self.executed
            .lock()
            .unwrap()
            .iter()
            .find(|(seen, _)| *seen == step)
            .map(|(_, procedure)| procedure.clone())
    }
}

#[async_trait]
impl StepExecutor for ScriptedExecutor {
    async fn execute(
        &self,
        step: StepId,
        procedure: &ProcedureDefinition,
        _context: &StepContext,
    ) -> Result<(), StepError> {
        self.executed.lock().unwrap().push((step, procedure.clone()));

        if let Some((gated_step, gate)) = &self.gate {
            if *gated_step == step {
                gate.notified().await;
            }
        }
        if self.panics_at == Some(step) {
            panic!("executor crashed while running {}", step);
        }
        if let Some(delay) = self.delays.get(&step) {
            tokio::time::sleep(*delay).await;
        }

        match self.failures.get(&step) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

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

pub struct Fixture {
    pub store: Arc<InMemoryStore>,
    pub executor: Arc<ScriptedExecutor>,
    pub channel: Arc<RecordingChannel>,
    pub orchestrator: Arc<RecoveryOrchestrator>,
}

pub fn objectives() -> RecoveryObjectives {
    MonitoringConfig::default().objectives
}

pub fn dispatcher(channel: &Arc<RecordingChannel>) -> Arc<NotificationDispatcher> {
    Arc::new(NotificationDispatcher::new(
        vec![channel.clone() as Arc<dyn NotificationChannel>],
        Duration::from_secs(1),
    ))
}

pub fn fixture(executor: ScriptedExecutor) -> Fixture {
    let store = Arc::new(InMemoryStore::new());
    let executor = Arc::new(executor);
    let channel = Arc::new(RecordingChannel::default());
    let orchestrator = Arc::new(RecoveryOrchestrator::new(
        store.clone() as Arc<dyn Store>,
        executor.clone() as Arc<dyn StepExecutor>,
        dispatcher(&channel),
        objectives(),
    ));

    Fixture {
        store,
        executor,
        channel,
        orchestrator,
    }
}

/// Polls until a fire-and-forget notification lands.
pub async fn wait_for_delivery(channel: &RecordingChannel, count: usize) -> Vec<Alert> {
    for _ in 0..100 {
        let delivered = channel.delivered();
        if delivered.len() >= count {
            return delivered;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    channel.delivered()
}

/// Polls the orchestrator until the current session reaches a terminal status.
pub async fn wait_until_finished(orchestrator: &RecoveryOrchestrator) {
    for _ in 0..200 {
        if orchestrator.get_recovery_status().await.status.is_terminal() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("recovery did not finish in time");
}
