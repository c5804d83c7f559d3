// ==============================================================================
// DISASTER RECOVERY ORCHESTRATOR
// ==============================================================================

use std::sync::Arc;

use chrono::Utc;
use serde_json::{json, Value};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::error::{RecoveryError, StepError};
use crate::models::{
    FailedStep, Phase, PlannedStep, RecoveryEventType, RecoveryOptions, RecoverySession, RecoveryStatus,
    RecoveryStatusReport, StepId,
};
use crate::services::catalog::ProcedureCatalog;
use crate::services::executor::{StepContext, StepExecutor};
use monitoring_cell::{models::alert_types, Alert, AlertLevel, NotificationDispatcher};
use shared_config::RecoveryObjectives;
use shared_database::{tables, Store};

/// Runs the phased recovery procedure. At most one session is active at a time.
pub struct RecoveryOrchestrator {
    store: Arc<dyn Store>,
    executor: Arc<dyn StepExecutor>,
    dispatcher: Arc<NotificationDispatcher>,
    objectives: RecoveryObjectives,
    session: RwLock<Option<RecoverySession>>,
}

impl RecoveryOrchestrator {
    pub fn new(
        store: Arc<dyn Store>,
        executor: Arc<dyn StepExecutor>,
        dispatcher: Arc<NotificationDispatcher>,
        objectives: RecoveryObjectives,
    ) -> Self {
        Self {
            store,
            executor,
            dispatcher,
            objectives,
            session: RwLock::new(None),
        }
    }

    /// Claims the session slot and runs the recovery in the background.
    pub async fn start_recovery(self: &Arc<Self>, options: RecoveryOptions) -> Result<String, RecoveryError> {
        let session = self.begin_session(&options).await?;
        let session_id = session.id.clone();

        let handle = self.spawn_session(session, options);
        tokio::spawn(async move {
            match handle.await {
                Ok(Err(e)) => error!(error = %e, "Background recovery ended with an error"),
                Err(e) => error!(error = %e, "Recovery supervisor stopped unexpectedly"),
                Ok(Ok(_)) => {}
            }
        });

        Ok(session_id)
    }

    /// Runs a full recovery to completion. Fails fast when another session is active.
    /// The run outlives the returned future.
    pub async fn execute_full_recovery(
        self: &Arc<Self>,
        options: RecoveryOptions,
    ) -> Result<RecoverySession, RecoveryError> {
        let session = self.begin_session(&options).await?;
        self.spawn_session(session, options)
            .await
            .map_err(|e| RecoveryError::Interrupted(e.to_string()))?
    }

    /// Runs the session on its own task and finalises it as failed if that task panics.
    fn spawn_session(
        self: &Arc<Self>,
        session: RecoverySession,
        options: RecoveryOptions,
    ) -> JoinHandle<Result<RecoverySession, RecoveryError>> {
        let orchestrator = Arc::clone(self);

        tokio::spawn(async move {
            let session_id = session.id.clone();
            let runner = Arc::clone(&orchestrator);
            let run = tokio::spawn(async move { runner.run_session(session, options).await });

            match run.await {
                Ok(result) => result,
                Err(e) => {
                    error!(session_id = %session_id, error = %e, "Recovery run terminated abnormally");
                    orchestrator.fail_interrupted(&session_id, &e.to_string()).await;
                    Err(RecoveryError::Interrupted(e.to_string()))
                }
            }
        })
    }

    /// Current session state with a live duration. Safe during an in-flight recovery.
    pub async fn get_recovery_status(&self) -> RecoveryStatusReport {
        let now = Utc::now();
        let session = self.session.read().await.clone();

        match session {
            Some(session) => {
                let duration = session.duration_at(now);
                RecoveryStatusReport {
                    status: session.status,
                    duration_ms: duration.num_milliseconds(),
                    duration_minutes: duration.num_minutes(),
                    session: Some(session),
                }
            }
            None => RecoveryStatusReport {
                status: RecoveryStatus::Standby,
                session: None,
                duration_ms: 0,
                duration_minutes: 0,
            },
        }
    }

    pub async fn procedures(&self) -> Result<Vec<PlannedStep>, RecoveryError> {
        Ok(self.load_catalog().await?.plan())
    }

    async fn begin_session(&self, options: &RecoveryOptions) -> Result<RecoverySession, RecoveryError> {
        let mut slot = self.session.write().await;

        if let Some(current) = slot.as_ref().filter(|s| s.is_active()) {
            warn!(session_id = %current.id, "Rejecting recovery request: a session is already active");
            return Err(RecoveryError::AlreadyInProgress(current.id.clone()));
        }

        let session = RecoverySession::start(options);
        info!(
            session_id = %session.id,
            reason = %session.reason,
            initiated_by = ?session.initiated_by,
            "Disaster recovery session started"
        );
        *slot = Some(session.clone());
        Ok(session)
    }

    #[instrument(skip_all, fields(session_id = %session.id))]
    async fn run_session(
        &self,
        session: RecoverySession,
        options: RecoveryOptions,
    ) -> Result<RecoverySession, RecoveryError> {
        let context = StepContext {
            session_id: session.id.clone(),
            recovery_point: options.recovery_point,
        };

        self.record_event(
            RecoveryEventType::RecoveryStarted,
            &session,
            &format!("Disaster recovery started: {}", options.reason),
            json!({ "initiated_by": options.initiated_by, "recovery_point": options.recovery_point }),
        )
        .await;

        let catalog = match self.load_catalog().await {
            Ok(catalog) => catalog,
            Err(e) => {
                let session = self.finish(RecoveryStatus::Failed).await?;
                self.record_event(
                    RecoveryEventType::RecoveryFailed,
                    &session,
                    &format!("Recovery could not start: {}", e),
                    json!({ "error": e.to_string() }),
                )
                .await;
                return Err(e);
            }
        };

        for phase in Phase::ALL {
            self.update_session(|s| s.phase = Some(phase)).await?;
            info!(session_id = %context.session_id, phase = %phase, "Entering recovery phase");

            let budget = phase.step_budget(&self.objectives);

            for &step in phase.steps() {
                let procedure = catalog.procedure(step);
                let outcome = match timeout(budget, self.executor.execute(step, &procedure, &context)).await {
                    Ok(result) => result,
                    Err(_) => Err(StepError::timeout(step, budget.as_secs())),
                };

                match outcome {
                    Ok(()) => {
                        let session = self.update_session(|s| s.completed_steps.push(step)).await?;
                        debug!(session_id = %session.id, step = %step, "Recovery step completed");
                        self.record_event(
                            RecoveryEventType::StepCompleted,
                            &session,
                            &format!("Step {} completed", step),
                            json!({ "phase": phase, "step": step }),
                        )
                        .await;
                    }
                    Err(step_error) => {
                        let session = self
                            .update_session(|s| {
                                s.failed_steps.push(FailedStep {
                                    step,
                                    error: step_error.clone(),
                                })
                            })
                            .await?;
                        error!(
                            session_id = %session.id,
                            phase = %phase,
                            step = %step,
                            kind = %step_error.kind,
                            critical = step.is_critical(),
                            "Recovery step failed: {}",
                            step_error.message
                        );
                        self.record_event(
                            RecoveryEventType::StepFailed,
                            &session,
                            &format!("Step {} failed: {}", step, step_error),
                            json!({ "phase": phase, "step": step, "error": step_error, "critical": step.is_critical() }),
                        )
                        .await;

                        if step.is_critical() {
                            let session = self.abort(step, &step_error).await?;
                            return Err(RecoveryError::Aborted {
                                step,
                                session: Box::new(session),
                            });
                        }
                    }
                }
            }
        }

        let session = self.finish(RecoveryStatus::Completed).await?;
        let minutes = session.duration_minutes(Utc::now());

        info!(
            session_id = %session.id,
            duration_minutes = minutes,
            completed = session.completed_steps.len(),
            failed = session.failed_steps.len(),
            "Disaster recovery completed"
        );

        let data = json!({
            "session_id": session.id,
            "duration_minutes": minutes,
            "completed_steps": session.completed_steps,
            "failed_steps": session.failed_steps,
            "rto_minutes": self.objectives.total_rto_minutes(),
        });
        self.record_event(
            RecoveryEventType::RecoveryCompleted,
            &session,
            &format!("Disaster recovery completed in {} minutes", minutes),
            data.clone(),
        )
        .await;
        self.notify(
            AlertLevel::Info,
            alert_types::RECOVERY_COMPLETED,
            format!("Disaster recovery completed in {} minutes", minutes),
            data,
        );

        Ok(session)
    }

    /// Finalises the session as failed and fires the critical notice.
    async fn abort(&self, step: StepId, step_error: &StepError) -> Result<RecoverySession, RecoveryError> {
        let session = self.finish(RecoveryStatus::Failed).await?;
        let minutes = session.duration_minutes(Utc::now());

        let data = json!({
            "session_id": session.id,
            "failed_step": step,
            "phase": step.phase(),
            "error": step_error,
            "duration_minutes": minutes,
            "completed_steps": session.completed_steps,
        });
        self.record_event(
            RecoveryEventType::RecoveryFailed,
            &session,
            &format!("Disaster recovery aborted: critical step {} failed", step),
            data.clone(),
        )
        .await;
        self.notify(
            AlertLevel::Critical,
            alert_types::RECOVERY_FAILED,
            format!("Disaster recovery aborted: critical step {} failed", step),
            data,
        );

        Ok(session)
    }

    /// Closes out a session whose run died before reaching a terminal status.
    async fn fail_interrupted(&self, session_id: &str, reason: &str) {
        let session = {
            let mut slot = self.session.write().await;
            match slot.as_mut() {
                Some(session) if session.id == session_id && session.is_active() => {
                    if let Err(e) = session.finish(RecoveryStatus::Failed, Utc::now()) {
                        warn!(session_id = %session_id, error = %e, "Could not finalise interrupted recovery");
                        return;
                    }
                    session.clone()
                }
                _ => return,
            }
        };

        let data = json!({
            "session_id": session.id,
            "error": reason,
            "completed_steps": session.completed_steps,
        });
        self.record_event(
            RecoveryEventType::RecoveryFailed,
            &session,
            &format!("Disaster recovery interrupted: {}", reason),
            data.clone(),
        )
        .await;
        self.notify(
            AlertLevel::Critical,
            alert_types::RECOVERY_FAILED,
            "Disaster recovery interrupted".to_string(),
            data,
        );
    }

    async fn load_catalog(&self) -> Result<ProcedureCatalog, RecoveryError> {
        match ProcedureCatalog::load(&self.store).await {
            Ok(catalog) => Ok(catalog),
            Err(RecoveryError::Store(e)) => {
                warn!(error = %e, "Procedure catalog unavailable; using built-in procedures");
                Ok(ProcedureCatalog::builtin())
            }
            Err(e) => Err(e),
        }
    }

    async fn update_session<F>(&self, apply: F) -> Result<RecoverySession, RecoveryError>
    where
        F: FnOnce(&mut RecoverySession),
    {
        let mut slot = self.session.write().await;
        let session = slot.as_mut().ok_or(RecoveryError::NoSession)?;
        apply(session);
        Ok(session.clone())
    }

    async fn finish(&self, status: RecoveryStatus) -> Result<RecoverySession, RecoveryError> {
        let mut slot = self.session.write().await;
        let session = slot.as_mut().ok_or(RecoveryError::NoSession)?;
        session.finish(status, Utc::now())?;
        Ok(session.clone())
    }

    /// Appends to `disaster_recovery_events`. Failures are logged, never raised.
    async fn record_event(&self, event_type: RecoveryEventType, session: &RecoverySession, message: &str, data: Value) {
        let row = json!({
            "event_id": Uuid::new_v4().to_string(),
            "event_type": event_type.as_str(),
            "status": session.status,
            "message": message,
            "data": data,
            "session_id": session.id,
            "created_at": Utc::now(),
        });

        if let Err(e) = self.store.insert(tables::RECOVERY_EVENTS, row).await {
            warn!(event_type = event_type.as_str(), error = %e, "Failed to record recovery event");
        }
    }

    /// Fire-and-forget so a slow channel never delays the next step.
    fn notify(&self, level: AlertLevel, alert_type: &str, title: String, data: Value) {
        let dispatcher = self.dispatcher.clone();
        let alert = Alert::new(level, alert_type, &title, data);

        tokio::spawn(async move {
            let summary = dispatcher.dispatch(&alert).await;
            debug!(
                alert_id = %alert.id,
                successful = summary.successful,
                failed = summary.failed,
                "Recovery notification dispatched"
            );
        });
    }
}
