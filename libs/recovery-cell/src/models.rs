use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{RecoveryError, StepError, StepErrorKind};
use shared_config::RecoveryObjectives;

// ==============================================================================
// SESSION STATE MACHINE
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecoveryStatus {
    Standby,
    Active,
    Completed,
    Failed,
}

impl RecoveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecoveryStatus::Standby => "standby",
            RecoveryStatus::Active => "active",
            RecoveryStatus::Completed => "completed",
            RecoveryStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RecoveryStatus::Completed | RecoveryStatus::Failed)
    }

    pub fn can_transition_to(&self, target: &RecoveryStatus) -> bool {
        use RecoveryStatus::*;
        matches!((self, target), (Standby, Active) | (Active, Completed) | (Active, Failed))
    }
}

impl std::fmt::Display for RecoveryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ==============================================================================
// PHASES AND STEPS
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Assessment,
    DatabaseRecovery,
    FileRecovery,
    ApplicationRecovery,
    Verification,
}

impl Phase {
    /// Fixed execution order.
    pub const ALL: [Phase; 5] = [
        Phase::Assessment,
        Phase::DatabaseRecovery,
        Phase::FileRecovery,
        Phase::ApplicationRecovery,
        Phase::Verification,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Assessment => "assessment",
            Phase::DatabaseRecovery => "database_recovery",
            Phase::FileRecovery => "file_recovery",
            Phase::ApplicationRecovery => "application_recovery",
            Phase::Verification => "verification",
        }
    }

    pub fn steps(&self) -> &'static [StepId] {
        use StepId::*;
        match self {
            Phase::Assessment => &[AssessDamage, VerifyBackupAvailability, PrepareRecoveryEnvironment],
            Phase::DatabaseRecovery => &[RestoreDatabase, VerifyDatabaseIntegrity],
            Phase::FileRecovery => &[RestoreFiles, VerifyFileIntegrity],
            Phase::ApplicationRecovery => &[DeployApplication, RestoreConfiguration, WarmCaches],
            Phase::Verification => &[RunHealthChecks, VerifyFunctionality, NotifyStakeholders],
        }
    }

    /// Per-step time budget taken from the RTO of the resource the phase restores.
    pub fn step_budget(&self, objectives: &RecoveryObjectives) -> Duration {
        let minutes = match self {
            Phase::DatabaseRecovery => objectives.database.rto_minutes,
            Phase::FileRecovery => objectives.files.rto_minutes,
            Phase::Assessment | Phase::ApplicationRecovery | Phase::Verification => {
                objectives.application.rto_minutes
            }
        };
        Duration::from_secs(minutes.max(1) * 60)
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepId {
    AssessDamage,
    VerifyBackupAvailability,
    PrepareRecoveryEnvironment,
    RestoreDatabase,
    VerifyDatabaseIntegrity,
    RestoreFiles,
    VerifyFileIntegrity,
    DeployApplication,
    RestoreConfiguration,
    WarmCaches,
    RunHealthChecks,
    VerifyFunctionality,
    NotifyStakeholders,
}

impl StepId {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepId::AssessDamage => "assess_damage",
            StepId::VerifyBackupAvailability => "verify_backup_availability",
            StepId::PrepareRecoveryEnvironment => "prepare_recovery_environment",
            StepId::RestoreDatabase => "restore_database",
            StepId::VerifyDatabaseIntegrity => "verify_database_integrity",
            StepId::RestoreFiles => "restore_files",
            StepId::VerifyFileIntegrity => "verify_file_integrity",
            StepId::DeployApplication => "deploy_application",
            StepId::RestoreConfiguration => "restore_configuration",
            StepId::WarmCaches => "warm_caches",
            StepId::RunHealthChecks => "run_health_checks",
            StepId::VerifyFunctionality => "verify_functionality",
            StepId::NotifyStakeholders => "notify_stakeholders",
        }
    }

    pub fn parse(name: &str) -> Option<StepId> {
        Self::execution_order().find(|step| step.as_str() == name)
    }

    /// A failed critical step aborts the whole recovery.
    pub fn is_critical(&self) -> bool {
        matches!(
            self,
            StepId::RestoreDatabase | StepId::VerifyDatabaseIntegrity | StepId::DeployApplication
        )
    }

    pub fn phase(&self) -> Phase {
        Phase::ALL
            .into_iter()
            .find(|phase| phase.steps().contains(self))
            .unwrap_or(Phase::Assessment)
    }

    pub fn execution_order() -> impl Iterator<Item = StepId> {
        Phase::ALL.into_iter().flat_map(|phase| phase.steps().iter().copied())
    }

    /// Failure kind reported when this step's own work fails.
    pub fn failure_kind(&self) -> StepErrorKind {
        match self {
            StepId::RestoreDatabase => StepErrorKind::Database,
            StepId::RestoreFiles | StepId::VerifyBackupAvailability | StepId::PrepareRecoveryEnvironment => {
                StepErrorKind::Storage
            }
            StepId::DeployApplication | StepId::RestoreConfiguration | StepId::WarmCaches => {
                StepErrorKind::Deployment
            }
            StepId::AssessDamage
            | StepId::VerifyDatabaseIntegrity
            | StepId::VerifyFileIntegrity
            | StepId::RunHealthChecks
            | StepId::VerifyFunctionality => StepErrorKind::Verification,
            StepId::NotifyStakeholders => StepErrorKind::Unavailable,
        }
    }
}

impl std::fmt::Display for StepId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ==============================================================================
// SESSION
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedStep {
    pub step: StepId,
    pub error: StepError,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecoveryOptions {
    pub reason: String,
    pub initiated_by: Option<String>,
    /// Point in time to restore to; latest backup when absent.
    pub recovery_point: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoverySession {
    pub id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub phase: Option<Phase>,
    pub completed_steps: Vec<StepId>,
    pub failed_steps: Vec<FailedStep>,
    pub status: RecoveryStatus,
    pub reason: String,
    pub initiated_by: Option<String>,
    pub recovery_point: Option<DateTime<Utc>>,
}

impl RecoverySession {
    /// A new session, already `active`.
    pub fn start(options: &RecoveryOptions) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            start_time: Utc::now(),
            end_time: None,
            phase: None,
            completed_steps: Vec::new(),
            failed_steps: Vec::new(),
            status: RecoveryStatus::Active,
            reason: options.reason.clone(),
            initiated_by: options.initiated_by.clone(),
            recovery_point: options.recovery_point,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == RecoveryStatus::Active
    }

    /// Steps attempted so far, in execution order.
    pub fn attempted_steps(&self) -> usize {
        self.completed_steps.len() + self.failed_steps.len()
    }

    pub fn finish(&mut self, target: RecoveryStatus, at: DateTime<Utc>) -> Result<(), RecoveryError> {
        if !self.status.can_transition_to(&target) {
            return Err(RecoveryError::InvalidStatusTransition {
                from: self.status,
                to: target,
            });
        }
        self.status = target;
        self.end_time = Some(at);
        Ok(())
    }

    /// Elapsed time, live while active.
    pub fn duration_at(&self, now: DateTime<Utc>) -> chrono::Duration {
        self.end_time.unwrap_or(now) - self.start_time
    }

    pub fn duration_minutes(&self, now: DateTime<Utc>) -> i64 {
        self.duration_at(now).num_minutes()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoveryStatusReport {
    pub status: RecoveryStatus,
    pub session: Option<RecoverySession>,
    pub duration_ms: i64,
    pub duration_minutes: i64,
}

// ==============================================================================
// PROCEDURE CATALOG
// ==============================================================================

/// Row of `recovery_procedures`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcedureDefinition {
    pub procedure_name: String,
    pub procedure_type: String,
    #[serde(default)]
    pub estimated_duration_minutes: u32,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub is_critical: bool,
    #[serde(default)]
    pub instructions: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlannedStep {
    pub phase: Phase,
    pub step: StepId,
    pub is_critical: bool,
    pub dependencies: Vec<String>,
    pub estimated_duration_minutes: u32,
    pub has_instructions: bool,
}

// ==============================================================================
// EVENTS
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryEventType {
    RecoveryStarted,
    StepCompleted,
    StepFailed,
    RecoveryCompleted,
    RecoveryFailed,
}

impl RecoveryEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecoveryEventType::RecoveryStarted => "recovery_started",
            RecoveryEventType::StepCompleted => "step_completed",
            RecoveryEventType::StepFailed => "step_failed",
            RecoveryEventType::RecoveryCompleted => "recovery_completed",
            RecoveryEventType::RecoveryFailed => "recovery_failed",
        }
    }
}

// ==============================================================================
// REQUEST / RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Deserialize)]
pub struct ExecuteRecoveryRequest {
    pub reason: String,
    pub recovery_point: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ExecuteRecoveryResponse {
    pub session_id: String,
    pub status: RecoveryStatus,
}
