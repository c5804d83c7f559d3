use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{RecoverySession, RecoveryStatus, StepId};

#[derive(Error, Debug)]
pub enum RecoveryError {
    #[error("Recovery session {0} is already in progress")]
    AlreadyInProgress(String),

    #[error("Recovery aborted: critical step {step} failed")]
    Aborted {
        step: StepId,
        session: Box<RecoverySession>,
    },

    #[error("Invalid recovery status transition from {from} to {to}")]
    InvalidStatusTransition { from: RecoveryStatus, to: RecoveryStatus },

    #[error("Recovery run was interrupted: {0}")]
    Interrupted(String),

    #[error("No recovery session has been started")]
    NoSession,

    #[error("Invalid recovery procedure catalog: {0}")]
    Catalog(String),

    #[error("Store operation failed: {0}")]
    Store(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl RecoveryError {
    pub fn store(err: anyhow::Error) -> Self {
        RecoveryError::Store(format!("{:#}", err))
    }
}

/// What kind of work a failing step was doing. Assigned where the failure is produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepErrorKind {
    Timeout,
    Database,
    Storage,
    Deployment,
    Verification,
    Command,
    Unavailable,
}

impl StepErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepErrorKind::Timeout => "timeout",
            StepErrorKind::Database => "database",
            StepErrorKind::Storage => "storage",
            StepErrorKind::Deployment => "deployment",
            StepErrorKind::Verification => "verification",
            StepErrorKind::Command => "command",
            StepErrorKind::Unavailable => "unavailable",
        }
    }
}

impl std::fmt::Display for StepErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[error("{kind} failure: {message}")]
pub struct StepError {
    pub kind: StepErrorKind,
    pub message: String,
}

impl StepError {
    pub fn new(kind: StepErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn timeout(step: StepId, budget_secs: u64) -> Self {
        Self::new(
            StepErrorKind::Timeout,
            format!("{} exceeded its {}s recovery time budget", step, budget_secs),
        )
    }
}
