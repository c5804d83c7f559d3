use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::{StepError, StepErrorKind};
use crate::models::{ProcedureDefinition, StepId};

/// Per-session values handed to every step.
#[derive(Debug, Clone)]
pub struct StepContext {
    pub session_id: String,
    pub recovery_point: Option<DateTime<Utc>>,
}

/// Performs the work of a single recovery step.
#[async_trait]
pub trait StepExecutor: Send + Sync {
    async fn execute(
        &self,
        step: StepId,
        procedure: &ProcedureDefinition,
        context: &StepContext,
    ) -> Result<(), StepError>;
}

/// Runs the catalog instructions through `sh -c`. The child is killed if the step times out.
#[derive(Debug, Clone)]
pub struct CommandStepExecutor {
    shell: String,
}

impl Default for CommandStepExecutor {
    fn default() -> Self {
        Self {
            shell: "sh".to_string(),
        }
    }
}

impl CommandStepExecutor {
    pub fn new(shell: impl Into<String>) -> Self {
        Self { shell: shell.into() }
    }
}

#[async_trait]
impl StepExecutor for CommandStepExecutor {
    async fn execute(
        &self,
        step: StepId,
        procedure: &ProcedureDefinition,
        context: &StepContext,
    ) -> Result<(), StepError> {
        let instructions = procedure.instructions.trim();
        if instructions.is_empty() {
            warn!(step = %step, "No instructions configured; recording step as a no-op");
            return Ok(());
        }

        let mut command = Command::new(&self.shell);
        command
            .arg("-c")
            .arg(instructions)
            .env("RECOVERY_SESSION_ID", &context.session_id)
            .env("RECOVERY_STEP", step.as_str())
            .env("RECOVERY_PHASE", step.phase().as_str())
            .kill_on_drop(true);
        if let Some(point) = context.recovery_point {
            command.env("RECOVERY_POINT", point.to_rfc3339());
        }

        let output = command
            .output()
            .await
            .map_err(|e| StepError::new(StepErrorKind::Command, format!("could not start {}: {}", self.shell, e)))?;

        if output.status.success() {
            debug!(step = %step, "Step command succeeded");
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(StepError::new(
                step.failure_kind(),
                format!("exited with {}: {}", output.status, stderr.trim()),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::catalog::default_procedure;

    fn context() -> StepContext {
        StepContext {
            session_id: "session-1".to_string(),
            recovery_point: None,
        }
    }

    fn with_instructions(step: StepId, instructions: &str) -> ProcedureDefinition {
        let mut procedure = default_procedure(step);
        procedure.instructions = instructions.to_string();
        procedure
    }

    #[tokio::test]
    async fn test_empty_instructions_are_noop() {
        let executor = CommandStepExecutor::default();
        let result = executor
            .execute(StepId::WarmCaches, &default_procedure(StepId::WarmCaches), &context())
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_command_sees_step_environment() {
        let executor = CommandStepExecutor::default();
        let procedure = with_instructions(StepId::RestoreFiles, r#"test "$RECOVERY_STEP" = restore_files"#);
        assert!(executor.execute(StepId::RestoreFiles, &procedure, &context()).await.is_ok());
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_typed_failure() {
        let executor = CommandStepExecutor::default();
        let procedure = with_instructions(StepId::RestoreDatabase, "echo restore failed >&2; exit 3");

        let err = executor
            .execute(StepId::RestoreDatabase, &procedure, &context())
            .await
            .unwrap_err();
        assert_eq!(err.kind, StepErrorKind::Database);
        assert!(err.message.contains("restore failed"));
    }

    #[tokio::test]
    async fn test_missing_shell_is_command_failure() {
        let executor = CommandStepExecutor::new("/nonexistent/shell");
        let procedure = with_instructions(StepId::AssessDamage, "true");

        let err = executor
            .execute(StepId::AssessDamage, &procedure, &context())
            .await
            .unwrap_err();
        assert_eq!(err.kind, StepErrorKind::Command);
    }
}
