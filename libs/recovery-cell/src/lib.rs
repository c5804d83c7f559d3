// =====================================================================================
// RECOVERY CELL - DISASTER RECOVERY ORCHESTRATION
// =====================================================================================
//
// Drives a full restore through five ordered phases, from damage assessment
// to post-recovery verification. A failed critical step aborts the session;
// other failures are recorded and the run continues. Every step is bounded by
// the recovery time objective of the resource its phase restores.
//
// =====================================================================================

pub mod error;
pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use error::{RecoveryError, StepError, StepErrorKind};
pub use models::{
    FailedStep, Phase, PlannedStep, ProcedureDefinition, RecoveryOptions, RecoverySession, RecoveryStatus,
    RecoveryStatusReport, StepId,
};
pub use services::{CommandStepExecutor, ProcedureCatalog, RecoveryOrchestrator, StepContext, StepExecutor};

pub use handlers::RecoveryHandlers;
pub use router::create_recovery_router;
