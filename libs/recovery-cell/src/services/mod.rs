pub mod catalog;
pub mod executor;
pub mod orchestrator;

pub use catalog::ProcedureCatalog;
pub use executor::{CommandStepExecutor, StepContext, StepExecutor};
pub use orchestrator::RecoveryOrchestrator;
