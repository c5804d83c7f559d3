use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::RecoveryError;
use crate::models::{PlannedStep, ProcedureDefinition, StepId};
use shared_database::{tables, Query, Store};

fn default_dependencies(step: StepId) -> &'static [StepId] {
    use StepId::*;
    match step {
        AssessDamage => &[],
        VerifyBackupAvailability => &[AssessDamage],
        PrepareRecoveryEnvironment => &[AssessDamage],
        RestoreDatabase => &[VerifyBackupAvailability, PrepareRecoveryEnvironment],
        VerifyDatabaseIntegrity => &[RestoreDatabase],
        RestoreFiles => &[VerifyBackupAvailability, PrepareRecoveryEnvironment],
        VerifyFileIntegrity => &[RestoreFiles],
        DeployApplication => &[VerifyDatabaseIntegrity],
        RestoreConfiguration => &[DeployApplication],
        WarmCaches => &[DeployApplication],
        RunHealthChecks => &[DeployApplication],
        VerifyFunctionality => &[RunHealthChecks],
        NotifyStakeholders => &[VerifyFunctionality],
    }
}

fn default_estimate(step: StepId) -> u32 {
    match step {
        StepId::RestoreDatabase => 45,
        StepId::RestoreFiles => 90,
        StepId::DeployApplication => 20,
        StepId::VerifyDatabaseIntegrity | StepId::VerifyFileIntegrity => 15,
        _ => 5,
    }
}

pub fn default_procedure(step: StepId) -> ProcedureDefinition {
    ProcedureDefinition {
        procedure_name: step.as_str().to_string(),
        procedure_type: step.phase().as_str().to_string(),
        estimated_duration_minutes: default_estimate(step),
        dependencies: default_dependencies(step)
            .iter()
            .map(|dep| dep.as_str().to_string())
            .collect(),
        is_critical: step.is_critical(),
        instructions: String::new(),
    }
}

/// Step definitions consulted at orchestration time, keyed by step.
#[derive(Debug, Clone)]
pub struct ProcedureCatalog {
    procedures: HashMap<StepId, ProcedureDefinition>,
}

impl ProcedureCatalog {
    pub fn builtin() -> Self {
        Self {
            procedures: StepId::execution_order()
                .map(|step| (step, default_procedure(step)))
                .collect(),
        }
    }

    /// Overlays known rows onto the built-in catalog. Unknown procedure names are skipped.
    pub fn from_rows(rows: Vec<ProcedureDefinition>) -> Self {
        let mut catalog = Self::builtin();

        for row in rows {
            let Some(step) = StepId::parse(&row.procedure_name) else {
                warn!(procedure = %row.procedure_name, "Ignoring unknown recovery procedure");
                continue;
            };
            if row.is_critical != step.is_critical() {
                warn!(
                    procedure = %row.procedure_name,
                    catalog = row.is_critical,
                    fixed = step.is_critical(),
                    "Catalog criticality differs from the fixed step table; using the fixed value"
                );
            }
            catalog.procedures.insert(step, row);
        }

        catalog
    }

    pub async fn load(store: &Arc<dyn Store>) -> Result<Self, RecoveryError> {
        let rows = store
            .select(tables::RECOVERY_PROCEDURES, &Query::new())
            .await
            .map_err(RecoveryError::store)?;

        let mut definitions = Vec::with_capacity(rows.len());
        for row in rows {
            match serde_json::from_value::<ProcedureDefinition>(row) {
                Ok(definition) => definitions.push(definition),
                Err(e) => warn!(error = %e, "Skipping malformed recovery procedure row"),
            }
        }

        debug!(rows = definitions.len(), "Loaded recovery procedure catalog");
        let catalog = Self::from_rows(definitions);
        catalog.validate()?;
        Ok(catalog)
    }

    pub fn procedure(&self, step: StepId) -> ProcedureDefinition {
        self.procedures
            .get(&step)
            .cloned()
            .unwrap_or_else(|| default_procedure(step))
    }

    /// Every dependency must name a step that runs earlier.
    pub fn validate(&self) -> Result<(), RecoveryError> {
        let mut earlier: HashSet<&'static str> = HashSet::new();

        for step in StepId::execution_order() {
            let procedure = self.procedure(step);
            for dependency in &procedure.dependencies {
                if !earlier.contains(dependency.as_str()) {
                    return Err(RecoveryError::Catalog(format!(
                        "{} depends on {} which does not run before it",
                        step, dependency
                    )));
                }
            }
            earlier.insert(step.as_str());
        }

        Ok(())
    }

    pub fn plan(&self) -> Vec<PlannedStep> {
        StepId::execution_order()
            .map(|step| {
                let procedure = self.procedure(step);
                PlannedStep {
                    phase: step.phase(),
                    step,
                    is_critical: step.is_critical(),
                    has_instructions: !procedure.instructions.trim().is_empty(),
                    dependencies: procedure.dependencies,
                    estimated_duration_minutes: procedure.estimated_duration_minutes,
                }
            })
            .collect()
    }
}
