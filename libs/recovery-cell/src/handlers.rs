// =====================================================================================
// RECOVERY CELL HANDLERS
// =====================================================================================

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::IntoResponse, Extension, Json};
use tracing::{info, instrument, warn};

use crate::error::RecoveryError;
use crate::models::{
    ExecuteRecoveryRequest, ExecuteRecoveryResponse, PlannedStep, RecoveryOptions, RecoveryStatus,
    RecoveryStatusReport,
};
use crate::services::RecoveryOrchestrator;
use shared_models::Operator;

pub struct RecoveryHandlers {
    orchestrator: Arc<RecoveryOrchestrator>,
}

impl RecoveryHandlers {
    pub fn new(orchestrator: Arc<RecoveryOrchestrator>) -> Self {
        Self { orchestrator }
    }

    pub fn orchestrator(&self) -> Arc<RecoveryOrchestrator> {
        self.orchestrator.clone()
    }
}

#[instrument(skip(handlers))]
pub async fn get_recovery_status(State(handlers): State<Arc<RecoveryHandlers>>) -> Json<RecoveryStatusReport> {
    Json(handlers.orchestrator.get_recovery_status().await)
}

#[instrument(skip(handlers))]
pub async fn get_procedures(
    State(handlers): State<Arc<RecoveryHandlers>>,
) -> Result<Json<Vec<PlannedStep>>, RecoveryError> {
    Ok(Json(handlers.orchestrator.procedures().await?))
}

/// Starts a recovery in the background and answers with the new session id.
#[instrument(skip(handlers, operator, request), fields(reason = %request.reason))]
pub async fn execute_recovery(
    State(handlers): State<Arc<RecoveryHandlers>>,
    Extension(operator): Extension<Operator>,
    Json(request): Json<ExecuteRecoveryRequest>,
) -> Result<(StatusCode, Json<ExecuteRecoveryResponse>), RecoveryError> {
    let initiated_by = operator.email.clone().unwrap_or_else(|| operator.id.clone());
    let options = RecoveryOptions {
        reason: request.reason,
        initiated_by: Some(initiated_by.clone()),
        recovery_point: request.recovery_point,
    };

    let session_id = handlers.orchestrator.start_recovery(options).await?;
    info!("Operator {} started disaster recovery {}", initiated_by, session_id);

    Ok((
        StatusCode::ACCEPTED,
        Json(ExecuteRecoveryResponse {
            session_id,
            status: RecoveryStatus::Active,
        }),
    ))
}

// =====================================================================================
// ERROR RESPONSE IMPLEMENTATION
// =====================================================================================

impl IntoResponse for RecoveryError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            RecoveryError::AlreadyInProgress(_) | RecoveryError::InvalidStatusTransition { .. } => {
                StatusCode::CONFLICT
            }
            RecoveryError::Store(_) => StatusCode::SERVICE_UNAVAILABLE,
            RecoveryError::Catalog(_) => StatusCode::UNPROCESSABLE_ENTITY,
            RecoveryError::Aborted { .. }
            | RecoveryError::Interrupted(_)
            | RecoveryError::NoSession
            | RecoveryError::Serialization(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        if status.is_server_error() {
            warn!(error = %self, "Recovery request failed");
        }

        (status, Json(serde_json::json!({
            "error": self.to_string(),
            "timestamp": chrono::Utc::now()
        }))).into_response()
    }
}
