// =====================================================================================
// MONITORING CELL HANDLERS
// =====================================================================================

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use tracing::{info, instrument};

use crate::models::{
    Alert, AlertListRequest, HealthCheckRequest, HealthCheckResponse, HealthStatus, MonitoringError,
    ReliabilityReport,
};
use crate::services::{
    AlertManagerService, BackupStatusReader, HealthMonitorService, NotificationDispatcher, ReportService,
};
use shared_config::MonitoringConfig;
use shared_database::Store;
use shared_models::Operator;

const DEFAULT_ALERT_LIMIT: usize = 100;

/// Wires the monitoring services together around one store and dispatcher.
pub struct MonitoringHandlers {
    health_service: Arc<HealthMonitorService>,
    alert_service: Arc<AlertManagerService>,
    report_service: Arc<ReportService>,
}

impl MonitoringHandlers {
    pub fn new(config: &MonitoringConfig, store: Arc<dyn Store>) -> Self {
        let dispatcher = Arc::new(NotificationDispatcher::from_config(&config.notifications));
        Self::with_dispatcher(config, store, dispatcher)
    }

    pub fn with_dispatcher(
        config: &MonitoringConfig,
        store: Arc<dyn Store>,
        dispatcher: Arc<NotificationDispatcher>,
    ) -> Self {
        let alert_service = Arc::new(AlertManagerService::new(config, store.clone(), dispatcher));
        let backups = Arc::new(BackupStatusReader::new(
            store.clone(),
            config.backups.clone(),
            config.thresholds.clone(),
        ));
        let health_service = Arc::new(HealthMonitorService::new(
            config,
            store.clone(),
            alert_service.clone(),
            backups.clone(),
        ));
        let report_service = Arc::new(ReportService::new(
            store,
            backups,
            alert_service.clone(),
            config.objectives.clone(),
        ));

        Self {
            health_service,
            alert_service,
            report_service,
        }
    }

    pub fn health_service(&self) -> Arc<HealthMonitorService> {
        self.health_service.clone()
    }

    pub fn alert_service(&self) -> Arc<AlertManagerService> {
        self.alert_service.clone()
    }

    pub fn report_service(&self) -> Arc<ReportService> {
        self.report_service.clone()
    }
}

// =====================================================================================
// PUBLIC HEALTH ENDPOINTS
// =====================================================================================

#[instrument(skip(handlers))]
pub async fn get_health_status(
    State(handlers): State<Arc<MonitoringHandlers>>,
    Query(request): Query<HealthCheckRequest>,
) -> Result<Json<HealthCheckResponse>, MonitoringError> {
    let snapshot = match handlers.health_service.latest_snapshot().await {
        Some(snapshot) if !request.refresh.unwrap_or(false) => snapshot,
        _ => handlers.health_service.run_check().await,
    };

    let response = HealthCheckResponse {
        status: snapshot.overall_status,
        healthy_checks: snapshot.count_with_status(HealthStatus::Healthy),
        warning_checks: snapshot.count_with_status(HealthStatus::Warning),
        unhealthy_checks: snapshot.count_with_status(HealthStatus::Unhealthy),
        last_check: snapshot.timestamp,
        details: if request.include_details.unwrap_or(false) {
            Some(snapshot)
        } else {
            None
        },
    };

    Ok(Json(response))
}

#[instrument(skip(handlers))]
pub async fn get_report(
    State(handlers): State<Arc<MonitoringHandlers>>,
) -> Result<Json<ReliabilityReport>, MonitoringError> {
    let report = handlers.report_service.generate_report().await?;
    Ok(Json(report))
}

// =====================================================================================
// ALERT ENDPOINTS
// =====================================================================================

#[instrument(skip(handlers))]
pub async fn list_alerts(
    State(handlers): State<Arc<MonitoringHandlers>>,
    Query(request): Query<AlertListRequest>,
) -> Result<Json<Vec<Alert>>, MonitoringError> {
    let alerts = handlers
        .alert_service
        .list_alerts(request.status, request.limit.unwrap_or(DEFAULT_ALERT_LIMIT))
        .await?;
    Ok(Json(alerts))
}

#[instrument(skip(handlers))]
pub async fn get_alert(
    State(handlers): State<Arc<MonitoringHandlers>>,
    Path(alert_id): Path<String>,
) -> Result<Json<Alert>, MonitoringError> {
    Ok(Json(handlers.alert_service.get_alert(&alert_id).await?))
}

#[instrument(skip(handlers))]
pub async fn get_alert_summary(
    State(handlers): State<Arc<MonitoringHandlers>>,
) -> Result<Json<HashMap<String, u32>>, MonitoringError> {
    Ok(Json(handlers.alert_service.alert_summary().await?))
}

#[instrument(skip(handlers, operator))]
pub async fn resolve_alert(
    State(handlers): State<Arc<MonitoringHandlers>>,
    Extension(operator): Extension<Operator>,
    Path(alert_id): Path<String>,
) -> Result<Json<Alert>, MonitoringError> {
    let alert = handlers.alert_service.resolve_alert(&alert_id).await?;
    info!("Operator {} resolved alert {}", operator.id, alert_id);
    Ok(Json(alert))
}

#[instrument(skip(handlers, operator))]
pub async fn ignore_alert(
    State(handlers): State<Arc<MonitoringHandlers>>,
    Extension(operator): Extension<Operator>,
    Path(alert_id): Path<String>,
) -> Result<Json<Alert>, MonitoringError> {
    let alert = handlers.alert_service.ignore_alert(&alert_id).await?;
    info!("Operator {} ignored alert {}", operator.id, alert_id);
    Ok(Json(alert))
}

// =====================================================================================
// ERROR RESPONSE IMPLEMENTATION
// =====================================================================================

impl IntoResponse for MonitoringError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            MonitoringError::AlertNotFound(_) => StatusCode::NOT_FOUND,
            MonitoringError::InvalidTransition { .. } => StatusCode::CONFLICT,
            MonitoringError::Store(_) | MonitoringError::HealthCheckFailed(_) => StatusCode::SERVICE_UNAVAILABLE,
            MonitoringError::CheckTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            MonitoringError::Notification(_) | MonitoringError::Serialization(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        (status, Json(serde_json::json!({
            "error": self.to_string(),
            "timestamp": chrono::Utc::now()
        }))).into_response()
    }
}
