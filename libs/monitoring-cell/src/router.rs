// =====================================================================================
// MONITORING CELL ROUTER
// =====================================================================================

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use crate::handlers::{
    get_alert, get_alert_summary, get_health_status, get_report, ignore_alert, list_alerts, resolve_alert,
    MonitoringHandlers,
};
use shared_config::AppConfig;
use shared_utils::operator_middleware;

pub fn create_monitoring_router(handlers: Arc<MonitoringHandlers>, config: Arc<AppConfig>) -> Router {
    // Read-only routes
    let public_routes = Router::new()
        .route("/health", get(get_health_status))
        .route("/alerts", get(list_alerts))
        .route("/alerts/summary", get(get_alert_summary))
        .route("/alerts/{alert_id}", get(get_alert))
        .route("/report", get(get_report))
        .with_state(handlers.clone());

    // Operator routes
    let operator_routes = Router::new()
        .route("/alerts/{alert_id}/resolve", post(resolve_alert))
        .route("/alerts/{alert_id}/ignore", post(ignore_alert))
        .layer(middleware::from_fn_with_state(config, operator_middleware))
        .with_state(handlers);

    Router::new().merge(public_routes).merge(operator_routes)
}
