// =====================================================================================
// RECOVERY CELL ROUTER
// =====================================================================================

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use crate::handlers::{execute_recovery, get_procedures, get_recovery_status, RecoveryHandlers};
use shared_config::AppConfig;
use shared_utils::operator_middleware;

pub fn create_recovery_router(handlers: Arc<RecoveryHandlers>, config: Arc<AppConfig>) -> Router {
    let public_routes = Router::new()
        .route("/status", get(get_recovery_status))
        .route("/procedures", get(get_procedures))
        .with_state(handlers.clone());

    // Starting a recovery requires an operator token
    let operator_routes = Router::new()
        .route("/execute", post(execute_recovery))
        .layer(middleware::from_fn_with_state(config, operator_middleware))
        .with_state(handlers);

    Router::new().merge(public_routes).merge(operator_routes)
}
