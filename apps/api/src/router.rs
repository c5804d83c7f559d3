use std::sync::Arc;

use axum::{routing::get, Json, Router};
use serde_json::{json, Value};

use monitoring_cell::{create_monitoring_router, MonitoringHandlers};
use recovery_cell::{create_recovery_router, RecoveryHandlers};
use shared_config::AppConfig;

pub fn create_router(
    config: Arc<AppConfig>,
    monitoring: Arc<MonitoringHandlers>,
    recovery: Arc<RecoveryHandlers>,
) -> Router {
    Router::new()
        .route("/", get(|| async { "Backup Guardian API is running!" }))
        .route("/health", get(liveness))
        .nest("/monitoring", create_monitoring_router(monitoring, config.clone()))
        .nest("/recovery", create_recovery_router(recovery, config))
}

async fn liveness() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
