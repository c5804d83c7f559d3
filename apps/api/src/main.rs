use std::sync::Arc;

use anyhow::Context;
use dotenv::dotenv;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::{self, TraceLayer};
use tracing::{info, warn, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod router;

use monitoring_cell::{MonitoringHandlers, NotificationDispatcher};
use recovery_cell::{CommandStepExecutor, RecoveryHandlers, RecoveryOrchestrator};
use shared_config::AppConfig;
use shared_database::{InMemoryStore, Store, SupabaseClient};
use shared_utils::PeriodicTask;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Loading Env Vars
    dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Backup Guardian API server");

    // Load configuration
    let config = Arc::new(AppConfig::from_env());

    let store: Arc<dyn Store> = if config.is_configured() {
        Arc::new(SupabaseClient::new(&config))
    } else {
        warn!("Supabase is not configured; using an in-memory store");
        Arc::new(InMemoryStore::new())
    };

    // Services
    let dispatcher = Arc::new(NotificationDispatcher::from_config(&config.monitoring.notifications));
    info!(channels = ?dispatcher.channel_names(), "Notification channels enabled");

    let monitoring = Arc::new(MonitoringHandlers::with_dispatcher(
        &config.monitoring,
        store.clone(),
        dispatcher.clone(),
    ));
    let orchestrator = Arc::new(RecoveryOrchestrator::new(
        store,
        Arc::new(CommandStepExecutor::default()),
        dispatcher,
        config.monitoring.objectives.clone(),
    ));
    let recovery = Arc::new(RecoveryHandlers::new(orchestrator));

    // Periodic ticks
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let intervals = &config.monitoring.intervals;
    let mut tasks = Vec::new();

    let health = monitoring.health_service();
    tasks.push(
        PeriodicTask::new("health_check", intervals.health_check()).spawn(shutdown_rx.clone(), move || {
            let health = health.clone();
            async move {
                health.run_check().await;
            }
        }),
    );

    let backups = monitoring.health_service();
    tasks.push(
        PeriodicTask::new("backup_status", intervals.backup_status()).spawn(shutdown_rx.clone(), move || {
            let backups = backups.clone();
            async move {
                backups.check_backup_status().await;
            }
        }),
    );

    let alerts = monitoring.alert_service();
    tasks.push(
        PeriodicTask::new("alert_processing", intervals.alert_processing()).spawn(shutdown_rx.clone(), move || {
            let alerts = alerts.clone();
            async move { alerts.run_processing_tick().await }
        }),
    );

    let reports = monitoring.report_service();
    tasks.push(
        PeriodicTask::new("reliability_report", intervals.report()).spawn(shutdown_rx, move || {
            let reports = reports.clone();
            async move { reports.run_report_tick().await }
        }),
    );

    // Set up CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Build the application router
    let app = router::create_router(config.clone(), monitoring, recovery)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(trace::DefaultMakeSpan::new().level(Level::INFO))
                .on_response(trace::DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors);

    // Run the server
    let listener = TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    info!("Listening on {}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "Failed to listen for shutdown signal");
            }
            info!("Shutdown signal received");
            let _ = shutdown_tx.send(true);
        })
        .await
        .context("server error")?;

    for task in tasks {
        let _ = task.await;
    }

    info!("Backup Guardian API stopped");
    Ok(())
}
