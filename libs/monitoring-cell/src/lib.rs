// =====================================================================================
// MONITORING CELL - BACKUP HEALTH, ALERTING & NOTIFICATION
// =====================================================================================
//
// This cell watches the backup estate:
// - Periodic health snapshots (backup freshness, storage, store and service probes)
// - Alert lifecycle with immediate dispatch for error/critical levels
// - Escalation of unresolved alerts on a schedule
// - Multi-channel notification fan-out (email, chat, webhook, SMS)
// - Reliability reporting against recovery point objectives
//
// =====================================================================================

pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

// Re-export commonly used types
pub use models::{
    Alert, AlertLevel, AlertStatus, BackupOperationSummary, CheckResult, DispatchSummary, ErrorKind,
    HealthSnapshot, HealthStatus, MonitoringError, ReliabilityReport,
};

pub use services::{
    AlertManagerService, HealthMonitorService, NotificationChannel, NotificationDispatcher, ReportService,
};

pub use handlers::MonitoringHandlers;
pub use router::create_monitoring_router;
