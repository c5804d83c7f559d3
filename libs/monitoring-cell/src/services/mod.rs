pub mod alerts;
pub mod backups;
pub mod channels;
pub mod checks;
pub mod health;
pub mod notifications;
pub mod reports;

pub use alerts::AlertManagerService;
pub use backups::BackupStatusReader;
pub use channels::NotificationChannel;
pub use checks::HealthCheck;
pub use health::HealthMonitorService;
pub use notifications::NotificationDispatcher;
pub use reports::ReportService;
