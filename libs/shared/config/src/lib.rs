use std::env;
use std::str::FromStr;
use tracing::warn;

mod monitoring;

pub use monitoring::{
    AlertThresholds, BackupSettings, EmailChannelConfig, EscalationConfig, MonitoredService,
    MonitoringConfig, MonitoringIntervals, NotificationConfig, RecoveryObjectives,
    ResourceObjective, SlackChannelConfig, SmsChannelConfig, ThresholdPair, WebhookChannelConfig,
};

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_service_key: String,
    pub operator_jwt_secret: String,
    pub bind_addr: String,
    pub monitoring: MonitoringConfig,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            supabase_url: env::var("SUPABASE_URL")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_URL not set, using empty value");
                    String::new()
                }),
            supabase_service_key: env::var("SUPABASE_SERVICE_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_SERVICE_KEY not set, using empty value");
                    String::new()
                }),
            operator_jwt_secret: env::var("OPERATOR_JWT_SECRET")
                .unwrap_or_else(|_| {
                    warn!("OPERATOR_JWT_SECRET not set, operator routes will reject all tokens");
                    String::new()
                }),
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string()),
            monitoring: MonitoringConfig::from_env(),
        };

        if !config.is_configured() {
            warn!("Store not configured - falling back to in-memory persistence");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.supabase_url.is_empty() && !self.supabase_service_key.is_empty()
    }
}

pub(crate) fn env_or<T>(key: &str, default: T) -> T
where
    T: FromStr,
{
    match env::var(key) {
        Ok(raw) => match raw.trim().parse::<T>() {
            Ok(value) => value,
            Err(_) => {
                warn!("{} has unparseable value {:?}, using default", key, raw);
                default
            }
        },
        Err(_) => default,
    }
}

pub(crate) fn env_string(key: &str) -> String {
    env::var(key).unwrap_or_default()
}

pub(crate) fn env_list(key: &str) -> Vec<String> {
    env::var(key)
        .map(|raw| split_list(&raw))
        .unwrap_or_default()
}

pub(crate) fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|item| item.trim())
        .filter(|item| !item.is_empty())
        .map(|item| item.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_list_drops_blanks() {
        assert_eq!(
            split_list("ops@example.com, ,dba@example.com,"),
            vec!["ops@example.com".to_string(), "dba@example.com".to_string()]
        );
        assert!(split_list("").is_empty());
    }

    #[test]
    fn test_env_or_falls_back_on_garbage() {
        env::set_var("SHARED_CONFIG_TEST_GARBAGE", "not-a-number");
        assert_eq!(env_or("SHARED_CONFIG_TEST_GARBAGE", 7u64), 7);
        env::set_var("SHARED_CONFIG_TEST_NUMBER", " 42 ");
        assert_eq!(env_or("SHARED_CONFIG_TEST_NUMBER", 7u64), 42);
    }
}
