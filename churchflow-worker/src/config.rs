/// Worker configuration
///
/// Read from the environment through the `config` crate. Every setting but
/// the database URL has a default.
///
/// | Variable | Default |
/// |---|---|
/// | `DATABASE_URL` | required |
/// | `WORKER_DATABASE_MAX_CONNECTIONS` | 5 |
/// | `WORKER_POLL_INTERVAL_SECS` | 5 |
/// | `WORKER_BATCH_SIZE` | 10 |
/// | `WORKER_MAX_CONCURRENT` | 4 |
/// | `WORKER_LOCK_TIMEOUT_SECS` | 300 |
/// | `WORKER_MAX_ATTEMPTS` | 3 |
/// | `WORKER_RETRY_BACKOFF_SECS` | 30 (doubles per attempt, at most 1h) |
/// | `WORKER_DISPATCH_TIMEOUT_SECS` | 30 |
/// | `WORKER_WEBHOOK_URL` | unset (log dispatcher) |

use config::{Config, ConfigError, Environment};
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct WorkerConfig {
    pub database_url: String,
    pub database_max_connections: u32,

    /// Pause between polls when the queue is empty
    pub poll_interval_secs: u64,

    /// Rows claimed per poll
    pub batch_size: u32,

    /// Communications delivered at the same time
    pub max_concurrent: usize,

    /// How long a claim stays exclusive before another worker may take it
    pub lock_timeout_secs: u64,

    /// Claims allowed before a retryable failure becomes FAILED
    pub max_attempts: i32,

    /// Wait before the first retry of a failed delivery
    pub retry_backoff_secs: u64,

    /// Upper bound on a single dispatch
    pub dispatch_timeout_secs: u64,

    /// Deliver through this webhook instead of logging
    pub webhook_url: Option<String>,
}

impl WorkerConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let settings = Config::builder()
            .set_default("database_max_connections", 5)?
            .set_default("poll_interval_secs", 5)?
            .set_default("batch_size", 10)?
            .set_default("max_concurrent", 4)?
            .set_default("lock_timeout_secs", 300)?
            .set_default("max_attempts", 3)?
            .set_default("retry_backoff_secs", 30)?
            .set_default("dispatch_timeout_secs", 30)?
            .set_override_option("database_url", std::env::var("DATABASE_URL").ok())?
            .add_source(Environment::with_prefix("WORKER").try_parsing(true))
            .build()?;

        let config: WorkerConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.database_url.trim().is_empty() {
            return Err(ConfigError::Message("DATABASE_URL must not be empty".into()));
        }
        if self.batch_size == 0 || self.max_concurrent == 0 {
            return Err(ConfigError::Message(
                "WORKER_BATCH_SIZE and WORKER_MAX_CONCURRENT must be positive".into(),
            ));
        }
        if self.max_attempts < 1 {
            return Err(ConfigError::Message("WORKER_MAX_ATTEMPTS must be at least 1".into()));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_secs(self.lock_timeout_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_secs(self.retry_backoff_secs)
    }

    pub fn dispatch_timeout(&self) -> Duration {
        Duration::from_secs(self.dispatch_timeout_secs)
    }

    /// Webhook URL with blank values treated as unset
    pub fn webhook(&self) -> Option<&str> {
        self.webhook_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }

    /// Defaults with the given database, for tests
    pub fn for_tests(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            database_max_connections: 2,
            poll_interval_secs: 1,
            batch_size: 10,
            max_concurrent: 2,
            lock_timeout_secs: 60,
            max_attempts: 3,
            retry_backoff_secs: 1,
            dispatch_timeout_secs: 5,
            webhook_url: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_webhook_is_unset() {
        let mut config = WorkerConfig::for_tests("postgres://localhost/churchflow");
        assert_eq!(config.webhook(), None);

        config.webhook_url = Some("   ".to_string());
        assert_eq!(config.webhook(), None);

        config.webhook_url = Some(" https://hooks.example.com/send ".to_string());
        assert_eq!(config.webhook(), Some("https://hooks.example.com/send"));
    }

    #[test]
    fn test_validate_rejects_zero_batch() {
        let mut config = WorkerConfig::for_tests("postgres://localhost/churchflow");
        assert!(config.validate().is_ok());

        config.batch_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_durations() {
        let config = WorkerConfig::for_tests("postgres://localhost/churchflow");
        assert_eq!(config.poll_interval(), Duration::from_secs(1));
        assert_eq!(config.lock_timeout(), Duration::from_secs(60));
        assert_eq!(config.retry_backoff(), Duration::from_secs(1));
    }
}
