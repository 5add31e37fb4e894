//! Configuration for Callwarden.

use crate::error::{WardenError, WardenResult};
use crate::retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Platform screening deadline. After this the platform applies its own
/// default handling.
pub const DEFAULT_SCREENING_DEADLINE_MS: u64 = 5_000;

/// Time the classifier gets inside the screening deadline.
pub const DEFAULT_CLASSIFIER_BUDGET_MS: u64 = 4_000;

/// Overall execution budget of one background dispatch task.
pub const DEFAULT_DISPATCH_TIMEOUT_MS: u64 = 60_000;

/// Callwarden configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WardenConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
    /// Hard response deadline of the platform screening hook.
    pub screening_deadline_ms: u64,
    /// Upper bound on classifier work inside the screening hook.
    pub classifier_budget_ms: u64,
    /// Delivery attempts per background dispatch task.
    pub retry_max_attempts: u32,
    /// Constant pause between delivery attempts.
    pub retry_delay_ms: u64,
    /// Overall budget of a dispatch task, retries included.
    pub dispatch_timeout_ms: u64,
    /// Pending relay requests before new ones are dropped.
    pub relay_queue_capacity: usize,
    /// Number of recent (call, state) pairs remembered for relay dedup.
    pub dedup_window: usize,
    /// Entries fetched from the call log when resolving an unknown number.
    pub recent_call_log_limit: usize,
}

impl Default for WardenConfig {
    fn default() -> Self {
        Self {
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            screening_deadline_ms: DEFAULT_SCREENING_DEADLINE_MS,
            classifier_budget_ms: DEFAULT_CLASSIFIER_BUDGET_MS,
            retry_max_attempts: crate::retry::DEFAULT_MAX_ATTEMPTS,
            retry_delay_ms: crate::retry::DEFAULT_RETRY_DELAY.as_millis() as u64,
            dispatch_timeout_ms: DEFAULT_DISPATCH_TIMEOUT_MS,
            relay_queue_capacity: 64,
            dedup_window: 32,
            recent_call_log_limit: 5,
        }
    }
}

impl WardenConfig {
    /// Load from `path` if it exists (defaults otherwise), then apply
    /// environment overrides and validate.
    pub fn load(path: &Path) -> WardenResult<Self> {
        let mut config = if path.exists() {
            Self::load_from_file(path)?
        } else {
            Self::default()
        };
        config.load_from_env();
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific JSON file.
    pub fn load_from_file(path: &Path) -> WardenResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: WardenConfig = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// `~/.callwarden/config.json`.
    pub fn default_path() -> WardenResult<PathBuf> {
        dirs::home_dir()
            .map(|home| home.join(".callwarden").join("config.json"))
            .ok_or_else(|| WardenError::Config("home directory not found".to_string()))
    }

    fn load_from_env(&mut self) {
        if let Ok(level) = std::env::var("CALLWARDEN_LOG_LEVEL") {
            self.log_level = level;
        }
        override_from_env("CALLWARDEN_SCREENING_DEADLINE_MS", &mut self.screening_deadline_ms);
        override_from_env("CALLWARDEN_CLASSIFIER_BUDGET_MS", &mut self.classifier_budget_ms);
        override_from_env("CALLWARDEN_RETRY_MAX_ATTEMPTS", &mut self.retry_max_attempts);
        override_from_env("CALLWARDEN_RETRY_DELAY_MS", &mut self.retry_delay_ms);
        override_from_env("CALLWARDEN_DISPATCH_TIMEOUT_MS", &mut self.dispatch_timeout_ms);
    }

    /// Reject settings that would break the timing contract.
    pub fn validate(&self) -> WardenResult<()> {
        if self.screening_deadline_ms == 0 {
            return Err(WardenError::Config(
                "screening_deadline_ms must be positive".to_string(),
            ));
        }
        if self.classifier_budget_ms >= self.screening_deadline_ms {
            return Err(WardenError::Config(format!(
                "classifier_budget_ms ({}) must be below screening_deadline_ms ({})",
                self.classifier_budget_ms, self.screening_deadline_ms
            )));
        }
        if self.retry_max_attempts == 0 {
            return Err(WardenError::Config(
                "retry_max_attempts must be at least 1".to_string(),
            ));
        }
        if self.relay_queue_capacity == 0 {
            return Err(WardenError::Config(
                "relay_queue_capacity must be positive".to_string(),
            ));
        }
        let retry_budget = self.retry_policy().retry_budget();
        if self.dispatch_timeout() <= retry_budget {
            return Err(WardenError::Config(format!(
                "dispatch_timeout_ms ({}) must exceed the retry budget ({} ms)",
                self.dispatch_timeout_ms,
                retry_budget.as_millis()
            )));
        }
        Ok(())
    }

    pub fn screening_deadline(&self) -> Duration {
        Duration::from_millis(self.screening_deadline_ms)
    }

    pub fn classifier_budget(&self) -> Duration {
        Duration::from_millis(self.classifier_budget_ms)
    }

    pub fn dispatch_timeout(&self) -> Duration {
        Duration::from_millis(self.dispatch_timeout_ms)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.retry_max_attempts,
            Duration::from_millis(self.retry_delay_ms),
        )
    }
}

fn override_from_env<T: std::str::FromStr>(key: &str, target: &mut T) {
    let Ok(raw) = std::env::var(key) else {
        return;
    };
    match raw.parse() {
        Ok(value) => *target = value,
        Err(_) => warn!(key = key, value = %raw, "ignoring unparsable environment override"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = WardenConfig::default();
        assert_eq!(config.log_level, "info");
        assert_eq!(config.screening_deadline(), Duration::from_secs(5));
        assert_eq!(config.classifier_budget(), Duration::from_secs(4));
        assert_eq!(config.dispatch_timeout(), Duration::from_secs(60));
        assert_eq!(config.retry_policy(), RetryPolicy::default());
        assert_eq!(config.recent_call_log_limit, 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_classifier_budget_must_fit_deadline() {
        let config = WardenConfig {
            classifier_budget_ms: 5_000,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(WardenError::Config(_))));
    }

    #[test]
    fn test_dispatch_timeout_must_dominate_retry_budget() {
        let config = WardenConfig {
            retry_max_attempts: 5,
            retry_delay_ms: 500,
            dispatch_timeout_ms: 2_500,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = WardenConfig {
            dispatch_timeout_ms: 2_501,
            ..config
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_attempts_rejected() {
        let config = WardenConfig {
            retry_max_attempts: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_partial_file_keeps_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "retry_delay_ms": 250, "log_level": "debug" }"#).unwrap();

        let config = WardenConfig::load_from_file(&path).unwrap();
        assert_eq!(config.retry_delay_ms, 250);
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.retry_max_attempts, 5);
        assert_eq!(config.dispatch_timeout_ms, 60_000);
    }

    #[test]
    fn test_load_invalid_json_is_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "not json").unwrap();

        assert!(matches!(
            WardenConfig::load_from_file(&path),
            Err(WardenError::Json(_))
        ));
    }

    #[test]
    fn test_load_rejects_invalid_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "classifier_budget_ms": 9000 }"#).unwrap();

        assert!(matches!(
            WardenConfig::load(&path),
            Err(WardenError::Config(_))
        ));
    }
}
