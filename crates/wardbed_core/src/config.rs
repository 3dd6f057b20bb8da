//! Core runtime configuration.
//!
//! # Responsibility
//! - Carry tunables that callers pass into connection bootstrap.
//! - Provide defaults that match the logging build-mode policy.
//!
//! # Invariants
//! - `lock_timeout_ms` is strictly positive.
//! - `log_level` is one of `trace|debug|info|warn|error`.

use crate::logging::{default_log_level, normalize_level};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Duration;

const DEFAULT_LOCK_TIMEOUT_MS: u64 = 5_000;

/// Configuration consumed by `db::open_db` and logging bootstrap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// Request-scoped bound on waiting for the database writer lock.
    pub lock_timeout_ms: u64,
    /// Log level passed to `init_logging`.
    pub log_level: String,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            lock_timeout_ms: DEFAULT_LOCK_TIMEOUT_MS,
            log_level: default_log_level().to_string(),
        }
    }
}

impl CoreConfig {
    /// Returns the lock timeout as a `Duration`.
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    /// Returns a copy with a different lock timeout.
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Checks field ranges before the config is used.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.lock_timeout_ms == 0 {
            return Err(ConfigError::ZeroLockTimeout);
        }
        if normalize_level(&self.log_level).is_err() {
            return Err(ConfigError::UnknownLogLevel(self.log_level.clone()));
        }
        Ok(())
    }
}

/// Invalid configuration values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    ZeroLockTimeout,
    UnknownLogLevel(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ZeroLockTimeout => write!(f, "lock_timeout_ms must be greater than zero"),
            Self::UnknownLogLevel(level) => write!(
                f,
                "unsupported log level `{level}`; expected trace|debug|info|warn|error"
            ),
        }
    }
}

impl Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::{ConfigError, CoreConfig};
    use std::time::Duration;

    #[test]
    fn default_config_is_valid() {
        let config = CoreConfig::default();
        assert_eq!(config.lock_timeout(), Duration::from_secs(5));
        config.validate().expect("default config should validate");
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let config: CoreConfig =
            serde_json::from_str(r#"{"lock_timeout_ms": 250}"#).expect("json should parse");
        assert_eq!(config.lock_timeout_ms, 250);
        assert_eq!(config.log_level, CoreConfig::default().log_level);
    }

    #[test]
    fn validate_rejects_zero_timeout_and_unknown_level() {
        let zero = CoreConfig::default().with_lock_timeout(Duration::ZERO);
        assert_eq!(zero.validate(), Err(ConfigError::ZeroLockTimeout));

        let loud = CoreConfig {
            log_level: "loud".to_string(),
            ..CoreConfig::default()
        };
        assert!(matches!(
            loud.validate(),
            Err(ConfigError::UnknownLogLevel(level)) if level == "loud"
        ));
    }
}
