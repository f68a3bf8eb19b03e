//! # Reconciler Configuration
//!
//! Timeouts and requeue delays used by both reconcilers.

use super::env_var_or_default;
use std::time::Duration;

/// Reconciler timing configuration
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Connect + ping timeout against the target MongoDB (seconds)
    pub connect_timeout_secs: u64,
    /// Retry delay while a referenced MongoDBConfig is missing or unusable (seconds)
    pub dependency_requeue_secs: u64,
    /// Retry delay after connection failures and store errors (seconds)
    pub transient_requeue_secs: u64,
    /// Lower bound of the error-policy Fibonacci backoff (seconds)
    pub error_backoff_min_secs: u64,
    /// Upper bound of the error-policy Fibonacci backoff (seconds)
    pub error_backoff_max_secs: u64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        use crate::constants::*;
        Self {
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            dependency_requeue_secs: DEFAULT_DEPENDENCY_REQUEUE_SECS,
            transient_requeue_secs: DEFAULT_TRANSIENT_REQUEUE_SECS,
            error_backoff_min_secs: DEFAULT_ERROR_BACKOFF_MIN_SECS,
            error_backoff_max_secs: DEFAULT_ERROR_BACKOFF_MAX_SECS,
        }
    }
}

impl ControllerConfig {
    /// Load configuration from environment variables with defaults
    pub fn from_env() -> Self {
        use crate::constants::*;
        Self {
            connect_timeout_secs: env_var_or_default(
                "CONNECT_TIMEOUT_SECS",
                DEFAULT_CONNECT_TIMEOUT_SECS,
            ),
            dependency_requeue_secs: env_var_or_default(
                "DEPENDENCY_REQUEUE_SECS",
                DEFAULT_DEPENDENCY_REQUEUE_SECS,
            ),
            transient_requeue_secs: env_var_or_default(
                "TRANSIENT_REQUEUE_SECS",
                DEFAULT_TRANSIENT_REQUEUE_SECS,
            ),
            error_backoff_min_secs: env_var_or_default(
                "ERROR_BACKOFF_MIN_SECS",
                DEFAULT_ERROR_BACKOFF_MIN_SECS,
            ),
            error_backoff_max_secs: env_var_or_default(
                "ERROR_BACKOFF_MAX_SECS",
                DEFAULT_ERROR_BACKOFF_MAX_SECS,
            ),
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn dependency_requeue(&self) -> Duration {
        Duration::from_secs(self.dependency_requeue_secs)
    }

    pub fn transient_requeue(&self) -> Duration {
        Duration::from_secs(self.transient_requeue_secs)
    }
}
