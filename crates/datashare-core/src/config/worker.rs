//! Provisioning worker configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Provisioning worker pool configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Whether the in-process worker is started. It is the only consumer
    /// of the dispatch queue, so this must stay on.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Number of items provisioned concurrently.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Capacity of the dispatch queue before `dispatch` reports backpressure.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Attempts per item before a transient handler error is recorded as failure.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay between attempts, in milliseconds.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    /// Seconds to wait for in-flight items on shutdown.
    #[serde(default = "default_shutdown_grace")]
    pub shutdown_grace_seconds: u64,
}

impl WorkerConfig {
    /// Reject settings the runner cannot work with.
    pub fn validate(&self) -> Result<(), AppError> {
        if !self.enabled {
            return Err(AppError::configuration(
                "worker.enabled = false leaves the provisioning queue without a consumer",
            ));
        }
        if self.concurrency == 0 || self.queue_capacity == 0 || self.max_attempts == 0 {
            return Err(AppError::configuration(
                "worker.concurrency, worker.queue_capacity and worker.max_attempts must be at least 1",
            ));
        }
        Ok(())
    }

    /// Delay between attempts.
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    /// Grace period for in-flight items on shutdown.
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_seconds)
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            concurrency: default_concurrency(),
            queue_capacity: default_queue_capacity(),
            max_attempts: default_max_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
            shutdown_grace_seconds: default_shutdown_grace(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_concurrency() -> usize {
    4
}

fn default_queue_capacity() -> usize {
    1024
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    500
}

fn default_shutdown_grace() -> u64 {
    30
}
