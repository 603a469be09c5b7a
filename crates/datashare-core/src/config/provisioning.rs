//! Provisioning reconciliation configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Timeouts and sweep cadence for items whose provisioning never reports back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvisioningConfig {
    /// Whether the periodic reconciler runs.
    #[serde(default = "default_true")]
    pub reconcile_enabled: bool,
    /// An item `*_In_Progress` for longer than this is forced to failed.
    #[serde(default = "default_in_flight_timeout")]
    pub in_flight_timeout_seconds: u64,
    /// An item `*_Approved` for longer than this has its dispatch retried.
    #[serde(default = "default_redispatch_after")]
    pub redispatch_after_seconds: u64,
    /// Interval between reconciler sweeps.
    #[serde(default = "default_reconcile_interval")]
    pub reconcile_interval_seconds: u64,
}

impl ProvisioningConfig {
    /// In-flight timeout as a [`Duration`].
    pub fn in_flight_timeout(&self) -> Duration {
        Duration::from_secs(self.in_flight_timeout_seconds)
    }

    /// Redispatch threshold as a [`Duration`].
    pub fn redispatch_after(&self) -> Duration {
        Duration::from_secs(self.redispatch_after_seconds)
    }

    /// Sweep interval as a [`Duration`].
    pub fn reconcile_interval(&self) -> Duration {
        Duration::from_secs(self.reconcile_interval_seconds.max(1))
    }
}

impl Default for ProvisioningConfig {
    fn default() -> Self {
        Self {
            reconcile_enabled: default_true(),
            in_flight_timeout_seconds: default_in_flight_timeout(),
            redispatch_after_seconds: default_redispatch_after(),
            reconcile_interval_seconds: default_reconcile_interval(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_in_flight_timeout() -> u64 {
    3600
}

fn default_redispatch_after() -> u64 {
    300
}

fn default_reconcile_interval() -> u64 {
    60
}
