//! Periodic reconciliation of items whose provisioning stalled.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use tracing;

use datashare_core::config::ProvisioningConfig;
use datashare_core::error::ErrorKind;
use datashare_core::result::AppResult;
use datashare_entity::share::ShareItemStatus;
use datashare_service::RequestOrchestrator;

/// Counts from one reconciliation sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    /// Items forced from `*_In_Progress` to failed.
    pub force_failed: usize,
    /// Items handed to the gateway again.
    pub redispatched: usize,
}

/// Fails items that never reported back and retries stuck dispatches.
#[derive(Debug)]
pub struct Reconciler {
    /// Orchestrator performing the transitions
    orchestrator: Arc<RequestOrchestrator>,
    /// Timeouts
    config: ProvisioningConfig,
}

impl Reconciler {
    /// Create a new reconciler
    pub fn new(orchestrator: Arc<RequestOrchestrator>, config: ProvisioningConfig) -> Self {
        Self {
            orchestrator,
            config,
        }
    }

    /// Run one sweep.
    ///
    /// Items that finish or restart between the scan and the transition are
    /// skipped.
    pub async fn sweep(&self) -> AppResult<ReconcileReport> {
        let now = Utc::now();
        let mut report = ReconcileReport::default();
        let store = self.orchestrator.store();

        if let Some(cutoff) = cutoff(now, self.config.in_flight_timeout()) {
            let stuck = store
                .find_items_by_status(&ShareItemStatus::IN_FLIGHT, cutoff)
                .await?;
            let reason = format!(
                "no provisioning outcome within {}s",
                self.config.in_flight_timeout_seconds
            );
            for item in stuck {
                match self
                    .orchestrator
                    .force_fail_if_stale(item.id, cutoff, &reason)
                    .await
                {
                    Ok(Some(_)) => report.force_failed += 1,
                    Ok(None) => {
                        tracing::debug!("Item {} made progress since the scan", item.id);
                    }
                    Err(e) if e.is(ErrorKind::InvalidTransition) || e.is(ErrorKind::NotFound) => {
                        tracing::debug!("Item {} settled before it could be failed", item.id);
                    }
                    Err(e) => return Err(e),
                }
            }
        }

        if let Some(cutoff) = cutoff(now, self.config.redispatch_after()) {
            let waiting = store
                .find_items_by_status(&ShareItemStatus::AWAITING_DISPATCH, cutoff)
                .await?;
            let shares: BTreeSet<_> = waiting.iter().map(|item| item.share_id).collect();
            for share_id in shares {
                match self.orchestrator.redispatch_approved(share_id).await {
                    Ok(ids) => report.redispatched += ids.len(),
                    Err(e) if e.is(ErrorKind::NotFound) => {}
                    Err(e) => return Err(e),
                }
            }
        }

        if report != ReconcileReport::default() {
            tracing::info!(
                "Reconciliation: {} item(s) force-failed, {} item(s) redispatched",
                report.force_failed,
                report.redispatched
            );
        }

        Ok(report)
    }
}

fn cutoff(now: DateTime<Utc>, age: Duration) -> Option<DateTime<Utc>> {
    TimeDelta::from_std(age)
        .ok()
        .and_then(|age| now.checked_sub_signed(age))
}
