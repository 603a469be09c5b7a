//! Repeating schedule for the reconciler.

use std::sync::Arc;

use tokio_cron_scheduler::{Job as CronJob, JobScheduler};
use tracing;

use datashare_core::config::ProvisioningConfig;
use datashare_core::error::AppError;

use crate::reconciler::Reconciler;

/// Runs [`Reconciler::sweep`] at a fixed interval
pub struct ReconcileScheduler {
    /// The underlying job scheduler
    scheduler: JobScheduler,
}

impl std::fmt::Debug for ReconcileScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReconcileScheduler").finish()
    }
}

impl ReconcileScheduler {
    /// Create a scheduler and register the reconciliation sweep
    pub async fn new(
        reconciler: Arc<Reconciler>,
        config: &ProvisioningConfig,
    ) -> Result<Self, AppError> {
        let scheduler = JobScheduler::new()
            .await
            .map_err(|e| AppError::internal(format!("Failed to create scheduler: {}", e)))?;

        let interval = config.reconcile_interval();
        let job = CronJob::new_repeated_async(interval, move |_uuid, _lock| {
            let reconciler = Arc::clone(&reconciler);
            Box::pin(async move {
                tracing::debug!("Running provisioning reconciliation");
                if let Err(e) = reconciler.sweep().await {
                    tracing::error!("Provisioning reconciliation failed: {}", e);
                }
            })
        })
        .map_err(|e| {
            AppError::internal(format!("Failed to create reconciliation schedule: {}", e))
        })?;

        scheduler.add(job).await.map_err(|e| {
            AppError::internal(format!("Failed to add reconciliation schedule: {}", e))
        })?;

        tracing::info!(
            "Registered: provisioning reconciliation (every {}s)",
            interval.as_secs()
        );
        Ok(Self { scheduler })
    }

    /// Start the scheduler
    pub async fn start(&self) -> Result<(), AppError> {
        self.scheduler
            .start()
            .await
            .map_err(|e| AppError::internal(format!("Failed to start scheduler: {}", e)))?;

        tracing::info!("Reconciliation scheduler started");
        Ok(())
    }

    /// Shutdown the scheduler
    pub async fn shutdown(&mut self) -> Result<(), AppError> {
        self.scheduler
            .shutdown()
            .await
            .map_err(|e| AppError::internal(format!("Failed to shutdown scheduler: {}", e)))?;

        tracing::info!("Reconciliation scheduler shut down");
        Ok(())
    }
}
