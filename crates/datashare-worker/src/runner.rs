//! Provisioning runner: drains the queue and reports outcomes back.

use std::sync::Arc;

use tokio::sync::{Semaphore, watch};
use tokio::time;
use tracing;

use datashare_core::config::WorkerConfig;
use datashare_entity::provisioning::{ProvisioningOutcome, ProvisioningRequest};
use datashare_service::RequestOrchestrator;

use crate::handler::{ProvisioningError, ProvisioningHandler};
use crate::queue::ProvisioningReceiver;

/// Runs provisioning requests through a handler with bounded concurrency.
///
/// For every request the runner first acknowledges the dispatch; only when
/// the acknowledgment moves the item to `*_In_Progress` does it call the
/// handler, so a request enqueued twice is processed once.
#[derive(Debug)]
pub struct ProvisioningRunner {
    /// Orchestrator receiving acknowledgments and outcomes
    orchestrator: Arc<RequestOrchestrator>,
    /// Platform-specific provisioning
    handler: Arc<dyn ProvisioningHandler>,
    /// Worker configuration
    config: WorkerConfig,
    /// Worker identifier
    worker_id: String,
}

impl ProvisioningRunner {
    /// Create a new provisioning runner
    pub fn new(
        orchestrator: Arc<RequestOrchestrator>,
        handler: Arc<dyn ProvisioningHandler>,
        config: WorkerConfig,
        worker_id: impl Into<String>,
    ) -> Self {
        Self {
            orchestrator,
            handler,
            config,
            worker_id: worker_id.into(),
        }
    }

    /// Run until the cancel signal is received or every queue sender is gone
    pub async fn run(&self, mut queue: ProvisioningReceiver, mut cancel: watch::Receiver<bool>) {
        let concurrency = self.config.concurrency.max(1);
        tracing::info!(
            "Provisioning worker '{}' started with handler='{}', concurrency={}",
            self.worker_id,
            self.handler.name(),
            concurrency
        );

        let semaphore = Arc::new(Semaphore::new(concurrency));

        loop {
            tokio::select! {
                changed = cancel.changed() => {
                    if changed.is_err() || *cancel.borrow() {
                        tracing::info!("Provisioning worker '{}' received shutdown signal", self.worker_id);
                        break;
                    }
                }
                next = queue.recv() => {
                    let Some(request) = next else {
                        tracing::info!("Provisioning queue closed");
                        break;
                    };
                    let Ok(permit) = Arc::clone(&semaphore).acquire_owned().await else {
                        break;
                    };

                    let orchestrator = Arc::clone(&self.orchestrator);
                    let handler = Arc::clone(&self.handler);
                    let config = self.config.clone();
                    tokio::spawn(async move {
                        let _permit = permit;
                        process(&orchestrator, handler.as_ref(), &config, request).await;
                    });
                }
            }
        }

        tracing::info!(
            "Provisioning worker '{}' waiting for in-flight items to complete...",
            self.worker_id
        );

        let max_permits = u32::try_from(concurrency).unwrap_or(u32::MAX);
        if time::timeout(
            self.config.shutdown_grace(),
            semaphore.acquire_many(max_permits),
        )
        .await
        .is_err()
        {
            tracing::warn!(
                "Provisioning worker '{}' stopped with items still running; the reconciler will fail them after the timeout",
                self.worker_id
            );
        }

        tracing::info!("Provisioning worker '{}' shut down complete", self.worker_id);
    }
}

/// Acknowledge, provision, and report one request.
async fn process(
    orchestrator: &RequestOrchestrator,
    handler: &dyn ProvisioningHandler,
    config: &WorkerConfig,
    request: ProvisioningRequest,
) {
    let item_id = request.item_id;

    match orchestrator.on_provisioning_started(item_id).await {
        Ok(disposition) if disposition.is_applied() => {}
        Ok(disposition) => {
            tracing::debug!("Skipping item {}: {:?}", item_id, disposition);
            return;
        }
        Err(e) => {
            tracing::error!("Failed to acknowledge item {}: {}", item_id, e);
            return;
        }
    }

    let outcome = match provision_with_retry(handler, config, &request).await {
        Ok(()) => ProvisioningOutcome::Succeeded,
        Err(e) => ProvisioningOutcome::failed(e.to_string()),
    };

    if let Err(e) = orchestrator.on_provisioning_outcome(item_id, outcome).await {
        tracing::error!("Failed to record outcome for item {}: {}", item_id, e);
    }
}

async fn provision_with_retry(
    handler: &dyn ProvisioningHandler,
    config: &WorkerConfig,
    request: &ProvisioningRequest,
) -> Result<(), ProvisioningError> {
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match handler.provision(request).await {
            Ok(()) => {
                tracing::info!(
                    "Item {} {} provisioned (attempt {}/{})",
                    request.item_id,
                    request.direction,
                    attempt,
                    max_attempts
                );
                return Ok(());
            }
            Err(e) if e.is_transient() && attempt < max_attempts => {
                tracing::warn!(
                    "Item {} failed (transient, attempt {}/{}): {}",
                    request.item_id,
                    attempt,
                    max_attempts,
                    e
                );
                attempt += 1;
                time::sleep(config.retry_delay()).await;
            }
            Err(e) => {
                tracing::error!("Item {} failed permanently: {}", request.item_id, e);
                return Err(e);
            }
        }
    }
}
