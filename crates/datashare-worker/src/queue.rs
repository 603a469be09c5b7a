//! Bounded in-process provisioning queue.

use async_trait::async_trait;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing;

use datashare_core::error::AppError;
use datashare_core::result::AppResult;
use datashare_entity::provisioning::{ProvisioningDirection, ProvisioningRequest};
use datashare_service::ProvisioningGateway;

/// Receiving side of the provisioning queue, drained by the runner.
pub type ProvisioningReceiver = mpsc::Receiver<ProvisioningRequest>;

/// Provisioning gateway that enqueues work for the in-process runner.
///
/// `dispatch` never waits for queue space: when the queue cannot take the
/// whole batch it fails, and the orchestrator leaves the items approved for
/// a later redispatch.
#[derive(Debug, Clone)]
pub struct ProvisioningQueue {
    /// Sending side of the queue
    sender: mpsc::Sender<ProvisioningRequest>,
}

impl ProvisioningQueue {
    /// Create a queue holding at most `capacity` pending requests
    pub fn channel(capacity: usize) -> (Self, ProvisioningReceiver) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender }, receiver)
    }

    /// Free slots left in the queue
    pub fn remaining_capacity(&self) -> usize {
        self.sender.capacity()
    }
}

#[async_trait]
impl ProvisioningGateway for ProvisioningQueue {
    async fn dispatch(
        &self,
        direction: ProvisioningDirection,
        requests: Vec<ProvisioningRequest>,
    ) -> AppResult<()> {
        if requests.len() > self.sender.capacity() {
            return Err(AppError::external_service(format!(
                "Provisioning queue is full ({} free, {} requested)",
                self.sender.capacity(),
                requests.len()
            )));
        }

        let count = requests.len();
        for request in requests {
            match self.sender.try_send(request) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    return Err(AppError::external_service("Provisioning queue is full"));
                }
                Err(TrySendError::Closed(_)) => {
                    return Err(AppError::external_service("Provisioning queue is closed"));
                }
            }
        }

        tracing::debug!("Enqueued {} {} request(s)", count, direction);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use datashare_core::types::{ShareItemId, ShareObjectId};
    use datashare_entity::share::ItemType;

    fn request() -> ProvisioningRequest {
        ProvisioningRequest {
            item_id: ShareItemId::new(),
            share_id: ShareObjectId::new(),
            item_type: ItemType::Table,
            item_uri: "table://sales/orders".to_string(),
            dataset_uri: "dataset://sales".to_string(),
            principal_uri: "env://analytics".to_string(),
            direction: ProvisioningDirection::Grant,
        }
    }

    #[tokio::test]
    async fn test_dispatch_enqueues_in_order() {
        let (queue, mut rx) = ProvisioningQueue::channel(4);
        let batch = vec![request(), request()];
        queue
            .dispatch(ProvisioningDirection::Grant, batch.clone())
            .await
            .unwrap();

        assert_eq!(rx.recv().await.unwrap(), batch[0]);
        assert_eq!(rx.recv().await.unwrap(), batch[1]);
    }

    #[tokio::test]
    async fn test_dispatch_rejects_batch_larger_than_free_space() {
        let (queue, mut rx) = ProvisioningQueue::channel(2);
        let err = queue
            .dispatch(
                ProvisioningDirection::Grant,
                vec![request(), request(), request()],
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind, datashare_core::ErrorKind::ExternalService);
        assert!(rx.try_recv().is_err());
        assert_eq!(queue.remaining_capacity(), 2);
    }

    #[tokio::test]
    async fn test_dispatch_fails_when_closed() {
        let (queue, rx) = ProvisioningQueue::channel(2);
        drop(rx);
        let err = queue
            .dispatch(ProvisioningDirection::Revoke, vec![request()])
            .await
            .unwrap_err();
        assert_eq!(err.kind, datashare_core::ErrorKind::ExternalService);
    }
}
