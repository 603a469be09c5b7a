//! Shared test helpers for orchestrator integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use datashare_core::error::AppError;
use datashare_core::result::AppResult;
use datashare_core::types::{ShareItemId, ShareObjectId};
use datashare_database::{MemoryShareStore, ShareStore};
use datashare_entity::provisioning::{
    ProvisioningDirection, ProvisioningOutcome, ProvisioningRequest,
};
use datashare_entity::share::{NewShareItem, ShareAggregate, ShareItemStatus, ShareObjectStatus};
use datashare_service::{CreateShareRequest, RequestContext, RequestOrchestrator};

/// Gateway that records every dispatch and can be switched to fail.
#[derive(Debug, Default)]
pub struct RecordingGateway {
    dispatches: Mutex<Vec<(ProvisioningDirection, Vec<ProvisioningRequest>)>>,
    failing: AtomicBool,
}

impl RecordingGateway {
    /// Make subsequent dispatches fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Every recorded dispatch call.
    pub fn dispatches(&self) -> Vec<(ProvisioningDirection, Vec<ProvisioningRequest>)> {
        self.dispatches.lock().unwrap().clone()
    }

    /// Item IDs dispatched in `direction`, across all calls.
    pub fn dispatched_items(&self, direction: ProvisioningDirection) -> Vec<ShareItemId> {
        self.dispatches()
            .into_iter()
            .filter(|(d, _)| *d == direction)
            .flat_map(|(_, requests)| requests.into_iter().map(|r| r.item_id))
            .collect()
    }
}

#[async_trait]
impl datashare_service::ProvisioningGateway for RecordingGateway {
    async fn dispatch(
        &self,
        direction: ProvisioningDirection,
        requests: Vec<ProvisioningRequest>,
    ) -> AppResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(AppError::external_service("provisioning queue unavailable"));
        }
        self.dispatches.lock().unwrap().push((direction, requests));
        Ok(())
    }
}

/// Test application context.
pub struct TestApp {
    /// Orchestrator under test.
    pub orchestrator: Arc<RequestOrchestrator>,
    /// Backing store, for direct inspection.
    pub store: Arc<MemoryShareStore>,
    /// Recording gateway.
    pub gateway: Arc<RecordingGateway>,
    /// Requester context.
    pub requester: RequestContext,
    /// Approver context.
    pub approver: RequestContext,
}

impl TestApp {
    /// Create a new test application over an empty in-memory store.
    pub fn new() -> Self {
        let store = Arc::new(MemoryShareStore::new());
        let gateway = Arc::new(RecordingGateway::default());
        let orchestrator = Arc::new(RequestOrchestrator::new(store.clone(), gateway.clone()));
        Self {
            orchestrator,
            store,
            gateway,
            requester: RequestContext::requester("team-analytics"),
            approver: RequestContext::approver("team-sales"),
        }
    }

    /// Create a `Draft` request with `count` table items.
    pub async fn draft_share(&self, count: usize) -> ShareAggregate {
        let items = (0..count)
            .map(|i| NewShareItem::table(format!("table://sales/t{i}"), format!("t{i}")))
            .collect();
        self.orchestrator
            .create_share(
                &self.requester,
                CreateShareRequest {
                    dataset_uri: "dataset://sales".to_string(),
                    principal_uri: "env://analytics".to_string(),
                    request_purpose: Some("quarterly reporting".to_string()),
                    items,
                },
            )
            .await
            .expect("Failed to create share")
    }

    /// Create a request with `count` items and submit it.
    pub async fn submitted_share(&self, count: usize) -> ShareAggregate {
        let agg = self.draft_share(count).await;
        self.orchestrator
            .submit(&self.requester, agg.share.id)
            .await
            .expect("Failed to submit share");
        self.load(agg.share.id).await
    }

    /// Create a request with `count` items, submit and approve it.
    pub async fn approved_share(&self, count: usize) -> ShareAggregate {
        let agg = self.submitted_share(count).await;
        self.orchestrator
            .approve(&self.approver, agg.share.id)
            .await
            .expect("Failed to approve share");
        self.load(agg.share.id).await
    }

    /// Create an approved request whose items all completed with `outcome`.
    pub async fn provisioned_share(
        &self,
        count: usize,
        outcome: ProvisioningOutcome,
    ) -> ShareAggregate {
        let agg = self.approved_share(count).await;
        for item in &agg.items {
            self.complete(item.id, outcome.clone()).await;
        }
        self.load(agg.share.id).await
    }

    /// Acknowledge and finish provisioning of one item.
    pub async fn complete(&self, item_id: ShareItemId, outcome: ProvisioningOutcome) {
        let started = self
            .orchestrator
            .on_provisioning_started(item_id)
            .await
            .unwrap();
        assert!(started.is_applied(), "start ack was stale: {started:?}");
        let finished = self
            .orchestrator
            .on_provisioning_outcome(item_id, outcome)
            .await
            .unwrap();
        assert!(finished.is_applied(), "outcome was stale: {finished:?}");
    }

    /// Load the stored aggregate.
    pub async fn load(&self, share_id: ShareObjectId) -> ShareAggregate {
        self.store
            .load(share_id)
            .await
            .unwrap()
            .expect("share should exist")
    }

    /// Current stored request status.
    pub async fn share_status(&self, share_id: ShareObjectId) -> ShareObjectStatus {
        self.load(share_id).await.share.status
    }

    /// Current stored status of an item.
    pub async fn item_status(&self, share_id: ShareObjectId, item_id: ShareItemId) -> ShareItemStatus {
        self.load(share_id)
            .await
            .item(item_id)
            .map(|i| i.status)
            .expect("item should exist")
    }
}
