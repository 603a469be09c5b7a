//! Shared helpers for worker integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use datashare_core::config::WorkerConfig;
use datashare_core::types::{ShareItemId, ShareObjectId};
use datashare_database::{MemoryShareStore, ShareStore};
use datashare_entity::provisioning::ProvisioningRequest;
use datashare_entity::share::{NewShareItem, ShareAggregate, ShareItemStatus};
use datashare_service::{CreateShareRequest, RequestContext, RequestOrchestrator};
use datashare_worker::queue::ProvisioningReceiver;
use datashare_worker::{
    ProvisioningError, ProvisioningHandler, ProvisioningQueue, ProvisioningRunner,
};

/// What the scripted handler does for an item URI.
#[derive(Debug, Clone)]
pub enum Script {
    /// Succeed immediately.
    Succeed,
    /// Fail permanently.
    Reject,
    /// Fail transiently this many times, then succeed.
    FlakyThenSucceed(u32),
}

/// Handler driven by per-URI scripts; records every call.
#[derive(Debug, Default)]
pub struct ScriptedHandler {
    scripts: Mutex<HashMap<String, Script>>,
    calls: Mutex<Vec<ProvisioningRequest>>,
}

impl ScriptedHandler {
    /// Set the behaviour for one item URI.
    pub fn script(&self, item_uri: &str, script: Script) {
        self.scripts
            .lock()
            .unwrap()
            .insert(item_uri.to_string(), script);
    }

    /// Calls made for `item_id`.
    pub fn calls_for(&self, item_id: ShareItemId) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.item_id == item_id)
            .count()
    }
}

#[async_trait]
impl ProvisioningHandler for ScriptedHandler {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn provision(&self, request: &ProvisioningRequest) -> Result<(), ProvisioningError> {
        self.calls.lock().unwrap().push(request.clone());
        let mut scripts = self.scripts.lock().unwrap();
        match scripts.get_mut(&request.item_uri) {
            None | Some(Script::Succeed) => Ok(()),
            Some(Script::Reject) => Err(ProvisioningError::Rejected("principal unknown".into())),
            Some(Script::FlakyThenSucceed(0)) => Ok(()),
            Some(Script::FlakyThenSucceed(left)) => {
                *left -= 1;
                Err(ProvisioningError::Unavailable("catalog timeout".into()))
            }
        }
    }
}

/// Worker test context: orchestrator, queue, and a running runner.
pub struct TestWorker {
    /// Orchestrator wired to the queue.
    pub orchestrator: Arc<RequestOrchestrator>,
    /// Backing store.
    pub store: Arc<MemoryShareStore>,
    /// Queue gateway, for direct enqueueing.
    pub queue: ProvisioningQueue,
    /// Scripted handler.
    pub handler: Arc<ScriptedHandler>,
    /// Requester context.
    pub requester: RequestContext,
    /// Approver context.
    pub approver: RequestContext,
    cancel: watch::Sender<bool>,
    runner: Option<JoinHandle<()>>,
}

impl TestWorker {
    /// Start a runner over a fresh in-memory store.
    pub fn start() -> Self {
        let (worker, receiver) = Self::stopped();
        worker.spawn_runner(receiver)
    }

    /// Build the context without starting the runner.
    pub fn stopped() -> (Self, ProvisioningReceiver) {
        let store = Arc::new(MemoryShareStore::new());
        let (queue, receiver) = ProvisioningQueue::channel(64);
        let orchestrator = Arc::new(RequestOrchestrator::new(
            store.clone(),
            Arc::new(queue.clone()),
        ));
        let (cancel, _) = watch::channel(false);
        let worker = Self {
            orchestrator,
            store,
            queue,
            handler: Arc::new(ScriptedHandler::default()),
            requester: RequestContext::requester("team-analytics"),
            approver: RequestContext::approver("team-sales"),
            cancel,
            runner: None,
        };
        (worker, receiver)
    }

    /// Start the runner on `receiver`.
    pub fn spawn_runner(mut self, receiver: ProvisioningReceiver) -> Self {
        let config = WorkerConfig {
            concurrency: 2,
            max_attempts: 3,
            retry_delay_ms: 5,
            shutdown_grace_seconds: 5,
            ..WorkerConfig::default()
        };
        let runner = ProvisioningRunner::new(
            Arc::clone(&self.orchestrator),
            self.handler.clone(),
            config,
            "test-worker",
        );
        let cancel = self.cancel.subscribe();
        self.runner = Some(tokio::spawn(async move {
            runner.run(receiver, cancel).await;
        }));
        self
    }

    /// Signal shutdown and wait for the runner to exit.
    pub async fn stop(mut self) {
        let _ = self.cancel.send(true);
        if let Some(runner) = self.runner.take() {
            runner.await.unwrap();
        }
    }

    /// Create, submit, and approve a request with the given item URIs.
    pub async fn approved_share(&self, uris: &[&str]) -> ShareAggregate {
        let agg = self
            .orchestrator
            .create_share(
                &self.requester,
                CreateShareRequest {
                    dataset_uri: "dataset://sales".to_string(),
                    principal_uri: "env://analytics".to_string(),
                    request_purpose: None,
                    items: uris
                        .iter()
                        .map(|uri| NewShareItem::table(*uri, *uri))
                        .collect(),
                },
            )
            .await
            .unwrap();
        self.orchestrator
            .submit(&self.requester, agg.share.id)
            .await
            .unwrap();
        self.orchestrator
            .approve(&self.approver, agg.share.id)
            .await
            .unwrap();
        self.load(agg.share.id).await
    }

    /// Load the stored aggregate.
    pub async fn load(&self, share_id: ShareObjectId) -> ShareAggregate {
        self.store.load(share_id).await.unwrap().unwrap()
    }

    /// Wait until `item_id` reaches `status`, panicking after two seconds.
    pub async fn wait_for(
        &self,
        share_id: ShareObjectId,
        item_id: ShareItemId,
        status: ShareItemStatus,
    ) {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        loop {
            let current = self.load(share_id).await.item(item_id).map(|i| i.status);
            if current == Some(status) {
                return;
            }
            assert!(
                tokio::time::Instant::now() < deadline,
                "item {item_id} stuck in {current:?}, expected {status}"
            );
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}
