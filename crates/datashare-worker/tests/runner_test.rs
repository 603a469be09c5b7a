//! Integration tests for the provisioning runner and reconciler.

mod helpers;

use std::sync::Arc;

use datashare_core::config::ProvisioningConfig;
use datashare_entity::provisioning::ProvisioningDirection;
use datashare_entity::share::ShareItemStatus;
use datashare_service::ProvisioningGateway;
use datashare_worker::Reconciler;

use helpers::{Script, TestWorker};

#[tokio::test]
async fn test_approved_items_are_provisioned() {
    let worker = TestWorker::start();
    let agg = worker
        .approved_share(&["table://sales/orders", "table://sales/customers"])
        .await;

    for item in &agg.items {
        worker
            .wait_for(agg.share.id, item.id, ShareItemStatus::ShareSucceeded)
            .await;
        assert_eq!(worker.handler.calls_for(item.id), 1);
    }
    worker.stop().await;
}

#[tokio::test]
async fn test_rejected_provisioning_marks_item_failed() {
    let worker = TestWorker::start();
    worker.handler.script("table://sales/pii", Script::Reject);
    let agg = worker.approved_share(&["table://sales/pii"]).await;

    let item_id = agg.items[0].id;
    worker
        .wait_for(agg.share.id, item_id, ShareItemStatus::ShareFailed)
        .await;
    assert_eq!(worker.handler.calls_for(item_id), 1);
    worker.stop().await;
}

#[tokio::test]
async fn test_transient_errors_are_retried() {
    let worker = TestWorker::start();
    worker
        .handler
        .script("table://sales/orders", Script::FlakyThenSucceed(2));
    let agg = worker.approved_share(&["table://sales/orders"]).await;

    let item_id = agg.items[0].id;
    worker
        .wait_for(agg.share.id, item_id, ShareItemStatus::ShareSucceeded)
        .await;
    assert_eq!(worker.handler.calls_for(item_id), 3);
    worker.stop().await;
}

#[tokio::test]
async fn test_transient_errors_exhaust_attempts() {
    let worker = TestWorker::start();
    worker
        .handler
        .script("table://sales/orders", Script::FlakyThenSucceed(10));
    let agg = worker.approved_share(&["table://sales/orders"]).await;

    let item_id = agg.items[0].id;
    worker
        .wait_for(agg.share.id, item_id, ShareItemStatus::ShareFailed)
        .await;
    assert_eq!(worker.handler.calls_for(item_id), 3);
    worker.stop().await;
}

#[tokio::test]
async fn test_duplicate_dispatch_is_processed_once() {
    let (worker, receiver) = TestWorker::stopped();
    let agg = worker.approved_share(&["table://sales/orders"]).await;
    let item = &agg.items[0];

    // The approval already enqueued the item; enqueue it again.
    worker
        .queue
        .dispatch(
            ProvisioningDirection::Grant,
            vec![agg.provisioning_request(item, ProvisioningDirection::Grant)],
        )
        .await
        .unwrap();

    let worker = worker.spawn_runner(receiver);
    worker
        .wait_for(agg.share.id, item.id, ShareItemStatus::ShareSucceeded)
        .await;
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert_eq!(worker.handler.calls_for(item.id), 1);
    worker.stop().await;
}

#[tokio::test]
async fn test_revoke_round_trip() {
    let worker = TestWorker::start();
    let agg = worker.approved_share(&["table://sales/orders"]).await;
    let item_id = agg.items[0].id;
    worker
        .wait_for(agg.share.id, item_id, ShareItemStatus::ShareSucceeded)
        .await;

    worker
        .orchestrator
        .revoke_items(&worker.approver, agg.share.id, &[item_id])
        .await
        .unwrap();
    worker
        .wait_for(agg.share.id, item_id, ShareItemStatus::RevokeSucceeded)
        .await;
    assert_eq!(worker.handler.calls_for(item_id), 2);

    worker
        .orchestrator
        .remove_item(&worker.requester, item_id)
        .await
        .unwrap();
    worker.stop().await;
}

#[tokio::test]
async fn test_reconciler_fails_stuck_items() {
    let (worker, _receiver) = TestWorker::stopped();
    let agg = worker.approved_share(&["table://sales/orders"]).await;
    let item_id = agg.items[0].id;
    worker
        .orchestrator
        .on_provisioning_started(item_id)
        .await
        .unwrap();

    let reconciler = Reconciler::new(
        Arc::clone(&worker.orchestrator),
        ProvisioningConfig {
            in_flight_timeout_seconds: 3600,
            redispatch_after_seconds: 3600,
            ..ProvisioningConfig::default()
        },
    );
    assert_eq!(reconciler.sweep().await.unwrap().force_failed, 0);

    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    let reconciler = Reconciler::new(
        Arc::clone(&worker.orchestrator),
        ProvisioningConfig {
            in_flight_timeout_seconds: 0,
            redispatch_after_seconds: 3600,
            ..ProvisioningConfig::default()
        },
    );
    let report = reconciler.sweep().await.unwrap();
    assert_eq!(report.force_failed, 1);
    assert_eq!(
        worker.load(agg.share.id).await.items[0].status,
        ShareItemStatus::ShareFailed
    );
}

#[tokio::test]
async fn test_reconciler_redispatches_stuck_approvals() {
    let (worker, mut receiver) = TestWorker::stopped();
    let agg = worker.approved_share(&["table://sales/orders"]).await;
    let item_id = agg.items[0].id;

    // Lose the original dispatch.
    assert_eq!(receiver.recv().await.unwrap().item_id, item_id);

    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    let reconciler = Reconciler::new(
        Arc::clone(&worker.orchestrator),
        ProvisioningConfig {
            in_flight_timeout_seconds: 3600,
            redispatch_after_seconds: 0,
            ..ProvisioningConfig::default()
        },
    );
    let report = reconciler.sweep().await.unwrap();
    assert_eq!(report.redispatched, 1);
    assert_eq!(receiver.recv().await.unwrap().item_id, item_id);

    let worker = worker.spawn_runner(receiver);
    worker
        .wait_for(agg.share.id, item_id, ShareItemStatus::ShareSucceeded)
        .await;
    worker.stop().await;
}
