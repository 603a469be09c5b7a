//! The only component that mutates share requests and their items.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use datashare_auth::{PermissionGuard, ShareOperation};
use datashare_core::error::AppError;
use datashare_core::result::AppResult;
use datashare_core::types::{ShareItemId, ShareObjectId};
use datashare_database::ShareStore;
use datashare_entity::provisioning::{ProvisioningDirection, ProvisioningOutcome};
use datashare_entity::share::{
    ItemAction, NewShareItem, ShareAction, ShareAggregate, ShareItem, ShareItemStateMachine,
    ShareObject, ShareObjectStateMachine, ShareObjectStatus,
};

use super::fanout::{plan_grant, plan_redispatch, plan_revoke};
use super::locks::ShareLocks;
use super::view::{
    ApprovalResult, CallbackDisposition, CreateShareRequest, ItemFilter, RevokeResult,
    ShareDetail,
};
use crate::context::RequestContext;
use crate::provisioning::ProvisioningGateway;

/// Role-checked, serialized operations over share requests.
///
/// Every mutating operation follows the same shape: take the request's
/// lock, load the aggregate, authorize, compute the transitions on a copy,
/// commit the copy in one store call, release the lock, and only then
/// dispatch provisioning work. A failure before the commit leaves the
/// stored request untouched.
#[derive(Debug)]
pub struct RequestOrchestrator {
    /// Persistence of share aggregates.
    store: Arc<dyn ShareStore>,
    /// Outbound provisioning port.
    gateway: Arc<dyn ProvisioningGateway>,
    /// Capability table.
    guard: PermissionGuard,
    /// Per-request serialization.
    locks: ShareLocks,
}

impl RequestOrchestrator {
    /// Creates a new orchestrator with the default capability table.
    pub fn new(store: Arc<dyn ShareStore>, gateway: Arc<dyn ProvisioningGateway>) -> Self {
        Self::with_guard(store, gateway, PermissionGuard::new())
    }

    /// Creates a new orchestrator with a custom guard.
    pub fn with_guard(
        store: Arc<dyn ShareStore>,
        gateway: Arc<dyn ProvisioningGateway>,
        guard: PermissionGuard,
    ) -> Self {
        Self {
            store,
            gateway,
            guard,
            locks: ShareLocks::new(),
        }
    }

    /// The underlying store.
    pub fn store(&self) -> &Arc<dyn ShareStore> {
        &self.store
    }

    // ── Requests ─────────────────────────────────────────────────────

    /// Opens a new request in `Draft`, owned by the caller.
    pub async fn create_share(
        &self,
        ctx: &RequestContext,
        req: CreateShareRequest,
    ) -> AppResult<ShareAggregate> {
        self.guard.require(ctx.role, ShareOperation::CreateShare)?;

        if req.dataset_uri.trim().is_empty() {
            return Err(AppError::validation("Dataset reference is required"));
        }
        if req.principal_uri.trim().is_empty() {
            return Err(AppError::validation("Principal reference is required"));
        }

        let share = ShareObject::draft(
            req.dataset_uri,
            req.principal_uri,
            ctx.actor.clone(),
            req.request_purpose,
        );
        let mut aggregate = ShareAggregate::new(share, Vec::new());
        attach_items(&mut aggregate, req.items)?;

        self.store.insert(&aggregate).await?;

        info!(
            actor = %ctx.actor,
            share_id = %aggregate.share.id,
            items = aggregate.items.len(),
            "Share request created"
        );

        Ok(aggregate)
    }

    /// Reads a request with one page of its items.
    pub async fn get_share(
        &self,
        ctx: &RequestContext,
        share_id: ShareObjectId,
        filter: ItemFilter,
    ) -> AppResult<ShareDetail> {
        let aggregate = self.load(share_id).await?;
        let items: Vec<ShareItem> = aggregate
            .items
            .into_iter()
            .filter(|item| filter.matches(item))
            .collect();

        Ok(ShareDetail {
            share: aggregate.share,
            role: ctx.role,
            items: filter.page.paginate(items),
        })
    }

    /// Sends a `Draft` or `Rejected` request to the approvers.
    pub async fn submit(
        &self,
        ctx: &RequestContext,
        share_id: ShareObjectId,
    ) -> AppResult<ShareObject> {
        let _lock = self.locks.acquire(share_id).await;
        let mut aggregate = self.load(share_id).await?;

        self.guard.require(ctx.role, ShareOperation::Submit)?;
        let from = aggregate.share.status;
        let to = ShareObjectStateMachine::transition(from, ShareAction::Submit)?;

        aggregate.share.status = to;
        aggregate.share.updated_at = Utc::now();
        self.store.commit(&aggregate, &[]).await?;

        info!(
            actor = %ctx.actor,
            share_id = %share_id,
            from = %from,
            to = %to,
            "Share request submitted"
        );

        Ok(aggregate.share)
    }

    /// Approves a submitted request and dispatches every newly approved item.
    pub async fn approve(
        &self,
        ctx: &RequestContext,
        share_id: ShareObjectId,
    ) -> AppResult<ApprovalResult> {
        let (aggregate, plan) = {
            let _lock = self.locks.acquire(share_id).await;
            let mut aggregate = self.load(share_id).await?;

            self.guard.require(ctx.role, ShareOperation::Approve)?;
            let to = ShareObjectStateMachine::transition(aggregate.share.status, ShareAction::Approve)?;
            let plan = plan_grant(&aggregate.items);

            let now = Utc::now();
            plan.apply(&mut aggregate.items, now);
            aggregate.share.status = to;
            aggregate.share.updated_at = now;
            self.store.commit(&aggregate, &[]).await?;

            info!(
                actor = %ctx.actor,
                share_id = %share_id,
                approved_items = plan.dispatch.len(),
                "Share request approved"
            );

            (aggregate, plan)
        };

        let dispatched = self
            .dispatch(&aggregate, plan.direction, &plan.dispatch)
            .await;

        Ok(ApprovalResult {
            share: aggregate.share,
            dispatched,
        })
    }

    /// Rejects a submitted request. `reason` must not be blank.
    pub async fn reject(
        &self,
        ctx: &RequestContext,
        share_id: ShareObjectId,
        reason: &str,
    ) -> AppResult<ShareObject> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(AppError::validation("A reject reason is required"));
        }

        let _lock = self.locks.acquire(share_id).await;
        let mut aggregate = self.load(share_id).await?;

        self.guard.require(ctx.role, ShareOperation::Reject)?;
        let to = ShareObjectStateMachine::transition(aggregate.share.status, ShareAction::Reject)?;

        aggregate.share.status = to;
        aggregate.share.reject_purpose = Some(reason.to_string());
        aggregate.share.updated_at = Utc::now();
        self.store.commit(&aggregate, &[]).await?;

        info!(
            actor = %ctx.actor,
            share_id = %share_id,
            "Share request rejected"
        );

        Ok(aggregate.share)
    }

    /// Logically deletes a request. Fails while any item is being provisioned.
    pub async fn delete_share(&self, ctx: &RequestContext, share_id: ShareObjectId) -> AppResult<()> {
        {
            let _lock = self.locks.acquire(share_id).await;
            let mut aggregate = self.load(share_id).await?;

            self.guard.require(ctx.role, ShareOperation::DeleteShare)?;
            let to = ShareObjectStateMachine::transition(aggregate.share.status, ShareAction::Delete)?;

            let in_flight = aggregate.in_flight_items().count();
            if in_flight > 0 {
                return Err(AppError::conflict_in_flight(format!(
                    "{in_flight} item(s) are still being provisioned; wait until they are processed"
                )));
            }

            aggregate.share.status = to;
            aggregate.share.updated_at = Utc::now();
            self.store.commit(&aggregate, &[]).await?;

            info!(
                actor = %ctx.actor,
                share_id = %share_id,
                "Share request deleted"
            );
        }

        self.locks.prune(share_id);
        Ok(())
    }

    /// Changes the requester's justification.
    pub async fn update_request_purpose(
        &self,
        ctx: &RequestContext,
        share_id: ShareObjectId,
        purpose: Option<String>,
    ) -> AppResult<ShareObject> {
        let _lock = self.locks.acquire(share_id).await;
        let mut aggregate = self.load(share_id).await?;

        self.guard
            .require(ctx.role, ShareOperation::UpdateRequestPurpose)?;
        ShareObjectStateMachine::ensure_editable(aggregate.share.status)?;

        aggregate.share.request_purpose = purpose
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty());
        aggregate.share.updated_at = Utc::now();
        self.store.commit(&aggregate, &[]).await?;

        debug!(actor = %ctx.actor, share_id = %share_id, "Request purpose updated");
        Ok(aggregate.share)
    }

    /// Changes the approver's reject reason. The reason must not be blank.
    pub async fn update_reject_purpose(
        &self,
        ctx: &RequestContext,
        share_id: ShareObjectId,
        purpose: &str,
    ) -> AppResult<ShareObject> {
        let purpose = purpose.trim();
        if purpose.is_empty() {
            return Err(AppError::validation("Reject purpose must not be empty"));
        }

        let _lock = self.locks.acquire(share_id).await;
        let mut aggregate = self.load(share_id).await?;

        self.guard
            .require(ctx.role, ShareOperation::UpdateRejectPurpose)?;
        ShareObjectStateMachine::ensure_editable(aggregate.share.status)?;

        aggregate.share.reject_purpose = Some(purpose.to_string());
        aggregate.share.updated_at = Utc::now();
        self.store.commit(&aggregate, &[]).await?;

        debug!(actor = %ctx.actor, share_id = %share_id, "Reject purpose updated");
        Ok(aggregate.share)
    }

    // ── Items ────────────────────────────────────────────────────────

    /// Attaches items to a `Draft` or `Rejected` request.
    pub async fn add_items(
        &self,
        ctx: &RequestContext,
        share_id: ShareObjectId,
        items: Vec<NewShareItem>,
    ) -> AppResult<Vec<ShareItem>> {
        if items.is_empty() {
            return Err(AppError::validation("At least one item is required"));
        }

        let _lock = self.locks.acquire(share_id).await;
        let mut aggregate = self.load(share_id).await?;

        self.guard
            .authorize_add_items(ctx.role, aggregate.share.status)?;

        let first_new = aggregate.items.len();
        attach_items(&mut aggregate, items)?;
        aggregate.share.updated_at = Utc::now();
        self.store.commit(&aggregate, &[]).await?;

        let added = aggregate.items.split_off(first_new);
        info!(
            actor = %ctx.actor,
            share_id = %share_id,
            added = added.len(),
            "Items added to share request"
        );

        Ok(added)
    }

    /// Detaches one item. Only `PendingApproval`, `Share_Failed` and
    /// `Revoke_Succeeded` items can be removed, whatever the request status.
    pub async fn remove_item(&self, ctx: &RequestContext, item_id: ShareItemId) -> AppResult<()> {
        let share_id = self.owner_of(item_id).await?;

        let _lock = self.locks.acquire(share_id).await;
        let mut aggregate = self.load(share_id).await?;
        let status = aggregate
            .item(item_id)
            .map(|item| item.status)
            .ok_or_else(|| AppError::not_found(format!("Share item {item_id} not found")))?;

        self.guard.authorize_remove_item(ctx.role, status)?;

        aggregate.items.retain(|item| item.id != item_id);
        aggregate.share.updated_at = Utc::now();
        self.store.commit(&aggregate, &[item_id]).await?;

        info!(
            actor = %ctx.actor,
            share_id = %share_id,
            item_id = %item_id,
            status = %status,
            "Item removed from share request"
        );

        Ok(())
    }

    /// Starts tearing down access for the given items.
    ///
    /// All-or-nothing: if any target cannot be revoked nothing changes.
    /// Targets already being revoked or already revoked are skipped.
    pub async fn revoke_items(
        &self,
        ctx: &RequestContext,
        share_id: ShareObjectId,
        item_ids: &[ShareItemId],
    ) -> AppResult<RevokeResult> {
        let (aggregate, plan) = {
            let _lock = self.locks.acquire(share_id).await;
            let mut aggregate = self.load(share_id).await?;

            self.guard.require(ctx.role, ShareOperation::RevokeItems)?;
            ShareObjectStateMachine::ensure_editable(aggregate.share.status)?;

            let plan = plan_revoke(&aggregate.items, item_ids)?;
            if !plan.is_empty() {
                let now = Utc::now();
                plan.apply(&mut aggregate.items, now);
                aggregate.share.updated_at = now;
                self.store.commit(&aggregate, &[]).await?;

                info!(
                    actor = %ctx.actor,
                    share_id = %share_id,
                    revoked_items = plan.dispatch.len(),
                    "Item revoke approved"
                );
            }

            (aggregate, plan)
        };

        let dispatched = self
            .dispatch(&aggregate, plan.direction, &plan.dispatch)
            .await;

        let targets: HashSet<ShareItemId> = item_ids.iter().copied().collect();
        let items = aggregate
            .items
            .into_iter()
            .filter(|item| targets.contains(&item.id))
            .collect();

        Ok(RevokeResult { items, dispatched })
    }

    // ── Provisioning callbacks ───────────────────────────────────────

    /// Records that the worker picked up an item (`*_Approved → *_In_Progress`).
    ///
    /// The worker must only process the item when this returns
    /// [`CallbackDisposition::Applied`]; anything else means another worker
    /// already owns it or the request moved on.
    pub async fn on_provisioning_started(
        &self,
        item_id: ShareItemId,
    ) -> AppResult<CallbackDisposition> {
        self.apply_callback(item_id, ItemAction::Start, "started")
            .await
    }

    /// Folds a terminal provisioning outcome into the item.
    ///
    /// Only items in `*_In_Progress` are affected; duplicate, late or
    /// unknown callbacks are logged and reported as stale.
    pub async fn on_provisioning_outcome(
        &self,
        item_id: ShareItemId,
        outcome: ProvisioningOutcome,
    ) -> AppResult<CallbackDisposition> {
        match &outcome {
            ProvisioningOutcome::Succeeded => {
                self.apply_callback(item_id, ItemAction::Success, "succeeded")
                    .await
            }
            ProvisioningOutcome::Failed { detail } => {
                warn!(item_id = %item_id, detail = %detail, "Provisioning reported failure");
                self.apply_callback(item_id, ItemAction::Failure, "failed")
                    .await
            }
        }
    }

    /// Forces an in-progress item into its failed status.
    ///
    /// Used when no outcome arrives in time. Fails with `InvalidTransition`
    /// when the item is not in progress.
    pub async fn force_fail(&self, item_id: ShareItemId, reason: &str) -> AppResult<ShareItem> {
        self.fail_in_flight(item_id, None, reason)
            .await?
            .ok_or_else(|| AppError::internal(format!("Item {item_id} was not force-failed")))
    }

    /// Like [`force_fail`](Self::force_fail), but only if the item has not
    /// been touched since `stale_before`.
    ///
    /// Returns `None` when the item moved on after that instant. The age is
    /// checked under the request lock, so an item that was restarted since
    /// a scan is left alone.
    pub async fn force_fail_if_stale(
        &self,
        item_id: ShareItemId,
        stale_before: DateTime<Utc>,
        reason: &str,
    ) -> AppResult<Option<ShareItem>> {
        self.fail_in_flight(item_id, Some(stale_before), reason).await
    }

    async fn fail_in_flight(
        &self,
        item_id: ShareItemId,
        stale_before: Option<DateTime<Utc>>,
        reason: &str,
    ) -> AppResult<Option<ShareItem>> {
        let share_id = self.owner_of(item_id).await?;

        let _lock = self.locks.acquire(share_id).await;
        let mut aggregate = self.load(share_id).await?;
        let now = Utc::now();
        let item = aggregate
            .item_mut(item_id)
            .ok_or_else(|| AppError::not_found(format!("Share item {item_id} not found")))?;

        let from = item.status;
        if !from.is_in_flight() {
            return Err(AppError::invalid_transition(format!(
                "Only in-progress items can be force-failed; item is {from}"
            )));
        }
        if stale_before.is_some_and(|cutoff| item.updated_at >= cutoff) {
            return Ok(None);
        }
        let to = ShareItemStateMachine::transition(from, ItemAction::Failure)?;
        item.status = to;
        item.updated_at = now;
        let item = item.clone();

        self.store.commit(&aggregate, &[]).await?;

        warn!(
            share_id = %share_id,
            item_id = %item_id,
            from = %from,
            to = %to,
            reason = %reason,
            "Item force-failed"
        );

        Ok(Some(item))
    }

    /// Retries the dispatch step for items left in `*_Approved`.
    ///
    /// Returns the items handed to the gateway. Deleted requests are skipped.
    pub async fn redispatch_approved(&self, share_id: ShareObjectId) -> AppResult<Vec<ShareItemId>> {
        let (aggregate, groups) = {
            let _lock = self.locks.acquire(share_id).await;
            let mut aggregate = self.load(share_id).await?;

            if aggregate.share.status.is_terminal() {
                debug!(share_id = %share_id, "Skipping redispatch for deleted share request");
                return Ok(Vec::new());
            }

            let groups = plan_redispatch(&aggregate.items);
            if groups.is_empty() {
                return Ok(Vec::new());
            }

            // Stamp the attempt so periodic sweeps wait a full interval again.
            let now = Utc::now();
            for (_, ids) in &groups {
                for id in ids {
                    if let Some(item) = aggregate.item_mut(*id) {
                        item.updated_at = now;
                    }
                }
            }
            self.store.commit(&aggregate, &[]).await?;
            (aggregate, groups)
        };

        let mut dispatched = Vec::new();
        for (direction, ids) in groups {
            dispatched.extend(self.dispatch(&aggregate, direction, &ids).await);
        }

        if !dispatched.is_empty() {
            info!(
                share_id = %share_id,
                items = dispatched.len(),
                "Approved items redispatched"
            );
        }

        Ok(dispatched)
    }

    // ── Internals ────────────────────────────────────────────────────

    async fn load(&self, share_id: ShareObjectId) -> AppResult<ShareAggregate> {
        self.store
            .load(share_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Share request {share_id} not found")))
    }

    async fn owner_of(&self, item_id: ShareItemId) -> AppResult<ShareObjectId> {
        self.store
            .share_id_for_item(item_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Share item {item_id} not found")))
    }

    async fn apply_callback(
        &self,
        item_id: ShareItemId,
        action: ItemAction,
        label: &'static str,
    ) -> AppResult<CallbackDisposition> {
        let Some(share_id) = self.store.share_id_for_item(item_id).await? else {
            warn!(item_id = %item_id, callback = label, "Callback for unknown item ignored");
            return Ok(CallbackDisposition::Stale { status: None });
        };

        let _lock = self.locks.acquire(share_id).await;
        let Some(mut aggregate) = self.store.load(share_id).await? else {
            warn!(item_id = %item_id, callback = label, "Callback for unknown share request ignored");
            return Ok(CallbackDisposition::Stale { status: None });
        };

        let share_status = aggregate.share.status;
        let now = Utc::now();
        let Some(item) = aggregate.item_mut(item_id) else {
            warn!(item_id = %item_id, callback = label, "Callback for removed item ignored");
            return Ok(CallbackDisposition::Stale { status: None });
        };

        let from = item.status;
        if action == ItemAction::Start && share_status == ShareObjectStatus::Deleted {
            warn!(
                share_id = %share_id,
                item_id = %item_id,
                "Provisioning start for deleted share request ignored"
            );
            return Ok(CallbackDisposition::Stale { status: Some(from) });
        }

        let Ok(to) = ShareItemStateMachine::transition(from, action) else {
            warn!(
                share_id = %share_id,
                item_id = %item_id,
                status = %from,
                callback = label,
                "Stale provisioning callback ignored"
            );
            return Ok(CallbackDisposition::Stale { status: Some(from) });
        };

        item.status = to;
        item.updated_at = now;
        self.store.commit(&aggregate, &[]).await?;

        info!(
            share_id = %share_id,
            item_id = %item_id,
            from = %from,
            to = %to,
            "Provisioning {label}"
        );

        Ok(CallbackDisposition::Applied { item_id, from, to })
    }

    /// Hands committed `*_Approved` items to the gateway.
    ///
    /// A failed dispatch is logged and reported as an empty result; the
    /// items stay approved until [`Self::redispatch_approved`] runs.
    async fn dispatch(
        &self,
        aggregate: &ShareAggregate,
        direction: ProvisioningDirection,
        item_ids: &[ShareItemId],
    ) -> Vec<ShareItemId> {
        if item_ids.is_empty() {
            return Vec::new();
        }

        let requests = item_ids
            .iter()
            .filter_map(|id| aggregate.item(*id))
            .map(|item| aggregate.provisioning_request(item, direction))
            .collect::<Vec<_>>();

        match self.gateway.dispatch(direction, requests).await {
            Ok(()) => {
                debug!(
                    share_id = %aggregate.share.id,
                    direction = %direction,
                    items = item_ids.len(),
                    "Provisioning dispatched"
                );
                item_ids.to_vec()
            }
            Err(e) => {
                error!(
                    share_id = %aggregate.share.id,
                    direction = %direction,
                    items = item_ids.len(),
                    error = %e,
                    "Provisioning dispatch failed; items stay approved for redispatch"
                );
                Vec::new()
            }
        }
    }
}

/// Validate and append new items as `PendingApproval`.
fn attach_items(aggregate: &mut ShareAggregate, items: Vec<NewShareItem>) -> AppResult<()> {
    for new_item in items {
        if new_item.item_uri.trim().is_empty() {
            return Err(AppError::validation("Item reference is required"));
        }
        if aggregate.contains_uri(&new_item.item_uri) {
            return Err(AppError::conflict(format!(
                "Item {} is already part of this share request",
                new_item.item_uri
            )));
        }
        let item = new_item.into_item(aggregate.share.id);
        aggregate.items.push(item);
    }
    Ok(())
}
