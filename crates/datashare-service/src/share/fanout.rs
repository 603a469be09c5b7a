//! Pure fan-out from a request-level action to item transitions.
//!
//! Planning never mutates anything; the orchestrator applies a plan to a
//! cloned aggregate, commits it, and dispatches `FanOut::dispatch` last.

use std::collections::HashSet;

use chrono::{DateTime, Utc};

use datashare_core::error::AppError;
use datashare_core::result::AppResult;
use datashare_core::types::ShareItemId;
use datashare_entity::provisioning::ProvisioningDirection;
use datashare_entity::share::{ItemAction, ShareItem, ShareItemStateMachine, ShareItemStatus};

/// One planned item status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemTransition {
    /// Target item.
    pub item_id: ShareItemId,
    /// Status before the change.
    pub from: ShareItemStatus,
    /// Status after the change.
    pub to: ShareItemStatus,
}

/// Item transitions implied by one request-level action, plus the items
/// that must be handed to the provisioning gateway afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FanOut {
    /// Direction of the provisioning work.
    pub direction: ProvisioningDirection,
    /// Status changes to commit.
    pub transitions: Vec<ItemTransition>,
    /// Items to dispatch once the changes are committed.
    pub dispatch: Vec<ShareItemId>,
}

impl FanOut {
    fn empty(direction: ProvisioningDirection) -> Self {
        Self {
            direction,
            transitions: Vec::new(),
            dispatch: Vec::new(),
        }
    }

    /// Whether the plan changes nothing.
    pub fn is_empty(&self) -> bool {
        self.transitions.is_empty()
    }

    /// Apply the planned status changes to `items`.
    pub fn apply(&self, items: &mut [ShareItem], now: DateTime<Utc>) {
        for transition in &self.transitions {
            if let Some(item) = items.iter_mut().find(|i| i.id == transition.item_id) {
                item.status = transition.to;
                item.updated_at = now;
            }
        }
    }
}

/// Plan the item side of an approval.
///
/// Only `PendingApproval` items move (to `Share_Approved`) and each is
/// dispatched exactly once; items from an earlier approval cycle are left
/// as they are.
pub fn plan_grant(items: &[ShareItem]) -> FanOut {
    let mut plan = FanOut::empty(ProvisioningDirection::Grant);
    for item in items {
        if let Ok(to) = ShareItemStateMachine::transition(item.status, ItemAction::Approve) {
            plan.transitions.push(ItemTransition {
                item_id: item.id,
                from: item.status,
                to,
            });
            plan.dispatch.push(item.id);
        }
    }
    plan
}

/// Plan a revoke of `targets`.
///
/// All-or-nothing: an unknown item, an item still being provisioned, or an
/// item that was never granted fails the whole plan. Items already
/// `Revoke_Approved` or `Revoke_Succeeded` are skipped, so repeating a
/// revoke dispatches nothing new.
pub fn plan_revoke(items: &[ShareItem], targets: &[ShareItemId]) -> AppResult<FanOut> {
    if targets.is_empty() {
        return Err(AppError::validation("At least one item must be selected to revoke"));
    }

    let mut plan = FanOut::empty(ProvisioningDirection::Revoke);
    let mut seen = HashSet::new();
    for item_id in targets {
        if !seen.insert(*item_id) {
            continue;
        }
        let item = items.iter().find(|i| i.id == *item_id).ok_or_else(|| {
            AppError::not_found(format!("Share item {item_id} not found in this request"))
        })?;

        if matches!(
            item.status,
            ShareItemStatus::RevokeApproved | ShareItemStatus::RevokeSucceeded
        ) {
            continue;
        }

        let to = ShareItemStateMachine::transition(item.status, ItemAction::Revoke)?;
        plan.transitions.push(ItemTransition {
            item_id: item.id,
            from: item.status,
            to,
        });
        plan.dispatch.push(item.id);
    }
    Ok(plan)
}

/// Items sitting in `*_Approved` whose dispatch should be retried, grouped
/// by direction.
pub fn plan_redispatch(items: &[ShareItem]) -> Vec<(ProvisioningDirection, Vec<ShareItemId>)> {
    let mut grant = Vec::new();
    let mut revoke = Vec::new();
    for item in items {
        match ShareItemStateMachine::pending_direction(item.status) {
            Some(ProvisioningDirection::Grant) => grant.push(item.id),
            Some(ProvisioningDirection::Revoke) => revoke.push(item.id),
            None => {}
        }
    }
    [
        (ProvisioningDirection::Grant, grant),
        (ProvisioningDirection::Revoke, revoke),
    ]
    .into_iter()
    .filter(|(_, ids)| !ids.is_empty())
    .collect()
}
