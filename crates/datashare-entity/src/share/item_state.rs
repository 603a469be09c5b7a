//! Item-level state machine.
//!
//! Request-level actions move items into an `*_Approved` status; the
//! provisioning worker then drives `Start` and `Success`/`Failure`.

use serde::{Deserialize, Serialize};
use std::fmt;

use datashare_core::error::AppError;
use datashare_core::result::AppResult;

use super::status::ShareItemStatus;
use crate::provisioning::ProvisioningDirection;

/// Actions that change an item's status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemAction {
    /// The owning request was approved.
    Approve,
    /// An approver asked for access to be torn down.
    Revoke,
    /// The worker acknowledged the dispatch and started provisioning.
    Start,
    /// The worker reported success.
    Success,
    /// The worker reported failure, or the item timed out.
    Failure,
}

impl fmt::Display for ItemAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Approve => "approve",
            Self::Revoke => "revoke",
            Self::Start => "start",
            Self::Success => "success",
            Self::Failure => "failure",
        };
        write!(f, "{name}")
    }
}

/// Transition table for [`ShareItemStatus`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ShareItemStateMachine;

impl ShareItemStateMachine {
    /// Compute the status reached by applying `action` in `from`.
    pub fn transition(from: ShareItemStatus, action: ItemAction) -> AppResult<ShareItemStatus> {
        use ShareItemStatus::*;

        let to = match (from, action) {
            (PendingApproval, ItemAction::Approve) => ShareApproved,

            (ShareSucceeded | ShareFailed | RevokeFailed, ItemAction::Revoke) => RevokeApproved,
            (ShareInProgress | RevokeInProgress, ItemAction::Revoke) => {
                return Err(AppError::conflict_in_flight(format!(
                    "Item is {from}; wait for provisioning to finish before revoking"
                )));
            }

            (ShareApproved, ItemAction::Start) => ShareInProgress,
            (RevokeApproved, ItemAction::Start) => RevokeInProgress,

            (ShareInProgress, ItemAction::Success) => ShareSucceeded,
            (ShareInProgress, ItemAction::Failure) => ShareFailed,
            (RevokeInProgress, ItemAction::Success) => RevokeSucceeded,
            (RevokeInProgress, ItemAction::Failure) => RevokeFailed,

            _ => {
                return Err(AppError::invalid_transition(format!(
                    "Cannot apply {action} to an item in status {from}"
                )));
            }
        };
        Ok(to)
    }

    /// Whether `action` is legal in `from`.
    pub fn can(from: ShareItemStatus, action: ItemAction) -> bool {
        Self::transition(from, action).is_ok()
    }

    /// Check that an item in `status` may be detached from its request.
    ///
    /// Items with work queued or running fail with `ConflictInFlight` and
    /// may be retried later; items that still hold access must be revoked
    /// first and fail with `InvalidTransition`.
    pub fn check_removable(status: ShareItemStatus) -> AppResult<()> {
        if status.is_removable() {
            return Ok(());
        }
        if status.is_in_flight() || status.is_awaiting_dispatch() {
            return Err(AppError::conflict_in_flight(format!(
                "Item is {status}; wait until it is processed"
            )));
        }
        Err(AppError::invalid_transition(format!(
            "Item is {status}; revoke access to this item before deleting"
        )))
    }

    /// Direction of provisioning work implied by an `*_Approved` status.
    pub fn pending_direction(status: ShareItemStatus) -> Option<ProvisioningDirection> {
        match status {
            ShareItemStatus::ShareApproved => Some(ProvisioningDirection::Grant),
            ShareItemStatus::RevokeApproved => Some(ProvisioningDirection::Revoke),
            _ => None,
        }
    }
}
