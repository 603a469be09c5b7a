//! Share request and share item status enumerations.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Request-level status of a [`ShareObject`](super::ShareObject).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "share_object_status")]
pub enum ShareObjectStatus {
    /// Created by the requester, not yet submitted.
    Draft,
    /// Awaiting an approver decision.
    Submitted,
    /// Granted by an approver.
    Approved,
    /// Denied by an approver; may be resubmitted.
    Rejected,
    /// Logically removed. Terminal.
    Deleted,
}

impl ShareObjectStatus {
    /// Check if no further transition is possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Deleted)
    }

    /// Check if items may currently be attached.
    pub fn accepts_new_items(&self) -> bool {
        matches!(self, Self::Draft | Self::Rejected)
    }

    /// Return the status name as stored and serialized.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "Draft",
            Self::Submitted => "Submitted",
            Self::Approved => "Approved",
            Self::Rejected => "Rejected",
            Self::Deleted => "Deleted",
        }
    }
}

impl fmt::Display for ShareObjectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Per-item status of a [`ShareItem`](super::ShareItem).
///
/// Grant phase: `Share_Approved → Share_In_Progress → Share_Succeeded | Share_Failed`.
/// Revoke phase, entered from either grant result or a failed revoke:
/// `Revoke_Approved → Revoke_In_Progress → Revoke_Succeeded | Revoke_Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "share_item_status")]
pub enum ShareItemStatus {
    /// Attached, waiting for the request to be approved.
    PendingApproval,
    /// Approved for grant, waiting for the worker to pick it up.
    #[serde(rename = "Share_Approved")]
    #[sqlx(rename = "Share_Approved")]
    ShareApproved,
    /// Grant running on the worker.
    #[serde(rename = "Share_In_Progress")]
    #[sqlx(rename = "Share_In_Progress")]
    ShareInProgress,
    /// Access granted.
    #[serde(rename = "Share_Succeeded")]
    #[sqlx(rename = "Share_Succeeded")]
    ShareSucceeded,
    /// Grant failed.
    #[serde(rename = "Share_Failed")]
    #[sqlx(rename = "Share_Failed")]
    ShareFailed,
    /// Approved for revoke, waiting for the worker to pick it up.
    #[serde(rename = "Revoke_Approved")]
    #[sqlx(rename = "Revoke_Approved")]
    RevokeApproved,
    /// Revoke running on the worker.
    #[serde(rename = "Revoke_In_Progress")]
    #[sqlx(rename = "Revoke_In_Progress")]
    RevokeInProgress,
    /// Access removed.
    #[serde(rename = "Revoke_Succeeded")]
    #[sqlx(rename = "Revoke_Succeeded")]
    RevokeSucceeded,
    /// Revoke failed; access may still exist.
    #[serde(rename = "Revoke_Failed")]
    #[sqlx(rename = "Revoke_Failed")]
    RevokeFailed,
}

impl ShareItemStatus {
    /// Statuses that block removal, re-dispatch, and share deletion.
    pub const IN_FLIGHT: [Self; 2] = [Self::ShareInProgress, Self::RevokeInProgress];

    /// Statuses that have been approved but not yet picked up by a worker.
    pub const AWAITING_DISPATCH: [Self; 2] = [Self::ShareApproved, Self::RevokeApproved];

    /// Check if provisioning is running for this item.
    pub fn is_in_flight(&self) -> bool {
        Self::IN_FLIGHT.contains(self)
    }

    /// Check if the item is approved and waiting for a worker.
    pub fn is_awaiting_dispatch(&self) -> bool {
        Self::AWAITING_DISPATCH.contains(self)
    }

    /// Check if the item may be detached from its share.
    ///
    /// Only items that hold no access grant and have no work pending qualify.
    pub fn is_removable(&self) -> bool {
        matches!(
            self,
            Self::PendingApproval | Self::ShareFailed | Self::RevokeSucceeded
        )
    }

    /// Return the status name as stored and serialized.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PendingApproval => "PendingApproval",
            Self::ShareApproved => "Share_Approved",
            Self::ShareInProgress => "Share_In_Progress",
            Self::ShareSucceeded => "Share_Succeeded",
            Self::ShareFailed => "Share_Failed",
            Self::RevokeApproved => "Revoke_Approved",
            Self::RevokeInProgress => "Revoke_In_Progress",
            Self::RevokeSucceeded => "Revoke_Succeeded",
            Self::RevokeFailed => "Revoke_Failed",
        }
    }
}

impl fmt::Display for ShareItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serde_uses_wire_names() {
        let json = serde_json::to_string(&ShareItemStatus::RevokeInProgress).unwrap();
        assert_eq!(json, "\"Revoke_In_Progress\"");
        let parsed: ShareItemStatus = serde_json::from_str("\"PendingApproval\"").unwrap();
        assert_eq!(parsed, ShareItemStatus::PendingApproval);
        assert_eq!(
            serde_json::to_string(&ShareObjectStatus::Submitted).unwrap(),
            "\"Submitted\""
        );
    }

    #[test]
    fn test_removable_set() {
        let removable: Vec<_> = [
            ShareItemStatus::PendingApproval,
            ShareItemStatus::ShareApproved,
            ShareItemStatus::ShareInProgress,
            ShareItemStatus::ShareSucceeded,
            ShareItemStatus::ShareFailed,
            ShareItemStatus::RevokeApproved,
            ShareItemStatus::RevokeInProgress,
            ShareItemStatus::RevokeSucceeded,
            ShareItemStatus::RevokeFailed,
        ]
        .into_iter()
        .filter(ShareItemStatus::is_removable)
        .collect();
        assert_eq!(
            removable,
            vec![
                ShareItemStatus::PendingApproval,
                ShareItemStatus::ShareFailed,
                ShareItemStatus::RevokeSucceeded,
            ]
        );
    }

    #[test]
    fn test_display_matches_as_str() {
        assert_eq!(ShareItemStatus::ShareFailed.to_string(), "Share_Failed");
        assert_eq!(ShareObjectStatus::Deleted.to_string(), "Deleted");
    }
}
