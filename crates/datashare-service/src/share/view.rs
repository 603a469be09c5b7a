//! Request and response shapes of the orchestrator operations.

use serde::{Deserialize, Serialize};

use datashare_core::types::{PageRequest, PageResponse, ShareItemId};
use datashare_entity::share::{NewShareItem, ShareItem, ShareItemStatus, ShareObject, ShareRole};

/// Request to open a new share request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateShareRequest {
    /// Dataset whose items are requested.
    pub dataset_uri: String,
    /// Consuming party or environment.
    pub principal_uri: String,
    /// Why the requester needs the data.
    pub request_purpose: Option<String>,
    /// Items to attach right away.
    #[serde(default)]
    pub items: Vec<NewShareItem>,
}

/// Which items to include when reading a request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ItemFilter {
    /// Only items in one of these statuses; all items when absent.
    pub statuses: Option<Vec<ShareItemStatus>>,
    /// Page of items to return.
    #[serde(default)]
    pub page: PageRequest,
}

impl ItemFilter {
    /// Whether `item` passes the status filter.
    pub fn matches(&self, item: &ShareItem) -> bool {
        self.statuses
            .as_ref()
            .is_none_or(|statuses| statuses.contains(&item.status))
    }
}

/// A request as seen by one caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShareDetail {
    /// The request.
    pub share: ShareObject,
    /// The caller's role for this request.
    pub role: ShareRole,
    /// One page of the request's items.
    pub items: PageResponse<ShareItem>,
}

/// Outcome of an approval.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalResult {
    /// The approved request.
    pub share: ShareObject,
    /// Items handed to the provisioning gateway; empty if the dispatch
    /// failed and will be retried.
    pub dispatched: Vec<ShareItemId>,
}

/// Outcome of a revoke.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevokeResult {
    /// The targeted items after the revoke.
    pub items: Vec<ShareItem>,
    /// Items handed to the provisioning gateway.
    pub dispatched: Vec<ShareItemId>,
}

/// What a provisioning callback did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "disposition", rename_all = "snake_case")]
pub enum CallbackDisposition {
    /// The item moved from one status to another.
    Applied {
        /// The item.
        item_id: ShareItemId,
        /// Status before the callback.
        from: ShareItemStatus,
        /// Status after the callback.
        to: ShareItemStatus,
    },
    /// The callback did not match the item's current status and was
    /// discarded. `status` is `None` when the item no longer exists.
    Stale {
        /// Current status of the item, if any.
        status: Option<ShareItemStatus>,
    },
}

impl CallbackDisposition {
    /// Whether the callback changed state.
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied { .. })
    }
}
