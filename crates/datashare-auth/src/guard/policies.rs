//! Role-to-operation mapping definitions.

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use datashare_entity::share::ShareRole;

/// An operation on a share request that requires a capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShareOperation {
    // Requester side
    /// Create a new draft request.
    CreateShare,
    /// Attach items to a request.
    AddItem,
    /// Detach an item from a request.
    RemoveItem,
    /// Send the request to the approvers.
    Submit,
    /// Edit the request purpose.
    UpdateRequestPurpose,
    /// Logically delete the request.
    DeleteShare,

    // Approver side
    /// Grant the request.
    Approve,
    /// Deny the request.
    Reject,
    /// Edit the reject purpose.
    UpdateRejectPurpose,
    /// Tear down access for granted items.
    RevokeItems,
}

impl fmt::Display for ShareOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::CreateShare => "createShare",
            Self::AddItem => "addItem",
            Self::RemoveItem => "removeItem",
            Self::Submit => "submit",
            Self::UpdateRequestPurpose => "updateRequestPurpose",
            Self::DeleteShare => "deleteShare",
            Self::Approve => "approve",
            Self::Reject => "reject",
            Self::UpdateRejectPurpose => "updateRejectPurpose",
            Self::RevokeItems => "revokeItems",
        };
        write!(f, "{name}")
    }
}

/// Maps each role to the operations it may perform.
///
/// The two roles have disjoint capability sets.
#[derive(Debug, Clone)]
pub struct CapabilityTable {
    /// Role → set of operations.
    capabilities: HashMap<ShareRole, HashSet<ShareOperation>>,
}

impl CapabilityTable {
    /// Creates the default capability table.
    pub fn new() -> Self {
        let mut capabilities = HashMap::new();

        let requester: HashSet<ShareOperation> = [
            ShareOperation::CreateShare,
            ShareOperation::AddItem,
            ShareOperation::RemoveItem,
            ShareOperation::Submit,
            ShareOperation::UpdateRequestPurpose,
            ShareOperation::DeleteShare,
        ]
        .into_iter()
        .collect();
        capabilities.insert(ShareRole::Requester, requester);

        let approver: HashSet<ShareOperation> = [
            ShareOperation::Approve,
            ShareOperation::Reject,
            ShareOperation::UpdateRejectPurpose,
            ShareOperation::RevokeItems,
        ]
        .into_iter()
        .collect();
        capabilities.insert(ShareRole::Approver, approver);

        Self { capabilities }
    }

    /// Checks whether the role may perform the operation.
    pub fn allows(&self, role: ShareRole, operation: ShareOperation) -> bool {
        self.capabilities
            .get(&role)
            .map(|ops| ops.contains(&operation))
            .unwrap_or(false)
    }
}

impl Default for CapabilityTable {
    fn default() -> Self {
        Self::new()
    }
}
