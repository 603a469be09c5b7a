//! Provisioning work descriptors exchanged with the provisioning gateway.

use std::fmt;

use serde::{Deserialize, Serialize};

use datashare_core::types::{ShareItemId, ShareObjectId};

use crate::share::ItemType;

/// Whether access is being granted or torn down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProvisioningDirection {
    /// Create the access grant.
    Grant,
    /// Remove the access grant.
    Revoke,
}

impl ProvisioningDirection {
    /// Return the direction as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Grant => "grant",
            Self::Revoke => "revoke",
        }
    }
}

impl fmt::Display for ProvisioningDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One unit of provisioning work handed to the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisioningRequest {
    /// The item to provision.
    pub item_id: ShareItemId,
    /// The owning share request.
    pub share_id: ShareObjectId,
    /// Table or folder.
    pub item_type: ItemType,
    /// External reference of the table or folder.
    pub item_uri: String,
    /// Dataset the item belongs to.
    pub dataset_uri: String,
    /// Consuming principal receiving (or losing) access.
    pub principal_uri: String,
    /// Grant or revoke.
    pub direction: ProvisioningDirection,
}

/// Terminal result reported by the gateway for one item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "lowercase")]
pub enum ProvisioningOutcome {
    /// Access was created or removed.
    Succeeded,
    /// Provisioning failed; the item records the failed status.
    Failed {
        /// Worker-supplied reason, logged only.
        detail: String,
    },
}

impl ProvisioningOutcome {
    /// Build a failure outcome.
    pub fn failed(detail: impl Into<String>) -> Self {
        Self::Failed {
            detail: detail.into(),
        }
    }

    /// Whether the outcome is a success.
    pub fn succeeded(&self) -> bool {
        matches!(self, Self::Succeeded)
    }
}
