//! Share request and share item entity models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use datashare_core::types::{ShareItemId, ShareObjectId};

use super::status::{ShareItemStatus, ShareObjectStatus};
use crate::provisioning::{ProvisioningDirection, ProvisioningRequest};

/// Kind of data unit targeted by a share item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "share_item_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ItemType {
    /// A catalog table.
    Table,
    /// A storage folder.
    Folder,
}

/// One sharing request: a principal asking for items of a dataset.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ShareObject {
    /// Unique request identifier.
    pub id: ShareObjectId,
    /// Dataset whose items are requested.
    pub dataset_uri: String,
    /// Consuming party or environment.
    pub principal_uri: String,
    /// Request-level status.
    pub status: ShareObjectStatus,
    /// Why the requester needs the data.
    pub request_purpose: Option<String>,
    /// Why the approver rejected the request; kept across resubmission.
    pub reject_purpose: Option<String>,
    /// Identity that created the request.
    pub owner: String,
    /// When the request was created.
    pub created_at: DateTime<Utc>,
    /// When the request was last changed.
    pub updated_at: DateTime<Utc>,
}

impl ShareObject {
    /// Create a new request in `Draft`.
    pub fn draft(
        dataset_uri: impl Into<String>,
        principal_uri: impl Into<String>,
        owner: impl Into<String>,
        request_purpose: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: ShareObjectId::new(),
            dataset_uri: dataset_uri.into(),
            principal_uri: principal_uri.into(),
            status: ShareObjectStatus::Draft,
            request_purpose,
            reject_purpose: None,
            owner: owner.into(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// One table or folder targeted by a request.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ShareItem {
    /// Unique item identifier.
    pub id: ShareItemId,
    /// Owning request.
    pub share_id: ShareObjectId,
    /// Table or folder.
    pub item_type: ItemType,
    /// External reference of the table or folder.
    pub item_uri: String,
    /// Display name of the table or folder.
    pub item_name: String,
    /// Item-level status.
    pub status: ShareItemStatus,
    /// When the item was attached.
    pub created_at: DateTime<Utc>,
    /// When the status last changed.
    pub updated_at: DateTime<Utc>,
}

/// Data required to attach an item to a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewShareItem {
    /// Table or folder.
    pub item_type: ItemType,
    /// External reference of the table or folder.
    pub item_uri: String,
    /// Display name.
    pub item_name: String,
}

impl NewShareItem {
    /// Describe a table to attach.
    pub fn table(item_uri: impl Into<String>, item_name: impl Into<String>) -> Self {
        Self {
            item_type: ItemType::Table,
            item_uri: item_uri.into(),
            item_name: item_name.into(),
        }
    }

    /// Describe a folder to attach.
    pub fn folder(item_uri: impl Into<String>, item_name: impl Into<String>) -> Self {
        Self {
            item_type: ItemType::Folder,
            item_uri: item_uri.into(),
            item_name: item_name.into(),
        }
    }

    /// Materialize the description as a `PendingApproval` item of `share_id`.
    pub fn into_item(self, share_id: ShareObjectId) -> ShareItem {
        let now = Utc::now();
        ShareItem {
            id: ShareItemId::new(),
            share_id,
            item_type: self.item_type,
            item_uri: self.item_uri,
            item_name: self.item_name,
            status: ShareItemStatus::PendingApproval,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A request together with every item it owns; the unit of consistency.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShareAggregate {
    /// The request.
    pub share: ShareObject,
    /// Items owned by the request.
    pub items: Vec<ShareItem>,
}

impl ShareAggregate {
    /// Bundle a request with its items.
    pub fn new(share: ShareObject, items: Vec<ShareItem>) -> Self {
        Self { share, items }
    }

    /// Find an owned item.
    pub fn item(&self, item_id: ShareItemId) -> Option<&ShareItem> {
        self.items.iter().find(|i| i.id == item_id)
    }

    /// Find an owned item mutably.
    pub fn item_mut(&mut self, item_id: ShareItemId) -> Option<&mut ShareItem> {
        self.items.iter_mut().find(|i| i.id == item_id)
    }

    /// Whether an item with this external reference is already attached.
    pub fn contains_uri(&self, item_uri: &str) -> bool {
        self.items.iter().any(|i| i.item_uri == item_uri)
    }

    /// Items whose provisioning is currently running.
    pub fn in_flight_items(&self) -> impl Iterator<Item = &ShareItem> {
        self.items.iter().filter(|i| i.status.is_in_flight())
    }

    /// Build the gateway request for an owned item.
    pub fn provisioning_request(
        &self,
        item: &ShareItem,
        direction: ProvisioningDirection,
    ) -> ProvisioningRequest {
        ProvisioningRequest {
            item_id: item.id,
            share_id: self.share.id,
            item_type: item.item_type,
            item_uri: item.item_uri.clone(),
            dataset_uri: self.share.dataset_uri.clone(),
            principal_uri: self.share.principal_uri.clone(),
            direction,
        }
    }
}
