//! Storage seam for share aggregates.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use datashare_core::result::AppResult;
use datashare_core::types::{ShareItemId, ShareObjectId};
use datashare_entity::share::{ShareAggregate, ShareItem, ShareItemStatus};

/// Loads and atomically persists a share request with the items it owns.
///
/// Callers serialize writes per request; implementations only need to make
/// each `commit` all-or-nothing.
#[async_trait]
pub trait ShareStore: Send + Sync + std::fmt::Debug + 'static {
    /// Persist a freshly created aggregate.
    async fn insert(&self, aggregate: &ShareAggregate) -> AppResult<()>;

    /// Load a request and all of its items.
    async fn load(&self, share_id: ShareObjectId) -> AppResult<Option<ShareAggregate>>;

    /// Resolve the owning request of an item.
    async fn share_id_for_item(&self, item_id: ShareItemId) -> AppResult<Option<ShareObjectId>>;

    /// Write the request row and every item in `aggregate`, and delete
    /// `removed` items, as one unit.
    async fn commit(&self, aggregate: &ShareAggregate, removed: &[ShareItemId]) -> AppResult<()>;

    /// Items currently in one of `statuses` whose status is older than
    /// `updated_before`.
    async fn find_items_by_status(
        &self,
        statuses: &[ShareItemStatus],
        updated_before: DateTime<Utc>,
    ) -> AppResult<Vec<ShareItem>>;
}
