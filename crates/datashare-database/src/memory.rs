//! In-process share store backed by dashmap.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tracing::debug;

use datashare_core::error::AppError;
use datashare_core::result::AppResult;
use datashare_core::types::{ShareItemId, ShareObjectId};
use datashare_entity::share::{ShareAggregate, ShareItem, ShareItemStatus};

use crate::store::ShareStore;

/// Share store that keeps aggregates in memory.
///
/// Each aggregate is replaced wholesale on commit, which makes a commit
/// atomic for readers of that request.
#[derive(Debug, Default)]
pub struct MemoryShareStore {
    /// Request ID → aggregate.
    shares: DashMap<ShareObjectId, ShareAggregate>,
    /// Item ID → owning request ID.
    item_index: DashMap<ShareItemId, ShareObjectId>,
}

impl MemoryShareStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored requests.
    pub fn len(&self) -> usize {
        self.shares.len()
    }

    /// Whether the store holds no requests.
    pub fn is_empty(&self) -> bool {
        self.shares.is_empty()
    }

    fn index_items(&self, aggregate: &ShareAggregate) {
        for item in &aggregate.items {
            self.item_index.insert(item.id, aggregate.share.id);
        }
    }
}

#[async_trait]
impl ShareStore for MemoryShareStore {
    async fn insert(&self, aggregate: &ShareAggregate) -> AppResult<()> {
        if self.shares.contains_key(&aggregate.share.id) {
            return Err(AppError::conflict(format!(
                "Share request {} already exists",
                aggregate.share.id
            )));
        }
        self.shares.insert(aggregate.share.id, aggregate.clone());
        self.index_items(aggregate);
        debug!(share_id = %aggregate.share.id, "Inserted share aggregate");
        Ok(())
    }

    async fn load(&self, share_id: ShareObjectId) -> AppResult<Option<ShareAggregate>> {
        Ok(self.shares.get(&share_id).map(|entry| entry.value().clone()))
    }

    async fn share_id_for_item(&self, item_id: ShareItemId) -> AppResult<Option<ShareObjectId>> {
        Ok(self.item_index.get(&item_id).map(|entry| *entry.value()))
    }

    async fn commit(&self, aggregate: &ShareAggregate, removed: &[ShareItemId]) -> AppResult<()> {
        let share_id = aggregate.share.id;
        match self.shares.get_mut(&share_id) {
            Some(mut entry) => *entry = aggregate.clone(),
            None => {
                return Err(AppError::not_found(format!(
                    "Share request {share_id} not found"
                )));
            }
        }
        self.index_items(aggregate);
        for item_id in removed {
            self.item_index.remove(item_id);
        }
        debug!(
            share_id = %share_id,
            items = aggregate.items.len(),
            removed = removed.len(),
            "Committed share aggregate"
        );
        Ok(())
    }

    async fn find_items_by_status(
        &self,
        statuses: &[ShareItemStatus],
        updated_before: DateTime<Utc>,
    ) -> AppResult<Vec<ShareItem>> {
        let mut items: Vec<ShareItem> = self
            .shares
            .iter()
            .flat_map(|entry| {
                entry
                    .value()
                    .items
                    .iter()
                    .filter(|i| statuses.contains(&i.status) && i.updated_at < updated_before)
                    .cloned()
                    .collect::<Vec<_>>()
            })
            .collect();
        items.sort_by_key(|i| i.updated_at);
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use datashare_entity::share::{NewShareItem, ShareObject};

    fn aggregate() -> ShareAggregate {
        let share = ShareObject::draft("dataset://sales", "env://analytics", "team-analytics", None);
        let items = vec![
            NewShareItem::table("table://sales/orders", "orders").into_item(share.id),
            NewShareItem::folder("folder://sales/raw", "raw").into_item(share.id),
        ];
        ShareAggregate::new(share, items)
    }

    #[tokio::test]
    async fn test_insert_and_load() {
        let store = MemoryShareStore::new();
        let agg = aggregate();
        store.insert(&agg).await.unwrap();

        let loaded = store.load(agg.share.id).await.unwrap().unwrap();
        assert_eq!(loaded.items.len(), 2);
        assert_eq!(
            store.share_id_for_item(agg.items[1].id).await.unwrap(),
            Some(agg.share.id)
        );
        assert!(store.insert(&agg).await.is_err());
    }

    #[tokio::test]
    async fn test_commit_drops_removed_items_from_index() {
        let store = MemoryShareStore::new();
        let mut agg = aggregate();
        store.insert(&agg).await.unwrap();

        let removed = agg.items.remove(0);
        store.commit(&agg, &[removed.id]).await.unwrap();

        assert_eq!(store.share_id_for_item(removed.id).await.unwrap(), None);
        assert_eq!(store.load(agg.share.id).await.unwrap().unwrap().items.len(), 1);
    }

    #[tokio::test]
    async fn test_commit_unknown_share_is_not_found() {
        let store = MemoryShareStore::new();
        let err = store.commit(&aggregate(), &[]).await.unwrap_err();
        assert_eq!(err.kind, datashare_core::ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_find_items_by_status_respects_age() {
        let store = MemoryShareStore::new();
        let mut agg = aggregate();
        agg.items[0].status = ShareItemStatus::ShareInProgress;
        agg.items[0].updated_at = Utc::now() - Duration::hours(2);
        agg.items[1].status = ShareItemStatus::ShareInProgress;
        store.insert(&agg).await.unwrap();

        let stale = store
            .find_items_by_status(
                &ShareItemStatus::IN_FLIGHT,
                Utc::now() - Duration::hours(1),
            )
            .await
            .unwrap();
        assert_eq!(stale.len(), 1);
        assert_eq!(stale[0].id, agg.items[0].id);
    }
}
