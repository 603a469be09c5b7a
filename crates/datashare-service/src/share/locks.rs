//! Per-request mutual exclusion.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use datashare_core::types::ShareObjectId;

/// One async mutex per share request.
///
/// Every mutation of a request and its items runs while holding that
/// request's guard. Different requests never contend.
#[derive(Debug, Default)]
pub struct ShareLocks {
    /// Request ID → lock.
    locks: DashMap<ShareObjectId, Arc<Mutex<()>>>,
}

impl ShareLocks {
    /// Create an empty lock table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `share_id`.
    pub async fn acquire(&self, share_id: ShareObjectId) -> OwnedMutexGuard<()> {
        let lock = self
            .locks
            .entry(share_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        lock.lock_owned().await
    }

    /// Drop the lock entry for `share_id` if nobody holds or awaits it.
    pub fn prune(&self, share_id: ShareObjectId) {
        self.locks
            .remove_if(&share_id, |_, lock| Arc::strong_count(lock) == 1);
    }

    /// Number of tracked requests.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    /// Whether no request is tracked.
    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_share_is_exclusive() {
        let locks = Arc::new(ShareLocks::new());
        let id = ShareObjectId::new();

        let guard = locks.acquire(id).await;
        let contender = {
            let locks = Arc::clone(&locks);
            tokio::spawn(async move {
                let _guard = locks.acquire(id).await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        drop(guard);
        contender.await.unwrap();
    }

    #[tokio::test]
    async fn test_distinct_shares_do_not_block() {
        let locks = ShareLocks::new();
        let _a = locks.acquire(ShareObjectId::new()).await;
        let _b = locks.acquire(ShareObjectId::new()).await;
        assert_eq!(locks.len(), 2);
    }

    #[tokio::test]
    async fn test_prune_keeps_held_locks() {
        let locks = ShareLocks::new();
        let id = ShareObjectId::new();
        let guard = locks.acquire(id).await;
        locks.prune(id);
        assert_eq!(locks.len(), 1);
        drop(guard);
        locks.prune(id);
        assert!(locks.is_empty());
    }
}
