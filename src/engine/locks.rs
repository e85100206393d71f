//! Keyed single-flight guard.
//!
//! Every code path that reads-modifies-writes a feed record (a poll cycle
//! committing a version, an admin edit, a subscribe) takes the feed's lock
//! first.  Two overlapping poll cycles therefore process the same feed one
//! after the other, and the second one re-reads the committed version.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Registry of per-feed async mutexes.  Cheap to clone; clones share state.
#[derive(Debug, Clone, Default)]
pub struct FeedLocks {
    inner: Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>,
}

impl FeedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to the feed `key`.
    pub async fn lock(&self, key: &str) -> OwnedMutexGuard<()> {
        let slot = {
            let mut map = self.inner.lock();
            Arc::clone(map.entry(key.to_string()).or_default())
        };
        slot.lock_owned().await
    }

    /// Drop the slot for a deleted feed.
    ///
    /// The slot is kept while any task still holds or waits on it, otherwise
    /// a later `lock` would hand out a second, independent mutex for the same
    /// key.  Slots are only cloned under the map lock, so the count is exact.
    pub fn forget(&self, key: &str) {
        let mut map = self.inner.lock();
        if map.get(key).is_some_and(|slot| Arc::strong_count(slot) == 1) {
            map.remove(key);
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.inner.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn same_key_is_exclusive() {
        let locks = FeedLocks::new();
        let guard = locks.lock("a").await;

        let other = locks.clone();
        let waiter = tokio::spawn(async move {
            let _g = other.lock("a").await;
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(guard);
        waiter.await.unwrap();
    }

    #[tokio::test]
    async fn different_keys_do_not_block() {
        let locks = FeedLocks::new();
        let _a = locks.lock("a").await;
        let b = tokio::time::timeout(Duration::from_millis(100), locks.lock("b")).await;
        assert!(b.is_ok());
    }

    #[tokio::test]
    async fn forget_removes_slot() {
        let locks = FeedLocks::new();
        drop(locks.lock("a").await);
        assert_eq!(locks.len(), 1);
        locks.forget("a");
        assert_eq!(locks.len(), 0);
    }

    #[tokio::test]
    async fn forget_while_waited_on_keeps_key_exclusive() {
        let locks = FeedLocks::new();
        let guard = locks.lock("app").await;

        let (acquired_tx, acquired_rx) = tokio::sync::oneshot::channel();
        let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();
        let other = locks.clone();
        let waiter = tokio::spawn(async move {
            let _g = other.lock("app").await;
            let _ = acquired_tx.send(());
            let _ = release_rx.await;
        });
        tokio::time::sleep(Duration::from_millis(20)).await;

        // Delete path: release, then forget while the waiter is queued.
        drop(guard);
        locks.forget("app");
        acquired_rx.await.unwrap();

        let second = tokio::time::timeout(Duration::from_millis(50), locks.lock("app")).await;
        assert!(second.is_err(), "a second holder got the key while the first still held it");

        release_tx.send(()).unwrap();
        waiter.await.unwrap();
        drop(locks.lock("app").await);
        locks.forget("app");
        assert_eq!(locks.len(), 0);
    }
}
