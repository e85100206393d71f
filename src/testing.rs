//! In-memory collaborators for unit tests.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::RwLock;

use crate::error::{DeliveryError, StoreError, Unavailable};
use crate::feed::{Feed, RecipientId};
use crate::sink::DeliverySink;
use crate::source::{Asset, Release, ReleaseSource};
use crate::store::FeedStore;

/// A release with one asset per name; locators are `mem://<name>`.
pub fn release(tag: &str, assets: &[&str]) -> Release {
    Release {
        tag: tag.to_string(),
        name: tag.to_string(),
        notes: Some(format!("notes for {tag}")),
        published: None,
        assets: assets
            .iter()
            .map(|name| Asset {
                name: name.to_string(),
                locator: format!("mem://{name}"),
            })
            .collect(),
    }
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryStore {
    feeds: RwLock<BTreeMap<String, Feed>>,
    fail_writes: AtomicBool,
    upserts: AtomicUsize,
}

impl MemoryStore {
    pub fn with_feeds(feeds: Vec<Feed>) -> Self {
        Self {
            feeds: RwLock::new(feeds.into_iter().map(|f| (f.key.clone(), f)).collect()),
            ..Self::default()
        }
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn upserts(&self) -> usize {
        self.upserts.load(Ordering::SeqCst)
    }

    fn check_writable(&self) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Io {
                path: "memory".into(),
                source: std::io::Error::other("disk full"),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl FeedStore for MemoryStore {
    async fn get_all(&self) -> Result<Vec<Feed>, StoreError> {
        Ok(self.feeds.read().await.values().cloned().collect())
    }

    async fn get(&self, key: &str) -> Result<Option<Feed>, StoreError> {
        Ok(self.feeds.read().await.get(key).cloned())
    }

    async fn upsert(&self, feed: Feed) -> Result<(), StoreError> {
        self.check_writable()?;
        self.upserts.fetch_add(1, Ordering::SeqCst);
        self.feeds.write().await.insert(feed.key.clone(), feed);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        self.check_writable()?;
        Ok(self.feeds.write().await.remove(key).is_some())
    }
}

// ---------------------------------------------------------------------------
// Source
// ---------------------------------------------------------------------------

/// Repos without a configured answer are `NotFound`.
#[derive(Default)]
pub struct FakeSource {
    releases: Mutex<HashMap<String, Result<Release, Unavailable>>>,
    failing_assets: Mutex<HashMap<String, Unavailable>>,
    delay: Mutex<Duration>,
    release_fetches: AtomicUsize,
    asset_fetches: AtomicUsize,
}

impl FakeSource {
    pub fn set_release(&self, repo: &str, release: Release) {
        self.releases.lock().insert(repo.to_string(), Ok(release));
    }

    pub fn set_unavailable(&self, repo: &str, reason: Unavailable) {
        self.releases.lock().insert(repo.to_string(), Err(reason));
    }

    pub fn fail_asset(&self, name: &str, reason: Unavailable) {
        self.failing_assets.lock().insert(name.to_string(), reason);
    }

    /// Delay applied to every release lookup, to force interleaving.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = delay;
    }

    pub fn release_fetches(&self) -> usize {
        self.release_fetches.load(Ordering::SeqCst)
    }

    pub fn asset_fetches(&self) -> usize {
        self.asset_fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReleaseSource for FakeSource {
    fn name(&self) -> &str {
        "fake"
    }

    async fn fetch_latest_release(&self, repo: &str) -> Result<Release, Unavailable> {
        self.release_fetches.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.releases
            .lock()
            .get(repo)
            .cloned()
            .unwrap_or(Err(Unavailable::NotFound))
    }

    async fn fetch_asset(&self, asset: &Asset) -> Result<Bytes, Unavailable> {
        self.asset_fetches.fetch_add(1, Ordering::SeqCst);
        match self.failing_assets.lock().get(&asset.name) {
            Some(reason) => Err(reason.clone()),
            None => Ok(Bytes::from(asset.locator.clone().into_bytes())),
        }
    }
}

// ---------------------------------------------------------------------------
// Sink
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentDocument {
    pub recipient: RecipientId,
    pub filename: String,
    pub caption: Option<String>,
}

#[derive(Default)]
pub struct RecordingSink {
    sent: Mutex<Vec<SentDocument>>,
    failing: Mutex<HashSet<RecipientId>>,
}

impl RecordingSink {
    pub fn fail_for(&self, recipient: RecipientId) {
        self.failing.lock().insert(recipient);
    }

    /// Successful deliveries, in order.
    pub fn sent(&self) -> Vec<SentDocument> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl DeliverySink for RecordingSink {
    async fn send_document(
        &self,
        recipient: RecipientId,
        _payload: Bytes,
        filename: &str,
        caption: Option<&str>,
    ) -> Result<(), DeliveryError> {
        tokio::task::yield_now().await;
        if self.failing.lock().contains(&recipient) {
            return Err(DeliveryError::Transport("connection reset".into()));
        }
        self.sent.lock().push(SentDocument {
            recipient,
            filename: filename.to_string(),
            caption: caption.map(String::from),
        });
        Ok(())
    }
}
