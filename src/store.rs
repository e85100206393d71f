//! Feed persistence.
//!
//! [`FeedStore`] is the four-operation table the engine and the admin
//! surface consume.  [`JsonFileStore`] is the implementation used by the
//! binary: the whole table lives in memory and is written through to a
//! single JSON document on every mutation.
//!
//! ## On-disk layout
//!
//! ```json
//! { "feeds": [ { "key": "...", "asset_filters": ["*.apk"], ... } ] }
//! ```
//!
//! List and set fields are plain JSON arrays.  Writes go to a sibling
//! `*.tmp` file which is then renamed over the real one, so readers never
//! observe a half-written table.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::error::StoreError;
use crate::feed::Feed;

/// Persistent table of [`Feed`] records keyed by [`Feed::key`].
#[async_trait]
pub trait FeedStore: Send + Sync {
    async fn get_all(&self) -> Result<Vec<Feed>, StoreError>;

    async fn get(&self, key: &str) -> Result<Option<Feed>, StoreError>;

    /// Insert or replace the record with `feed.key`.
    async fn upsert(&self, feed: Feed) -> Result<(), StoreError>;

    /// Remove a record.  Returns whether it existed.
    async fn delete(&self, key: &str) -> Result<bool, StoreError>;
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Document {
    #[serde(default)]
    feeds: Vec<Feed>,
}

/// A [`FeedStore`] backed by one JSON file.
pub struct JsonFileStore {
    path: PathBuf,
    feeds: RwLock<BTreeMap<String, Feed>>,
}

impl JsonFileStore {
    /// Open the store at `path`, loading any existing table.  A missing file
    /// is an empty store; the file is created on the first write.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let feeds = match tokio::fs::read(&path).await {
            Ok(raw) => {
                let doc: Document = serde_json::from_slice(&raw)?;
                doc.feeds.into_iter().map(|f| (f.key.clone(), f)).collect()
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(source) => return Err(StoreError::Io { path, source }),
        };
        info!(path = %path.display(), feeds = feeds.len(), "feed store opened");
        Ok(Self {
            path,
            feeds: RwLock::new(feeds),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self, feeds: &BTreeMap<String, Feed>) -> Result<(), StoreError> {
        let doc = Document {
            feeds: feeds.values().cloned().collect(),
        };
        let raw = serde_json::to_vec_pretty(&doc)?;

        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, &raw)
            .await
            .map_err(|source| StoreError::Io { path: tmp.clone(), source })?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|source| StoreError::Io { path: self.path.clone(), source })?;
        debug!(path = %self.path.display(), feeds = feeds.len(), "feed store written");
        Ok(())
    }
}

#[async_trait]
impl FeedStore for JsonFileStore {
    async fn get_all(&self) -> Result<Vec<Feed>, StoreError> {
        Ok(self.feeds.read().await.values().cloned().collect())
    }

    async fn get(&self, key: &str) -> Result<Option<Feed>, StoreError> {
        Ok(self.feeds.read().await.get(key).cloned())
    }

    async fn upsert(&self, feed: Feed) -> Result<(), StoreError> {
        let mut feeds = self.feeds.write().await;
        let mut next = feeds.clone();
        next.insert(feed.key.clone(), feed);
        // Only swap the in-memory table once the disk agrees with it.
        self.persist(&next).await?;
        *feeds = next;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        let mut feeds = self.feeds.write().await;
        if !feeds.contains_key(key) {
            return Ok(false);
        }
        let mut next = feeds.clone();
        next.remove(key);
        self.persist(&next).await?;
        *feeds = next;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::Recipient;

    fn feed(key: &str) -> Feed {
        let mut f = Feed::new(key, key.to_uppercase(), "", "owner/name");
        f.asset_filters = vec!["*.apk".into()];
        f
    }

    #[tokio::test]
    async fn missing_file_opens_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(dir.path().join("feeds.json")).await.unwrap();
        assert!(store.get_all().await.unwrap().is_empty());
        assert!(store.get("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn upsert_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("feeds.json");

        let store = JsonFileStore::open(&path).await.unwrap();
        let mut a = feed("a");
        a.subscribe(Recipient::User(7));
        a.subscribe(Recipient::Channel(-1001));
        a.last_observed_version = Some("v3".into());
        store.upsert(a.clone()).await.unwrap();
        store.upsert(feed("b")).await.unwrap();
        drop(store);

        let reopened = JsonFileStore::open(&path).await.unwrap();
        assert_eq!(reopened.get("a").await.unwrap(), Some(a));
        assert_eq!(reopened.get_all().await.unwrap().len(), 2);
        assert!(!path.with_extension("tmp").exists());
    }

    #[tokio::test]
    async fn upsert_replaces_existing_record() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(dir.path().join("f.json")).await.unwrap();
        store.upsert(feed("a")).await.unwrap();

        let mut changed = feed("a");
        changed.title = "Renamed".into();
        store.upsert(changed).await.unwrap();

        let all = store.get_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].title, "Renamed");
    }

    #[tokio::test]
    async fn delete_reports_existence() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(dir.path().join("f.json")).await.unwrap();
        store.upsert(feed("a")).await.unwrap();

        assert!(store.delete("a").await.unwrap());
        assert!(!store.delete("a").await.unwrap());
        assert!(store.get("a").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn failed_write_leaves_memory_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(dir.path().join("missing-dir").join("f.json"))
            .await
            .unwrap();

        let err = store.upsert(feed("a")).await.unwrap_err();
        assert!(matches!(err, StoreError::Io { .. }));
        assert!(store.get("a").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn corrupt_file_is_a_serialization_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f.json");
        std::fs::write(&path, "__import__('os')").unwrap();

        let err = JsonFileStore::open(&path).await.err().unwrap();
        assert!(matches!(err, StoreError::Serialization(_)));
    }
}
