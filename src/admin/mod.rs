//! Administrator and subscriber operations on feed records.
//!
//! [`Admin`] is the only writer of feed configuration.  Every mutation is a
//! read-modify-write performed under the feed's [`FeedLocks`] slot, the same
//! lock the polling engine holds while it commits a version, so neither side
//! can overwrite the other's change.
//!
//! Authorization is a single static identity comparison ([`AdminGuard`]):
//! configuration changes need the administrator, (un)subscribing does not.

pub mod command;
pub mod dialog;

use std::sync::Arc;

use tracing::info;

use crate::engine::FeedLocks;
use crate::error::AdminError;
use crate::feed::{self, Feed, Recipient, RecipientId};
use crate::filter;
use crate::source::ReleaseSource;
use crate::store::FeedStore;

/// Compares callers against the configured administrator identity.
#[derive(Debug, Clone, Copy)]
pub struct AdminGuard {
    admin_id: RecipientId,
}

impl AdminGuard {
    pub fn new(admin_id: RecipientId) -> Self {
        Self { admin_id }
    }

    pub fn is_admin(&self, caller: RecipientId) -> bool {
        caller == self.admin_id
    }

    pub fn authorize(&self, caller: RecipientId) -> Result<(), AdminError> {
        if self.is_admin(caller) {
            Ok(())
        } else {
            Err(AdminError::Unauthorized)
        }
    }
}

/// Everything needed to create a feed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedDraft {
    pub key: String,
    pub title: String,
    pub link: String,
    pub repo: String,
    pub asset_filters: Vec<String>,
}

pub struct Admin {
    guard: AdminGuard,
    store: Arc<dyn FeedStore>,
    source: Arc<dyn ReleaseSource>,
    locks: FeedLocks,
}

impl Admin {
    pub fn new(
        guard: AdminGuard,
        store: Arc<dyn FeedStore>,
        source: Arc<dyn ReleaseSource>,
        locks: FeedLocks,
    ) -> Self {
        Self {
            guard,
            store,
            source,
            locks,
        }
    }

    pub fn guard(&self) -> AdminGuard {
        self.guard
    }

    pub async fn list(&self) -> Result<Vec<Feed>, AdminError> {
        Ok(self.store.get_all().await?)
    }

    /// Validate `repo` against the release source and return the asset
    /// names of its latest release.
    pub async fn check_repo(&self, repo: &str) -> Result<Vec<String>, AdminError> {
        if !feed::is_valid_repo(repo) {
            return Err(AdminError::InvalidRepo(repo.to_string()));
        }
        self.source
            .fetch_latest_release(repo)
            .await
            .map(|release| release.asset_names().map(String::from).collect())
            .map_err(|reason| AdminError::RepoUnavailable {
                repo: repo.to_string(),
                reason,
            })
    }

    /// Asset names currently offered by a feed's repository.  Empty when the
    /// source is unreachable.
    pub async fn asset_names(&self, key: &str) -> Result<Vec<String>, AdminError> {
        let feed = self.require(key).await?;
        Ok(self.source.list_asset_names(&feed.repo).await)
    }

    pub async fn register(&self, caller: RecipientId, draft: FeedDraft) -> Result<Feed, AdminError> {
        self.guard.authorize(caller)?;
        if !feed::is_valid_key(&draft.key) {
            return Err(AdminError::InvalidKey(draft.key));
        }
        let filters = filter::validate_patterns(&draft.asset_filters)?;
        self.check_repo(&draft.repo).await?;

        let _guard = self.locks.lock(&draft.key).await;
        if self.store.get(&draft.key).await?.is_some() {
            return Err(AdminError::DuplicateKey(draft.key));
        }
        let mut created = Feed::new(draft.key, draft.title, draft.link, draft.repo);
        created.asset_filters = filters;
        self.store.upsert(created.clone()).await?;
        info!(feed = %created.key, repo = %created.repo, "feed registered");
        Ok(created)
    }

    /// Point a feed at another repository.  The new repository must answer.
    pub async fn set_repo(&self, caller: RecipientId, key: &str, repo: &str) -> Result<Feed, AdminError> {
        self.guard.authorize(caller)?;
        self.check_repo(repo).await?;
        self.update(key, |feed| {
            feed.repo = repo.to_string();
            true
        })
        .await
        .map(|(feed, _)| feed)
    }

    pub async fn set_filters<S: AsRef<str>>(
        &self,
        caller: RecipientId,
        key: &str,
        patterns: &[S],
    ) -> Result<Feed, AdminError> {
        self.guard.authorize(caller)?;
        let filters = filter::validate_patterns(patterns)?;
        self.update(key, move |feed| {
            feed.asset_filters = filters;
            true
        })
        .await
        .map(|(feed, _)| feed)
    }

    /// Open to any recipient.  Returns `false` if already subscribed.
    pub async fn subscribe(&self, key: &str, recipient: Recipient) -> Result<bool, AdminError> {
        self.update(key, |feed| feed.subscribe(recipient))
            .await
            .map(|(_, changed)| changed)
    }

    /// Open to any recipient.  Returns `false` if not subscribed.
    pub async fn unsubscribe(&self, key: &str, recipient: Recipient) -> Result<bool, AdminError> {
        self.update(key, |feed| feed.unsubscribe(recipient))
            .await
            .map(|(_, changed)| changed)
    }

    pub async fn delete(&self, caller: RecipientId, key: &str) -> Result<(), AdminError> {
        self.guard.authorize(caller)?;
        {
            let _guard = self.locks.lock(key).await;
            if !self.store.delete(key).await? {
                return Err(AdminError::UnknownFeed(key.to_string()));
            }
        }
        self.locks.forget(key);
        info!(feed = key, "feed deleted");
        Ok(())
    }

    async fn require(&self, key: &str) -> Result<Feed, AdminError> {
        self.store
            .get(key)
            .await?
            .ok_or_else(|| AdminError::UnknownFeed(key.to_string()))
    }

    /// Apply `edit` under the feed's lock; persist only if it reports a
    /// change.
    async fn update<F>(&self, key: &str, edit: F) -> Result<(Feed, bool), AdminError>
    where
        F: FnOnce(&mut Feed) -> bool,
    {
        let _guard = self.locks.lock(key).await;
        let mut feed = self.require(key).await?;
        let changed = edit(&mut feed);
        if changed {
            self.store.upsert(feed.clone()).await?;
            info!(feed = key, "feed updated");
        }
        Ok((feed, changed))
    }
}
