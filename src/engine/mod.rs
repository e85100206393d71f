//! The polling engine: change detection and fan-out delivery.
//!
//! One call to [`PollingEngine::run_poll_cycle`] walks every feed in the
//! store.  Per feed, under that feed's lock:
//!
//! ```text
//!  re-read feed ─► filters set? ─► fetch latest ─► tag changed? ─► commit tag
//!        │              │ no            │ unavailable     │ no          │
//!        ▼              ▼               ▼                 ▼             ▼
//!     removed      unconfigured     unavailable       unchanged    filter assets
//!                                                                       │
//!                                         for each asset: download once │
//!                                         for each recipient: send  ◄───┘
//! ```
//!
//! The tag is committed **before** delivery: a release is delivered at most
//! once per recipient, and a partial delivery failure is never retried by
//! the next cycle.  Every failure is contained to its feed (or to its
//! asset/recipient pair); nothing a single feed does can abort the cycle.

mod locks;

pub use locks::FeedLocks;

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tracing::{debug, error, info, warn};

use crate::feed::{Feed, Recipient};
use crate::filter;
use crate::sink::DeliverySink;
use crate::source::{Asset, Release, ReleaseSource};
use crate::store::FeedStore;

/// What happened to one feed during a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedOutcome {
    /// Latest tag equals the stored one.
    Unchanged,
    /// The source could not be queried; retried next cycle.
    Unavailable,
    /// No asset filters configured; skipped.
    Unconfigured,
    /// Deleted between listing and processing.
    Removed,
    /// Reading or committing the feed failed; no delivery was attempted.
    StoreFailed,
    /// A new tag was committed and delivery attempted.
    Updated { delivered: usize, failed: usize },
}

/// Totals for one poll cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub checked: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub unavailable: usize,
    pub unconfigured: usize,
    pub store_failures: usize,
    pub delivered: usize,
    pub delivery_failures: usize,
}

impl CycleReport {
    fn record(&mut self, outcome: FeedOutcome) {
        match outcome {
            FeedOutcome::Removed => return,
            FeedOutcome::Unchanged => self.unchanged += 1,
            FeedOutcome::Unavailable => self.unavailable += 1,
            FeedOutcome::Unconfigured => self.unconfigured += 1,
            FeedOutcome::StoreFailed => self.store_failures += 1,
            FeedOutcome::Updated { delivered, failed } => {
                self.updated += 1;
                self.delivered += delivered;
                self.delivery_failures += failed;
            }
        }
        self.checked += 1;
    }
}

impl fmt::Display for CycleReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} feeds checked: {} updated, {} unchanged, {} unavailable, {} unconfigured, {} store failures; {} files sent, {} failed",
            self.checked,
            self.updated,
            self.unchanged,
            self.unavailable,
            self.unconfigured,
            self.store_failures,
            self.delivered,
            self.delivery_failures,
        )
    }
}

/// Orchestrates store, release source and delivery sink.
pub struct PollingEngine {
    store: Arc<dyn FeedStore>,
    source: Arc<dyn ReleaseSource>,
    sink: Arc<dyn DeliverySink>,
    locks: FeedLocks,
    max_concurrent_feeds: usize,
}

impl PollingEngine {
    /// `locks` must be the same registry the admin surface uses.
    pub fn new(
        store: Arc<dyn FeedStore>,
        source: Arc<dyn ReleaseSource>,
        sink: Arc<dyn DeliverySink>,
        locks: FeedLocks,
        max_concurrent_feeds: usize,
    ) -> Self {
        Self {
            store,
            source,
            sink,
            locks,
            max_concurrent_feeds: max_concurrent_feeds.max(1),
        }
    }

    /// Check every feed once.  Safe to call concurrently with itself.
    pub async fn run_poll_cycle(&self) -> CycleReport {
        let mut report = CycleReport::default();

        let keys: Vec<String> = match self.store.get_all().await {
            Ok(feeds) => feeds.into_iter().map(|f| f.key).collect(),
            Err(e) => {
                error!(error = %e, "could not list feeds, cycle abandoned");
                report.store_failures += 1;
                return report;
            }
        };
        debug!(feeds = keys.len(), "poll cycle started");

        let outcomes: Vec<FeedOutcome> = stream::iter(keys)
            .map(|key| async move { self.process_feed(&key).await })
            .buffer_unordered(self.max_concurrent_feeds)
            .collect()
            .await;

        for outcome in outcomes {
            report.record(outcome);
        }
        info!(%report, "poll cycle finished");
        report
    }

    async fn process_feed(&self, key: &str) -> FeedOutcome {
        let _guard = self.locks.lock(key).await;

        // Re-read under the lock: an overlapping cycle may have committed.
        let feed = match self.store.get(key).await {
            Ok(Some(feed)) => feed,
            Ok(None) => return FeedOutcome::Removed,
            Err(e) => {
                error!(feed = key, error = %e, "could not read feed");
                return FeedOutcome::StoreFailed;
            }
        };

        if feed.asset_filters.is_empty() {
            warn!(feed = key, "no asset filters configured, skipping");
            return FeedOutcome::Unconfigured;
        }

        let release = match self.source.fetch_latest_release(&feed.repo).await {
            Ok(release) => release,
            Err(reason) => {
                info!(feed = key, repo = %feed.repo, %reason, "release source unavailable, will retry next cycle");
                return FeedOutcome::Unavailable;
            }
        };

        if feed.last_observed_version.as_deref() == Some(release.tag.as_str()) {
            debug!(feed = key, tag = %release.tag, "no new release");
            return FeedOutcome::Unchanged;
        }

        let previous = feed.last_observed_version.clone();
        let mut committed = feed;
        committed.last_observed_version = Some(release.tag.clone());
        if let Err(e) = self.store.upsert(committed.clone()).await {
            error!(
                feed = key,
                tag = %release.tag,
                error = %e,
                "could not commit new version, delivery skipped"
            );
            return FeedOutcome::StoreFailed;
        }
        info!(
            feed = key,
            from = previous.as_deref().unwrap_or("<none>"),
            to = %release.tag,
            published = ?release.published,
            "new release committed"
        );

        let (delivered, failed) = self.deliver(&committed, &release).await;
        FeedOutcome::Updated { delivered, failed }
    }

    /// Send every matching asset to every recipient.  Returns
    /// `(delivered, failed)` counts of (asset, recipient) pairs.
    async fn deliver(&self, feed: &Feed, release: &Release) -> (usize, usize) {
        let names: Vec<&str> = release.asset_names().collect();
        let selected = filter::select_matching(&feed.asset_filters, &names);
        let assets: Vec<&Asset> = release
            .assets
            .iter()
            .filter(|a| selected.contains(&a.name.as_str()))
            .collect();
        let recipients: Vec<Recipient> = feed.recipients().collect();

        if assets.is_empty() {
            warn!(feed = %feed.key, tag = %release.tag, "no release assets match the filters");
            return (0, 0);
        }
        if recipients.is_empty() {
            debug!(feed = %feed.key, "no subscribers");
            return (0, 0);
        }

        let caption = release.caption(&feed.title);
        let mut captioned: HashSet<Recipient> = HashSet::new();
        let (mut delivered, mut failed) = (0, 0);

        for asset in assets {
            let payload = match self.source.fetch_asset(asset).await {
                Ok(payload) => payload,
                Err(reason) => {
                    error!(feed = %feed.key, asset = %asset.name, %reason, "asset download failed");
                    failed += recipients.len();
                    continue;
                }
            };

            for &recipient in &recipients {
                let first = !captioned.contains(&recipient);
                let result = self
                    .sink
                    .send_document(
                        recipient.id(),
                        payload.clone(),
                        &asset.name,
                        first.then_some(caption.as_str()),
                    )
                    .await;
                match result {
                    Ok(()) => {
                        delivered += 1;
                        captioned.insert(recipient);
                        info!(feed = %feed.key, asset = %asset.name, %recipient, "file delivered");
                    }
                    Err(e) => {
                        failed += 1;
                        error!(feed = %feed.key, asset = %asset.name, %recipient, error = %e, "delivery failed");
                    }
                }
            }
        }

        (delivered, failed)
    }
}
