//! The persisted record for a tracked release source.
//!
//! A [`Feed`] couples a remote repository with its asset filters, the set of
//! recipients that want its files, and the version tag that was last
//! delivered.  Everything else in the relay (engine, store, admin console)
//! passes `Feed` values around by clone; the store is the only owner.
//!
//! ## Invariants
//!
//! * `key` never changes after creation.
//! * `last_observed_version` only moves to a tag actually observed from the
//!   source, and only the polling engine moves it.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Chat identifier understood by the delivery sink.
pub type RecipientId = i64;

static KEY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_]+$").expect("static regex"));

static REPO_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_.-]+/[A-Za-z0-9_.-]+$").expect("static regex"));

/// A named, trackable release source plus its subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feed {
    pub key: String,
    pub title: String,
    pub link: String,
    /// `owner/name` of the remote repository.
    pub repo: String,
    /// Glob patterns, in the order the administrator entered them.
    #[serde(default)]
    pub asset_filters: Vec<String>,
    #[serde(default)]
    pub subscribed_users: BTreeSet<RecipientId>,
    #[serde(default)]
    pub subscribed_channels: BTreeSet<RecipientId>,
    /// Tag of the most recently delivered release.
    #[serde(default)]
    pub last_observed_version: Option<String>,
}

impl Feed {
    pub fn new(
        key: impl Into<String>,
        title: impl Into<String>,
        link: impl Into<String>,
        repo: impl Into<String>,
    ) -> Self {
        Self {
            key: key.into(),
            title: title.into(),
            link: link.into(),
            repo: repo.into(),
            asset_filters: Vec::new(),
            subscribed_users: BTreeSet::new(),
            subscribed_channels: BTreeSet::new(),
            last_observed_version: None,
        }
    }

    /// Every recipient, users first, each set in ascending id order.
    ///
    /// The two sets are independent: an id present in both is returned twice.
    pub fn recipients(&self) -> impl Iterator<Item = Recipient> + '_ {
        self.subscribed_users
            .iter()
            .map(|&id| Recipient::User(id))
            .chain(self.subscribed_channels.iter().map(|&id| Recipient::Channel(id)))
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribed_users.len() + self.subscribed_channels.len()
    }

    /// Add a recipient.  Returns `false` if it was already subscribed.
    pub fn subscribe(&mut self, recipient: Recipient) -> bool {
        match recipient {
            Recipient::User(id) => self.subscribed_users.insert(id),
            Recipient::Channel(id) => self.subscribed_channels.insert(id),
        }
    }

    /// Remove a recipient.  Returns `false` if it was not subscribed.
    pub fn unsubscribe(&mut self, recipient: Recipient) -> bool {
        match recipient {
            Recipient::User(id) => self.subscribed_users.remove(&id),
            Recipient::Channel(id) => self.subscribed_channels.remove(&id),
        }
    }
}

/// A user or a group/channel subscribed to a feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Recipient {
    User(RecipientId),
    Channel(RecipientId),
}

impl Recipient {
    pub fn id(&self) -> RecipientId {
        match *self {
            Self::User(id) | Self::Channel(id) => id,
        }
    }
}

impl fmt::Display for Recipient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User(id) => write!(f, "user {id}"),
            Self::Channel(id) => write!(f, "channel {id}"),
        }
    }
}

/// Feed keys are short identifiers: letters, digits and underscores.
pub fn is_valid_key(key: &str) -> bool {
    KEY_RE.is_match(key)
}

/// Repository identifiers look like `owner/name`.
pub fn is_valid_repo(repo: &str) -> bool {
    // `.` and `..` would become path traversal in API URLs.
    REPO_RE.is_match(repo) && repo.split('/').all(|part| !part.chars().all(|c| c == '.'))
}
