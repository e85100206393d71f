//! Release source abstraction layer.
//!
//! This module defines the [`ReleaseSource`] trait and the common
//! [`Release`] / [`Asset`] types.  Concrete source implementations live in
//! sub-modules (currently only [`github`]).
//!
//! ## For contributors: adding a new source
//!
//! 1. Create a new file in this directory (e.g. `gitea.rs`).
//! 2. Define a struct holding the client and credentials, and implement
//!    [`ReleaseSource`] for it.
//! 3. Add `mod gitea;` below and re-export your struct.
//! 4. Construct it in `main.rs` instead of (or next to) the GitHub client.
//!
//! The engine, filter and admin surface are all source-agnostic.

mod github;
mod release;

pub use github::GithubSource;
pub use release::{Asset, Release};

use async_trait::async_trait;
use bytes::Bytes;
use tracing::{debug, warn};

use crate::error::Unavailable;

/// Trait that every release source must implement.
///
/// Failures are never fatal: every transport, auth, rate-limit or not-found
/// problem comes back as [`Unavailable`] and the caller skips the feed.
#[async_trait]
pub trait ReleaseSource: Send + Sync {
    /// Human-readable label used in logs.
    fn name(&self) -> &str;

    /// Fetch the latest release descriptor for `repo`.
    async fn fetch_latest_release(&self, repo: &str) -> Result<Release, Unavailable>;

    /// Fetch the raw bytes of one asset of a release from this source.
    async fn fetch_asset(&self, asset: &Asset) -> Result<Bytes, Unavailable>;

    /// Names of the latest release's assets, for interactive selection.
    ///
    /// Never fails: any problem yields an empty list.
    async fn list_asset_names(&self, repo: &str) -> Vec<String> {
        match self.fetch_latest_release(repo).await {
            Ok(release) => release.asset_names().map(String::from).collect(),
            Err(reason) => {
                if reason.is_rate_limited() {
                    warn!(source = self.name(), repo, %reason, "rate limited while listing assets");
                } else {
                    debug!(source = self.name(), repo, %reason, "could not list assets");
                }
                Vec::new()
            }
        }
    }
}
