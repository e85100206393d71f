//! Error types for every collaborator the relay talks to.
//!
//! Each failure class the polling engine distinguishes has its own type so
//! that the engine can decide locally whether to skip, log, or escalate:
//!
//! | Type             | Raised by        | Engine reaction                       |
//! |------------------|------------------|---------------------------------------|
//! | [`Unavailable`]  | release source   | skip the feed for this cycle          |
//! | [`DeliveryError`]| delivery sink    | log, continue with the next recipient |
//! | [`StoreError`]   | feed store       | log as fatal for the feed, no retry   |
//! | [`ConfigError`]  | start-up         | abort the process                     |
//! | [`AdminError`]   | admin surface    | reported back to the operator         |

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// The release source could not produce an answer.
///
/// Every variant collapses to the same control-flow outcome (skip this feed
/// for the cycle); the distinction only exists for logging.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum Unavailable {
    #[error("network error: {0}")]
    Network(String),

    #[error("request timed out")]
    Timeout,

    #[error("credentials rejected (HTTP 401)")]
    Unauthorized,

    #[error("rate limited (HTTP {0})")]
    RateLimited(u16),

    #[error("not found")]
    NotFound,

    #[error("unexpected HTTP status {0}")]
    Status(u16),

    #[error("malformed response: {0}")]
    Malformed(String),
}

impl Unavailable {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited(_))
    }

    /// Classify a transport-level `reqwest` failure.
    pub fn from_transport(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_decode() {
            Self::Malformed(err.to_string())
        } else {
            Self::Network(err.to_string())
        }
    }
}

/// A single (asset, recipient) transmission failed.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("rejected by delivery API (HTTP {status}): {description}")]
    Rejected { status: u16, description: String },

    #[error("still rate limited after {attempts} attempts (last retry_after {retry_after:?})")]
    RateLimited {
        attempts: u32,
        retry_after: Option<Duration>,
    },
}

/// Persistence read or write failed.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("store serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Start-up configuration is missing or malformed.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set (environment or .env file)")]
    Missing(&'static str),

    #[error("{key}={value:?} is invalid: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// An administrator or subscriber action was refused.
#[derive(Debug, Error)]
pub enum AdminError {
    #[error("only the administrator may do that")]
    Unauthorized,

    #[error("invalid feed key {0:?}: use letters, digits and underscores")]
    InvalidKey(String),

    #[error("a feed with key {0:?} already exists")]
    DuplicateKey(String),

    #[error("unknown feed {0:?}")]
    UnknownFeed(String),

    #[error("invalid repository {0:?}: expected owner/name")]
    InvalidRepo(String),

    #[error("repository {repo} has no reachable release: {reason}")]
    RepoUnavailable { repo: String, reason: Unavailable },

    #[error("invalid asset pattern {pattern:?}: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_rate_limit_is_flagged_as_rate_limited() {
        assert!(Unavailable::RateLimited(403).is_rate_limited());
        assert!(Unavailable::RateLimited(429).is_rate_limited());
        assert!(!Unavailable::NotFound.is_rate_limited());
        assert!(!Unavailable::Unauthorized.is_rate_limited());
    }

    #[test]
    fn admin_error_messages_name_the_offender() {
        let err = AdminError::RepoUnavailable {
            repo: "octo/cat".into(),
            reason: Unavailable::NotFound,
        };
        assert_eq!(
            err.to_string(),
            "repository octo/cat has no reachable release: not found"
        );
        assert!(AdminError::DuplicateKey("app".into())
            .to_string()
            .contains("\"app\""));
    }
}
