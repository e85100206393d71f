//! GitHub releases source implementation.
//!
//! Talks to the GitHub REST API (`/repos/{owner}/{name}/releases/latest`)
//! with [`reqwest`].  Every request carries the API version header, a
//! `User-Agent` (GitHub rejects requests without one) and, when configured,
//! a bearer token.  Metadata requests ask for `application/vnd.github+json`;
//! asset downloads ask for `application/octet-stream`.
//!
//! The JSON-to-[`Release`] conversion and the status classification are pure
//! functions so tests can exercise them without the network.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use tracing::{debug, error, warn};

use super::{Asset, Release, ReleaseSource};
use crate::error::Unavailable;

const METADATA_ACCEPT: &str = "application/vnd.github+json";
const BYTES_ACCEPT: &str = "application/octet-stream";
const API_VERSION: &str = "2022-11-28";
const USER_AGENT: &str = concat!("release-relay/", env!("CARGO_PKG_VERSION"));

/// A GitHub (or GitHub Enterprise) release source.
pub struct GithubSource {
    client: Client,
    api_base: String,
    token: Option<String>,
    request_timeout: Duration,
    transfer_timeout: Duration,
}

impl GithubSource {
    /// Create a new GitHub source.
    ///
    /// * `api_base`: e.g. `https://api.github.com`, without trailing slash.
    /// * `token`: optional bearer credential attached to every request.
    /// * `request_timeout`: bound for metadata calls.
    /// * `transfer_timeout`: bound for asset downloads.
    pub fn new(
        api_base: impl Into<String>,
        token: Option<String>,
        request_timeout: Duration,
        transfer_timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let mut headers = HeaderMap::new();
        headers.insert("X-GitHub-Api-Version", HeaderValue::from_static(API_VERSION));

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .connect_timeout(request_timeout)
            .build()?;

        Ok(Self {
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            token: token.filter(|t| !t.is_empty()),
            request_timeout,
            transfer_timeout,
        })
    }

    fn latest_release_url(&self, repo: &str) -> String {
        format!("{}/repos/{repo}/releases/latest", self.api_base)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.header(AUTHORIZATION, format!("Bearer {token}")),
            None => request,
        }
    }

    /// Convert a decoded API payload into a [`Release`].
    fn into_release(payload: ReleasePayload) -> Release {
        let name = payload
            .name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| payload.tag_name.clone());

        Release {
            tag: payload.tag_name,
            name,
            notes: payload.body,
            published: payload.published_at,
            assets: payload
                .assets
                .into_iter()
                .map(|a| Asset {
                    // The API URL also works for private repositories.
                    locator: a.url.unwrap_or(a.browser_download_url),
                    name: a.name,
                })
                .collect(),
        }
    }
}

/// Map a non-success HTTP status onto [`Unavailable`].  `None` means success.
fn classify_status(status: StatusCode) -> Option<Unavailable> {
    match status {
        s if s.is_success() => None,
        StatusCode::UNAUTHORIZED => Some(Unavailable::Unauthorized),
        StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS => {
            Some(Unavailable::RateLimited(status.as_u16()))
        }
        StatusCode::NOT_FOUND => Some(Unavailable::NotFound),
        s => Some(Unavailable::Status(s.as_u16())),
    }
}

fn log_unavailable(what: &str, subject: &str, reason: &Unavailable) {
    match reason {
        Unavailable::RateLimited(_) => warn!(subject, %reason, "{what}: GitHub rate limit hit"),
        Unavailable::Unauthorized => error!(subject, %reason, "{what}: GitHub token rejected"),
        _ => error!(subject, %reason, "{what} failed"),
    }
}

#[async_trait]
impl ReleaseSource for GithubSource {
    fn name(&self) -> &str {
        "github"
    }

    async fn fetch_latest_release(&self, repo: &str) -> Result<Release, Unavailable> {
        let request = self
            .client
            .get(self.latest_release_url(repo))
            .header(ACCEPT, METADATA_ACCEPT)
            .timeout(self.request_timeout);

        let result = async {
            let response = self
                .authorize(request)
                .send()
                .await
                .map_err(|e| Unavailable::from_transport(&e))?;
            if let Some(reason) = classify_status(response.status()) {
                return Err(reason);
            }
            let payload: ReleasePayload = response
                .json()
                .await
                .map_err(|e| Unavailable::from_transport(&e))?;
            Ok::<_, Unavailable>(Self::into_release(payload))
        }
        .await;

        match &result {
            Ok(release) => debug!(repo, tag = %release.tag, assets = release.assets.len(), "fetched latest release"),
            Err(reason) => log_unavailable("release lookup", repo, reason),
        }
        result
    }

    async fn fetch_asset(&self, asset: &Asset) -> Result<Bytes, Unavailable> {
        let request = self
            .client
            .get(&asset.locator)
            .header(ACCEPT, BYTES_ACCEPT)
            .timeout(self.transfer_timeout);

        let result = async {
            let response = self
                .authorize(request)
                .send()
                .await
                .map_err(|e| Unavailable::from_transport(&e))?;
            if let Some(reason) = classify_status(response.status()) {
                return Err(reason);
            }
            response
                .bytes()
                .await
                .map_err(|e| Unavailable::from_transport(&e))
        }
        .await;

        match &result {
            Ok(bytes) => debug!(asset = %asset.name, size = bytes.len(), "downloaded asset"),
            Err(reason) => log_unavailable("asset download", &asset.name, reason),
        }
        result
    }
}

// ---------------------------------------------------------------------------
// Wire format
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ReleasePayload {
    tag_name: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    body: Option<String>,
    #[serde(default)]
    published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    assets: Vec<AssetPayload>,
}

#[derive(Debug, Deserialize)]
struct AssetPayload {
    name: String,
    #[serde(default)]
    url: Option<String>,
    browser_download_url: String,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
