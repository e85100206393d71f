//! Telegram Bot API delivery sink.
//!
//! Uploads files with `POST /bot<token>/sendDocument` as multipart form
//! data.  HTTP 429 answers are retried after the `parameters.retry_after`
//! delay the API returns; any other failure is handed back to the engine.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, warn};

use super::DeliverySink;
use crate::error::DeliveryError;
use crate::feed::RecipientId;

/// Maximum number of attempts for rate-limited uploads.
const MAX_RATE_LIMIT_ATTEMPTS: u32 = 3;

/// Telegram caption limit for documents, in UTF-16 code units.
const CAPTION_LIMIT: usize = 1024;

pub struct TelegramSink {
    client: Client,
    endpoint: String,
}

impl TelegramSink {
    /// * `api_base`: usually `https://api.telegram.org`.
    /// * `timeout`: bound for one upload, including the file body.
    pub fn new(
        api_base: &str,
        bot_token: &str,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: format!(
                "{}/bot{bot_token}/sendDocument",
                api_base.trim_end_matches('/')
            ),
        })
    }

    fn form(recipient: RecipientId, payload: &Bytes, filename: &str, caption: Option<&str>) -> Form {
        let document = Part::stream_with_length(Body::from(payload.clone()), payload.len() as u64)
            .file_name(filename.to_string());
        let form = Form::new()
            .text("chat_id", recipient.to_string())
            .part("document", document);
        match caption {
            Some(caption) => form.text("caption", truncate_caption(caption, CAPTION_LIMIT)),
            None => form,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    ok: bool,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    parameters: Option<ResponseParameters>,
}

#[derive(Debug, Default, Deserialize)]
struct ResponseParameters {
    #[serde(default)]
    retry_after: Option<u64>,
}

impl ApiResponse {
    fn retry_after(&self) -> Option<Duration> {
        self.parameters
            .as_ref()
            .and_then(|p| p.retry_after)
            .map(Duration::from_secs)
    }
}

#[async_trait]
impl DeliverySink for TelegramSink {
    async fn send_document(
        &self,
        recipient: RecipientId,
        payload: Bytes,
        filename: &str,
        caption: Option<&str>,
    ) -> Result<(), DeliveryError> {
        let mut attempts = 0;

        loop {
            attempts += 1;

            let response = self
                .client
                .post(&self.endpoint)
                .multipart(Self::form(recipient, &payload, filename, caption))
                .send()
                .await
                // The endpoint URL embeds the bot token.
                .map_err(|e| DeliveryError::Transport(e.without_url().to_string()))?;

            let status = response.status();
            let body: ApiResponse = response.json().await.unwrap_or_default();

            if status.is_success() && body.ok {
                debug!(recipient, filename, "document delivered");
                return Ok(());
            }

            if status == StatusCode::TOO_MANY_REQUESTS {
                let retry_after = body.retry_after();
                if attempts >= MAX_RATE_LIMIT_ATTEMPTS {
                    return Err(DeliveryError::RateLimited {
                        attempts,
                        retry_after,
                    });
                }
                let wait = retry_after.unwrap_or(Duration::from_secs(1));
                warn!(
                    recipient,
                    "Telegram rate limited, retrying in {:?} (attempt {}/{})",
                    wait,
                    attempts,
                    MAX_RATE_LIMIT_ATTEMPTS
                );
                tokio::time::sleep(wait).await;
                continue;
            }

            return Err(DeliveryError::Rejected {
                status: status.as_u16(),
                description: body
                    .description
                    .unwrap_or_else(|| "no description".to_string()),
            });
        }
    }
}

/// Truncate a caption to fit within the Telegram limit, which counts UTF-16
/// code units rather than characters.
fn truncate_caption(text: &str, limit: usize) -> String {
    if text.encode_utf16().count() <= limit {
        return text.to_string();
    }
    let suffix = '…';
    let budget = limit.saturating_sub(suffix.len_utf16());
    let mut used = 0;
    let mut truncated = String::new();
    for c in text.chars() {
        used += c.len_utf16();
        if used > budget {
            break;
        }
        truncated.push(c);
    }
    truncated.push(suffix);
    truncated
}
