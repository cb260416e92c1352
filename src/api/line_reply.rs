//! Implements the `Reply` trait for the LINE Messaging API, plus a stand-in that only logs.

use crate::api::Reply;
use crate::Result;
use anyhow::{bail, Context};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde::Serialize;
use tracing::{debug, info};
use url::Url;

/// The LINE Messaging API reply endpoint.
pub const LINE_REPLY_ENDPOINT: &str = "https://api.line.me/v2/bot/message/reply";

/// LINE rejects text messages longer than this many characters.
const MAX_TEXT_CHARS: usize = 5000;

/// Replies to a chat event through the LINE Messaging API using the event's reply token.
#[derive(Debug, Clone)]
pub struct LineReply {
    endpoint: Url,
    client: reqwest::Client,
}

impl LineReply {
    pub fn new(endpoint: Url, access_token: &str) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let bearer = HeaderValue::from_str(&format!("Bearer {access_token}"))
            .context("The channel access token is not a valid header value")?;
        headers.insert(AUTHORIZATION, bearer);
        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .context("Unable to build the reply HTTP client")?;
        Ok(Self { endpoint, client })
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ReplyRequest<'a> {
    reply_token: &'a str,
    messages: Vec<TextMessage>,
}

#[derive(Debug, Serialize)]
struct TextMessage {
    #[serde(rename = "type")]
    kind: &'static str,
    text: String,
}

#[async_trait::async_trait]
impl Reply for LineReply {
    async fn send(&self, token: &str, text: &str) -> Result<()> {
        let body = ReplyRequest {
            reply_token: token,
            messages: vec![TextMessage {
                kind: "text",
                text: truncate(text, MAX_TEXT_CHARS),
            }],
        };

        let resp = self
            .client
            .post(self.endpoint.clone())
            .json(&body)
            .send()
            .await
            .context("Failed to send the reply request")?;

        let status = resp.status();
        if !status.is_success() {
            let txt = resp.text().await.unwrap_or_default();
            bail!("Reply failed with status {status}: {txt}");
        }
        debug!("Replied to {token}");
        Ok(())
    }
}

/// A `Reply` that writes the text to the log instead of sending it anywhere.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogReply;

#[async_trait::async_trait]
impl Reply for LogReply {
    async fn send(&self, token: &str, text: &str) -> Result<()> {
        info!("Reply to {token}:\n{text}");
        Ok(())
    }
}

/// Cuts `text` down to at most `max` characters.
fn truncate(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((ix, _)) => text[..ix].to_string(),
        None => text.to_string(),
    }
}
