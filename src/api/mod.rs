//! Traits for the external collaborators this app talks to (the document store, the classifier
//! and the chat reply channel) and the functions that choose an implementation for each.

mod classifier;
mod file_store;
mod keyword_classifier;
mod line_reply;
#[cfg(test)]
mod memory_store;

pub use classifier::{parse_assignments, LlmClassifier, Provider};
pub use file_store::FileStore;
pub use keyword_classifier::KeywordClassifier;
pub use line_reply::{LineReply, LogReply, LINE_REPLY_ENDPOINT};
#[cfg(test)]
pub use memory_store::MemoryStore;

use crate::model::{Assignment, CategorizedItem};
use crate::{Config, Result};
use anyhow::Context;
use serde_json::Value;
use std::sync::Arc;

/// The environment variable that, when set to a non-empty value, puts the app in `Mode::Test`.
pub const TEST_MODE_ENV: &str = "CHAT_LEDGER_IN_TEST_MODE";

/// A document store addressable by collection and document id, with whole-document
/// last-write-wins semantics.
#[async_trait::async_trait]
pub trait Store: Send + Sync {
    /// Returns the document, or `None` when it does not exist.
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>>;

    /// Overwrites the document with `data`, creating it if needed.
    async fn set(&self, collection: &str, id: &str, data: &Value) -> Result<()>;
}

/// An external service that assigns a category label to each numbered item. Its answers are
/// untrusted: ids may be missing, duplicated or unknown.
#[async_trait::async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(&self, request: &ClassifyRequest) -> Result<Vec<Assignment>>;
}

/// Sends a text reply to the chat platform.
#[async_trait::async_trait]
pub trait Reply: Send + Sync {
    async fn send(&self, token: &str, text: &str) -> Result<()>;
}

/// What gets sent to a `Classifier`: the numbered items and the category vocabulary.
#[derive(Debug, Clone)]
pub struct ClassifyRequest {
    pub items: Vec<CategorizedItem>,
    pub vocabulary: &'static [&'static str],
    pub vocabulary_version: u32,
}

/// Whether the classifier and reply channel are the real ones or offline stand-ins that let the
/// whole app run top-to-bottom without network access.
#[derive(Debug, Default, Clone, Copy, Eq, PartialEq)]
pub enum Mode {
    #[default]
    Live,
    Test,
}

impl Mode {
    /// Reads `CHAT_LEDGER_IN_TEST_MODE`. Any non-empty value selects `Mode::Test`.
    pub fn from_env() -> Self {
        match std::env::var(TEST_MODE_ENV) {
            Ok(value) if !value.is_empty() => Mode::Test,
            _ => Mode::Live,
        }
    }
}

/// Creates the document store. It lives on the local disk in both modes, so the ledger persists
/// between CLI runs even in `Mode::Test`.
pub fn store(config: &Config) -> Arc<dyn Store> {
    Arc::new(FileStore::new(config.store_dir()))
}

/// Creates the classifier for `mode`. A live classifier needs an API key.
pub fn classifier(config: &Config, mode: Mode, api_key: Option<&str>) -> Result<Arc<dyn Classifier>> {
    Ok(match mode {
        Mode::Live => {
            let api_key = api_key
                .filter(|k| !k.is_empty())
                .context("CLASSIFIER_API_KEY is required to organize expenses")?;
            Arc::new(LlmClassifier::new(config.classifier().clone(), api_key)?)
        }
        Mode::Test => Arc::new(KeywordClassifier),
    })
}

/// Creates the reply channel for `mode`. A live reply channel needs the channel access token.
pub fn reply(config: &Config, mode: Mode, access_token: Option<&str>) -> Result<Arc<dyn Reply>> {
    Ok(match mode {
        Mode::Live => {
            let access_token = access_token
                .filter(|t| !t.is_empty())
                .context("CHANNEL_ACCESS_TOKEN is required to reply to chat messages")?;
            Arc::new(LineReply::new(config.reply_endpoint().clone(), access_token)?)
        }
        Mode::Test => Arc::new(LogReply),
    })
}
