//! Implements the `Classifier` trait by asking a hosted language model to categorize items.

use crate::api::{ClassifyRequest, Classifier};
use crate::config::ClassifierSettings;
use crate::model::Assignment;
use crate::Result;
use anyhow::{bail, Context};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use std::fmt::Write;
use tracing::{debug, trace};
use url::Url;

const OPENAI_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";
const ANTHROPIC_ENDPOINT: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 4096;

const SYSTEM_PROMPT: &str = "你是一個家庭記帳助手，負責把每一筆消費歸到最合適的分類。";

/// The chat completion API flavor spoken by the configured endpoint.
#[derive(Debug, Default, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    #[default]
    Openai,
    Anthropic,
}

serde_plain::derive_display_from_serialize!(Provider);
serde_plain::derive_fromstr_from_deserialize!(Provider);

impl Provider {
    fn default_endpoint(&self) -> &'static str {
        match self {
            Provider::Openai => OPENAI_ENDPOINT,
            Provider::Anthropic => ANTHROPIC_ENDPOINT,
        }
    }
}

/// A `Classifier` backed by an OpenAI or Anthropic style chat completion endpoint.
#[derive(Debug, Clone)]
pub struct LlmClassifier {
    provider: Provider,
    model: String,
    endpoint: Url,
    client: reqwest::Client,
}

impl LlmClassifier {
    pub fn new(settings: ClassifierSettings, api_key: &str) -> Result<Self> {
        let provider = settings.provider();
        let endpoint = match settings.endpoint() {
            Some(url) => url.clone(),
            None => Url::parse(provider.default_endpoint())
                .context("Invalid default classifier endpoint")?,
        };

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        match provider {
            Provider::Openai => {
                let bearer = HeaderValue::from_str(&format!("Bearer {api_key}"))
                    .context("The classifier API key is not a valid header value")?;
                headers.insert(AUTHORIZATION, bearer);
            }
            Provider::Anthropic => {
                let key = HeaderValue::from_str(api_key)
                    .context("The classifier API key is not a valid header value")?;
                headers.insert("x-api-key", key);
                headers.insert(
                    "anthropic-version",
                    HeaderValue::from_static(ANTHROPIC_VERSION),
                );
            }
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .context("Unable to build the classifier HTTP client")?;

        Ok(Self {
            provider,
            model: settings.model().to_string(),
            endpoint,
            client,
        })
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        match self.provider {
            Provider::Openai => self.openai_complete(prompt).await,
            Provider::Anthropic => self.anthropic_complete(prompt).await,
        }
    }

    async fn openai_complete(&self, prompt: &str) -> Result<String> {
        #[derive(Serialize)]
        struct Msg<'a> {
            role: &'a str,
            content: &'a str,
        }

        #[derive(Serialize)]
        struct Req<'a> {
            model: &'a str,
            messages: Vec<Msg<'a>>,
            temperature: f32,
        }

        #[derive(Deserialize)]
        struct Resp {
            choices: Vec<Choice>,
        }

        #[derive(Deserialize)]
        struct Choice {
            message: MsgOut,
        }

        #[derive(Deserialize)]
        struct MsgOut {
            content: Option<String>,
        }

        let body = Req {
            model: &self.model,
            messages: vec![
                Msg {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                Msg {
                    role: "user",
                    content: prompt,
                },
            ],
            temperature: 0.0,
        };

        let resp = self
            .client
            .post(self.endpoint.clone())
            .json(&body)
            .send()
            .await
            .context("openai request")?;

        let status = resp.status();
        if !status.is_success() {
            let txt = resp.text().await.unwrap_or_default();
            bail!("openai error: {status} {txt}");
        }

        let out: Resp = resp.json().await.context("parse openai response")?;
        Ok(out
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default())
    }

    async fn anthropic_complete(&self, prompt: &str) -> Result<String> {
        #[derive(Serialize)]
        struct Msg<'a> {
            role: &'a str,
            content: &'a str,
        }

        #[derive(Serialize)]
        struct Req<'a> {
            model: &'a str,
            max_tokens: u32,
            system: &'a str,
            messages: Vec<Msg<'a>>,
        }

        #[derive(Deserialize)]
        struct Resp {
            content: Vec<ContentBlock>,
        }

        #[derive(Deserialize)]
        struct ContentBlock {
            #[serde(rename = "type")]
            t: String,
            text: Option<String>,
        }

        let body = Req {
            model: &self.model,
            max_tokens: MAX_TOKENS,
            system: SYSTEM_PROMPT,
            messages: vec![Msg {
                role: "user",
                content: prompt,
            }],
        };

        let resp = self
            .client
            .post(self.endpoint.clone())
            .json(&body)
            .send()
            .await
            .context("anthropic request")?;

        let status = resp.status();
        if !status.is_success() {
            let txt = resp.text().await.unwrap_or_default();
            bail!("anthropic error: {status} {txt}");
        }

        let out: Resp = resp.json().await.context("parse anthropic response")?;
        Ok(out
            .content
            .into_iter()
            .filter(|b| b.t == "text")
            .filter_map(|b| b.text)
            .collect())
    }
}

#[async_trait::async_trait]
impl Classifier for LlmClassifier {
    async fn classify(&self, request: &ClassifyRequest) -> Result<Vec<Assignment>> {
        let prompt = build_prompt(request);
        trace!("classifier prompt:\n{prompt}");
        let reply = self.complete(&prompt).await?;
        debug!("classifier replied with {} bytes", reply.len());
        parse_assignments(&reply)
    }
}

/// Renders the request as a prompt: the vocabulary, the expected answer format and one numbered
/// line per item.
pub(crate) fn build_prompt(request: &ClassifyRequest) -> String {
    let mut prompt = format!(
        "請將以下每一筆消費分到一個分類。\n\
         可用分類（第 {} 版）：{}。\n\
         如果都不適合，可以自行新增一個簡短的分類名稱。\n\
         只回傳 JSON 陣列，格式為 [{{\"id\": 1, \"category\": \"分類\"}}]，\
         每個 id 恰好出現一次，不要加任何其他文字。\n\n",
        request.vocabulary_version,
        request.vocabulary.join("、"),
    );
    for item in &request.items {
        // Writing to a String cannot fail.
        let _ = writeln!(
            prompt,
            "{}. {} {} {}",
            item.id, item.display_date, item.name, item.price
        );
    }
    prompt
}

/// Parses a classifier reply into assignments. The reply must contain a JSON array of
/// `{"id", "category"}` objects; Markdown code fences and prose around the array are ignored.
pub fn parse_assignments(reply: &str) -> Result<Vec<Assignment>> {
    let start = reply.find('[');
    let end = reply.rfind(']');
    let json = match (start, end) {
        (Some(start), Some(end)) if start < end => &reply[start..=end],
        _ => bail!("The classifier reply does not contain a JSON array: '{reply}'"),
    };
    serde_json::from_str(json)
        .with_context(|| format!("Unable to parse the classifier reply: '{json}'"))
}
