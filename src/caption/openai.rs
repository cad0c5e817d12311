//! OpenAI-compatible chat completions provider

use crate::caption::{clean_caption, CaptionInput, CaptionProvider, CaptionResponse};
use crate::config::CaptioningConfig;
use crate::CrawlError;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    total_tokens: u32,
}

pub struct OpenAiProvider {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    max_tokens: u32,
}

impl OpenAiProvider {
    pub fn new(config: &CaptioningConfig) -> crate::Result<Self> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            api_key: config.api_key.clone().filter(|k| !k.is_empty()),
            model: config
                .model
                .clone()
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            max_tokens: config.max_tokens,
        })
    }
}

#[async_trait]
impl CaptionProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    async fn caption(&self, input: &CaptionInput, prompt: &str) -> crate::Result<CaptionResponse> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| CrawlError::Caption("openai api key is not set".to_string()))?;

        let url = format!("{}/chat/completions", self.base_url);
        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            max_tokens: self.max_tokens,
        };

        debug!("Requesting caption for {} from {}", input.url, url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| CrawlError::Http {
                url: url.clone(),
                source: e,
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(CrawlError::Caption(format!(
                "openai returned {}: {}",
                status, body
            )));
        }

        let result: ChatResponse = response.json().await?;
        let text = result
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|c| clean_caption(&c))
            .filter(|c| !c.is_empty())
            .ok_or_else(|| CrawlError::Caption("openai returned an empty caption".to_string()))?;

        Ok(CaptionResponse {
            text,
            model: self.model.clone(),
            tokens_used: result.usage.map(|u| u.total_tokens),
        })
    }

    fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if self.api_key.is_none() {
            problems.push(
                "openai requires an API key (captioning.api-key or PAGESCRIBE_API_KEY)".to_string(),
            );
        }
        if self.model.is_empty() {
            problems.push("openai model name is empty".to_string());
        }
        problems
    }
}
