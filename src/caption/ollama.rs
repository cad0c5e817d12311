//! Ollama provider for local models

use crate::caption::{clean_caption, CaptionInput, CaptionProvider, CaptionResponse};
use crate::config::CaptioningConfig;
use crate::CrawlError;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";
pub const DEFAULT_MODEL: &str = "llama3.2";

/// Local models can be slow on first load
const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    response: String,
    #[serde(default)]
    prompt_eval_count: Option<u32>,
    #[serde(default)]
    eval_count: Option<u32>,
}

pub struct OllamaProvider {
    client: Client,
    base_url: String,
    model: String,
    max_tokens: u32,
}

impl OllamaProvider {
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
            model: config
                .model
                .clone()
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            max_tokens: config.max_tokens,
        })
    }
}

#[async_trait]
impl CaptionProvider for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn caption(&self, input: &CaptionInput, prompt: &str) -> crate::Result<CaptionResponse> {
        let url = format!("{}/api/generate", self.base_url);
        let request = OllamaRequest {
            model: &self.model,
            prompt,
            stream: false,
            options: OllamaOptions {
                temperature: 0.3,
                num_predict: self.max_tokens,
            },
        };

        debug!("Requesting caption for {} from {}", input.url, url);

        let response = self
            .client
            .post(&url)
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
                "ollama returned {}: {}",
                status, body
            )));
        }

        let result: OllamaResponse = response.json().await?;
        let text = clean_caption(&result.response);
        if text.is_empty() {
            return Err(CrawlError::Caption(
                "ollama returned an empty caption".to_string(),
            ));
        }

        let tokens_used = match (result.prompt_eval_count, result.eval_count) {
            (None, None) => None,
            (prompt, eval) => Some(prompt.unwrap_or(0) + eval.unwrap_or(0)),
        };

        Ok(CaptionResponse {
            text,
            model: self.model.clone(),
            tokens_used,
        })
    }

    fn validate(&self) -> Vec<String> {
        if self.model.is_empty() {
            vec!["ollama model name is empty".to_string()]
        } else {
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider(base_url: &str) -> OllamaProvider {
        OllamaProvider::new(&CaptioningConfig {
            provider: "ollama".to_string(),
            base_url: Some(format!("{}/", base_url)),
            max_tokens: 200,
            ..CaptioningConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_defaults_need_no_key() {
        let provider = OllamaProvider::new(&CaptioningConfig::default()).unwrap();
        assert_eq!(provider.base_url, DEFAULT_BASE_URL);
        assert_eq!(provider.model, DEFAULT_MODEL);
        assert!(provider.validate().is_empty());
    }

    #[tokio::test]
    async fn test_caption_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .and(body_partial_json(serde_json::json!({
                "model": DEFAULT_MODEL,
                "prompt": "describe it",
                "stream": false,
                "options": {"num_predict": 200}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "model": DEFAULT_MODEL,
                "response": "A documentation page.\n",
                "done": true,
                "prompt_eval_count": 30,
                "eval_count": 12
            })))
            .expect(1)
            .mount(&server)
            .await;

        let response = provider(&server.uri())
            .caption(&CaptionInput::default(), "describe it")
            .await
            .unwrap();

        assert_eq!(response.text, "A documentation page.");
        assert_eq!(response.tokens_used, Some(42));
    }

    #[tokio::test]
    async fn test_caption_without_counts() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "response": "A blog post.",
                "done": true
            })))
            .mount(&server)
            .await;

        let response = provider(&server.uri())
            .caption(&CaptionInput::default(), "describe it")
            .await
            .unwrap();
        assert_eq!(response.tokens_used, None);
    }

    #[tokio::test]
    async fn test_caption_empty_response_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "response": "   ",
                "done": true
            })))
            .mount(&server)
            .await;

        let err = provider(&server.uri())
            .caption(&CaptionInput::default(), "describe it")
            .await
            .unwrap_err();
        assert!(matches!(err, CrawlError::Caption(_)));
    }

    #[tokio::test]
    async fn test_caption_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("model not found"))
            .mount(&server)
            .await;

        let err = provider(&server.uri())
            .caption(&CaptionInput::default(), "describe it")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("model not found"));
    }
}
