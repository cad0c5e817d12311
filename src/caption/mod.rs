//! Captioning of captured pages
//!
//! A [`CaptionProvider`] turns a rendered prompt into a description of a
//! page. Providers are looked up by name in a [`ProviderRegistry`], which is
//! populated once at startup by [`ProviderRegistry::register_builtin`].
//! [`CaptionService`] renders the prompt for a capture and calls the
//! configured provider.

mod ollama;
mod openai;
mod prompt;
mod registry;
mod service;

pub use ollama::OllamaProvider;
pub use openai::OpenAiProvider;
pub use prompt::{render_prompt, truncate, DEFAULT_PROMPT};
pub use registry::{ProviderConstructor, ProviderRegistry};
pub use service::CaptionService;

use crate::capture::Capture;
use crate::storage::CaptureRecord;
use async_trait::async_trait;

/// Page content handed to a provider
#[derive(Debug, Clone, Default)]
pub struct CaptionInput {
    pub url: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub text: String,
    pub html: Option<String>,
    pub css: Option<String>,
}

impl CaptionInput {
    pub fn from_capture(capture: &Capture) -> Self {
        Self {
            url: capture.url.clone(),
            title: capture.title.clone(),
            description: capture.description.clone(),
            text: capture.text.clone(),
            html: capture.html.clone(),
            css: capture.css.clone(),
        }
    }

    pub fn from_record(record: &CaptureRecord) -> Self {
        Self {
            url: record.url.clone(),
            title: record.title.clone(),
            description: record.description.clone(),
            text: record.text.clone(),
            html: record.html.clone(),
            css: record.css.clone(),
        }
    }
}

/// What a provider returns for one prompt
#[derive(Debug, Clone, PartialEq)]
pub struct CaptionResponse {
    pub text: String,
    pub model: String,
    pub tokens_used: Option<u32>,
}

/// A finished caption, attributed to the provider that wrote it
#[derive(Debug, Clone, PartialEq)]
pub struct CaptionResult {
    pub provider: String,
    pub model: String,
    pub text: String,
    pub tokens_used: Option<u32>,
}

/// A captioning backend
#[async_trait]
pub trait CaptionProvider: Send + Sync {
    /// Registry name of the provider
    fn name(&self) -> &str;

    /// Generates a caption for the page from the rendered prompt
    async fn caption(&self, input: &CaptionInput, prompt: &str) -> crate::Result<CaptionResponse>;

    /// Problems that would make every call fail (missing credentials, etc.)
    fn validate(&self) -> Vec<String>;
}

/// Strips surrounding whitespace and wrapping quotes from model output
pub(crate) fn clean_caption(text: &str) -> String {
    text.trim().trim_matches('"').trim().to_string()
}
