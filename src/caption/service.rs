use crate::caption::{
    render_prompt, CaptionInput, CaptionProvider, CaptionResult, ProviderRegistry, DEFAULT_PROMPT,
};
use crate::config::CaptioningConfig;
use crate::ConfigError;
use tracing::debug;

/// Renders prompts and calls the configured provider
pub struct CaptionService {
    provider: Box<dyn CaptionProvider>,
    config: CaptioningConfig,
}

impl CaptionService {
    pub fn new(provider: Box<dyn CaptionProvider>, config: CaptioningConfig) -> Self {
        Self { provider, config }
    }

    /// Creates the configured provider and checks it is usable
    pub fn from_config(registry: &ProviderRegistry, config: &CaptioningConfig) -> crate::Result<Self> {
        let provider = registry.create(config)?;

        let problems = provider.validate();
        if !problems.is_empty() {
            return Err(ConfigError::Validation(problems.join("; ")).into());
        }

        Ok(Self::new(provider, config.clone()))
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub fn prompt_for(&self, input: &CaptionInput) -> String {
        let template = self
            .config
            .prompt_template
            .as_deref()
            .unwrap_or(DEFAULT_PROMPT);
        render_prompt(
            template,
            input,
            self.config.include_html,
            self.config.include_css,
        )
    }

    pub async fn caption(&self, input: &CaptionInput) -> crate::Result<CaptionResult> {
        let prompt = self.prompt_for(input);
        debug!(
            "Captioning {} with {} ({} prompt bytes)",
            input.url,
            self.provider.name(),
            prompt.len()
        );

        let response = self.provider.caption(input, &prompt).await?;

        Ok(CaptionResult {
            provider: self.provider.name().to_string(),
            model: response.model,
            text: response.text,
            tokens_used: response.tokens_used,
        })
    }
}
