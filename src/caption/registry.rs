//! Name to provider lookup

use crate::caption::{CaptionProvider, OllamaProvider, OpenAiProvider};
use crate::config::CaptioningConfig;
use crate::ConfigError;
use std::collections::BTreeMap;

/// Builds a provider from the captioning config
pub type ProviderConstructor = fn(&CaptioningConfig) -> crate::Result<Box<dyn CaptionProvider>>;

/// Registered captioning providers, keyed by name
///
/// Populate it once at startup and treat it as read-only afterwards.
#[derive(Default)]
pub struct ProviderRegistry {
    constructors: BTreeMap<String, ProviderConstructor>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the built-in providers
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register_builtin();
        registry
    }

    pub fn register_builtin(&mut self) {
        self.register("openai", openai);
        self.register("ollama", ollama);
    }

    /// Registers a provider; a later registration under the same name wins
    pub fn register(&mut self, name: &str, constructor: ProviderConstructor) {
        self.constructors
            .insert(name.to_lowercase(), constructor);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.constructors.contains_key(&name.to_lowercase())
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<&str> {
        self.constructors.keys().map(String::as_str).collect()
    }

    /// Creates the provider named by `config.provider`
    ///
    /// # Returns
    ///
    /// * `Ok(provider)` - A provider built from `config`
    /// * `Err(CrawlError::Config)` - No provider is registered under the name
    pub fn create(&self, config: &CaptioningConfig) -> crate::Result<Box<dyn CaptionProvider>> {
        let constructor = self
            .constructors
            .get(&config.provider.to_lowercase())
            .ok_or_else(|| ConfigError::UnknownProvider(config.provider.clone()))?;
        constructor(config)
    }
}

fn openai(config: &CaptioningConfig) -> crate::Result<Box<dyn CaptionProvider>> {
    Ok(Box::new(OpenAiProvider::new(config)?))
}

fn ollama(config: &CaptioningConfig) -> crate::Result<Box<dyn CaptionProvider>> {
    Ok(Box::new(OllamaProvider::new(config)?))
}
