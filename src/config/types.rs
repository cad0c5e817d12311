use serde::Deserialize;

/// Main configuration structure for pagescribe
///
/// Every section and field has a built-in default, so a config file only
/// needs to name the values it changes.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub crawler: CrawlerConfig,
    pub captioning: CaptioningConfig,
    pub storage: StorageConfig,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CrawlerConfig {
    /// Maximum link distance from a seed URL
    #[serde(default = "default_max_depth")]
    pub max_depth: u32,

    /// Minimum time between two requests to the same domain (milliseconds)
    #[serde(default = "default_rate_limit")]
    pub rate_limit: u64,

    /// Upper bound on a robots.txt `Crawl-delay` (milliseconds)
    #[serde(default = "default_max_crawl_delay")]
    pub max_crawl_delay: u64,

    /// Number of pages processed concurrently
    #[serde(default = "default_concurrency")]
    pub concurrency: u32,

    /// Page fetch timeout (milliseconds)
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Whether robots.txt is consulted before fetching
    #[serde(default = "default_true")]
    pub respect_robots_txt: bool,

    /// User agent sent with every request and matched against robots.txt
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    #[serde(default = "default_viewport_width")]
    pub viewport_width: u32,

    #[serde(default = "default_viewport_height")]
    pub viewport_height: u32,

    /// Capture the full scrollable page rather than the viewport only
    #[serde(default = "default_true")]
    pub full_page: bool,

    /// Maximum number of URLs admitted per domain
    #[serde(default = "default_max_urls_per_domain")]
    pub max_urls_per_domain: u32,

    /// When non-empty, only these domains (or their subdomains) are crawled
    #[serde(default)]
    pub allowed_domains: Vec<String>,

    /// Domains that are never crawled
    #[serde(default)]
    pub blocked_domains: Vec<String>,

    /// Number of times a failing page is re-queued before it is marked failed
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

/// Captioning provider configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CaptioningConfig {
    /// Registered provider name (see `pagescribe providers`)
    #[serde(default = "default_provider")]
    pub provider: String,

    #[serde(default)]
    pub api_key: Option<String>,

    /// Model name; each provider falls back to its own default when unset
    #[serde(default)]
    pub model: Option<String>,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Include an excerpt of the page HTML in the prompt
    #[serde(default)]
    pub include_html: bool,

    /// Include the page's inline CSS in the prompt
    #[serde(default)]
    pub include_css: bool,

    /// Custom prompt; supports {url}, {title}, {description}, {text}, {html}, {css}
    #[serde(default)]
    pub prompt_template: Option<String>,

    /// Override for the provider's API endpoint
    #[serde(default)]
    pub base_url: Option<String>,
}

/// Storage configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct StorageConfig {
    /// Directory for screenshots and other capture artifacts
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    /// Path to the SQLite database file
    #[serde(default = "default_db_path")]
    pub db_path: String,

    /// Screenshots larger than this many bytes are not written to disk
    #[serde(default = "default_max_screenshot_size")]
    pub max_screenshot_size: u64,
}

fn default_max_depth() -> u32 {
    2
}
fn default_rate_limit() -> u64 {
    1000
}
fn default_max_crawl_delay() -> u64 {
    60_000
}
fn default_concurrency() -> u32 {
    3
}
fn default_timeout() -> u64 {
    30_000
}
fn default_true() -> bool {
    true
}
fn default_user_agent() -> String {
    format!("pagescribe/{}", env!("CARGO_PKG_VERSION"))
}
fn default_viewport_width() -> u32 {
    1920
}
fn default_viewport_height() -> u32 {
    1080
}
fn default_max_urls_per_domain() -> u32 {
    100
}
fn default_max_retries() -> u32 {
    3
}
fn default_provider() -> String {
    "openai".to_string()
}
fn default_max_tokens() -> u32 {
    500
}
fn default_data_dir() -> String {
    "./data".to_string()
}
fn default_db_path() -> String {
    "./data/pagescribe.db".to_string()
}
fn default_max_screenshot_size() -> u64 {
    10 * 1024 * 1024
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            rate_limit: default_rate_limit(),
            max_crawl_delay: default_max_crawl_delay(),
            concurrency: default_concurrency(),
            timeout: default_timeout(),
            respect_robots_txt: true,
            user_agent: default_user_agent(),
            viewport_width: default_viewport_width(),
            viewport_height: default_viewport_height(),
            full_page: true,
            max_urls_per_domain: default_max_urls_per_domain(),
            allowed_domains: Vec::new(),
            blocked_domains: Vec::new(),
            max_retries: default_max_retries(),
        }
    }
}

impl Default for CaptioningConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            api_key: None,
            model: None,
            max_tokens: default_max_tokens(),
            include_html: false,
            include_css: false,
            prompt_template: None,
            base_url: None,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            db_path: default_db_path(),
            max_screenshot_size: default_max_screenshot_size(),
        }
    }
}

/// Values supplied on the command line; each `Some` replaces the file value
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub max_depth: Option<u32>,
    pub concurrency: Option<u32>,
    pub rate_limit: Option<u64>,
    pub respect_robots_txt: Option<bool>,
    pub provider: Option<String>,
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub db_path: Option<String>,
    pub data_dir: Option<String>,
}

impl CliOverrides {
    /// Applies the overrides on top of an already loaded configuration
    pub fn apply(&self, config: &mut Config) {
        if let Some(depth) = self.max_depth {
            config.crawler.max_depth = depth;
        }
        if let Some(concurrency) = self.concurrency {
            config.crawler.concurrency = concurrency;
        }
        if let Some(rate_limit) = self.rate_limit {
            config.crawler.rate_limit = rate_limit;
        }
        if let Some(respect) = self.respect_robots_txt {
            config.crawler.respect_robots_txt = respect;
        }
        if let Some(provider) = &self.provider {
            config.captioning.provider = provider.clone();
        }
        if let Some(api_key) = &self.api_key {
            config.captioning.api_key = Some(api_key.clone());
        }
        if let Some(model) = &self.model {
            config.captioning.model = Some(model.clone());
        }
        if let Some(db_path) = &self.db_path {
            config.storage.db_path = db_path.clone();
        }
        if let Some(data_dir) = &self.data_dir {
            config.storage.data_dir = data_dir.clone();
        }
    }
}
