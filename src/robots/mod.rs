//! Robots.txt handling module
//!
//! [`RobotsGate`] fetches, parses and caches robots.txt per domain and
//! answers allow/deny and crawl-delay questions for URLs. A domain moves
//! from unfetched to cached on its first successful fetch and stays cached
//! until [`RobotsGate::clear_cache`]. Failed fetches allow everything and
//! are not cached, so the next check fetches again.

mod cache;
mod parser;

pub use cache::{CachedRobots, RobotsCache};
pub use parser::{product_token, ParsedRobots};

use crate::capture::build_http_client;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Timeout for a single robots.txt request
const ROBOTS_TIMEOUT: Duration = Duration::from_secs(10);

/// Answer for one URL
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RobotsCheck {
    pub is_allowed: bool,

    /// Crawl-delay for the user agent, in seconds
    pub crawl_delay: Option<f64>,

    pub sitemaps: Vec<String>,
}

impl RobotsCheck {
    fn allow_all() -> Self {
        Self {
            is_allowed: true,
            crawl_delay: None,
            sitemaps: Vec::new(),
        }
    }
}

/// Robots.txt compliance gate
pub struct RobotsGate {
    client: Client,
    scheme: String,
    cache: RobotsCache,
}

impl RobotsGate {
    /// Creates a gate that fetches robots.txt over https
    pub fn new(user_agent: &str) -> crate::Result<Self> {
        let client = build_http_client(user_agent, ROBOTS_TIMEOUT)?;
        Ok(Self::with_client(client))
    }

    pub fn with_client(client: Client) -> Self {
        Self {
            client,
            scheme: "https".to_string(),
            cache: RobotsCache::new(),
        }
    }

    /// Overrides the scheme used to fetch robots.txt
    pub fn with_scheme(mut self, scheme: &str) -> Self {
        self.scheme = scheme.to_string();
        self
    }

    /// Checks whether `url` may be fetched by `user_agent`
    ///
    /// Fetches and caches the domain's robots.txt on first use. URLs that
    /// cannot be parsed are allowed.
    ///
    /// # Arguments
    ///
    /// * `url` - The URL to check
    /// * `user_agent` - The user agent to match against robots.txt groups
    ///
    /// # Returns
    ///
    /// The verdict with the applicable crawl delay and the listed sitemaps
    pub async fn check(&self, url: &str, user_agent: &str) -> RobotsCheck {
        let Some(key) = cache_key(url) else {
            return RobotsCheck::allow_all();
        };

        let robots = match self.cache.get(&key) {
            Some(cached) => cached.content,
            None => match self.fetch(&key).await {
                Some(robots) => {
                    self.cache.insert(&key, robots.clone());
                    robots
                }
                None => return RobotsCheck::allow_all(),
            },
        };

        RobotsCheck {
            is_allowed: robots.is_allowed(url, user_agent),
            crawl_delay: robots.crawl_delay(user_agent),
            sitemaps: robots.sitemaps(),
        }
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    pub fn cached_domains(&self) -> Vec<String> {
        self.cache.domains()
    }

    /// Fetches robots.txt for a `host[:port]`; `None` on any failure
    async fn fetch(&self, authority: &str) -> Option<ParsedRobots> {
        let robots_url = format!("{}://{}/robots.txt", self.scheme, authority);

        let response = match self
            .client
            .get(&robots_url)
            .timeout(ROBOTS_TIMEOUT)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!("Failed to fetch {}: {}", robots_url, e);
                return None;
            }
        };

        if !response.status().is_success() {
            debug!("{} returned HTTP {}", robots_url, response.status());
            return None;
        }

        match response.text().await {
            Ok(body) => {
                debug!("Fetched {} ({} bytes)", robots_url, body.len());
                Some(ParsedRobots::from_content(&body))
            }
            Err(e) => {
                warn!("Failed to read {}: {}", robots_url, e);
                None
            }
        }
    }
}

/// `host[:port]` of a URL, lowercased
fn cache_key(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?.to_lowercase();
    Some(match parsed.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host,
    })
}
