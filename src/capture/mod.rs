//! Page capture
//!
//! A [`Renderer`] turns a URL into a [`Capture`]: the page's metadata,
//! visible text, links and, for renderers that can take one, a screenshot.
//! [`HttpRenderer`] is the built-in renderer; it fetches HTML over HTTP and
//! never produces a screenshot.

mod extract;
mod fetcher;
mod http_renderer;

pub use extract::{parse_html, parse_html_for_site, ParsedPage};
pub use fetcher::{build_http_client, fetch_page, FetchResult};
pub use http_renderer::HttpRenderer;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A link found on a captured page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageLink {
    /// Absolute URL
    pub url: String,

    /// Anchor text, whitespace-collapsed
    pub text: String,

    /// Whether the link points at the same site as the page it was found on
    pub is_internal: bool,
}

/// The rendered artifact and extracted data for one fetched page
#[derive(Debug, Clone)]
pub struct Capture {
    pub url: String,
    pub normalized_url: String,
    pub domain: String,
    pub depth: u32,
    pub status_code: u16,
    pub title: Option<String>,
    pub description: Option<String>,
    pub text: String,
    pub html: Option<String>,
    pub css: Option<String>,
    pub links: Vec<PageLink>,
    pub screenshot: Option<Vec<u8>>,
    pub bytes_downloaded: u64,
    pub captured_at: DateTime<Utc>,
}

impl Capture {
    /// Links the crawler may follow
    pub fn internal_links(&self) -> impl Iterator<Item = &PageLink> {
        self.links.iter().filter(|l| l.is_internal)
    }
}

/// Produces captures for URLs
///
/// `Ok(None)` means the page was deliberately not captured (blocked, not
/// HTML, permanently gone) and must not be retried. An `Err` is a
/// recoverable failure that the scheduler retries.
#[async_trait]
pub trait Renderer: Send + Sync {
    async fn capture(&self, url: &str, depth: u32) -> crate::Result<Option<Capture>>;
}
