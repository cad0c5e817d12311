use crate::capture::{build_http_client, fetch_page, parse_html_for_site, Capture, FetchResult, Renderer};
use crate::config::CrawlerConfig;
use crate::url::{domain_of, normalize_url};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Renderer that fetches pages over plain HTTP and extracts them with an
/// HTML parser
///
/// Pages are captured as served, without running scripts. No screenshot is
/// produced.
pub struct HttpRenderer {
    client: Client,
}

impl HttpRenderer {
    pub fn new(config: &CrawlerConfig) -> crate::Result<Self> {
        let client = build_http_client(&config.user_agent, Duration::from_millis(config.timeout))?;
        Ok(Self { client })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Renderer for HttpRenderer {
    async fn capture(&self, url: &str, depth: u32) -> crate::Result<Option<Capture>> {
        let (final_url, status_code, body) = match fetch_page(&self.client, url).await? {
            FetchResult::Success {
                final_url,
                status_code,
                body,
                ..
            } => (final_url, status_code, body),
            FetchResult::ContentMismatch { content_type } => {
                debug!("Skipping {}: content type {}", url, content_type);
                return Ok(None);
            }
            FetchResult::PermanentError { status_code } => {
                debug!("Skipping {}: HTTP {}", url, status_code);
                return Ok(None);
            }
        };

        // Links resolve against the page that was actually served, but stay
        // internal only to the site that was requested
        let requested = Url::parse(url)?;
        let base = Url::parse(&final_url).unwrap_or_else(|_| requested.clone());
        let parsed = parse_html_for_site(&body, &base, &requested);

        Ok(Some(Capture {
            url: url.to_string(),
            normalized_url: normalize_url(url),
            domain: domain_of(url),
            depth,
            status_code,
            title: parsed.title,
            description: parsed.description,
            text: parsed.text,
            css: parsed.css,
            links: parsed.links,
            bytes_downloaded: body.len() as u64,
            html: Some(body),
            screenshot: None,
            captured_at: Utc::now(),
        }))
    }
}
