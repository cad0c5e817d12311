//! HTTP fetcher implementation
//!
//! This module handles the HTTP side of page capture:
//! - Building HTTP clients with the configured user agent and timeout
//! - GET requests to fetch page content
//! - Classifying responses into usable, skippable and retryable outcomes

use crate::CrawlError;
use reqwest::{redirect::Policy, Client, StatusCode};
use std::time::Duration;

/// Outcome of a fetch that reached the server
#[derive(Debug)]
pub enum FetchResult {
    /// Successfully fetched an HTML page
    Success {
        /// Final URL after redirects
        final_url: String,
        status_code: u16,
        content_type: String,
        body: String,
    },

    /// Page is not HTML
    ContentMismatch { content_type: String },

    /// The server answered with a status that will not change on retry
    PermanentError { status_code: u16 },
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `user_agent` - User agent sent with every request
/// * `timeout` - Total request timeout
///
/// # Example
///
/// ```no_run
/// use pagescribe::capture::build_http_client;
/// use std::time::Duration;
///
/// let client = build_http_client("pagescribe/0.1", Duration::from_secs(30)).unwrap();
/// ```
pub fn build_http_client(user_agent: &str, timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(user_agent)
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(10))
        .redirect(Policy::limited(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetches a URL and classifies the response
///
/// | Condition | Result |
/// |-----------|--------|
/// | 2xx with HTML body | `Ok(Success)` |
/// | 2xx, not HTML | `Ok(ContentMismatch)` |
/// | 4xx except 408 and 429 | `Ok(PermanentError)` |
/// | 408, 429, 5xx | `Err(HttpStatus)` (retryable) |
/// | Timeout, connection or body error | `Err(Http)` (retryable) |
pub async fn fetch_page(client: &Client, url: &str) -> crate::Result<FetchResult> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|source| CrawlError::Http {
            url: url.to_string(),
            source,
        })?;

    let status = response.status();
    let final_url = response.url().to_string();

    if !status.is_success() {
        if is_retryable_status(status) {
            return Err(CrawlError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        return Ok(FetchResult::PermanentError {
            status_code: status.as_u16(),
        });
    }

    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();

    if !is_html(&content_type) {
        return Ok(FetchResult::ContentMismatch { content_type });
    }

    let body = response.text().await.map_err(|source| CrawlError::Http {
        url: url.to_string(),
        source,
    })?;

    Ok(FetchResult::Success {
        final_url,
        status_code: status.as_u16(),
        content_type,
        body,
    })
}

fn is_retryable_status(status: StatusCode) -> bool {
    status.is_server_error()
        || status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
}

/// Missing content types are treated as HTML
fn is_html(content_type: &str) -> bool {
    let content_type = content_type.to_ascii_lowercase();
    content_type.is_empty()
        || content_type.contains("text/html")
        || content_type.contains("application/xhtml+xml")
}
