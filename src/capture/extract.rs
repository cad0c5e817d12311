//! HTML parser for extracting links and metadata
//!
//! This module handles parsing HTML content to extract:
//! - Page title and meta description
//! - Visible text
//! - Inline CSS from `<style>` elements
//! - Links to follow, each flagged internal or external

use crate::capture::PageLink;
use crate::url::extract_domain;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use url::Url;

/// Elements whose text is never shown to a reader
const HIDDEN_ELEMENTS: &[&str] = &["script", "style", "noscript", "template"];

/// Extracted information from an HTML page
#[derive(Debug, Clone, Default)]
pub struct ParsedPage {
    /// The page title (from <title> tag)
    pub title: Option<String>,

    /// Content of `<meta name="description">`
    pub description: Option<String>,

    /// Visible body text, whitespace-collapsed
    pub text: String,

    /// Concatenated contents of inline `<style>` elements
    pub css: Option<String>,

    /// Links found on the page (absolute URLs, first occurrence only)
    pub links: Vec<PageLink>,
}

/// Parses HTML content and extracts metadata, text and links
///
/// # Link Extraction Rules
///
/// **Include:** `<a href="...">` tags, resolved against `base_url`
///
/// **Exclude:**
/// - `<a href="..." download>`
/// - `javascript:`, `mailto:`, `tel:` links and data URIs
/// - Fragment-only links
/// - Anything that does not resolve to http(s)
///
/// A link is internal when its host equals the page's host, ignoring a
/// leading `www.` on either side.
///
/// # Example
///
/// ```
/// use pagescribe::capture::parse_html;
/// use url::Url;
///
/// let html = r#"<html><head><title>Test</title></head><body><a href="/page">Link</a></body></html>"#;
/// let base_url = Url::parse("https://example.com/").unwrap();
/// let parsed = parse_html(html, &base_url);
/// assert_eq!(parsed.title, Some("Test".to_string()));
/// assert!(parsed.links[0].is_internal);
/// ```
pub fn parse_html(html: &str, base_url: &Url) -> ParsedPage {
    parse_html_for_site(html, base_url, base_url)
}

/// Parses HTML served from `base_url` on behalf of a request to `site_url`
///
/// # Arguments
///
/// * `html` - The page body
/// * `base_url` - URL the body was served from, used to resolve relative links
/// * `site_url` - URL that was requested, whose host decides which links are
///   internal
///
/// After a cross-domain redirect the two differ, and links on the redirect
/// target count as external to the requested site.
pub fn parse_html_for_site(html: &str, base_url: &Url, site_url: &Url) -> ParsedPage {
    let document = Html::parse_document(html);

    ParsedPage {
        title: extract_title(&document),
        description: extract_description(&document),
        text: extract_text(&document),
        css: extract_css(&document),
        links: extract_links(&document, base_url, site_url),
    }
}

fn extract_title(document: &Html) -> Option<String> {
    let title_selector = Selector::parse("title").ok()?;

    document
        .select(&title_selector)
        .next()
        .map(|element| collapse_whitespace(&element.text().collect::<String>()))
        .filter(|s| !s.is_empty())
}

fn extract_description(document: &Html) -> Option<String> {
    let selector = Selector::parse(r#"meta[name="description"]"#).ok()?;

    document
        .select(&selector)
        .filter_map(|element| element.value().attr("content"))
        .map(collapse_whitespace)
        .find(|s| !s.is_empty())
}

fn extract_text(document: &Html) -> String {
    let root = Selector::parse("body")
        .ok()
        .and_then(|selector| document.select(&selector).next())
        .unwrap_or_else(|| document.root_element());

    let mut words: Vec<&str> = Vec::new();
    for node in root.descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };

        let hidden = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .map(|e| HIDDEN_ELEMENTS.contains(&e.name()))
                .unwrap_or(false)
        });

        if !hidden {
            words.extend(text.split_whitespace());
        }
    }

    words.join(" ")
}

fn extract_css(document: &Html) -> Option<String> {
    let selector = Selector::parse("style").ok()?;

    let css = document
        .select(&selector)
        .map(|element| element.text().collect::<String>().trim().to_string())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("\n");

    if css.is_empty() {
        None
    } else {
        Some(css)
    }
}

fn extract_links(document: &Html, base_url: &Url, site_url: &Url) -> Vec<PageLink> {
    let mut links = Vec::new();
    let mut seen = HashSet::new();

    let Ok(a_selector) = Selector::parse("a[href]") else {
        return links;
    };

    let site_host = extract_domain(site_url).map(|h| strip_www(&h).to_string());

    for element in document.select(&a_selector) {
        if element.value().attr("download").is_some() {
            continue;
        }

        let Some(href) = element.value().attr("href") else {
            continue;
        };

        let Some(absolute) = resolve_link(href, base_url) else {
            continue;
        };

        if !seen.insert(absolute.to_string()) {
            continue;
        }

        let is_internal = match (&site_host, extract_domain(&absolute)) {
            (Some(site), Some(host)) => strip_www(&host) == site,
            _ => false,
        };

        links.push(PageLink {
            url: absolute.to_string(),
            text: anchor_text(&element),
            is_internal,
        });
    }

    links
}

/// Resolves a link href to an absolute URL and validates it
///
/// Returns None if the link should be excluded.
fn resolve_link(href: &str, base_url: &Url) -> Option<Url> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lower = href.to_ascii_lowercase();
    if lower.starts_with("javascript:")
        || lower.starts_with("mailto:")
        || lower.starts_with("tel:")
        || lower.starts_with("data:")
    {
        return None;
    }

    let absolute = base_url.join(href).ok()?;
    if absolute.scheme() == "http" || absolute.scheme() == "https" {
        Some(absolute)
    } else {
        None
    }
}

fn anchor_text(element: &ElementRef<'_>) -> String {
    collapse_whitespace(&element.text().collect::<String>())
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn strip_www(host: &str) -> &str {
    host.strip_prefix("www.").unwrap_or(host)
}
