use url::Url;

/// Query parameters that only carry tracking information
const TRACKING_PARAMS: &[&str] = &[
    "utm_source",
    "utm_medium",
    "utm_campaign",
    "utm_content",
    "utm_term",
    "ref",
    "fbclid",
    "gclid",
];

/// Normalizes a URL into the canonical form used as its identity key
///
/// # Normalization Steps
///
/// 1. Parse the URL; malformed input is returned unchanged
/// 2. Remove the fragment (everything after #)
/// 3. Remove tracking query parameters, keeping the order of the others
/// 4. Remove an empty query string
/// 5. Remove a trailing slash from the path unless the path is the root
///
/// Scheme and host casing follow the `url` crate's parser, so the host is
/// always lowercase. Nothing else (scheme, `www.` prefix, parameter order)
/// is rewritten.
///
/// # Arguments
///
/// * `url_str` - The URL to normalize
///
/// # Returns
///
/// The normalized URL string, or the input unchanged if it does not parse
///
/// # Examples
///
/// ```
/// use pagescribe::url::normalize_url;
///
/// assert_eq!(normalize_url("https://a.com/x/?utm_source=y#frag"), "https://a.com/x");
/// assert_eq!(normalize_url("https://a.com/x"), "https://a.com/x");
/// assert_eq!(normalize_url("not a url"), "not a url");
/// ```
pub fn normalize_url(url_str: &str) -> String {
    let mut url = match Url::parse(url_str) {
        Ok(url) => url,
        Err(_) => return url_str.to_string(),
    };

    url.set_fragment(None);

    if let Some(query) = url.query() {
        let kept = strip_tracking_params(query);
        if kept.is_empty() {
            url.set_query(None);
        } else {
            url.set_query(Some(&kept));
        }
    }

    let path = url.path().to_string();
    if path.len() > 1 && path.ends_with('/') {
        let trimmed = path.trim_end_matches('/');
        url.set_path(if trimmed.is_empty() { "/" } else { trimmed });
    }

    url.to_string()
}

/// Drops tracking pairs from a raw query string without re-encoding the rest
fn strip_tracking_params(query: &str) -> String {
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .filter(|pair| {
            let key = pair.split('=').next().unwrap_or("");
            !is_tracking_param(key)
        })
        .collect::<Vec<_>>()
        .join("&")
}

/// Checks if a query parameter is a tracking parameter
fn is_tracking_param(key: &str) -> bool {
    TRACKING_PARAMS.contains(&key)
}
