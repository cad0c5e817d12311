/// Checks if a domain matches a domain-list entry
///
/// Two kinds of entries are supported:
/// 1. Plain entries match by substring: "wiki.org" matches "wiki.org" and
///    "en.wiki.org"
/// 2. Wildcard entries: "*.example.com" matches "example.com" and any of
///    its subdomains, but not "myexample.com"
///
/// Both sides are compared case-insensitively.
///
/// # Arguments
///
/// * `pattern` - The domain-list entry
/// * `candidate` - The domain to check
///
/// # Examples
///
/// ```
/// use pagescribe::url::matches_domain;
///
/// assert!(matches_domain("wiki.org", "en.wiki.org"));
/// assert!(!matches_domain("wiki.org", "other.com"));
///
/// assert!(matches_domain("*.example.com", "example.com"));
/// assert!(matches_domain("*.example.com", "api.v2.example.com"));
/// assert!(!matches_domain("*.example.com", "myexample.com"));
/// ```
pub fn matches_domain(pattern: &str, candidate: &str) -> bool {
    let pattern = pattern.to_lowercase();
    let candidate = candidate.to_lowercase();

    if pattern.is_empty() || candidate.is_empty() {
        return false;
    }

    if let Some(base) = pattern.strip_prefix("*.") {
        candidate == base || candidate.ends_with(&format!(".{}", base))
    } else {
        candidate.contains(&pattern)
    }
}

/// Returns true if the domain matches any entry of the list
pub fn matches_any(patterns: &[String], candidate: &str) -> bool {
    patterns.iter().any(|p| matches_domain(p, candidate))
}
