/// Checks if a host matches a wildcard pattern
///
/// `"ru.wikipedia.org"` matches only itself; `"*.wikipedia.org"` matches
/// `wikipedia.org` and any of its subdomains.
///
/// # Examples
///
/// ```
/// use wiki_harvest::url::matches_wildcard;
///
/// assert!(matches_wildcard("ru.wikipedia.org", "ru.wikipedia.org"));
/// assert!(matches_wildcard("*.wikipedia.org", "ru.wikipedia.org"));
/// assert!(!matches_wildcard("*.wikipedia.org", "ru.wikibooks.org"));
/// ```
pub fn matches_wildcard(pattern: &str, candidate: &str) -> bool {
    if let Some(base) = pattern.strip_prefix("*.") {
        candidate == base || candidate.ends_with(&format!(".{}", base))
    } else {
        candidate == pattern
    }
}

/// Returns true if `host` matches any of the allow-listed patterns
///
/// The host is compared case-insensitively; patterns are expected lowercase.
pub fn host_allowed(patterns: &[String], host: &str) -> bool {
    let host = host.to_lowercase();
    patterns.iter().any(|p| matches_wildcard(p, &host))
}
