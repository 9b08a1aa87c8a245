//! HTML parsing for fetched wiki pages
//!
//! This module handles:
//! - Plain text extraction (script, style and noscript content dropped)
//! - Discovery of links to other articles of the same wiki

use crate::url::{host_allowed, is_valid_title, normalize_url};
use scraper::{Html, Node, Selector};
use std::collections::BTreeSet;
use url::Url;

/// Elements whose text never reaches the extracted document
const SKIPPED_ELEMENTS: [&str; 3] = ["script", "style", "noscript"];

/// Extracts readable text from an HTML page
///
/// Text nodes are joined with single spaces and every run of whitespace is
/// collapsed, so the result has no leading, trailing or repeated spaces.
///
/// # Example
///
/// ```
/// use wiki_harvest::crawler::html_to_text;
///
/// let html = "<html><body><h1>Atom</h1><script>var x;</script><p>A  small\n particle</p></body></html>";
/// assert_eq!(html_to_text(html), "Atom A small particle");
/// ```
pub fn html_to_text(html: &str) -> String {
    let document = Html::parse_document(html);

    let mut pieces = Vec::new();
    for node in document.root_element().descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };

        let hidden = node.ancestors().any(|ancestor| match ancestor.value() {
            Node::Element(element) => SKIPPED_ELEMENTS.contains(&element.name()),
            _ => false,
        });
        if hidden {
            continue;
        }

        let trimmed = text.trim();
        if !trimmed.is_empty() {
            pieces.push(trimmed);
        }
    }

    pieces
        .join(" ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Extracts normalized links to articles on allow-listed hosts
///
/// # Link Extraction Rules
///
/// **Include** `<a href="...">` targets that, once resolved against
/// `base_url`:
/// - are on a host matching `allowed_hosts` (port ignored)
/// - have a path starting with `path_prefix`
/// - name a valid article title (percent-decoded path after the prefix)
///
/// **Exclude** fragment-only, `javascript:` and `mailto:` links.
///
/// The result is deduplicated and sorted.
pub fn extract_wiki_links(
    html: &str,
    base_url: &Url,
    allowed_hosts: &[String],
    path_prefix: &str,
) -> Vec<String> {
    let document = Html::parse_document(html);
    let mut links = BTreeSet::new();

    let Ok(a_selector) = Selector::parse("a[href]") else {
        return Vec::new();
    };

    for element in document.select(&a_selector) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };

        if let Some(url) = resolve_link(href, base_url) {
            if is_article_link(&url, allowed_hosts, path_prefix) {
                links.insert(normalize_url(url.as_str()));
            }
        }
    }

    links.into_iter().collect()
}

/// Resolves a link href to an absolute URL
///
/// Returns None for empty, fragment-only, `javascript:` and `mailto:` links
/// and for hrefs that do not resolve.
fn resolve_link(href: &str, base_url: &Url) -> Option<Url> {
    let href = href.trim();

    if href.is_empty()
        || href.starts_with('#')
        || href.starts_with("javascript:")
        || href.starts_with("mailto:")
    {
        return None;
    }

    base_url.join(href).ok()
}

fn is_article_link(url: &Url, allowed_hosts: &[String], path_prefix: &str) -> bool {
    let Some(host) = url.host_str() else {
        return false;
    };
    if !host_allowed(allowed_hosts, host) {
        return false;
    }

    let Some(encoded_title) = url.path().strip_prefix(path_prefix) else {
        return false;
    };

    match urlencoding::decode(encoded_title) {
        Ok(title) => is_valid_title(&title),
        Err(_) => false,
    }
}
