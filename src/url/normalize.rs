use url::Url;

/// Scheme assumed when the input has none
const DEFAULT_SCHEME: &str = "https";

/// Canonicalizes a URL into the identity key shared by documents and jobs
///
/// # Normalization Steps
///
/// 1. Supply `https` when the scheme is missing (`//host/..` or `host/..`)
/// 2. Lowercase the scheme and the authority (host and port)
/// 3. Use `/` for an empty path
/// 4. Keep the path and the query byte-for-byte, without re-encoding
/// 5. Drop the fragment
///
/// Malformed input never fails: the same rules are applied textually, so the
/// result is still stable.
///
/// # Examples
///
/// ```
/// use wiki_harvest::url::normalize_url;
///
/// assert_eq!(
///     normalize_url("HTTPS://RU.Wikipedia.org/wiki/Атом#History"),
///     "https://ru.wikipedia.org/wiki/Атом"
/// );
/// assert_eq!(normalize_url("ru.wikipedia.org"), "https://ru.wikipedia.org/");
/// ```
pub fn normalize_url(raw: &str) -> String {
    let with_scheme = with_default_scheme(raw.trim());
    let parts = UrlParts::split(&with_scheme);

    let scheme = match Url::parse(&with_scheme) {
        Ok(url) if url.has_host() => url.scheme().to_string(),
        _ => parts.scheme.to_lowercase(),
    };

    let path = if parts.path.is_empty() {
        "/"
    } else {
        parts.path
    };

    match parts.query {
        Some(query) => format!(
            "{}://{}{}?{}",
            scheme,
            parts.authority.to_lowercase(),
            path,
            query
        ),
        None => format!("{}://{}{}", scheme, parts.authority.to_lowercase(), path),
    }
}

/// Textual components of a URL, borrowed from the input
#[derive(Debug, PartialEq, Eq)]
struct UrlParts<'a> {
    scheme: &'a str,
    authority: &'a str,
    path: &'a str,
    query: Option<&'a str>,
}

impl<'a> UrlParts<'a> {
    /// Splits `scheme://authority/path?query#fragment`, discarding the fragment
    fn split(raw: &'a str) -> Self {
        let without_fragment = raw.split('#').next().unwrap_or_default();

        let (scheme, rest) = without_fragment
            .split_once("://")
            .unwrap_or((DEFAULT_SCHEME, without_fragment));

        let authority_end = rest.find(|c| c == '/' || c == '?').unwrap_or(rest.len());
        let (authority, tail) = rest.split_at(authority_end);

        let (path, query) = match tail.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (tail, None),
        };

        Self {
            scheme,
            authority,
            path,
            query,
        }
    }
}

/// Prefixes the default scheme when the input has none
fn with_default_scheme(raw: &str) -> String {
    if raw.starts_with("//") {
        format!("{}:{}", DEFAULT_SCHEME, raw)
    } else if has_scheme(raw) {
        raw.to_string()
    } else {
        format!("{}://{}", DEFAULT_SCHEME, raw)
    }
}

/// True when the input starts with `scheme://`
fn has_scheme(raw: &str) -> bool {
    match raw.find("://") {
        Some(idx) if idx > 0 => {
            let scheme = &raw[..idx];
            scheme
                .chars()
                .next()
                .map(|c| c.is_ascii_alphabetic())
                .unwrap_or(false)
                && scheme
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remove_fragment() {
        assert_eq!(
            normalize_url("https://en.wikipedia.org/wiki/Atom#Structure"),
            "https://en.wikipedia.org/wiki/Atom"
        );
    }

    #[test]
    fn test_lowercase_host_keeps_path_case() {
        assert_eq!(
            normalize_url("https://EN.Wikipedia.ORG/wiki/Atom"),
            "https://en.wikipedia.org/wiki/Atom"
        );
    }

    #[test]
    fn test_lowercase_scheme() {
        assert_eq!(
            normalize_url("HTTP://en.wikipedia.org/wiki/Atom"),
            "http://en.wikipedia.org/wiki/Atom"
        );
    }

    #[test]
    fn test_default_scheme() {
        assert_eq!(
            normalize_url("en.wikipedia.org/wiki/Atom"),
            normalize_url("https://en.wikipedia.org/wiki/Atom")
        );
        assert_eq!(
            normalize_url("//en.wikipedia.org/wiki/Atom"),
            "https://en.wikipedia.org/wiki/Atom"
        );
    }

    #[test]
    fn test_empty_path_becomes_root() {
        assert_eq!(
            normalize_url("https://en.wikipedia.org"),
            "https://en.wikipedia.org/"
        );
    }

    #[test]
    fn test_query_preserved() {
        assert_eq!(
            normalize_url("https://en.wikipedia.org/w/index.php?title=Atom&oldid=5#top"),
            "https://en.wikipedia.org/w/index.php?title=Atom&oldid=5"
        );
    }

    #[test]
    fn test_equivalent_inputs_share_key() {
        let variants = [
            "https://ru.wikipedia.org/wiki/Физика",
            "https://RU.WIKIPEDIA.ORG/wiki/Физика#Разделы",
            "ru.wikipedia.org/wiki/Физика",
            "//ru.wikipedia.org/wiki/Физика#x",
        ];

        let expected = normalize_url(variants[0]);
        for variant in variants {
            assert_eq!(normalize_url(variant), expected, "input {}", variant);
        }
    }

    #[test]
    fn test_idempotent() {
        let inputs = [
            "https://en.wikipedia.org/wiki/Atom#Structure",
            "EN.wikipedia.org",
            "https://en.wikipedia.org/wiki/Quantum_mechanics?action=raw",
            "https://ru.wikipedia.org/wiki/%D0%90%D1%82%D0%BE%D0%BC",
            "http://exa mple.com/Some Page#frag",
            "not a url at all",
            "",
        ];

        for input in inputs {
            let once = normalize_url(input);
            assert_eq!(normalize_url(&once), once, "input {:?}", input);
        }
    }

    #[test]
    fn test_malformed_input_is_best_effort() {
        assert_eq!(
            normalize_url("http://Exa Mple.com/Page#frag"),
            "http://exa mple.com/Page"
        );
    }

    #[test]
    fn test_path_and_query_kept_verbatim() {
        let url = "https://ru.wikipedia.org/w/index.php?title=Физика";
        assert_eq!(normalize_url(url), url);
        assert_eq!(normalize_url(&normalize_url(url)), url);

        assert_eq!(
            normalize_url("https://ru.wikipedia.org/w/index.php?title=Физика&a=b c#x"),
            "https://ru.wikipedia.org/w/index.php?title=Физика&a=b c"
        );
        assert_eq!(
            normalize_url("https://ru.wikipedia.org/wiki/Физика"),
            "https://ru.wikipedia.org/wiki/Физика"
        );
    }

    #[test]
    fn test_encoded_and_raw_paths_stay_distinct() {
        assert_eq!(
            normalize_url("https://ru.wikipedia.org/wiki/%D0%90%D1%82%D0%BE%D0%BC"),
            "https://ru.wikipedia.org/wiki/%D0%90%D1%82%D0%BE%D0%BC"
        );
    }

    #[test]
    fn test_port_and_dot_segments_untouched() {
        assert_eq!(
            normalize_url("https://X.org:443/a/../b"),
            "https://x.org:443/a/../b"
        );
    }

    #[test]
    fn test_query_without_path() {
        assert_eq!(
            normalize_url("https://en.wikipedia.org?title=Atom"),
            "https://en.wikipedia.org/?title=Atom"
        );
    }

    #[test]
    fn test_split_parts() {
        assert_eq!(
            UrlParts::split("https://host:8080/p/q?x=1&y=2#frag"),
            UrlParts {
                scheme: "https",
                authority: "host:8080",
                path: "/p/q",
                query: Some("x=1&y=2"),
            }
        );
    }

    #[test]
    fn test_has_scheme() {
        assert!(has_scheme("https://example.com"));
        assert!(has_scheme("svn+ssh://example.com"));
        assert!(!has_scheme("example.com/a://b"));
        assert!(!has_scheme("://example.com"));
    }
}
