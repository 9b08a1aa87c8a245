/// Separator between a namespace and a page name (`Category:Physics`)
const NAMESPACE_SEPARATOR: char = ':';

/// Returns true if a wiki title names an ordinary article
///
/// Empty titles and titles carrying a namespace (`File:..`, `Category:..`,
/// `Talk:..`) are rejected.
///
/// # Examples
///
/// ```
/// use wiki_harvest::url::is_valid_title;
///
/// assert!(is_valid_title("Quantum mechanics"));
/// assert!(!is_valid_title("Category:Physics"));
/// assert!(!is_valid_title(""));
/// ```
pub fn is_valid_title(title: &str) -> bool {
    !title.is_empty() && !title.contains(NAMESPACE_SEPARATOR)
}

/// Converts a display title into its URL path form (spaces become underscores)
pub fn title_to_path(title: &str) -> String {
    title.replace(' ', "_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_article_titles_are_valid() {
        assert!(is_valid_title("Atom"));
        assert!(is_valid_title("Special relativity"));
        assert!(is_valid_title("Физика"));
    }

    #[test]
    fn test_namespaced_titles_are_rejected() {
        assert!(!is_valid_title("Category:Physics"));
        assert!(!is_valid_title("Категория:Физика"));
        assert!(!is_valid_title("File:Atom.svg"));
        assert!(!is_valid_title("Talk:Atom"));
    }

    #[test]
    fn test_empty_title_is_rejected() {
        assert!(!is_valid_title(""));
    }

    #[test]
    fn test_title_to_path() {
        assert_eq!(title_to_path("Special relativity"), "Special_relativity");
        assert_eq!(title_to_path("Atom"), "Atom");
    }
}
