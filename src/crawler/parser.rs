//! HTML link extraction
//!
//! Pulls outbound links from fetched pages so the crawl can grow.

use scraper::{Html, Selector};
use url::Url;

/// Extracts all followable links from an HTML document
///
/// # Link Extraction Rules
///
/// **Include:**
/// - `<a href="...">` tags anywhere in the document
///
/// **Exclude:**
/// - `javascript:`, `mailto:`, `tel:` links
/// - Data URIs
/// - Fragment-only links
/// - Anything that is not HTTP(S) after resolution
///
/// Links are resolved against `base_url` and returned in document order
/// without duplicates.
///
/// # Example
///
/// ```
/// use pagefeed::crawler::extract_links;
/// use url::Url;
///
/// let html = r#"<html><body><a href="/page">Link</a><a href="mailto:x@y.z">Mail</a></body></html>"#;
/// let base_url = Url::parse("https://example.com/").unwrap();
/// assert_eq!(extract_links(html, &base_url), vec!["https://example.com/page"]);
/// ```
pub fn extract_links(html: &str, base_url: &Url) -> Vec<String> {
    let document = Html::parse_document(html);
    let mut links: Vec<String> = Vec::new();

    if let Ok(a_selector) = Selector::parse("a[href]") {
        for element in document.select(&a_selector) {
            if let Some(href) = element.value().attr("href") {
                if let Some(absolute_url) = resolve_link(href, base_url) {
                    if !links.contains(&absolute_url) {
                        links.push(absolute_url);
                    }
                }
            }
        }
    }

    links
}

/// Resolves a link href to an absolute URL and validates it
///
/// Returns None if the link should be excluded:
/// - javascript:, mailto:, tel: schemes
/// - data: URIs
/// - Invalid URLs
/// - Non-HTTP(S) URLs after resolution
pub fn resolve_link(href: &str, base_url: &Url) -> Option<String> {
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

    match base_url.join(href) {
        Ok(absolute_url) => {
            if absolute_url.scheme() == "http" || absolute_url.scheme() == "https" {
                Some(absolute_url.to_string())
            } else {
                None
            }
        }
        Err(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_url() -> Url {
        Url::parse("https://example.com/dir/page").unwrap()
    }

    #[test]
    fn test_relative_and_absolute_links() {
        let html = r#"<a href="other">A</a><a href="/root">B</a><a href="https://b.com/x?y=1&z=2">C</a>"#;
        let links = extract_links(html, &base_url());
        assert_eq!(
            links,
            vec![
                "https://example.com/dir/other",
                "https://example.com/root",
                "https://b.com/x?y=1&z=2",
            ]
        );
    }

    #[test]
    fn test_skip_special_schemes() {
        let html = r##"
            <a href="javascript:void(0)">J</a>
            <a href="MAILTO:a@b.c">M</a>
            <a href="tel:123">T</a>
            <a href="data:text/plain,hi">D</a>
            <a href="#section">F</a>
            <a href="ftp://files.example.com/">FTP</a>
            <a href="">Empty</a>
        "##;
        assert!(extract_links(html, &base_url()).is_empty());
    }

    #[test]
    fn test_duplicates_removed() {
        let html = r#"<a href="/a">1</a><a href="https://example.com/a">2</a>"#;
        assert_eq!(extract_links(html, &base_url()).len(), 1);
    }

    #[test]
    fn test_anchor_without_href_ignored() {
        let html = r#"<a name="top">Top</a><a href=" /x ">X</a>"#;
        assert_eq!(
            extract_links(html, &base_url()),
            vec!["https://example.com/x"]
        );
    }
}
