use super::domain::domain_of;

/// The components of a URL that the store keeps alongside the full string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlParts {
    /// Lowercase host
    pub domain: String,

    /// Path up to `?` or `#`, `/` when absent
    pub path: String,

    /// Everything between the first `?` and `#`, verbatim
    pub query_string: String,

    /// Coarse content type inferred from the path extension
    pub file_type: &'static str,
}

/// Splits a URL into its indexed components
///
/// The query string is never decoded, reordered or truncated.
///
/// # Examples
///
/// ```
/// use pagefeed::url::split_url;
///
/// let parts = split_url("https://x.com/a/report.PDF?b=1&c=2");
/// assert_eq!(parts.domain, "x.com");
/// assert_eq!(parts.path, "/a/report.PDF");
/// assert_eq!(parts.query_string, "b=1&c=2");
/// assert_eq!(parts.file_type, "pdf");
/// ```
pub fn split_url(url: &str) -> UrlParts {
    let path = url_path(url);
    UrlParts {
        domain: domain_of(url),
        path: if path.is_empty() {
            "/".to_string()
        } else {
            path.to_string()
        },
        query_string: query_of(url).to_string(),
        file_type: file_type_for_path(path),
    }
}

/// Returns the path portion of a URL: from the first `/` after the host up
/// to `?` or `#`. Empty when the URL has no path.
pub fn url_path(url: &str) -> &str {
    let after_scheme = match url.find("://") {
        Some(idx) => idx + 3,
        None => 0,
    };
    let rest = &url[after_scheme..];

    let end = rest.find(&['?', '#'][..]).unwrap_or(rest.len());
    let before_query = &rest[..end];

    match before_query.find('/') {
        Some(idx) => &before_query[idx..],
        None => "",
    }
}

/// Returns the raw query string (without `?`), stopping at a fragment
fn query_of(url: &str) -> &str {
    let without_fragment = match url.find('#') {
        Some(idx) => &url[..idx],
        None => url,
    };
    match without_fragment.find('?') {
        Some(idx) => &without_fragment[idx + 1..],
        None => "",
    }
}

/// Returns the lowercase extension of the last path segment, if any
pub fn extension(path: &str) -> Option<String> {
    let segment = path.rsplit('/').next().unwrap_or(path);
    let (stem, ext) = segment.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// Maps a path to the store's closed set of file types
///
/// Unknown or missing extensions are treated as `html`.
pub fn file_type_for_path(path: &str) -> &'static str {
    match extension(path).as_deref() {
        Some("pdf") => "pdf",
        Some("txt") => "txt",
        Some("doc") | Some("docx") => "doc",
        Some("jpg") | Some("jpeg") | Some("png") | Some("gif") => "image",
        Some("mp4") | Some("avi") | Some("mkv") => "video",
        Some("mp3") | Some("wav") | Some("flac") => "audio",
        Some("zip") | Some("tar") | Some("gz") => "archive",
        _ => "html",
    }
}

/// Link depth of a URL: the number of non-empty segments in its path
///
/// # Examples
///
/// ```
/// use pagefeed::url::path_depth;
///
/// assert_eq!(path_depth("https://x.com/"), 0);
/// assert_eq!(path_depth("https://x.com/a/b"), 2);
/// ```
pub fn path_depth(url: &str) -> u32 {
    if !url.contains("://") {
        return 0;
    }
    url_path(url)
        .split('/')
        .filter(|segment| !segment.is_empty())
        .count() as u32
}
