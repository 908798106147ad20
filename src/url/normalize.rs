use crate::UrlError;
use url::Url;

/// Tracking query parameters stripped by default when the filter's
/// `strip_tracking_params` policy is on
pub const DEFAULT_TRACKING_PARAMS: &[&str] = &[
    "utm_source",
    "utm_medium",
    "utm_campaign",
    "utm_term",
    "utm_content",
    "fbclid",
    "gclid",
    "mc_eid",
];

/// Checks that a string is an absolute HTTP(S) URL with a host
///
/// The returned `Url` is only used for validation and link resolution; the
/// store always keeps the original string.
pub fn validate_http_url(url_str: &str) -> Result<Url, UrlError> {
    let url = Url::parse(url_str).map_err(|e| UrlError::Parse(e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(format!(
            "Only HTTP and HTTPS schemes are supported, got: {}",
            url.scheme()
        )));
    }

    if url.host_str().map(str::is_empty).unwrap_or(true) {
        return Err(UrlError::MissingDomain);
    }

    Ok(url)
}

/// Removes the named query parameters from a URL, leaving the rest untouched
///
/// Remaining parameters keep their original order, spelling and encoding.
/// Removing every parameter also removes the `?`. A fragment is preserved.
///
/// # Examples
///
/// ```
/// use pagefeed::url::strip_query_params;
///
/// let url = strip_query_params("https://x.com/a?b=2&utm_source=t&a=1", &["utm_source"]);
/// assert_eq!(url, "https://x.com/a?b=2&a=1");
/// ```
pub fn strip_query_params<S: AsRef<str>>(url: &str, names: &[S]) -> String {
    let (base, fragment) = match url.find('#') {
        Some(idx) => (&url[..idx], &url[idx..]),
        None => (url, ""),
    };
    let (prefix, query) = match base.find('?') {
        Some(idx) => (&base[..idx], &base[idx + 1..]),
        None => return url.to_string(),
    };

    let kept: Vec<&str> = query
        .split('&')
        .filter(|pair| {
            let key = pair.split('=').next().unwrap_or(pair);
            !names.iter().any(|name| name.as_ref() == key)
        })
        .collect();

    // Nothing removed: return the input exactly
    if kept.len() == query.split('&').count() {
        return url.to_string();
    }

    let kept: Vec<&str> = kept.into_iter().filter(|pair| !pair.is_empty()).collect();
    if kept.is_empty() {
        format!("{}{}", prefix, fragment)
    } else {
        format!("{}?{}{}", prefix, kept.join("&"), fragment)
    }
}

/// Removes the whole query string (and `?`) from a URL
pub fn drop_query(url: &str) -> String {
    let (base, fragment) = match url.find('#') {
        Some(idx) => (&url[..idx], &url[idx..]),
        None => (url, ""),
    };
    match base.find('?') {
        Some(idx) => format!("{}{}", &base[..idx], fragment),
        None => url.to_string(),
    }
}
