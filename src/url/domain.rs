use url::Url;

/// Lowercase host of a URL, or an empty string if it has none
///
/// The host is whatever the WHATWG parser connects to, so `\`, embedded
/// tabs and user-info are treated the same way the fetcher treats them.
/// Unparseable strings fall back to a plain scan of the authority.
pub fn domain_of(url: &str) -> String {
    match Url::parse(url) {
        Ok(parsed) => parsed.host_str().map(str::to_lowercase).unwrap_or_default(),
        Err(_) => scan_host(url),
    }
}

fn scan_host(url: &str) -> String {
    let rest = url.split_once("://").map_or(url, |(_, rest)| rest);
    let authority = rest.split(&['/', '\\', '?', '#'][..]).next().unwrap_or_default();
    let host_port = authority.rsplit('@').next().unwrap_or_default();

    let host = if host_port.starts_with('[') {
        host_port
            .find(']')
            .map_or(host_port, |idx| &host_port[..=idx])
    } else {
        host_port.rsplit_once(':').map_or(host_port, |(host, _)| host)
    };

    host.to_lowercase()
}
