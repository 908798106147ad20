//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building the blocking HTTP client with the configured user agent
//! - GET requests with a redirect cap and timeout
//! - Enforcing the page size cap while reading the body
//! - Error classification for the fetch loop's log

use crate::config::FetchConfig;
use reqwest::blocking::Client;
use reqwest::{redirect::Policy, StatusCode};
use std::io::Read;
use std::time::Duration;

/// Result of a fetch operation
#[derive(Debug)]
pub enum FetchResult {
    /// Successfully fetched the page
    Success {
        /// Final URL after redirects
        final_url: String,
        /// Body bytes exactly as received
        body: Vec<u8>,
    },

    /// The server answered with something other than 200
    HttpError {
        /// The HTTP status code
        status_code: u16,
    },

    /// The body exceeded the configured size cap
    TooLarge {
        /// The cap that was exceeded, in bytes
        limit: u64,
    },

    /// Network error (connection refused, timeout, too many redirects, etc.)
    NetworkError {
        /// Error description
        error: String,
    },
}

impl FetchResult {
    /// Short description of a failed fetch, `None` on success
    pub fn error_message(&self) -> Option<String> {
        match self {
            FetchResult::Success { .. } => None,
            FetchResult::HttpError { status_code } => Some(format!("HTTP {}", status_code)),
            FetchResult::TooLarge { limit } => {
                Some(format!("Response larger than {} bytes", limit))
            }
            FetchResult::NetworkError { error } => Some(error.clone()),
        }
    }
}

/// Builds a blocking HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The fetch configuration
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
///
/// # Example
///
/// ```no_run
/// use pagefeed::config::FetchConfig;
/// use pagefeed::crawler::build_http_client;
///
/// let client = build_http_client(&FetchConfig::default()).unwrap();
/// ```
pub fn build_http_client(config: &FetchConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.user_agent.clone())
        .timeout(Duration::from_secs(config.timeout_secs))
        .connect_timeout(Duration::from_secs(10))
        .redirect(Policy::limited(config.max_redirects as usize))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetches a URL once
///
/// | Condition | Result |
/// |-----------|--------|
/// | HTTP 200 | Success |
/// | Any other status | HttpError |
/// | Body over `max_bytes` | TooLarge |
/// | Timeout, connect or redirect error | NetworkError |
///
/// There is no retry; a failed URL stays failed until an operator resets it.
pub fn fetch_url(client: &Client, url: &str, max_bytes: u64) -> FetchResult {
    let response = match client.get(url).send() {
        Ok(response) => response,
        Err(e) => return classify_error(e),
    };

    let status = response.status();
    if status != StatusCode::OK {
        return FetchResult::HttpError {
            status_code: status.as_u16(),
        };
    }

    if response.content_length().map_or(false, |len| len > max_bytes) {
        return FetchResult::TooLarge { limit: max_bytes };
    }

    let final_url = response.url().to_string();

    // Read one byte past the cap so an oversized body is detected
    let mut bytes = Vec::new();
    if let Err(e) = response.take(max_bytes + 1).read_to_end(&mut bytes) {
        return FetchResult::NetworkError {
            error: e.to_string(),
        };
    }
    if bytes.len() as u64 > max_bytes {
        return FetchResult::TooLarge { limit: max_bytes };
    }

    FetchResult::Success {
        final_url,
        body: bytes,
    }
}

fn classify_error(e: reqwest::Error) -> FetchResult {
    let error = if e.is_timeout() {
        "Request timeout".to_string()
    } else if e.is_connect() {
        "Connection refused".to_string()
    } else if e.is_redirect() {
        "Too many redirects".to_string()
    } else {
        e.to_string()
    };
    FetchResult::NetworkError { error }
}
