//! URL handling module for Pagefeed
//!
//! This module splits URLs into the components the store indexes (domain,
//! path, query string, file type), applies the query-parameter policy, and
//! provides the string hashes used for file names and scoring.
//!
//! Splitting is done on the raw string rather than through `url::Url`, so the
//! query string is kept byte-for-byte as it was discovered.

mod domain;
mod hash;
mod normalize;
mod parse;

// Re-export main functions
pub use domain::domain_of;
pub use hash::{djb2, url_hash};
pub use normalize::{drop_query, strip_query_params, validate_http_url, DEFAULT_TRACKING_PARAMS};
pub use parse::{extension, file_type_for_path, path_depth, split_url, url_path, UrlParts};
