//! State module for tracking crawl progress
//!
//! This module provides the status of individual URLs and the per-domain
//! crawl history used to balance the crawl across sites.
//!
//! # Components
//!
//! - `UrlStatus`: Tracks where a URL record is in its lifecycle (pending, crawling, crawled, ...)
//! - `DomainStats`: Tracks how often a domain has been crawled, for diversity scoring
//! - `DomainStatsTable`: The set of all domain stats, keyed by domain

mod domain_stats;
mod url_status;

// Re-export main types
pub use domain_stats::{DomainStats, DomainStatsTable};
pub use url_status::UrlStatus;
