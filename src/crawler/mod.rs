//! Crawler module for URL scheduling and page fetching
//!
//! This module contains the core crawling logic, including:
//! - URL admission and priority-based selection
//! - HTTP fetching with a size cap and redirect limit
//! - The rate-limited fetch loop and its control handle
//! - HTML link extraction
//! - The flat-file compatibility queue

mod fetch_loop;
mod fetcher;
mod legacy_queue;
mod parser;
mod raw_page;
mod scheduler;

pub use fetch_loop::{FetchHandle, FetchLoop, RateLimit, UrlSource};
pub use fetcher::{build_http_client, fetch_url, FetchResult};
pub use legacy_queue::{LegacyQueue, CRAWLED_FILE, QUEUE_FILE};
pub use parser::{extract_links, resolve_link};
pub use raw_page::{header_url, raw_page_name, write_raw_page};
pub use scheduler::{AddOutcome, RejectReason, SchedulerStats, UrlScheduler};
