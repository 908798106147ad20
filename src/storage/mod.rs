//! Storage module for persisting URL records
//!
//! This module handles all database operations for the crawler, including:
//! - SQLite database initialization and schema management
//! - URL admission with deduplication on the full URL string
//! - Status transitions (pending, crawling, crawled, failed, blocked)
//! - Counters and per-domain crawl totals
//! - Newline-delimited import and export

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteUrlStore;
pub use traits::{StorageError, StorageResult, UrlStore};

use crate::state::UrlStatus;
use crate::PagefeedError;

use std::path::Path;

/// File name of the URL database inside the data directory
pub const DATABASE_FILE: &str = "urls.db";

/// Opens the URL store at `path`, creating it if needed
pub fn open_store(path: &Path) -> Result<SqliteUrlStore, PagefeedError> {
    SqliteUrlStore::new(path)
}

/// Represents a URL in the database
#[derive(Debug, Clone, PartialEq)]
pub struct UrlRecord {
    pub id: i64,
    pub url: String,
    pub domain: String,
    pub path: String,
    pub query_string: String,
    pub file_type: String,
    pub first_seen: i64,
    pub last_crawled: Option<i64>,
    pub crawl_count: u64,
    pub priority: i64,
    pub status: UrlStatus,
    pub source_url: String,
    pub blocked: bool,
}

/// Outcome of inserting a URL into the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddResult {
    /// A new record was created with this id
    Added(i64),

    /// The URL was already stored; nothing changed
    Duplicate,
}

/// Predicate for `UrlStore::query`
///
/// The default matches every non-blocked record.
#[derive(Debug, Clone, Default)]
pub struct UrlQuery {
    /// Only records with this status
    pub status: Option<UrlStatus>,

    /// Only records on this domain
    pub domain: Option<String>,

    /// Include records with the blocked flag set
    pub include_blocked: bool,

    /// Maximum number of rows
    pub limit: Option<usize>,
}

impl UrlQuery {
    /// Pending, non-blocked records: the fetch candidates
    pub fn pending() -> Self {
        Self {
            status: Some(UrlStatus::Pending),
            ..Self::default()
        }
    }

    /// Every record, blocked or not
    pub fn all() -> Self {
        Self {
            include_blocked: true,
            ..Self::default()
        }
    }

    /// Restricts the query to one domain
    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    /// Caps the number of rows returned
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}
