//! Storage traits and error types
//!
//! This module defines the trait interface for URL store backends and
//! associated error types.

use crate::state::DomainStats;
use crate::storage::{AddResult, UrlQuery, UrlRecord};
use std::path::Path;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("URL record not found: {0}")]
    NotFound(i64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for URL store implementations
///
/// The store is the single source of truth for URL identity, status and
/// crawl history. Every mutating method takes `&mut self`; callers that share
/// a store across threads wrap its owner in a mutex.
pub trait UrlStore {
    // ===== Admission =====

    /// Inserts a URL in `pending` state, or reports that it already exists
    ///
    /// Inserting an existing URL changes nothing and is not an error.
    ///
    /// # Arguments
    ///
    /// * `url` - The full URL, stored verbatim
    /// * `source_url` - The page the URL was discovered on (may be empty)
    fn add(&mut self, url: &str, source_url: &str) -> StorageResult<AddResult>;

    /// Checks whether a URL is already stored
    fn exists(&self, url: &str) -> StorageResult<bool>;

    // ===== Lookup =====

    /// Returns records matching the query, ordered by
    /// `priority DESC, first_seen ASC, id ASC`
    fn query(&self, query: &UrlQuery) -> StorageResult<Vec<UrlRecord>>;

    /// Gets a record by id
    fn get_by_id(&self, id: i64) -> StorageResult<Option<UrlRecord>>;

    /// Gets a record by its URL
    fn get_by_url(&self, url: &str) -> StorageResult<Option<UrlRecord>>;

    // ===== Status Transitions =====

    /// Marks a URL fetched: bumps `crawl_count` and sets `last_crawled`
    fn mark_crawled(&mut self, id: i64) -> StorageResult<()>;

    /// Marks a fetch as failed; the record is not retried automatically
    fn mark_failed(&mut self, id: i64) -> StorageResult<()>;

    /// Marks a URL as claimed by a fetcher
    fn mark_crawling(&mut self, id: i64) -> StorageResult<()>;

    /// Moves a record from `pending` to `crawling` only if it is still pending
    ///
    /// Returns `false` when another caller claimed it first.
    fn claim(&mut self, id: i64) -> StorageResult<bool>;

    /// Sets the blocked flag and `blocked` status
    fn block(&mut self, id: i64) -> StorageResult<()>;

    /// Clears the blocked flag and returns the record to `pending`
    fn unblock(&mut self, id: i64) -> StorageResult<()>;

    /// Deletes a record
    fn remove(&mut self, id: i64) -> StorageResult<()>;

    /// Stores the last computed priority score
    fn update_priority(&mut self, id: i64, priority: i64) -> StorageResult<()>;

    /// Returns every non-blocked record to `pending`
    fn reset_all(&mut self) -> StorageResult<u64>;

    /// Returns records stuck in `crawling` (after an unclean stop) to `pending`
    fn reset_interrupted(&mut self) -> StorageResult<u64>;

    // ===== Statistics =====

    /// Total records
    fn count_total(&self) -> StorageResult<u64>;

    /// Records that are pending and not blocked
    fn count_pending(&self) -> StorageResult<u64>;

    /// Records in `crawled` state
    fn count_crawled(&self) -> StorageResult<u64>;

    /// Records in `failed` state
    fn count_failed(&self) -> StorageResult<u64>;

    /// Records with the blocked flag set
    fn count_blocked(&self) -> StorageResult<u64>;

    /// Per-domain crawl totals, used to rebuild domain stats on startup
    fn domain_crawl_summary(&self) -> StorageResult<Vec<DomainStats>>;

    // ===== Import / Export =====

    /// Writes every URL, one per line; returns the number written
    fn export(&self, path: &Path) -> StorageResult<usize>;

    /// Adds every non-empty line as a URL; returns the number newly added
    fn import(&mut self, path: &Path) -> StorageResult<usize>;
}
