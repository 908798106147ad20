//! URL scheduler: admission and next-URL selection
//!
//! This module handles:
//! - Admission of discovered URLs through the query policy, the blocker and
//!   the filter, with deduplication against the store
//! - Choosing the next URL to fetch by priority score
//! - Keeping per-domain crawl history for the diversity term
//! - Operator actions (block, unblock, reset, import, export)

use crate::blocker::{BlockKind, UrlBlocker, BLOCKER_FILE};
use crate::filter::{UrlFilter, FILTER_FILE};
use crate::priority::{PriorityFactors, PriorityScorer};
use crate::state::DomainStatsTable;
use crate::storage::{
    AddResult, SqliteUrlStore, StorageError, UrlQuery, UrlRecord, UrlStore, DATABASE_FILE,
};
use crate::url::validate_http_url;
use crate::PagefeedError;
use chrono::Utc;
use std::cmp::Reverse;
use std::fmt;
use std::path::Path;

/// Why a URL was not admitted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// Not an absolute http(s) URL with a host
    InvalidUrl,

    /// Matched an enabled block pattern
    Blocked,

    /// Refused by the domain, type or pattern filter
    Filtered,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RejectReason::InvalidUrl => "invalid URL",
            RejectReason::Blocked => "blocked",
            RejectReason::Filtered => "filtered",
        })
    }
}

/// Result of offering a URL to the scheduler
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddOutcome {
    /// Stored as a new pending record
    Added(i64),

    /// Rejected by admission; nothing stored
    Filtered(RejectReason),

    /// Already known to the store
    Duplicate,

    /// The store failed; the message describes the error
    StoreError(String),
}

/// Record counts for status reporting
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub total: u64,
    pub pending: u64,
    pub crawled: u64,
    pub failed: u64,
    pub blocked: u64,
    pub domains: usize,
}

/// Composes the store, filter, blocker and scorer
///
/// The scheduler exclusively owns its parts. Threads share it through
/// `Arc<Mutex<UrlScheduler>>`, so admission and select-then-claim each run
/// under one lock hold.
pub struct UrlScheduler {
    store: SqliteUrlStore,
    filter: UrlFilter,
    blocker: UrlBlocker,
    scorer: PriorityScorer,
    domain_stats: DomainStatsTable,
}

impl UrlScheduler {
    /// Opens the scheduler over a data directory
    ///
    /// Loads `urls.db`, `url_filter.conf` and `url_blocker.txt`, returns any
    /// records left in `crawling` by an unclean stop to `pending`, and
    /// rebuilds the per-domain crawl history from the store.
    ///
    /// # Errors
    ///
    /// Fails if the database cannot be opened or a settings file cannot be read.
    pub fn open(data_dir: &Path, factors: PriorityFactors) -> Result<Self, PagefeedError> {
        let store = SqliteUrlStore::new(&data_dir.join(DATABASE_FILE))?;
        let filter = UrlFilter::open(&data_dir.join(FILTER_FILE))?;
        let blocker = UrlBlocker::open(&data_dir.join(BLOCKER_FILE))?;

        let mut scheduler = Self::from_parts(store, filter, blocker, factors)?;

        let interrupted = scheduler.store.reset_interrupted()?;
        if interrupted > 0 {
            tracing::info!("Returned {} interrupted URLs to pending", interrupted);
        }

        Ok(scheduler)
    }

    /// Builds a scheduler from already-opened parts
    pub fn from_parts(
        store: SqliteUrlStore,
        filter: UrlFilter,
        blocker: UrlBlocker,
        factors: PriorityFactors,
    ) -> Result<Self, PagefeedError> {
        let domain_stats = DomainStatsTable::from_records(store.domain_crawl_summary()?);

        Ok(Self {
            store,
            filter,
            blocker,
            scorer: PriorityScorer::new(factors),
            domain_stats,
        })
    }

    // ===== Admission =====

    /// Offers a URL for crawling
    ///
    /// The query policy is applied first, then the URL must be a valid
    /// http(s) URL, unknown to the store, not blocked and accepted by the
    /// filter. Every call evaluates the current filter and blocker.
    pub fn add(&mut self, url: &str, source_url: &str) -> AddOutcome {
        let url = self.filter.apply_query_policy(url);

        if validate_http_url(&url).is_err() {
            return AddOutcome::Filtered(RejectReason::InvalidUrl);
        }

        match self.store.exists(&url) {
            Ok(true) => return AddOutcome::Duplicate,
            Ok(false) => {}
            Err(e) => return store_error(e),
        }

        if let Some(reason) = self.rejection(&url) {
            return AddOutcome::Filtered(reason);
        }

        match self.store.add(&url, source_url) {
            Ok(AddResult::Added(id)) => {
                tracing::debug!("Queued {}", url);
                AddOutcome::Added(id)
            }
            Ok(AddResult::Duplicate) => AddOutcome::Duplicate,
            Err(e) => store_error(e),
        }
    }

    /// Offers several URLs; returns how many were newly added
    pub fn add_batch<S: AsRef<str>>(&mut self, urls: &[S], source_url: &str) -> usize {
        urls.iter()
            .filter(|url| matches!(self.add(url.as_ref(), source_url), AddOutcome::Added(_)))
            .count()
    }

    /// The admission decision for a URL, without touching the store
    pub fn should_crawl(&self, url: &str) -> bool {
        let url = self.filter.apply_query_policy(url);
        validate_http_url(&url).is_ok() && self.rejection(&url).is_none()
    }

    /// Explains why a URL would be refused, or `None` if it would be admitted
    pub fn explain(&self, url: &str) -> Option<RejectReason> {
        let url = self.filter.apply_query_policy(url);
        if validate_http_url(&url).is_err() {
            return Some(RejectReason::InvalidUrl);
        }
        self.rejection(&url)
    }

    fn rejection(&self, url: &str) -> Option<RejectReason> {
        if self.blocker.is_blocked(url) {
            Some(RejectReason::Blocked)
        } else if !self.filter.should_crawl(url) {
            Some(RejectReason::Filtered)
        } else {
            None
        }
    }

    // ===== Selection =====

    /// Returns the highest-scoring pending URL, or `None` if nothing is pending
    ///
    /// Ties are broken by earliest `first_seen`, then lowest id.
    pub fn get_next(&self) -> Result<Option<UrlRecord>, PagefeedError> {
        let now = Utc::now().timestamp();
        let candidates = self.store.query(&UrlQuery::pending())?;

        let best = candidates
            .into_iter()
            .map(|record| (self.score(&record, now), record))
            .max_by_key(|(score, record)| (*score, Reverse(record.first_seen), Reverse(record.id)))
            .map(|(_, record)| record);

        Ok(best)
    }

    /// Selects the next URL and marks it `crawling`
    pub fn claim_next(&mut self) -> Result<Option<UrlRecord>, PagefeedError> {
        while let Some(mut record) = self.get_next()? {
            if self.store.claim(record.id)? {
                record.status = crate::state::UrlStatus::Crawling;
                return Ok(Some(record));
            }
            // Claimed elsewhere between selection and claim; pick again
            tracing::debug!("URL {} was claimed concurrently", record.url);
        }
        Ok(None)
    }

    fn score(&self, record: &UrlRecord, now: i64) -> i64 {
        self.scorer.score(
            record,
            self.domain_stats.get(&record.domain),
            self.domain_stats.domain_count(),
            now,
        )
    }

    /// Rescores every pending URL and stores the scores; returns the count
    pub fn recalculate_priorities(&mut self) -> Result<usize, PagefeedError> {
        let now = Utc::now().timestamp();
        let pending = self.store.query(&UrlQuery::pending())?;

        for record in &pending {
            let score = self.score(record, now);
            self.store.update_priority(record.id, score)?;
        }

        tracing::info!("Recalculated priorities for {} URLs", pending.len());
        Ok(pending.len())
    }

    // ===== Status Transitions =====

    /// Records a successful fetch in the domain history and the store
    pub fn mark_crawled(&mut self, id: i64) -> Result<(), PagefeedError> {
        let record = self
            .store
            .get_by_id(id)?
            .ok_or(StorageError::NotFound(id))?;

        self.store.mark_crawled(id)?;
        self.domain_stats
            .record_crawl(&record.domain, Utc::now().timestamp());
        Ok(())
    }

    pub fn mark_failed(&mut self, id: i64) -> Result<(), PagefeedError> {
        self.store.mark_failed(id)?;
        Ok(())
    }

    pub fn mark_crawling(&mut self, id: i64) -> Result<(), PagefeedError> {
        self.store.mark_crawling(id)?;
        Ok(())
    }

    // ===== Operator Actions =====

    /// Blocks a single URL: adds an exact pattern and flags the stored record
    ///
    /// The pattern holds the URL as it would be stored, after the query
    /// policy, so it matches the record and later offers of the same page.
    pub fn block_url(&mut self, url: &str, description: &str) -> Result<u64, PagefeedError> {
        let url = self.filter.apply_query_policy(url);
        let id = self.blocker.add_pattern(BlockKind::Exact, &url, description)?;
        if let Some(record) = self.store.get_by_url(&url)? {
            self.store.block(record.id)?;
        }
        Ok(id)
    }

    /// Removes exact patterns for a URL and returns its record to pending
    ///
    /// Returns the number of patterns removed.
    pub fn unblock_url(&mut self, url: &str) -> Result<usize, PagefeedError> {
        let stored = self.filter.apply_query_policy(url);
        let mut removed = self.blocker.remove_exact(&stored)?;
        if stored != url {
            removed += self.blocker.remove_exact(url)?;
        }
        if let Some(record) = self.store.get_by_url(&stored)? {
            if record.blocked {
                self.store.unblock(record.id)?;
            }
        }
        Ok(removed)
    }

    /// Returns every non-blocked URL to pending; returns the count changed
    pub fn reset_all(&mut self) -> Result<u64, PagefeedError> {
        Ok(self.store.reset_all()?)
    }

    pub fn export(&self, path: &Path) -> Result<usize, PagefeedError> {
        Ok(self.store.export(path)?)
    }

    /// Offers every non-empty line of a file through admission
    pub fn import(&mut self, path: &Path) -> Result<usize, PagefeedError> {
        let text = std::fs::read_to_string(path)?;
        let urls: Vec<&str> = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect();
        Ok(self.add_batch(&urls, ""))
    }

    pub fn stats(&self) -> Result<SchedulerStats, PagefeedError> {
        Ok(SchedulerStats {
            total: self.store.count_total()?,
            pending: self.store.count_pending()?,
            crawled: self.store.count_crawled()?,
            failed: self.store.count_failed()?,
            blocked: self.store.count_blocked()?,
            domains: self.domain_stats.domain_count(),
        })
    }

    // ===== Accessors =====

    pub fn filter(&self) -> &UrlFilter {
        &self.filter
    }

    pub fn filter_mut(&mut self) -> &mut UrlFilter {
        &mut self.filter
    }

    pub fn blocker(&self) -> &UrlBlocker {
        &self.blocker
    }

    pub fn blocker_mut(&mut self) -> &mut UrlBlocker {
        &mut self.blocker
    }

    pub fn store(&self) -> &SqliteUrlStore {
        &self.store
    }

    pub fn domain_stats(&self) -> &DomainStatsTable {
        &self.domain_stats
    }
}

fn store_error(e: StorageError) -> AddOutcome {
    tracing::error!("URL store error: {}", e);
    AddOutcome::StoreError(e.to_string())
}
