use std::collections::HashMap;

/// Crawl history for a single domain
///
/// One record exists per domain that has ever been crawled. It only changes
/// when a URL on the domain is marked crawled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainStats {
    /// The domain this record describes
    pub domain: String,

    /// Number of successful fetches from this domain
    pub crawl_count: u64,

    /// Unix timestamp of the most recent successful fetch
    pub last_crawled: Option<i64>,
}

impl DomainStats {
    /// Creates an empty stats record for a domain
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            crawl_count: 0,
            last_crawled: None,
        }
    }

    /// Records one successful fetch at `now`
    pub fn record_crawl(&mut self, now: i64) {
        self.crawl_count += 1;
        self.last_crawled = Some(now);
    }
}

/// All domain stats known to the scheduler
#[derive(Debug, Clone, Default)]
pub struct DomainStatsTable {
    stats: HashMap<String, DomainStats>,
}

impl DomainStatsTable {
    /// Creates an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a table from previously persisted rows
    pub fn from_records(records: impl IntoIterator<Item = DomainStats>) -> Self {
        let stats = records
            .into_iter()
            .map(|record| (record.domain.clone(), record))
            .collect();
        Self { stats }
    }

    /// Records a successful fetch for `domain`, creating the entry if needed
    pub fn record_crawl(&mut self, domain: &str, now: i64) {
        self.stats
            .entry(domain.to_string())
            .or_insert_with(|| DomainStats::new(domain))
            .record_crawl(now);
    }

    /// Gets the stats for a domain
    pub fn get(&self, domain: &str) -> Option<&DomainStats> {
        self.stats.get(domain)
    }

    /// Number of domains tracked
    pub fn domain_count(&self) -> usize {
        self.stats.len()
    }

    /// Iterates over all tracked domains
    pub fn iter(&self) -> impl Iterator<Item = &DomainStats> {
        self.stats.values()
    }

    /// Forgets all history
    pub fn clear(&mut self) {
        self.stats.clear();
    }
}
