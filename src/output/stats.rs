//! Statistics gathered from the URL store and the pipeline directories
//!
//! This module provides functionality for collecting and displaying crawl
//! statistics for the command line.

use crate::crawler::{SchedulerStats, UrlScheduler};
use crate::orchestrator::DirCounts;
use crate::state::DomainStats;
use crate::storage::UrlStore;
use crate::PagefeedError;
use chrono::{TimeZone, Utc};
use std::path::Path;

/// How many domains the report lists
const TOP_DOMAINS: usize = 10;

/// Crawl statistics summary
#[derive(Debug, Clone)]
pub struct CrawlStatistics {
    /// Record counts by status
    pub urls: SchedulerStats,

    /// Domains with the most successful fetches, busiest first
    pub top_domains: Vec<DomainStats>,

    /// Items in each pipeline directory
    pub pipeline: DirCounts,
}

/// Loads statistics from the scheduler and the data directory
///
/// # Arguments
///
/// * `scheduler` - The scheduler whose store is queried
/// * `data_dir` - The data directory holding the pipeline directories
///
/// # Returns
///
/// * `Ok(CrawlStatistics)` - Successfully loaded statistics
/// * `Err(PagefeedError)` - Failed to query the store
pub fn load_statistics(
    scheduler: &UrlScheduler,
    data_dir: &Path,
) -> Result<CrawlStatistics, PagefeedError> {
    let urls = scheduler.stats()?;

    let mut top_domains = scheduler.store().domain_crawl_summary()?;
    top_domains.sort_by(|a, b| b.crawl_count.cmp(&a.crawl_count).then(a.domain.cmp(&b.domain)));
    top_domains.truncate(TOP_DOMAINS);

    Ok(CrawlStatistics {
        urls,
        top_domains,
        pipeline: DirCounts::scan(data_dir),
    })
}

fn percentage(part: u64, total: u64) -> f64 {
    if total > 0 {
        (part as f64 / total as f64) * 100.0
    } else {
        0.0
    }
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &CrawlStatistics) {
    let urls = &stats.urls;

    println!("=== Crawl Statistics ===\n");

    println!("URLs:");
    println!("  Total: {}", urls.total);
    for (label, count) in [
        ("Pending", urls.pending),
        ("Crawled", urls.crawled),
        ("Failed", urls.failed),
        ("Blocked", urls.blocked),
    ] {
        println!(
            "  {}: {} ({:.1}%)",
            label,
            count,
            percentage(count, urls.total)
        );
    }
    println!("  Domains crawled: {}", urls.domains);
    println!();

    if !stats.top_domains.is_empty() {
        println!("Top Domains:");
        for domain in &stats.top_domains {
            let last = domain
                .last_crawled
                .and_then(|ts| Utc.timestamp_opt(ts, 0).single())
                .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_else(|| "never".to_string());
            println!(
                "  {}: {} pages (last {})",
                domain.domain, domain.crawl_count, last
            );
        }
        println!();
    }

    let pipeline = &stats.pipeline;
    println!("Pipeline:");
    println!("  Raw pages: {}", pipeline.raw);
    println!("  Preprocessed: {}", pipeline.preprocessed);
    println!("  Tokenized: {}", pipeline.tokenized);
    println!("  Trained: {}", pipeline.trained);
}
