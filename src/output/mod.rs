//! Output module for operator-facing reports
//!
//! This module handles:
//! - Crawl statistics from the URL store and pipeline directories
//! - Listing block patterns

pub mod stats;

pub use stats::{load_statistics, print_statistics, CrawlStatistics};

use crate::blocker::BlockPattern;
use chrono::{TimeZone, Utc};

/// Formats one block pattern as a table row
pub fn format_pattern(pattern: &BlockPattern) -> String {
    let added = Utc
        .timestamp_opt(pattern.added_time, 0)
        .single()
        .map(|dt| dt.format("%Y-%m-%d").to_string())
        .unwrap_or_default();

    let mut line = format!(
        "{:>4}  {:<3}  {:<6}  {:<10}  {}",
        pattern.id,
        if pattern.enabled { "on" } else { "off" },
        pattern.kind.as_str(),
        added,
        pattern.pattern
    );
    if !pattern.description.is_empty() {
        line.push_str("  # ");
        line.push_str(&pattern.description);
    }
    line
}

/// Prints block patterns to stdout
pub fn print_patterns(patterns: &[BlockPattern]) {
    if patterns.is_empty() {
        println!("No block patterns");
        return;
    }

    println!("{:>4}  {:<3}  {:<6}  {:<10}  PATTERN", "ID", "ON", "KIND", "ADDED");
    for pattern in patterns {
        println!("{}", format_pattern(pattern));
    }
}
