//! Priority scoring for pending URLs
//!
//! The score balances four pressures: uncrawled URLs first, spreading work
//! across domains, letting recently crawled URLs cool off, and preferring
//! shallow pages. A small seeded jitter keeps equal-looking candidates from
//! always resolving the same way across different seeds.

mod randomization;

pub use randomization::{prime_mix, unit_fraction, PrimeSequence};

use crate::state::DomainStats;
use crate::storage::UrlRecord;
use crate::url::{path_depth, url_hash};
use serde::Deserialize;

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Weight of the recency term
const RECENCY_WEIGHT: f64 = 50.0;

/// Tunable weights of the score
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct PriorityFactors {
    pub uncrawled_bonus: f64,
    pub domain_diversity: f64,
    pub time_decay: f64,
    pub depth_penalty: f64,
    pub prime_randomization: f64,
    pub seed: u64,
}

impl Default for PriorityFactors {
    fn default() -> Self {
        Self {
            uncrawled_bonus: 100.0,
            domain_diversity: 50.0,
            time_decay: 0.5,
            depth_penalty: -5.0,
            prime_randomization: 10.0,
            seed: 0,
        }
    }
}

/// Pure scoring function over a record and its domain's history
#[derive(Debug, Clone, Default)]
pub struct PriorityScorer {
    factors: PriorityFactors,
}

impl PriorityScorer {
    pub fn new(factors: PriorityFactors) -> Self {
        Self { factors }
    }

    pub fn factors(&self) -> &PriorityFactors {
        &self.factors
    }

    /// Scores a record; higher is fetched sooner
    ///
    /// # Arguments
    ///
    /// * `record` - The candidate URL
    /// * `stats` - Crawl history of the record's domain, `None` if never crawled
    /// * `total_domains` - Number of domains with crawl history
    /// * `now` - Current unix time in seconds
    pub fn score(
        &self,
        record: &UrlRecord,
        stats: Option<&DomainStats>,
        total_domains: usize,
        now: i64,
    ) -> i64 {
        let f = &self.factors;
        let mut score = 0.0;

        if record.crawl_count == 0 {
            score += f.uncrawled_bonus;
        }

        if total_domains > 0 {
            let domain_crawls = stats.map_or(0, |s| s.crawl_count) as f64;
            score += (1.0 - domain_crawls / total_domains as f64) * f.domain_diversity;
        }

        score += match record.last_crawled {
            Some(last) => {
                let age_days = (now - last).max(0) as f64 / SECONDS_PER_DAY;
                (1.0 - (-f.time_decay * age_days).exp()) * RECENCY_WEIGHT
            }
            None => RECENCY_WEIGHT,
        };

        score += path_depth(&record.url) as f64 * f.depth_penalty;

        score += unit_fraction(url_hash(&record.url) ^ f.seed) * f.prime_randomization;

        score as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::UrlStatus;

    fn record(url: &str) -> UrlRecord {
        UrlRecord {
            id: 1,
            url: url.to_string(),
            domain: crate::url::domain_of(url),
            path: "/".to_string(),
            query_string: String::new(),
            file_type: "html".to_string(),
            first_seen: 0,
            last_crawled: None,
            crawl_count: 0,
            priority: 0,
            status: UrlStatus::Pending,
            source_url: String::new(),
            blocked: false,
        }
    }

    fn no_jitter() -> PriorityScorer {
        PriorityScorer::new(PriorityFactors {
            prime_randomization: 0.0,
            ..PriorityFactors::default()
        })
    }

    #[test]
    fn test_fresh_root_url() {
        // 100 (uncrawled) + 50 (never crawled) + 0 depth
        let score = no_jitter().score(&record("https://x.com/"), None, 0, 1_000);
        assert_eq!(score, 150);
    }

    #[test]
    fn test_depth_penalty() {
        let scorer = no_jitter();
        let shallow = scorer.score(&record("https://x.com/a"), None, 0, 0);
        let deep = scorer.score(&record("https://x.com/a/b/c"), None, 0, 0);
        assert_eq!(shallow - deep, 10);
    }

    #[test]
    fn test_uncrawled_beats_crawled() {
        let scorer = PriorityScorer::default();
        let now = 1_700_000_000;

        let fresh = record("https://x.com/a");
        let mut crawled = record("https://x.com/a");
        crawled.crawl_count = 1;
        crawled.last_crawled = Some(now - 3600);

        assert!(scorer.score(&fresh, None, 0, now) > scorer.score(&crawled, None, 0, now));
    }

    #[test]
    fn test_recency_monotonic() {
        let scorer = no_jitter();
        let now = 100 * 86_400;
        let mut last = None;

        for days_ago in [0, 1, 2, 5, 30] {
            let mut r = record("https://x.com/a");
            r.crawl_count = 1;
            r.last_crawled = Some(now - days_ago * 86_400);
            let score = scorer.score(&r, None, 0, now);
            if let Some(previous) = last {
                assert!(score >= previous);
            }
            last = Some(score);
        }
    }

    #[test]
    fn test_domain_diversity() {
        let scorer = no_jitter();
        let r = record("https://busy.com/");
        let stats = DomainStats {
            domain: "busy.com".to_string(),
            crawl_count: 4,
            last_crawled: Some(0),
        };

        let unknown = scorer.score(&r, None, 4, 0);
        let busy = scorer.score(&r, Some(&stats), 4, 0);

        // Unknown domain: full 50 bonus; fully crawled share: 0
        assert_eq!(unknown - busy, 50);
    }

    #[test]
    fn test_seeded_jitter_is_reproducible() {
        let factors = PriorityFactors {
            seed: 12345,
            ..PriorityFactors::default()
        };
        let a = PriorityScorer::new(factors);
        let b = PriorityScorer::new(factors);
        let r = record("https://x.com/page");

        assert_eq!(a.score(&r, None, 0, 0), b.score(&r, None, 0, 0));

        let jitter = a.score(&r, None, 0, 0) - no_jitter().score(&r, None, 0, 0);
        assert!((0..10).contains(&jitter));
    }

    #[test]
    fn test_factors_deserialize_with_defaults() {
        let factors: PriorityFactors = toml::from_str("depth-penalty = -1.0\nseed = 9").unwrap();
        assert_eq!(factors.depth_penalty, -1.0);
        assert_eq!(factors.seed, 9);
        assert_eq!(factors.uncrawled_bonus, 100.0);
    }
}
