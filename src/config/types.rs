use crate::crawler::RateLimit;
use crate::priority::PriorityFactors;
use serde::Deserialize;
use std::path::PathBuf;

/// User agent sent with every request unless configured otherwise
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64; rv:109.0) Gecko/20100101 Firefox/115.0";

/// Main configuration structure for Pagefeed
///
/// Every section is optional; an empty file yields a working configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(rename = "rate-limit", default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub priority: PriorityFactors,
}

/// Crawl scope and data location
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CrawlerConfig {
    /// Directory holding the database, settings files and stage directories
    #[serde(rename = "data-dir")]
    pub data_dir: PathBuf,

    /// URLs offered to the scheduler on every start
    pub seeds: Vec<String>,

    /// Stop fetching after this many pages (0 = unlimited)
    #[serde(rename = "max-pages")]
    pub max_pages: u64,

    /// Read URLs from `links_to_crawl.txt` instead of the database
    #[serde(rename = "use-legacy-queue")]
    pub use_legacy_queue: bool,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./crawler_data"),
            seeds: Vec::new(),
            max_pages: 0,
            use_legacy_queue: false,
        }
    }
}

/// HTTP client settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    #[serde(rename = "user-agent")]
    pub user_agent: String,

    /// Whole-request timeout in seconds
    #[serde(rename = "timeout-secs")]
    pub timeout_secs: u64,

    /// Redirects followed before the fetch fails
    #[serde(rename = "max-redirects")]
    pub max_redirects: u32,

    /// Bodies larger than this fail the fetch
    #[serde(rename = "max-page-bytes")]
    pub max_page_bytes: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout_secs: 30,
            max_redirects: 5,
            max_page_bytes: 10 * 1024 * 1024,
        }
    }
}

/// How the delay between fetches is chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RateLimitMode {
    #[default]
    Random,
    Fixed,
    PerMinute,
    Minutes,
}

/// Delay between fetches
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub mode: RateLimitMode,

    /// Lower bound for `random` mode, seconds
    #[serde(rename = "min-delay-secs")]
    pub min_delay_secs: u64,

    /// Upper bound for `random` mode, seconds
    #[serde(rename = "max-delay-secs")]
    pub max_delay_secs: u64,

    /// Delay for `fixed` mode, seconds
    #[serde(rename = "delay-secs")]
    pub delay_secs: u64,

    #[serde(rename = "requests-per-minute")]
    pub requests_per_minute: u32,

    pub minutes: u64,

    /// Seed of the delay sequence in `random` mode
    pub seed: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            mode: RateLimitMode::Random,
            min_delay_secs: 5,
            max_delay_secs: 15,
            delay_secs: 10,
            requests_per_minute: 6,
            minutes: 1,
            seed: 0,
        }
    }
}

impl RateLimitConfig {
    /// The policy selected by `mode`
    pub fn to_rate_limit(&self) -> RateLimit {
        match self.mode {
            RateLimitMode::Random => RateLimit::Random {
                min: self.min_delay_secs,
                max: self.max_delay_secs,
            },
            RateLimitMode::Fixed => RateLimit::Fixed {
                secs: self.delay_secs,
            },
            RateLimitMode::PerMinute => RateLimit::PerMinute {
                rpm: self.requests_per_minute,
            },
            RateLimitMode::Minutes => RateLimit::Minutes {
                minutes: self.minutes,
            },
        }
    }
}

/// Worker pool sizes and trainer settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// 0 picks one thread fewer than the CPU count
    #[serde(rename = "preprocess-threads")]
    pub preprocess_threads: usize,

    #[serde(rename = "tokenize-threads")]
    pub tokenize_threads: usize,

    #[serde(rename = "train-threads")]
    pub train_threads: usize,

    /// Passes over each token file
    pub epochs: u32,

    /// Token ids are reduced modulo this value
    #[serde(rename = "vocab-size")]
    pub vocab_size: u32,

    /// Shorter extracted text is not forwarded to the tokenizer
    #[serde(rename = "min-text-length")]
    pub min_text_length: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            preprocess_threads: 0,
            tokenize_threads: 0,
            train_threads: 0,
            epochs: 5,
            vocab_size: 10_000,
            min_text_length: 100,
        }
    }
}

/// Resolves a configured thread count, where 0 means `max(cpus - 1, 1)`
pub fn resolve_threads(configured: usize) -> usize {
    if configured > 0 {
        return configured;
    }
    std::thread::available_parallelism()
        .map(|n| n.get().saturating_sub(1))
        .unwrap_or(1)
        .max(1)
}
