//! Pagefeed: a polite, continuously-running crawler feeding a text pipeline
//!
//! This crate keeps a persistent, deduplicated URL store, decides which URL to
//! fetch next, fetches pages one at a time under a rate limit, and moves the
//! results through preprocess, tokenize and train stages that communicate
//! through directories.

pub mod blocker;
pub mod config;
pub mod crawler;
pub mod filter;
pub mod orchestrator;
pub mod output;
pub mod pipeline;
pub mod priority;
pub mod state;
pub mod storage;
pub mod url;

use std::sync::{Mutex, MutexGuard, PoisonError};
use thiserror::Error;

/// Main error type for Pagefeed operations
#[derive(Debug, Error)]
pub enum PagefeedError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Filter error: {0}")]
    Filter(#[from] filter::FilterError),

    #[error("Blocker error: {0}")]
    Blocker(#[from] blocker::BlockerError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Crawler is already running")]
    AlreadyRunning,

    #[error("Crawler is not running")]
    NotRunning,

    #[error("Pipeline error: {0}")]
    Pipeline(String),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing domain in URL")]
    MissingDomain,
}

/// Result type alias for Pagefeed operations
pub type Result<T> = std::result::Result<T, PagefeedError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

/// Locks a mutex, taking over the data if a previous holder panicked
///
/// Worker threads never leave shared state half-updated across a panic
/// point, so the data is still usable.
pub(crate) fn lock_or_recover<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// Re-export commonly used types
pub use config::Config;
pub use crawler::{AddOutcome, UrlScheduler};
pub use orchestrator::{CrawlerEvent, Orchestrator, StatusSnapshot};
pub use pipeline::{NullTrainer, Trainer};
pub use state::{DomainStats, UrlStatus};
pub use storage::{SqliteUrlStore, UrlRecord, UrlStore};
