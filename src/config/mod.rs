//! TOML configuration
//!
//! Every section and key has a default, so an empty file is a valid
//! configuration. Loading validates the result and the file's SHA-256 is
//! logged at startup.
//!
//! ```no_run
//! use pagefeed::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("pagefeed.toml")).unwrap();
//! println!("Stopping after {} pages", config.crawler.max_pages);
//! ```

mod parser;
mod types;
mod validation;

pub use parser::{compute_config_hash, content_hash, load_config, load_config_with_hash, parse_config};
pub use types::{
    resolve_threads, Config, CrawlerConfig, FetchConfig, PipelineConfig, RateLimitConfig,
    RateLimitMode, DEFAULT_USER_AGENT,
};
pub use validation::validate;
