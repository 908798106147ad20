//! URL admission filter
//!
//! Decides whether a URL is worth storing based on its content type, its
//! domain and a list of reject patterns, and applies the query-parameter
//! policy before a URL is stored.

mod config;

pub use config::{category_for_extension, FileTypes, FilterConfig, FILE_TYPE_NAMES};

use crate::url::{domain_of, drop_query, extension, strip_query_params, url_path};
use config::push_unique;
use regex::Regex;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// File name of the filter settings inside the data directory
pub const FILTER_FILE: &str = "url_filter.conf";

/// Errors raised by filter mutators
#[derive(Debug, Error)]
pub enum FilterError {
    #[error("Unknown file type: {0}")]
    UnknownType(String),

    #[error("Invalid URL pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Failed to save filter file: {0}")]
    Io(#[from] std::io::Error),
}

/// URL admission filter with optional file persistence
#[derive(Debug)]
pub struct UrlFilter {
    config: FilterConfig,
    compiled: Vec<Regex>,
    path: Option<PathBuf>,
}

impl Default for UrlFilter {
    fn default() -> Self {
        Self::new(FilterConfig::default())
    }
}

impl UrlFilter {
    /// Builds a filter from settings, without persistence
    ///
    /// Patterns that fail to compile are logged and ignored.
    pub fn new(config: FilterConfig) -> Self {
        let compiled = compile_patterns(&config.url_patterns);
        Self {
            config,
            compiled,
            path: None,
        }
    }

    /// Loads the filter from a file and saves every later change back to it
    ///
    /// A missing file gives the default settings.
    pub fn open(path: &Path) -> Result<Self, FilterError> {
        let config = FilterConfig::load(path)?;
        let mut filter = Self::new(config);
        filter.path = Some(path.to_path_buf());
        tracing::debug!(
            "Loaded URL filter from {} ({} patterns)",
            path.display(),
            filter.compiled.len()
        );
        Ok(filter)
    }

    /// Current settings
    pub fn config(&self) -> &FilterConfig {
        &self.config
    }

    /// Returns true if the URL passes the domain, type and pattern checks
    pub fn should_crawl(&self, url: &str) -> bool {
        self.domain_allowed(&domain_of(url))
            && self.type_allowed(url)
            && !self.compiled.iter().any(|re| re.is_match(url))
    }

    fn domain_allowed(&self, domain: &str) -> bool {
        if self.config.domain_blacklist.iter().any(|d| d == domain) {
            return false;
        }
        self.config.domain_whitelist.is_empty()
            || self.config.domain_whitelist.iter().any(|d| d == domain)
    }

    fn type_allowed(&self, url: &str) -> bool {
        let category = match extension(url_path(url)) {
            Some(ext) => category_for_extension(&ext),
            None => "html",
        };
        self.config.file_types.get(category).unwrap_or(false)
    }

    /// Rewrites a URL according to the query-parameter policy
    ///
    /// # Examples
    ///
    /// ```
    /// use pagefeed::filter::UrlFilter;
    ///
    /// let filter = UrlFilter::default();
    /// assert_eq!(
    ///     filter.apply_query_policy("https://x.com/a?utm_source=t&id=4"),
    ///     "https://x.com/a?id=4"
    /// );
    /// ```
    pub fn apply_query_policy(&self, url: &str) -> String {
        if !self.config.preserve_query_params {
            drop_query(url)
        } else if self.config.strip_tracking_params {
            strip_query_params(url, &self.config.tracking_params)
        } else {
            url.to_string()
        }
    }

    // ===== Mutators =====

    pub fn add_domain_whitelist(&mut self, domain: &str) -> Result<(), FilterError> {
        let domain = domain.to_lowercase();
        self.update(|config| push_unique(&mut config.domain_whitelist, domain))
    }

    pub fn remove_domain_whitelist(&mut self, domain: &str) -> Result<(), FilterError> {
        let domain = domain.to_lowercase();
        self.update(|config| remove_value(&mut config.domain_whitelist, &domain))
    }

    pub fn add_domain_blacklist(&mut self, domain: &str) -> Result<(), FilterError> {
        let domain = domain.to_lowercase();
        self.update(|config| push_unique(&mut config.domain_blacklist, domain))
    }

    pub fn remove_domain_blacklist(&mut self, domain: &str) -> Result<(), FilterError> {
        let domain = domain.to_lowercase();
        self.update(|config| remove_value(&mut config.domain_blacklist, &domain))
    }

    /// Adds a reject pattern; an invalid regex is refused
    pub fn add_pattern(&mut self, pattern: &str) -> Result<(), FilterError> {
        Regex::new(pattern).map_err(|source| FilterError::InvalidPattern {
            pattern: pattern.to_string(),
            source,
        })?;
        self.update(|config| push_unique(&mut config.url_patterns, pattern.to_string()))
    }

    pub fn remove_pattern(&mut self, pattern: &str) -> Result<(), FilterError> {
        self.update(|config| remove_value(&mut config.url_patterns, pattern))
    }

    /// Sets the allow flag of a content category (`html`, `images`, ...)
    pub fn set_type(&mut self, name: &str, allow: bool) -> Result<(), FilterError> {
        if self.config.file_types.get(name).is_none() {
            return Err(FilterError::UnknownType(name.to_string()));
        }
        self.update(|config| config.file_types.set(name, allow))
    }

    pub fn set_query_policy(&mut self, preserve: bool, strip_tracking: bool) -> Result<(), FilterError> {
        self.update(|config| {
            config.preserve_query_params = preserve;
            config.strip_tracking_params = strip_tracking;
            true
        })
    }

    /// Applies `change` to a copy of the rules, saves the copy, then makes
    /// it current
    ///
    /// `change` returns false when it left the rules as they were; nothing is
    /// written then. On a save error the current rules are kept.
    fn update<F>(&mut self, change: F) -> Result<(), FilterError>
    where
        F: FnOnce(&mut FilterConfig) -> bool,
    {
        let mut config = self.config.clone();
        if !change(&mut config) {
            return Ok(());
        }
        if let Some(path) = &self.path {
            config.save(path)?;
        }
        self.compiled = compile_patterns(&config.url_patterns);
        self.config = config;
        Ok(())
    }
}

/// Removes every copy of `value`; returns whether anything was removed
fn remove_value(list: &mut Vec<String>, value: &str) -> bool {
    let before = list.len();
    list.retain(|v| v != value);
    list.len() != before
}

fn compile_patterns(patterns: &[String]) -> Vec<Regex> {
    patterns
        .iter()
        .filter_map(|pattern| match Regex::new(pattern) {
            Ok(re) => Some(re),
            Err(e) => {
                tracing::warn!("Skipping invalid URL pattern '{}': {}", pattern, e);
                None
            }
        })
        .collect()
}
