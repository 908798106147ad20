//! Operator-defined URL blocking
//!
//! A blocker holds an ordered set of block patterns. A URL is blocked when
//! any enabled pattern matches it. Patterns persist to `url_blocker.txt`
//! and every mutation is written back immediately when a file is attached.

mod pattern;
mod persist;

pub use pattern::{BlockKind, BlockPattern};

use chrono::Utc;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// File name of the block list inside the data directory
pub const BLOCKER_FILE: &str = "url_blocker.txt";

/// Errors raised by the blocker
#[derive(Debug, Error)]
pub enum BlockerError {
    #[error("Unknown block type: {0}")]
    UnknownKind(String),

    #[error("Invalid block regex '{pattern}': {source}")]
    InvalidRegex {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Block pattern not found: {0}")]
    NotFound(u64),

    #[error("Failed to access block list: {0}")]
    Io(#[from] io::Error),
}

/// Multi-strategy URL blocker
#[derive(Debug)]
pub struct UrlBlocker {
    patterns: Vec<BlockPattern>,
    next_id: u64,
    path: Option<PathBuf>,
}

impl Default for UrlBlocker {
    fn default() -> Self {
        Self::new()
    }
}

impl UrlBlocker {
    /// Creates an empty blocker without persistence
    pub fn new() -> Self {
        Self {
            patterns: Vec::new(),
            next_id: 1,
            path: None,
        }
    }

    /// Loads patterns from a file and saves every later change back to it
    ///
    /// A missing file yields an empty blocker. Malformed lines are logged and
    /// skipped.
    pub fn open(path: &Path) -> Result<Self, BlockerError> {
        let mut blocker = Self::new();
        blocker.path = Some(path.to_path_buf());

        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(blocker),
            Err(e) => return Err(e.into()),
        };

        for (index, line) in text.lines().enumerate() {
            if line.trim().is_empty() || line.starts_with('#') {
                continue;
            }
            match persist::parse_line(line) {
                Ok(pattern) => {
                    if blocker.get_pattern(pattern.id).is_some() {
                        tracing::warn!(
                            "Skipping duplicate block pattern id {} on line {}",
                            pattern.id,
                            index + 1
                        );
                        continue;
                    }
                    blocker.next_id = blocker.next_id.max(pattern.id + 1);
                    blocker.patterns.push(pattern);
                }
                Err(reason) => {
                    tracing::warn!("Skipping block list line {}: {}", index + 1, reason);
                }
            }
        }

        tracing::debug!(
            "Loaded {} block patterns from {}",
            blocker.patterns.len(),
            path.display()
        );
        Ok(blocker)
    }

    /// Returns true if any enabled pattern matches the URL
    pub fn is_blocked(&self, url: &str) -> bool {
        self.patterns
            .iter()
            .any(|pattern| pattern.enabled && pattern.matches(url))
    }

    /// Adds an enabled pattern and returns its id
    ///
    /// # Errors
    ///
    /// Returns `InvalidRegex` if a regex pattern does not compile; nothing is
    /// added in that case.
    pub fn add_pattern(
        &mut self,
        kind: BlockKind,
        pattern: &str,
        description: &str,
    ) -> Result<u64, BlockerError> {
        let id = self.next_id;
        let pattern = BlockPattern::new(
            id,
            kind,
            pattern,
            description,
            Utc::now().timestamp(),
            true,
        )?;
        let text = pattern.pattern.clone();

        let mut patterns = self.patterns.clone();
        patterns.push(pattern);
        self.commit(patterns)?;

        self.next_id += 1;
        tracing::info!("Added {} block pattern #{}: {}", kind, id, text);
        Ok(id)
    }

    /// Removes a pattern by id
    pub fn remove_pattern(&mut self, id: u64) -> Result<(), BlockerError> {
        if self.get_pattern(id).is_none() {
            return Err(BlockerError::NotFound(id));
        }
        let patterns = self.patterns.iter().filter(|p| p.id != id).cloned().collect();
        self.commit(patterns)
    }

    /// Removes every exact pattern equal to `url`; returns how many were removed
    pub fn remove_exact(&mut self, url: &str) -> Result<usize, BlockerError> {
        let patterns: Vec<BlockPattern> = self
            .patterns
            .iter()
            .filter(|p| !(p.kind == BlockKind::Exact && p.pattern == url))
            .cloned()
            .collect();
        let removed = self.patterns.len() - patterns.len();
        if removed > 0 {
            self.commit(patterns)?;
        }
        Ok(removed)
    }

    /// Enables or disables a pattern without removing it
    pub fn set_pattern_enabled(&mut self, id: u64, enabled: bool) -> Result<(), BlockerError> {
        if self.get_pattern(id).is_none() {
            return Err(BlockerError::NotFound(id));
        }
        let mut patterns = self.patterns.clone();
        for pattern in patterns.iter_mut().filter(|p| p.id == id) {
            pattern.enabled = enabled;
        }
        self.commit(patterns)
    }

    /// Checks whether a would-be pattern matches a URL, without storing it
    ///
    /// An invalid regex matches nothing.
    pub fn test_pattern(&self, pattern: &str, kind: BlockKind, url: &str) -> bool {
        match BlockPattern::new(0, kind, pattern, "", 0, true) {
            Ok(candidate) => candidate.matches(url),
            Err(e) => {
                tracing::debug!("Test pattern rejected: {}", e);
                false
            }
        }
    }

    /// Removes every pattern; ids are not reused afterwards
    pub fn clear(&mut self) -> Result<(), BlockerError> {
        self.commit(Vec::new())
    }

    pub fn patterns(&self) -> &[BlockPattern] {
        &self.patterns
    }

    pub fn get_pattern(&self, id: u64) -> Option<&BlockPattern> {
        self.patterns.iter().find(|p| p.id == id)
    }

    pub fn count(&self) -> usize {
        self.patterns.len()
    }

    pub fn enabled_count(&self) -> usize {
        self.patterns.iter().filter(|p| p.enabled).count()
    }

    /// Writes `patterns` to the block list, then makes them current
    ///
    /// On a write error the in-memory patterns are left as they were.
    fn commit(&mut self, patterns: Vec<BlockPattern>) -> Result<(), BlockerError> {
        if let Some(path) = &self.path {
            let mut out = String::from("# id|type|pattern|description|added_time|enabled\n");
            for pattern in &patterns {
                out.push_str(&persist::format_line(pattern));
                out.push('\n');
            }
            let temp = path.with_extension("txt.tmp");
            fs::write(&temp, out)?;
            fs::rename(&temp, path)?;
        }
        self.patterns = patterns;
        Ok(())
    }
}
