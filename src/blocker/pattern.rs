use super::BlockerError;
use crate::url::{domain_of, url_path};
use regex::Regex;
use std::fmt;
use std::str::FromStr;

/// Matching strategy of a block pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockKind {
    /// The whole URL string is equal
    Exact,

    /// The URL's host is equal, ignoring case
    Domain,

    /// The URL's path starts with the pattern
    Prefix,

    /// The regex matches anywhere in the URL
    Regex,
}

impl BlockKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockKind::Exact => "exact",
            BlockKind::Domain => "domain",
            BlockKind::Prefix => "prefix",
            BlockKind::Regex => "regex",
        }
    }
}

impl fmt::Display for BlockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BlockKind {
    type Err = BlockerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "exact" => Ok(BlockKind::Exact),
            "domain" => Ok(BlockKind::Domain),
            "prefix" => Ok(BlockKind::Prefix),
            "regex" => Ok(BlockKind::Regex),
            other => Err(BlockerError::UnknownKind(other.to_string())),
        }
    }
}

/// One operator-defined block rule
#[derive(Debug, Clone)]
pub struct BlockPattern {
    pub id: u64,
    pub kind: BlockKind,
    pub pattern: String,
    pub description: String,
    pub added_time: i64,
    pub enabled: bool,
    regex: Option<Regex>,
}

impl BlockPattern {
    /// Builds a pattern, compiling it when it is a regex
    pub fn new(
        id: u64,
        kind: BlockKind,
        pattern: &str,
        description: &str,
        added_time: i64,
        enabled: bool,
    ) -> Result<Self, BlockerError> {
        let (pattern, regex) = match kind {
            BlockKind::Regex => {
                let re = Regex::new(pattern).map_err(|source| BlockerError::InvalidRegex {
                    pattern: pattern.to_string(),
                    source,
                })?;
                (pattern.to_string(), Some(re))
            }
            BlockKind::Domain => (pattern.to_lowercase(), None),
            BlockKind::Exact | BlockKind::Prefix => (pattern.to_string(), None),
        };

        Ok(Self {
            id,
            kind,
            pattern,
            description: description.to_string(),
            added_time,
            enabled,
            regex,
        })
    }

    /// Checks the rule against a URL, ignoring the enabled flag
    pub fn matches(&self, url: &str) -> bool {
        match self.kind {
            BlockKind::Exact => url == self.pattern,
            BlockKind::Domain => domain_of(url) == self.pattern,
            BlockKind::Prefix => url_path(url).starts_with(&self.pattern),
            BlockKind::Regex => self.regex.as_ref().map_or(false, |re| re.is_match(url)),
        }
    }
}
