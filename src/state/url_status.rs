/// URL status definitions for tracking crawl progress
///
/// This module defines all possible states a URL record can be in.
use std::fmt;

/// Represents the current state of a URL in the crawl process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UrlStatus {
    /// URL has been admitted and is waiting to be fetched
    Pending,

    /// URL has been claimed by the fetch loop
    Crawling,

    /// URL was fetched successfully
    Crawled,

    /// The last fetch attempt failed; not retried automatically
    Failed,

    /// URL was blocked by an operator after admission
    Blocked,
}

impl UrlStatus {
    /// Returns true if the URL may still be selected for fetching
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Pending | Self::Crawling)
    }

    /// Returns true if this is a terminal state (no further fetch planned)
    pub fn is_terminal(&self) -> bool {
        !self.is_active()
    }

    /// Converts the status to a database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Crawling => "crawling",
            Self::Crawled => "crawled",
            Self::Failed => "failed",
            Self::Blocked => "blocked",
        }
    }

    /// Parses a status from a database string representation
    ///
    /// Returns None if the string doesn't match any known status.
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "crawling" => Some(Self::Crawling),
            "crawled" => Some(Self::Crawled),
            "failed" => Some(Self::Failed),
            "blocked" => Some(Self::Blocked),
            _ => None,
        }
    }

    /// Returns all possible statuses
    pub fn all_statuses() -> Vec<Self> {
        vec![
            Self::Pending,
            Self::Crawling,
            Self::Crawled,
            Self::Failed,
            Self::Blocked,
        ]
    }
}

impl fmt::Display for UrlStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}
