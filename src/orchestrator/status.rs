use crate::lock_or_recover;
use std::fmt;
use std::sync::{Arc, Mutex};

/// Lifecycle and progress notifications
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CrawlerEvent {
    Started,
    PageDownloaded,
    PagePreprocessed,
    PageTokenized,
    PageTrained,
    Stopped,
}

impl fmt::Display for CrawlerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CrawlerEvent::Started => "started",
            CrawlerEvent::PageDownloaded => "page downloaded",
            CrawlerEvent::PagePreprocessed => "page preprocessed",
            CrawlerEvent::PageTokenized => "page tokenized",
            CrawlerEvent::PageTrained => "page trained",
            CrawlerEvent::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Point-in-time view of a running crawl
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusSnapshot {
    pub running: bool,
    pub pages_crawled: u64,

    /// Text files in `preprocessed/`
    pub preprocessed: usize,

    /// Token files in `training_queue/` and `trained/`
    pub tokenized: usize,

    /// Token files in `trained/`
    pub trained: usize,

    pub current_url: Option<String>,
    pub last_error: Option<String>,
}

impl fmt::Display for StatusSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} | crawled {} | preprocessed {} | tokenized {} | trained {}",
            if self.running { "running" } else { "stopped" },
            self.pages_crawled,
            self.preprocessed,
            self.tokenized,
            self.trained
        )
    }
}

pub(crate) type EventCallback = Arc<dyn Fn(CrawlerEvent, &StatusSnapshot) + Send + Sync>;

/// Status and callback shared between the orchestrator and its monitor
#[derive(Clone, Default)]
pub(crate) struct SharedStatus {
    snapshot: Arc<Mutex<StatusSnapshot>>,
    callback: Arc<Mutex<Option<EventCallback>>>,
}

impl SharedStatus {
    pub fn snapshot(&self) -> StatusSnapshot {
        lock_or_recover(&self.snapshot).clone()
    }

    pub fn update<F: FnOnce(&mut StatusSnapshot)>(&self, f: F) {
        f(&mut lock_or_recover(&self.snapshot));
    }

    pub fn set_callback(&self, callback: EventCallback) {
        *lock_or_recover(&self.callback) = Some(callback);
    }

    /// Invokes the callback, if any, with the current snapshot
    ///
    /// No lock is held while the callback runs.
    pub fn fire(&self, event: CrawlerEvent) {
        tracing::debug!("Event: {}", event);
        let callback = lock_or_recover(&self.callback).clone();
        if let Some(callback) = callback {
            let snapshot = self.snapshot();
            callback(event, &snapshot);
        }
    }
}
