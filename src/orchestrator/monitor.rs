//! Periodic progress polling
//!
//! The monitor counts files in the pipeline directories, folds the counts and
//! the fetch loop's state into the shared status, and fires an event for each
//! count that grew since the previous poll.

use super::status::{CrawlerEvent, SharedStatus};
use crate::crawler::FetchHandle;
use crate::pipeline::{count_files, PREPROCESSED_DIR, RAW_PAGES_DIR, TRAINED_DIR, TRAINING_QUEUE_DIR};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

pub const POLL_INTERVAL: Duration = Duration::from_secs(2);

const STOP_CHECK: Duration = Duration::from_millis(100);

/// File counts of the pipeline directories
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DirCounts {
    pub raw: usize,
    pub preprocessed: usize,
    pub tokenized: usize,
    pub trained: usize,
}

impl DirCounts {
    pub fn scan(data_dir: &Path) -> Self {
        let trained = count_files(&data_dir.join(TRAINED_DIR), "tok");
        Self {
            raw: count_files(&data_dir.join(RAW_PAGES_DIR), "html"),
            preprocessed: count_files(&data_dir.join(PREPROCESSED_DIR), "txt"),
            tokenized: count_files(&data_dir.join(TRAINING_QUEUE_DIR), "tok") + trained,
            trained,
        }
    }

    /// Events for every count that grew since `previous`
    pub fn growth_events(&self, previous: &DirCounts) -> Vec<CrawlerEvent> {
        [
            (self.raw > previous.raw, CrawlerEvent::PageDownloaded),
            (self.preprocessed > previous.preprocessed, CrawlerEvent::PagePreprocessed),
            (self.tokenized > previous.tokenized, CrawlerEvent::PageTokenized),
            (self.trained > previous.trained, CrawlerEvent::PageTrained),
        ]
        .into_iter()
        .filter_map(|(grew, event)| grew.then_some(event))
        .collect()
    }
}

pub(crate) struct StatusMonitor {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl StatusMonitor {
    pub fn spawn(
        data_dir: PathBuf,
        fetch: FetchHandle,
        status: SharedStatus,
        interval: Duration,
    ) -> std::io::Result<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        let thread_stop = Arc::clone(&stop);

        let mut previous = DirCounts::scan(&data_dir);
        refresh(&status, &previous, &fetch);

        let handle = thread::Builder::new()
            .name("status-monitor".to_string())
            .spawn(move || {
                while wait(interval, &thread_stop) {
                    let counts = DirCounts::scan(&data_dir);
                    refresh(&status, &counts, &fetch);
                    for event in counts.growth_events(&previous) {
                        status.fire(event);
                    }
                    previous = counts;
                }
            })?;

        Ok(Self {
            stop,
            handle: Some(handle),
        })
    }

    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::error!("Status monitor panicked");
            }
        }
    }
}

fn refresh(status: &SharedStatus, counts: &DirCounts, fetch: &FetchHandle) {
    let pages_crawled = fetch.pages_crawled();
    let current_url = fetch.current_url();
    let last_error = fetch.last_error();

    status.update(|s| {
        s.pages_crawled = pages_crawled;
        s.preprocessed = counts.preprocessed;
        s.tokenized = counts.tokenized;
        s.trained = counts.trained;
        s.current_url = current_url;
        s.last_error = last_error;
    });
}

/// Sleeps for `interval`; returns false if stop was requested meanwhile
fn wait(interval: Duration, stop: &AtomicBool) -> bool {
    let deadline = Instant::now() + interval;
    loop {
        if stop.load(Ordering::SeqCst) {
            return false;
        }
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        thread::sleep(STOP_CHECK.min(deadline - now));
    }
}
