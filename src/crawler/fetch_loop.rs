//! Sequential, rate-limited fetch loop
//!
//! One thread takes URLs from the scheduler (or the legacy queue), fetches
//! them one at a time, saves successful pages into `raw_pages/` and records
//! the outcome. Pause, resume, stop and the rate limit are controlled from
//! other threads through a [`FetchHandle`].

use crate::config::Config;
use crate::crawler::fetcher::{build_http_client, fetch_url, FetchResult};
use crate::crawler::legacy_queue::LegacyQueue;
use crate::crawler::raw_page::write_raw_page;
use crate::crawler::scheduler::UrlScheduler;
use crate::lock_or_recover;
use crate::priority::PrimeSequence;
use crate::PagefeedError;
use chrono::Utc;
use reqwest::blocking::Client;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Granularity of every sleep, so stop and pause are noticed promptly
const SLEEP_STEP: Duration = Duration::from_secs(1);

/// Wait before polling an empty queue again
const EMPTY_QUEUE_WAIT: Duration = Duration::from_secs(5);

/// Delay policy applied after each fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimit {
    /// Always wait `secs`
    Fixed { secs: u64 },

    /// Wait a seeded pseudo-random number of seconds in `[min, max]`
    Random { min: u64, max: u64 },

    /// Wait `60 / rpm` seconds
    PerMinute { rpm: u32 },

    /// Wait whole minutes
    Minutes { minutes: u64 },
}

impl Default for RateLimit {
    fn default() -> Self {
        RateLimit::Random { min: 5, max: 15 }
    }
}

impl RateLimit {
    /// Next delay; `sequence` supplies the values for `Random`
    pub fn delay(&self, sequence: &mut PrimeSequence) -> Duration {
        match *self {
            RateLimit::Fixed { secs } => Duration::from_secs(secs),
            RateLimit::Random { min, max } => Duration::from_secs(sequence.next_in_range(min, max)),
            RateLimit::PerMinute { rpm } => Duration::from_secs_f64(60.0 / f64::from(rpm.max(1))),
            RateLimit::Minutes { minutes } => Duration::from_secs(minutes * 60),
        }
    }
}

#[derive(Debug, Default)]
struct ControlState {
    paused: bool,
    finished: bool,
    rate_limit: RateLimit,
    pages_crawled: u64,
    current_url: Option<String>,
    last_error: Option<String>,
}

/// Thread-safe control surface of a running fetch loop
#[derive(Debug, Clone)]
pub struct FetchHandle {
    state: Arc<Mutex<ControlState>>,
    stop: Arc<AtomicBool>,
}

impl FetchHandle {
    fn new(rate_limit: RateLimit) -> Self {
        Self {
            state: Arc::new(Mutex::new(ControlState {
                rate_limit,
                ..ControlState::default()
            })),
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    fn state(&self) -> MutexGuard<'_, ControlState> {
        lock_or_recover(&self.state)
    }

    pub fn pause(&self) {
        self.state().paused = true;
        tracing::info!("Fetch loop paused");
    }

    pub fn resume(&self) {
        self.state().paused = false;
        tracing::info!("Fetch loop resumed");
    }

    /// Asks the loop to exit; an in-flight request completes first
    pub fn stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    pub fn is_paused(&self) -> bool {
        self.state().paused
    }

    /// True once the loop has exited because it reached its page limit
    pub fn is_finished(&self) -> bool {
        self.state().finished
    }

    pub fn pages_crawled(&self) -> u64 {
        self.state().pages_crawled
    }

    pub fn set_rate_limit(&self, rate_limit: RateLimit) {
        self.state().rate_limit = rate_limit;
        tracing::info!("Rate limit set to {:?}", rate_limit);
    }

    pub fn rate_limit(&self) -> RateLimit {
        self.state().rate_limit
    }

    pub fn current_url(&self) -> Option<String> {
        self.state().current_url.clone()
    }

    pub fn last_error(&self) -> Option<String> {
        self.state().last_error.clone()
    }

    fn record_error(&self, error: String) {
        self.state().last_error = Some(error);
    }

    /// Sleeps for `duration` in one-second steps
    ///
    /// Returns early on stop. Time spent paused does not count towards the
    /// duration when `hold_while_paused` is set.
    fn sleep(&self, duration: Duration, hold_while_paused: bool) {
        let mut remaining = duration;
        while !remaining.is_zero() && !self.is_stopped() {
            let step = remaining.min(SLEEP_STEP);
            thread::sleep(step);
            if !(hold_while_paused && self.is_paused()) {
                remaining = remaining.saturating_sub(step);
            }
        }
    }
}

/// Where the loop takes its URLs from and reports outcomes to
#[derive(Clone)]
pub enum UrlSource {
    Scheduler(Arc<Mutex<UrlScheduler>>),
    Legacy(Arc<LegacyQueue>),
}

/// A URL selected for fetching
#[derive(Debug, Clone)]
struct FetchTarget {
    /// Store id; absent for legacy-queue links
    id: Option<i64>,
    url: String,
}

/// The fetch worker
pub struct FetchLoop {
    client: Client,
    source: UrlSource,
    raw_dir: PathBuf,
    max_pages: u64,
    max_bytes: u64,
    handle: FetchHandle,
    sequence: PrimeSequence,
    iteration: u64,
    empty_queue_wait: Duration,
}

impl FetchLoop {
    /// Creates a loop writing into `raw_dir`
    ///
    /// # Errors
    ///
    /// Fails if the HTTP client cannot be built.
    pub fn new(config: &Config, source: UrlSource, raw_dir: PathBuf) -> Result<Self, PagefeedError> {
        let client = build_http_client(&config.fetch)?;

        Ok(Self {
            client,
            source,
            raw_dir,
            max_pages: config.crawler.max_pages,
            max_bytes: config.fetch.max_page_bytes,
            handle: FetchHandle::new(config.rate_limit.to_rate_limit()),
            sequence: PrimeSequence::new(config.rate_limit.seed),
            iteration: 0,
            empty_queue_wait: EMPTY_QUEUE_WAIT,
        })
    }

    /// Overrides how long the loop waits when no URL is available
    pub fn with_empty_queue_wait(mut self, wait: Duration) -> Self {
        self.empty_queue_wait = wait;
        self
    }

    pub fn handle(&self) -> FetchHandle {
        self.handle.clone()
    }

    /// Starts the loop on its own thread
    pub fn spawn(self) -> std::io::Result<JoinHandle<()>> {
        thread::Builder::new()
            .name("fetch".to_string())
            .spawn(move || self.run())
    }

    /// Runs until stopped or until the page limit is reached
    pub fn run(mut self) {
        tracing::info!("Fetch loop started");

        loop {
            if self.handle.is_stopped() {
                break;
            }
            if self.handle.is_paused() {
                thread::sleep(SLEEP_STEP);
                continue;
            }
            if self.limit_reached() {
                tracing::info!("Reached page limit of {}", self.max_pages);
                self.handle.state().finished = true;
                break;
            }

            match self.next_target() {
                Ok(Some(target)) => self.process(target),
                Ok(None) => {
                    tracing::debug!("No URLs to fetch, waiting");
                    self.handle.sleep(self.empty_queue_wait, false);
                    continue;
                }
                Err(e) => {
                    tracing::error!("Failed to select next URL: {}", e);
                    self.handle.record_error(e.to_string());
                    self.handle.sleep(self.empty_queue_wait, false);
                    continue;
                }
            }

            if self.limit_reached() {
                continue;
            }

            let delay = {
                let rate_limit = self.handle.rate_limit();
                rate_limit.delay(&mut self.sequence)
            };
            tracing::debug!("Waiting {:?} before next fetch", delay);
            self.handle.sleep(delay, true);
        }

        tracing::info!(
            "Fetch loop stopped after {} pages",
            self.handle.pages_crawled()
        );
    }

    fn limit_reached(&self) -> bool {
        self.max_pages > 0 && self.handle.pages_crawled() >= self.max_pages
    }

    fn next_target(&mut self) -> Result<Option<FetchTarget>, PagefeedError> {
        match &self.source {
            UrlSource::Scheduler(scheduler) => {
                let record = lock_or_recover(scheduler).claim_next()?;
                Ok(record.map(|r| FetchTarget {
                    id: Some(r.id),
                    url: r.url,
                }))
            }
            UrlSource::Legacy(queue) => {
                let url = queue.next(self.iteration)?;
                self.iteration = self.iteration.wrapping_add(1);
                Ok(url.map(|url| FetchTarget { id: None, url }))
            }
        }
    }

    /// Fetches one URL and records the outcome
    fn process(&mut self, target: FetchTarget) {
        tracing::info!("Fetching {}", target.url);

        let result = fetch_url(&self.client, &target.url, self.max_bytes);
        let outcome = match result {
            FetchResult::Success { body, final_url } => {
                if final_url != target.url {
                    tracing::debug!("{} redirected to {}", target.url, final_url);
                }
                let now = Utc::now().timestamp();
                write_raw_page(&self.raw_dir, &target.url, &body, now)
                    .map(|path| {
                        tracing::debug!("Saved {} to {}", target.url, path.display());
                    })
                    .map_err(|e| format!("Failed to save page: {}", e))
            }
            failure => Err(failure
                .error_message()
                .unwrap_or_else(|| "Unknown fetch error".to_string())),
        };

        match outcome {
            Ok(()) => {
                if let Err(e) = self.record_success(&target) {
                    tracing::error!("Failed to record fetch of {}: {}", target.url, e);
                    self.handle.record_error(e.to_string());
                }
                let mut state = self.handle.state();
                state.pages_crawled += 1;
                state.current_url = Some(target.url);
            }
            Err(error) => {
                tracing::warn!("Fetch failed for {}: {}", target.url, error);
                if let Err(e) = self.record_failure(&target) {
                    tracing::error!("Failed to record failure of {}: {}", target.url, e);
                }
                self.handle.record_error(format!("{}: {}", target.url, error));
            }
        }
    }

    fn record_success(&self, target: &FetchTarget) -> Result<(), PagefeedError> {
        match (&self.source, target.id) {
            (UrlSource::Scheduler(scheduler), Some(id)) => lock_or_recover(scheduler).mark_crawled(id),
            (UrlSource::Legacy(queue), _) => Ok(queue.record_crawled(&target.url)?),
            (UrlSource::Scheduler(_), None) => Ok(()),
        }
    }

    fn record_failure(&self, target: &FetchTarget) -> Result<(), PagefeedError> {
        match (&self.source, target.id) {
            (UrlSource::Scheduler(scheduler), Some(id)) => lock_or_recover(scheduler).mark_failed(id),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_and_minutes_delay() {
        let mut seq = PrimeSequence::new(0);
        assert_eq!(
            RateLimit::Fixed { secs: 3 }.delay(&mut seq),
            Duration::from_secs(3)
        );
        assert_eq!(
            RateLimit::Minutes { minutes: 2 }.delay(&mut seq),
            Duration::from_secs(120)
        );
    }

    #[test]
    fn test_per_minute_delay() {
        let mut seq = PrimeSequence::new(0);
        assert_eq!(
            RateLimit::PerMinute { rpm: 6 }.delay(&mut seq),
            Duration::from_secs(10)
        );
        assert_eq!(
            RateLimit::PerMinute { rpm: 120 }.delay(&mut seq),
            Duration::from_millis(500)
        );
    }

    #[test]
    fn test_random_delay_seeded() {
        let limit = RateLimit::default();
        let mut a = PrimeSequence::new(99);
        let mut b = PrimeSequence::new(99);

        for _ in 0..10 {
            let delay = limit.delay(&mut a);
            assert_eq!(delay, limit.delay(&mut b));
            assert!(delay >= Duration::from_secs(5) && delay <= Duration::from_secs(15));
        }
    }

    #[test]
    fn test_handle_controls() {
        let handle = FetchHandle::new(RateLimit::default());
        assert!(!handle.is_paused());

        handle.pause();
        assert!(handle.is_paused());
        handle.resume();
        assert!(!handle.is_paused());

        handle.set_rate_limit(RateLimit::Fixed { secs: 1 });
        assert_eq!(handle.rate_limit(), RateLimit::Fixed { secs: 1 });

        assert!(!handle.is_stopped());
        handle.stop();
        assert!(handle.is_stopped());
    }

    #[test]
    fn test_sleep_returns_on_stop() {
        let handle = FetchHandle::new(RateLimit::default());
        handle.stop();

        let start = std::time::Instant::now();
        handle.sleep(Duration::from_secs(30), true);
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_loop_exits_on_stop_with_empty_queue() {
        let dir = tempfile::tempdir().unwrap();
        let queue = Arc::new(LegacyQueue::new(dir.path()));
        let fetch = FetchLoop::new(
            &Config::default(),
            UrlSource::Legacy(queue),
            dir.path().to_path_buf(),
        )
        .unwrap()
        .with_empty_queue_wait(Duration::from_millis(50));

        let handle = fetch.handle();
        let thread = fetch.spawn().unwrap();
        thread::sleep(Duration::from_millis(200));
        handle.stop();
        thread.join().unwrap();

        assert_eq!(handle.pages_crawled(), 0);
    }
}
