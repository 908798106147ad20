//! Crawl orchestration
//!
//! The [`Orchestrator`] owns every running component: the fetch loop, the
//! preprocess, tokenize and train worker pools, and the status monitor. It
//! starts them in pipeline order and stops them cooperatively.
//!
//! Stopping does not drain the pipeline. Every stage writes its output before
//! its completion marker appears, so an item cut short by a stop is redone on
//! the next start and nothing is lost.

mod monitor;
mod status;

pub use monitor::{DirCounts, POLL_INTERVAL};
pub use status::{CrawlerEvent, StatusSnapshot};

use crate::config::{resolve_threads, Config};
use crate::crawler::{AddOutcome, FetchHandle, FetchLoop, LegacyQueue, UrlScheduler, UrlSource};
use crate::pipeline::{
    HtmlTextExtractor, LinkSink, PreprocessStage, StageWorkerPool, TokenizeStage, TrainStage, Trainer,
    PREPROCESSED_DIR, RAW_PAGES_DIR, TRAINED_DIR, TRAINING_QUEUE_DIR,
};
use crate::{lock_or_recover, PagefeedError};
use monitor::StatusMonitor;
use status::SharedStatus;
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

/// Components that only exist while the crawl runs
struct Running {
    fetch: FetchHandle,
    fetch_thread: Option<JoinHandle<()>>,
    preprocess: StageWorkerPool,
    tokenize: StageWorkerPool,
    train: StageWorkerPool,
    monitor: StatusMonitor,
}

/// Runs the crawl and the processing pipeline
pub struct Orchestrator {
    config: Config,
    trainer: Arc<dyn Trainer>,
    status: SharedStatus,
    scheduler: Option<Arc<Mutex<UrlScheduler>>>,
    running: Option<Running>,
}

impl Orchestrator {
    /// Creates an idle orchestrator
    ///
    /// # Arguments
    ///
    /// * `config` - The crawler configuration
    /// * `trainer` - Model hook for the train stage; use [`crate::NullTrainer`]
    ///   when no model is attached
    pub fn new(config: Config, trainer: Arc<dyn Trainer>) -> Self {
        Self {
            config,
            trainer,
            status: SharedStatus::default(),
            scheduler: None,
            running: None,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// Starts the fetch loop, the three stage pools and the status monitor
    ///
    /// # Errors
    ///
    /// * `AlreadyRunning` - `start` was already called without `stop`
    /// * Any error creating the data directories or opening the URL store
    pub fn start(&mut self) -> Result<(), PagefeedError> {
        if self.running.is_some() {
            return Err(PagefeedError::AlreadyRunning);
        }

        let data_dir = self.config.crawler.data_dir.clone();
        for dir in [RAW_PAGES_DIR, PREPROCESSED_DIR, TRAINING_QUEUE_DIR, TRAINED_DIR] {
            fs::create_dir_all(data_dir.join(dir))?;
        }

        let scheduler = match &self.scheduler {
            Some(scheduler) => Arc::clone(scheduler),
            None => {
                let opened = UrlScheduler::open(&data_dir, self.config.priority)?;
                let scheduler = Arc::new(Mutex::new(opened));
                self.scheduler = Some(Arc::clone(&scheduler));
                scheduler
            }
        };

        let legacy = self
            .config
            .crawler
            .use_legacy_queue
            .then(|| Arc::new(LegacyQueue::new(&data_dir)));

        self.seed(&scheduler, legacy.as_deref());

        let (source, links) = match &legacy {
            Some(queue) => (
                UrlSource::Legacy(Arc::clone(queue)),
                Arc::clone(queue) as Arc<dyn LinkSink>,
            ),
            None => (
                UrlSource::Scheduler(Arc::clone(&scheduler)),
                Arc::clone(&scheduler) as Arc<dyn LinkSink>,
            ),
        };

        let fetch_loop = FetchLoop::new(&self.config, source, data_dir.join(RAW_PAGES_DIR))?;
        let fetch = fetch_loop.handle();
        let fetch_thread = fetch_loop.spawn()?;

        let pools = self.start_pools(&data_dir, links);
        let (preprocess, tokenize, train) = match pools {
            Ok(pools) => pools,
            Err(e) => {
                fetch.stop();
                join_fetch(Some(fetch_thread));
                return Err(e);
            }
        };

        let monitor = match StatusMonitor::spawn(
            data_dir.clone(),
            fetch.clone(),
            self.status.clone(),
            POLL_INTERVAL,
        ) {
            Ok(monitor) => monitor,
            Err(e) => {
                fetch.stop();
                join_fetch(Some(fetch_thread));
                return Err(e.into());
            }
        };

        self.running = Some(Running {
            fetch,
            fetch_thread: Some(fetch_thread),
            preprocess,
            tokenize,
            train,
            monitor,
        });

        self.status.update(|s| s.running = true);
        tracing::info!("Crawler started in {}", data_dir.display());
        self.status.fire(CrawlerEvent::Started);
        Ok(())
    }

    fn start_pools(
        &self,
        data_dir: &Path,
        links: Arc<dyn LinkSink>,
    ) -> Result<(StageWorkerPool, StageWorkerPool, StageWorkerPool), PagefeedError> {
        let pipeline = &self.config.pipeline;

        let preprocess_stage = PreprocessStage::new(
            data_dir.join(RAW_PAGES_DIR),
            data_dir.join(PREPROCESSED_DIR),
            Arc::new(HtmlTextExtractor::new(pipeline.min_text_length)),
            Some(links),
        );
        let tokenize_stage = TokenizeStage::new(
            data_dir.join(PREPROCESSED_DIR),
            data_dir.join(TRAINING_QUEUE_DIR),
            data_dir.join(TRAINED_DIR),
        );
        let train_stage = TrainStage::new(
            data_dir.join(TRAINING_QUEUE_DIR),
            data_dir.join(TRAINED_DIR),
            Arc::clone(&self.trainer),
            pipeline.epochs,
            pipeline.vocab_size,
        );

        let mut preprocess = StageWorkerPool::new(
            Arc::new(preprocess_stage),
            resolve_threads(pipeline.preprocess_threads),
        );
        let mut tokenize = StageWorkerPool::new(
            Arc::new(tokenize_stage),
            resolve_threads(pipeline.tokenize_threads),
        );
        let mut train = StageWorkerPool::new(
            Arc::new(train_stage),
            resolve_threads(pipeline.train_threads),
        );

        // Pools already started are stopped by their Drop on early return
        preprocess.start()?;
        tokenize.start()?;
        train.start()?;

        Ok((preprocess, tokenize, train))
    }

    fn seed(&self, scheduler: &Mutex<UrlScheduler>, legacy: Option<&LegacyQueue>) {
        let seeds = &self.config.crawler.seeds;
        if seeds.is_empty() {
            return;
        }

        if let Some(queue) = legacy {
            match queue.is_empty() {
                Ok(true) => match queue.append(seeds) {
                    Ok(count) => tracing::info!("Seeded legacy queue with {} URLs", count),
                    Err(e) => tracing::error!("Failed to seed legacy queue: {}", e),
                },
                Ok(false) => tracing::debug!("Legacy queue not empty, skipping seeds"),
                Err(e) => tracing::error!("Failed to read legacy queue: {}", e),
            }
            return;
        }

        let mut scheduler = lock_or_recover(scheduler);
        for seed in seeds {
            match scheduler.add(seed, "") {
                AddOutcome::Added(_) => tracing::info!("Seeded {}", seed),
                AddOutcome::Duplicate => tracing::debug!("Seed {} already known", seed),
                AddOutcome::Filtered(reason) => tracing::warn!("Seed {} rejected: {}", seed, reason),
                AddOutcome::StoreError(e) => tracing::error!("Failed to store seed {}: {}", seed, e),
            }
        }
    }

    /// Stops every component and waits for it to exit
    ///
    /// Items in flight are abandoned and redone on the next start.
    pub fn stop(&mut self) -> Result<(), PagefeedError> {
        let mut running = self.running.take().ok_or(PagefeedError::NotRunning)?;
        tracing::info!("Stopping crawler");

        running.fetch.stop();
        running.preprocess.request_stop();
        running.tokenize.request_stop();
        running.train.request_stop();

        running.train.join();
        join_fetch(running.fetch_thread.take());
        running.preprocess.join();
        running.tokenize.join();
        running.monitor.stop();

        let pages_crawled = running.fetch.pages_crawled();
        self.status.update(|s| {
            s.running = false;
            s.pages_crawled = pages_crawled;
        });
        tracing::info!("Crawler stopped");
        self.status.fire(CrawlerEvent::Stopped);
        Ok(())
    }

    pub fn pause(&self) -> Result<(), PagefeedError> {
        self.fetch_handle()?.pause();
        Ok(())
    }

    pub fn resume(&self) -> Result<(), PagefeedError> {
        self.fetch_handle()?.resume();
        Ok(())
    }

    /// Control handle of the running fetch loop
    pub fn fetch_handle(&self) -> Result<&FetchHandle, PagefeedError> {
        self.running
            .as_ref()
            .map(|r| &r.fetch)
            .ok_or(PagefeedError::NotRunning)
    }

    /// True once the fetch loop has reached its page limit
    pub fn fetch_finished(&self) -> bool {
        self.running.as_ref().map_or(false, |r| r.fetch.is_finished())
    }

    /// Latest status, with the fetch counters read live
    pub fn status(&self) -> StatusSnapshot {
        let mut snapshot = self.status.snapshot();
        if let Some(running) = &self.running {
            snapshot.pages_crawled = running.fetch.pages_crawled();
            snapshot.current_url = running.fetch.current_url();
            snapshot.last_error = running.fetch.last_error();
        }
        snapshot
    }

    /// Registers the callback invoked for every [`CrawlerEvent`]
    ///
    /// The callback runs on the thread that raised the event.
    pub fn set_event_callback<F>(&self, callback: F)
    where
        F: Fn(CrawlerEvent, &StatusSnapshot) + Send + Sync + 'static,
    {
        self.status.set_callback(Arc::new(callback));
    }

    /// Shared scheduler for adding URLs while the crawl runs
    ///
    /// `None` until the first `start`.
    pub fn scheduler(&self) -> Option<Arc<Mutex<UrlScheduler>>> {
        self.scheduler.clone()
    }
}

impl Drop for Orchestrator {
    fn drop(&mut self) {
        if self.running.is_some() {
            if let Err(e) = self.stop() {
                tracing::error!("Failed to stop crawler: {}", e);
            }
        }
    }
}

fn join_fetch(thread: Option<JoinHandle<()>>) {
    if let Some(thread) = thread {
        if thread.join().is_err() {
            tracing::error!("Fetch loop panicked");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::NullTrainer;

    fn test_config(data_dir: &Path) -> Config {
        let mut config = Config::default();
        config.crawler.data_dir = data_dir.to_path_buf();
        config.pipeline.preprocess_threads = 1;
        config.pipeline.tokenize_threads = 1;
        config.pipeline.train_threads = 1;
        config
    }

    #[test]
    fn test_start_creates_directories_and_stops() {
        let dir = tempfile::tempdir().unwrap();
        let events = Arc::new(Mutex::new(Vec::new()));

        let mut orchestrator = Orchestrator::new(test_config(dir.path()), Arc::new(NullTrainer));
        let sink = Arc::clone(&events);
        orchestrator.set_event_callback(move |event: CrawlerEvent, _status: &StatusSnapshot| {
            sink.lock().unwrap().push(event);
        });

        orchestrator.start().unwrap();
        assert!(orchestrator.is_running());
        assert!(orchestrator.status().running);
        for sub in [RAW_PAGES_DIR, PREPROCESSED_DIR, TRAINING_QUEUE_DIR, TRAINED_DIR] {
            assert!(dir.path().join(sub).is_dir());
        }
        assert!(matches!(orchestrator.start(), Err(PagefeedError::AlreadyRunning)));

        orchestrator.pause().unwrap();
        assert!(orchestrator.fetch_handle().unwrap().is_paused());
        orchestrator.resume().unwrap();

        orchestrator.stop().unwrap();
        assert!(!orchestrator.is_running());
        assert!(!orchestrator.status().running);

        let events = events.lock().unwrap();
        assert_eq!(events.first(), Some(&CrawlerEvent::Started));
        assert_eq!(events.last(), Some(&CrawlerEvent::Stopped));
    }

    #[test]
    fn test_stop_when_idle() {
        let dir = tempfile::tempdir().unwrap();
        let mut orchestrator = Orchestrator::new(test_config(dir.path()), Arc::new(NullTrainer));
        assert!(matches!(orchestrator.stop(), Err(PagefeedError::NotRunning)));
        assert!(matches!(orchestrator.pause(), Err(PagefeedError::NotRunning)));
        assert!(!orchestrator.fetch_finished());
    }

    #[test]
    fn test_seeds_reach_the_store() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config(dir.path());
        config.crawler.seeds = vec!["http://127.0.0.1:9/".to_string()];

        let mut orchestrator = Orchestrator::new(config, Arc::new(NullTrainer));
        orchestrator.start().unwrap();
        orchestrator.pause().unwrap();

        let scheduler = orchestrator.scheduler().unwrap();
        let stats = scheduler.lock().unwrap().stats().unwrap();
        assert_eq!(stats.total, 1);

        orchestrator.stop().unwrap();
    }

    #[test]
    fn test_restart_reuses_scheduler() {
        let dir = tempfile::tempdir().unwrap();
        let mut orchestrator = Orchestrator::new(test_config(dir.path()), Arc::new(NullTrainer));

        orchestrator.start().unwrap();
        let first = orchestrator.scheduler().unwrap();
        orchestrator.stop().unwrap();

        orchestrator.start().unwrap();
        assert!(Arc::ptr_eq(&first, &orchestrator.scheduler().unwrap()));
        orchestrator.stop().unwrap();
    }
}
