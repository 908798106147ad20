//! Polling worker pool shared by all pipeline stages

use super::{sorted_entries, Stage, StageOutcome};
use crate::PagefeedError;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Pause after an item was processed
const WORK_DELAY: Duration = Duration::from_secs(1);

/// Pause when the input directory had nothing to do
const IDLE_DELAY: Duration = Duration::from_secs(5);

/// Granularity at which sleeping workers check for stop
const STOP_CHECK: Duration = Duration::from_millis(100);

/// Item counters of one pool
#[derive(Debug, Default)]
pub struct PoolStats {
    processed: AtomicU64,
    failed: AtomicU64,
}

impl PoolStats {
    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }
}

/// N threads polling one stage's input directory
///
/// Each worker lists the input directory in name order, takes the first item
/// it can claim, processes it and pauses for one second. When nothing was
/// claimable it pauses for five seconds instead. Sleeps are cut short by
/// [`request_stop`](Self::request_stop), and an item in progress is always
/// finished before the worker exits.
///
/// A failed item is logged and counted in [`PoolStats`], and the worker
/// moves on. The item is left in place and is retried on a later pass.
///
/// ```no_run
/// use pagefeed::pipeline::{StageWorkerPool, TokenizeStage};
/// use std::path::PathBuf;
/// use std::sync::Arc;
///
/// let stage = TokenizeStage::new(
///     PathBuf::from("data/preprocessed"),
///     PathBuf::from("data/training_queue"),
///     PathBuf::from("data/trained"),
/// );
/// let mut pool = StageWorkerPool::new(Arc::new(stage), 2);
/// pool.start().unwrap();
/// // ...
/// pool.stop();
/// ```
pub struct StageWorkerPool {
    stage: Arc<dyn Stage>,
    threads: usize,
    stop: Arc<AtomicBool>,
    stats: Arc<PoolStats>,
    handles: Vec<JoinHandle<()>>,
}

impl StageWorkerPool {
    pub fn new(stage: Arc<dyn Stage>, threads: usize) -> Self {
        Self {
            stage,
            threads: threads.max(1),
            stop: Arc::new(AtomicBool::new(false)),
            stats: Arc::new(PoolStats::default()),
            handles: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        self.stage.name()
    }

    pub fn stats(&self) -> Arc<PoolStats> {
        Arc::clone(&self.stats)
    }

    pub fn is_running(&self) -> bool {
        !self.handles.is_empty()
    }

    /// Prepares the stage and starts the worker threads
    ///
    /// [`Stage::prepare`] runs first, on the calling thread, so stale state
    /// such as leftover train locks is cleared before any worker polls.
    /// Threads are named `{stage}-{index}`.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyRunning` if the pool has live workers, the error from
    /// `prepare`, or an I/O error if a thread cannot be spawned. Workers
    /// spawned before a spawn failure keep running until the pool is stopped
    /// or dropped.
    pub fn start(&mut self) -> Result<(), PagefeedError> {
        if self.is_running() {
            return Err(PagefeedError::AlreadyRunning);
        }

        self.stage.prepare()?;
        self.stop.store(false, Ordering::SeqCst);

        for index in 0..self.threads {
            let stage = Arc::clone(&self.stage);
            let stop = Arc::clone(&self.stop);
            let stats = Arc::clone(&self.stats);

            let handle = thread::Builder::new()
                .name(format!("{}-{}", stage.name(), index))
                .spawn(move || worker_loop(stage.as_ref(), &stop, &stats))?;
            self.handles.push(handle);
        }

        tracing::info!("Started {} {} workers", self.threads, self.stage.name());
        Ok(())
    }

    /// Asks every worker to exit after its current item
    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    /// Waits for every worker to exit
    pub fn join(&mut self) {
        for handle in self.handles.drain(..) {
            if handle.join().is_err() {
                tracing::error!("A {} worker panicked", self.stage.name());
            }
        }
        tracing::info!(
            "{} workers stopped ({} processed, {} failed)",
            self.stage.name(),
            self.stats.processed(),
            self.stats.failed()
        );
    }

    pub fn stop(&mut self) {
        self.request_stop();
        self.join();
    }

    /// Processes items on the calling thread until the input has no work left
    ///
    /// Returns the number of items handled.
    pub fn drain(&self) -> usize {
        let mut handled = 0;
        while run_once(self.stage.as_ref(), &self.stats) {
            handled += 1;
        }
        handled
    }
}

impl Drop for StageWorkerPool {
    fn drop(&mut self) {
        if self.is_running() {
            self.stop();
        }
    }
}

fn worker_loop(stage: &dyn Stage, stop: &AtomicBool, stats: &PoolStats) {
    while !stop.load(Ordering::SeqCst) {
        let delay = if run_once(stage, stats) {
            WORK_DELAY
        } else {
            IDLE_DELAY
        };
        sleep_unless_stopped(delay, stop);
    }
}

/// Finds the first claimable candidate and processes it
///
/// Returns false when there was nothing to do.
fn run_once(stage: &dyn Stage, stats: &PoolStats) -> bool {
    for path in sorted_entries(stage.input_dir()) {
        let Some(item) = stage.candidate(&path) else {
            continue;
        };
        let Some(_claim) = stage.claim(&item) else {
            continue;
        };

        match stage.process(&item) {
            Ok(outcome) => {
                stats.processed.fetch_add(1, Ordering::Relaxed);
                if outcome == StageOutcome::Empty {
                    tracing::debug!("{}: {} had no content", stage.name(), item.base);
                }
            }
            Err(e) => {
                stats.failed.fetch_add(1, Ordering::Relaxed);
                tracing::warn!("{}: failed on {}: {}", stage.name(), item.path.display(), e);
            }
        }
        return true;
    }
    false
}

fn sleep_unless_stopped(duration: Duration, stop: &AtomicBool) {
    let deadline = Instant::now() + duration;
    while !stop.load(Ordering::SeqCst) {
        let now = Instant::now();
        if now >= deadline {
            break;
        }
        thread::sleep(STOP_CHECK.min(deadline - now));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{Claim, WorkItem};
    use std::fs;
    use std::path::{Path, PathBuf};

    /// Copies `*.in` files to `*.out` in the same directory
    struct CopyStage {
        dir: PathBuf,
        fail_on: Option<String>,
    }

    impl Stage for CopyStage {
        fn name(&self) -> &str {
            "copy"
        }

        fn input_dir(&self) -> &Path {
            &self.dir
        }

        fn candidate(&self, path: &Path) -> Option<WorkItem> {
            let item = WorkItem::with_extension(path, "in")?;
            let out = self.dir.join(format!("{}.out", item.base));
            let err = self.dir.join(format!("{}.err", item.base));
            if out.exists() || err.exists() {
                return None;
            }
            Some(item)
        }

        fn claim(&self, _item: &WorkItem) -> Option<Claim> {
            Some(Claim::unlocked())
        }

        fn process(&self, item: &WorkItem) -> Result<StageOutcome, PagefeedError> {
            if self.fail_on.as_deref() == Some(item.base.as_str()) {
                fs::write(self.dir.join(format!("{}.err", item.base)), "")?;
                return Err(PagefeedError::Pipeline("boom".to_string()));
            }
            fs::copy(&item.path, self.dir.join(format!("{}.out", item.base)))?;
            Ok(StageOutcome::Processed)
        }
    }

    fn pool(dir: &Path, fail_on: Option<&str>, threads: usize) -> StageWorkerPool {
        let stage = CopyStage {
            dir: dir.to_path_buf(),
            fail_on: fail_on.map(str::to_string),
        };
        StageWorkerPool::new(Arc::new(stage), threads)
    }

    #[test]
    fn test_drain_processes_everything() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["a", "b", "c"] {
            fs::write(dir.path().join(format!("{}.in", name)), name).unwrap();
        }

        let pool = pool(dir.path(), None, 1);
        assert_eq!(pool.drain(), 3);
        assert_eq!(pool.drain(), 0);
        assert_eq!(pool.stats().processed(), 3);
        assert_eq!(fs::read_to_string(dir.path().join("b.out")).unwrap(), "b");
    }

    #[test]
    fn test_failures_are_counted_and_skipped() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("bad.in"), "").unwrap();
        fs::write(dir.path().join("good.in"), "").unwrap();

        let pool = pool(dir.path(), Some("bad"), 1);
        assert_eq!(pool.drain(), 2);
        assert_eq!(pool.stats().failed(), 1);
        assert_eq!(pool.stats().processed(), 1);
    }

    #[test]
    fn test_threads_start_and_stop() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("x.in"), "x").unwrap();

        let mut pool = pool(dir.path(), None, 2);
        pool.start().unwrap();
        assert!(pool.is_running());
        assert!(matches!(pool.start(), Err(PagefeedError::AlreadyRunning)));

        let deadline = Instant::now() + Duration::from_secs(5);
        while pool.stats().processed() == 0 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(20));
        }

        let started = Instant::now();
        pool.stop();
        assert!(!pool.is_running());
        assert!(started.elapsed() < Duration::from_secs(2));
        assert!(dir.path().join("x.out").exists());
    }
}
