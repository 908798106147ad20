//! Flat-file URL queue
//!
//! Compatibility mode for data directories that predate the URL database.
//! Pending links live one per line in `links_to_crawl.txt`; fetched links are
//! appended to `links_crawled.txt`. Off unless `use-legacy-queue` is set.

use crate::lock_or_recover;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Pending links file inside the data directory
pub const QUEUE_FILE: &str = "links_to_crawl.txt";

/// Fetched links file inside the data directory
pub const CRAWLED_FILE: &str = "links_crawled.txt";

/// Stride used to spread selection over the queue
const SELECTION_STRIDE: u64 = 13;

/// Flat-file link queue shared by the fetch loop and the preprocess stage
#[derive(Debug)]
pub struct LegacyQueue {
    queue_path: PathBuf,
    crawled_path: PathBuf,
    lock: Mutex<()>,
}

impl LegacyQueue {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            queue_path: data_dir.join(QUEUE_FILE),
            crawled_path: data_dir.join(CRAWLED_FILE),
            lock: Mutex::new(()),
        }
    }

    /// Removes and returns the link at `(iteration * 13) % len`
    ///
    /// Returns `None` when the queue is empty or missing.
    pub fn next(&self, iteration: u64) -> io::Result<Option<String>> {
        let _guard = lock_or_recover(&self.lock);

        let mut links = read_lines(&self.queue_path)?;
        if links.is_empty() {
            return Ok(None);
        }

        let index = (iteration.wrapping_mul(SELECTION_STRIDE) % links.len() as u64) as usize;
        let link = links.remove(index);
        write_lines(&self.queue_path, &links)?;

        Ok(Some(link))
    }

    /// Appends links to the queue; returns how many were written
    pub fn append<S: AsRef<str>>(&self, urls: &[S]) -> io::Result<usize> {
        let _guard = lock_or_recover(&self.lock);
        append_lines(&self.queue_path, urls)
    }

    /// Records a fetched link
    pub fn record_crawled(&self, url: &str) -> io::Result<()> {
        let _guard = lock_or_recover(&self.lock);
        append_lines(&self.crawled_path, &[url]).map(|_| ())
    }

    /// Number of queued links
    pub fn len(&self) -> io::Result<usize> {
        let _guard = lock_or_recover(&self.lock);
        Ok(read_lines(&self.queue_path)?.len())
    }

    pub fn is_empty(&self) -> io::Result<bool> {
        Ok(self.len()? == 0)
    }
}

fn read_lines(path: &Path) -> io::Result<Vec<String>> {
    match fs::read_to_string(path) {
        Ok(text) => Ok(text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(e),
    }
}

fn write_lines(path: &Path, lines: &[String]) -> io::Result<()> {
    let mut out = String::new();
    for line in lines {
        out.push_str(line);
        out.push('\n');
    }
    fs::write(path, out)
}

fn append_lines<S: AsRef<str>>(path: &Path, lines: &[S]) -> io::Result<usize> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    for line in lines {
        writeln!(file, "{}", line.as_ref())?;
    }
    Ok(lines.len())
}
