//! Directory-queue processing pipeline
//!
//! Fetched pages move through three stages, each a pool of polling worker
//! threads that reads one directory and writes the next:
//!
//! ```text
//! raw_pages/ -> preprocess -> preprocessed/ -> tokenize -> training_queue/ -> train -> trained/
//! ```
//!
//! An item counts as done once its output (the completion marker) exists.
//! Outputs are written under a temporary name and renamed into place, so a
//! stage never observes a half-written file and an interrupted item is simply
//! redone on the next start.

mod extract;
mod preprocess;
mod tokenize;
mod train;
mod worker;

pub use extract::{html_to_text, ExtractOutcome, HtmlTextExtractor, TextExtractor};
pub use preprocess::PreprocessStage;
pub use tokenize::{tokenize, TokenizeStage, MAX_TOKENS, MAX_TOKEN_LEN};
pub use train::{token_id, TrainStage};
pub use worker::{PoolStats, StageWorkerPool};

use crate::crawler::{LegacyQueue, UrlScheduler};
use crate::{lock_or_recover, PagefeedError};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Raw fetched pages
pub const RAW_PAGES_DIR: &str = "raw_pages";

/// Extracted text
pub const PREPROCESSED_DIR: &str = "preprocessed";

/// Token files waiting for the trainer
pub const TRAINING_QUEUE_DIR: &str = "training_queue";

/// Token files the trainer has consumed
pub const TRAINED_DIR: &str = "trained";

/// One file waiting in a stage's input directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    pub path: PathBuf,

    /// File name without its extension; outputs are named after it
    pub base: String,
}

impl WorkItem {
    /// Builds an item if `path` has the given extension
    pub fn with_extension(path: &Path, extension: &str) -> Option<Self> {
        if path.extension()? != extension {
            return None;
        }
        let base = path.file_stem()?.to_str()?.to_string();
        Some(Self {
            path: path.to_path_buf(),
            base,
        })
    }
}

/// What processing an item produced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageOutcome {
    /// Output written with content
    Processed,

    /// Output written, but there was nothing to carry forward
    Empty,
}

/// Exclusive hold on a work item
///
/// When the claim owns a lock file, dropping the claim removes it.
#[derive(Debug)]
pub struct Claim {
    lock_path: Option<PathBuf>,
}

impl Claim {
    /// A claim that takes no lock
    pub fn unlocked() -> Self {
        Self { lock_path: None }
    }

    pub fn locked(lock_path: PathBuf) -> Self {
        Self {
            lock_path: Some(lock_path),
        }
    }
}

impl Drop for Claim {
    fn drop(&mut self) {
        if let Some(path) = &self.lock_path {
            if let Err(e) = fs::remove_file(path) {
                tracing::warn!("Failed to remove lock {}: {}", path.display(), e);
            }
        }
    }
}

/// One step of the pipeline, run by a [`StageWorkerPool`]
pub trait Stage: Send + Sync {
    /// Name used for thread names and logs
    fn name(&self) -> &str;

    /// Directory polled for work
    fn input_dir(&self) -> &Path;

    /// Accepts an input file as work, or skips it (wrong type, already done)
    fn candidate(&self, path: &Path) -> Option<WorkItem>;

    /// Takes exclusive ownership of an item
    ///
    /// Returns `None` if another worker got there first. The default never
    /// contends, which is fine for stages whose outputs are idempotent.
    fn claim(&self, _item: &WorkItem) -> Option<Claim> {
        Some(Claim::unlocked())
    }

    fn process(&self, item: &WorkItem) -> Result<StageOutcome, PagefeedError>;

    /// Runs once when the pool starts
    fn prepare(&self) -> Result<(), PagefeedError> {
        Ok(())
    }
}

/// Model hook called by the train stage
pub trait Trainer: Send + Sync {
    /// Runs one pass over a token id sequence and returns the loss
    fn train_on_tokens(&self, tokens: &[u32]) -> f32;
}

/// Trainer used when no model is attached
#[derive(Debug, Clone, Copy, Default)]
pub struct NullTrainer;

impl Trainer for NullTrainer {
    fn train_on_tokens(&self, tokens: &[u32]) -> f32 {
        tracing::debug!("No model attached, skipping {} tokens", tokens.len());
        0.0
    }
}

/// Destination for links discovered during preprocessing
pub trait LinkSink: Send + Sync {
    /// Offers links found on `source_url`; returns how many were accepted
    fn submit(&self, links: &[String], source_url: &str) -> usize;
}

impl LinkSink for Mutex<UrlScheduler> {
    fn submit(&self, links: &[String], source_url: &str) -> usize {
        lock_or_recover(self).add_batch(links, source_url)
    }
}

impl LinkSink for LegacyQueue {
    fn submit(&self, links: &[String], _source_url: &str) -> usize {
        match self.append(links) {
            Ok(count) => count,
            Err(e) => {
                tracing::warn!("Failed to append links to legacy queue: {}", e);
                0
            }
        }
    }
}

/// Lists a directory's files in name order; a missing directory is empty
pub(crate) fn sorted_entries(dir: &Path) -> Vec<PathBuf> {
    let mut entries: Vec<PathBuf> = match fs::read_dir(dir) {
        Ok(read) => read
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file())
            .collect(),
        Err(_) => Vec::new(),
    };
    entries.sort();
    entries
}

/// Counts files with the given extension in a directory
pub fn count_files(dir: &Path, extension: &str) -> usize {
    sorted_entries(dir)
        .iter()
        .filter(|path| path.extension().map_or(false, |ext| ext == extension))
        .count()
}

/// Writes `content` under a temporary name and renames it to `path`
pub(crate) fn write_atomic(path: &Path, content: &str) -> std::io::Result<()> {
    let mut temp = path.as_os_str().to_owned();
    temp.push(".tmp");
    let temp = PathBuf::from(temp);
    fs::write(&temp, content)?;
    fs::rename(&temp, path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_work_item_extension() {
        let item = WorkItem::with_extension(Path::new("/q/page_1_2.html"), "html").unwrap();
        assert_eq!(item.base, "page_1_2");
        assert!(WorkItem::with_extension(Path::new("/q/page.html.part"), "html").is_none());
        assert!(WorkItem::with_extension(Path::new("/q/noext"), "html").is_none());
    }

    #[test]
    fn test_claim_drop_removes_lock() {
        let dir = tempfile::tempdir().unwrap();
        let lock = dir.path().join("item.lock");
        fs::write(&lock, "").unwrap();

        drop(Claim::locked(lock.clone()));
        assert!(!lock.exists());
    }

    #[test]
    fn test_sorted_entries_and_count() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.txt"), "").unwrap();
        fs::write(dir.path().join("a.txt"), "").unwrap();
        fs::write(dir.path().join("c.tok"), "").unwrap();

        let names: Vec<_> = sorted_entries(dir.path())
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.txt", "b.txt", "c.tok"]);
        assert_eq!(count_files(dir.path(), "txt"), 2);
        assert_eq!(count_files(&dir.path().join("missing"), "txt"), 0);
    }

    #[test]
    fn test_write_atomic() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.tok");
        write_atomic(&path, "data").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "data");
        assert_eq!(sorted_entries(dir.path()).len(), 1);
    }
}
