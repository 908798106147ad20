use super::{sorted_entries, Claim, Stage, StageOutcome, Trainer, WorkItem};
use crate::url::djb2;
use crate::PagefeedError;
use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Maps a token to its id in a vocabulary of `vocab_size` entries
pub fn token_id(token: &str, vocab_size: u32) -> u32 {
    (djb2(token) % u64::from(vocab_size.max(1))) as u32
}

/// Feeds token files to the model and retires them into `trained/`
pub struct TrainStage {
    queue_dir: PathBuf,
    trained_dir: PathBuf,
    trainer: Arc<dyn Trainer>,
    epochs: u32,
    vocab_size: u32,
}

impl TrainStage {
    pub fn new(
        queue_dir: PathBuf,
        trained_dir: PathBuf,
        trainer: Arc<dyn Trainer>,
        epochs: u32,
        vocab_size: u32,
    ) -> Self {
        Self {
            queue_dir,
            trained_dir,
            trainer,
            epochs,
            vocab_size,
        }
    }

    fn lock_path(item: &WorkItem) -> PathBuf {
        let mut path = item.path.as_os_str().to_owned();
        path.push(".lock");
        PathBuf::from(path)
    }

    fn read_token_ids(&self, path: &Path) -> io::Result<Vec<u32>> {
        let content = fs::read_to_string(path)?;
        Ok(content
            .lines()
            .filter(|line| !line.starts_with('#'))
            .flat_map(str::split_whitespace)
            .map(|token| token_id(token, self.vocab_size))
            .collect())
    }
}

impl Stage for TrainStage {
    fn name(&self) -> &str {
        "train"
    }

    fn input_dir(&self) -> &Path {
        &self.queue_dir
    }

    fn candidate(&self, path: &Path) -> Option<WorkItem> {
        WorkItem::with_extension(path, "tok")
    }

    /// Creates `{item}.lock` exclusively; only one worker can succeed
    ///
    /// The item is checked again once the lock is held, since the previous
    /// holder may have retired it after this worker listed the queue.
    fn claim(&self, item: &WorkItem) -> Option<Claim> {
        let lock_path = Self::lock_path(item);
        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&lock_path)
        {
            Ok(_) => {
                let claim = Claim::locked(lock_path);
                if item.path.exists() {
                    Some(claim)
                } else {
                    tracing::debug!("{} already trained", item.base);
                    None
                }
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => None,
            Err(e) => {
                tracing::warn!("Failed to lock {}: {}", item.path.display(), e);
                None
            }
        }
    }

    fn process(&self, item: &WorkItem) -> Result<StageOutcome, PagefeedError> {
        let tokens = self.read_token_ids(&item.path)?;

        let outcome = if tokens.is_empty() {
            tracing::debug!("No tokens in {}, skipping training", item.base);
            StageOutcome::Empty
        } else {
            for epoch in 1..=self.epochs {
                let loss = self.trainer.train_on_tokens(&tokens);
                tracing::debug!(
                    "Trained on {} epoch {}/{}: loss {:.4}",
                    item.base,
                    epoch,
                    self.epochs,
                    loss
                );
            }
            StageOutcome::Processed
        };

        let file_name = item
            .path
            .file_name()
            .ok_or_else(|| PagefeedError::Pipeline(format!("No file name: {}", item.path.display())))?;
        fs::rename(&item.path, self.trained_dir.join(file_name))?;

        Ok(outcome)
    }

    /// Clears locks left behind by a crashed run
    fn prepare(&self) -> Result<(), PagefeedError> {
        for path in sorted_entries(&self.queue_dir) {
            if path.extension().map_or(false, |ext| ext == "lock") {
                tracing::info!("Removing stale lock {}", path.display());
                fs::remove_file(&path)?;
            }
        }
        Ok(())
    }
}
