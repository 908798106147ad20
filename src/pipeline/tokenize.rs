use super::{write_atomic, Stage, StageOutcome, WorkItem};
use crate::PagefeedError;
use std::fs;
use std::path::{Path, PathBuf};

/// Longer tokens are cut to this many characters
pub const MAX_TOKEN_LEN: usize = 64;

/// Tokens beyond this count are dropped
pub const MAX_TOKENS: usize = 100_000;

/// Splits text into lowercase word tokens
///
/// A token is a run of alphanumeric characters, apostrophes and hyphens.
///
/// # Examples
///
/// ```
/// use pagefeed::pipeline::tokenize;
///
/// assert_eq!(tokenize("Don't stop-me, NOW!"), vec!["don't", "stop-me", "now"]);
/// ```
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !(c.is_alphanumeric() || c == '\'' || c == '-'))
        .filter(|token| !token.is_empty())
        .take(MAX_TOKENS)
        .map(|token| token.chars().take(MAX_TOKEN_LEN).collect::<String>().to_lowercase())
        .collect()
}

/// Turns extracted text into token files for the trainer
pub struct TokenizeStage {
    input_dir: PathBuf,
    queue_dir: PathBuf,
    trained_dir: PathBuf,
}

impl TokenizeStage {
    pub fn new(input_dir: PathBuf, queue_dir: PathBuf, trained_dir: PathBuf) -> Self {
        Self {
            input_dir,
            queue_dir,
            trained_dir,
        }
    }

    fn token_file(base: &str) -> String {
        format!("{}.tok", base)
    }
}

impl Stage for TokenizeStage {
    fn name(&self) -> &str {
        "tokenize"
    }

    fn input_dir(&self) -> &Path {
        &self.input_dir
    }

    /// Text files whose token file is neither queued nor already trained
    fn candidate(&self, path: &Path) -> Option<WorkItem> {
        let item = WorkItem::with_extension(path, "txt")?;
        let name = Self::token_file(&item.base);
        if self.queue_dir.join(&name).exists() || self.trained_dir.join(&name).exists() {
            return None;
        }
        Some(item)
    }

    fn process(&self, item: &WorkItem) -> Result<StageOutcome, PagefeedError> {
        let bytes = fs::read(&item.path)?;
        let tokens = tokenize(&String::from_utf8_lossy(&bytes));

        let content = format!(
            "# Source: {}\n# Token count: {}\n{}\n",
            item.path.display(),
            tokens.len(),
            tokens.join(" ")
        );
        write_atomic(&self.queue_dir.join(Self::token_file(&item.base)), &content)?;

        tracing::debug!("Tokenized {} into {} tokens", item.base, tokens.len());
        Ok(if tokens.is_empty() {
            StageOutcome::Empty
        } else {
            StageOutcome::Processed
        })
    }
}
