use super::{LinkSink, Stage, StageOutcome, TextExtractor, WorkItem};
use crate::crawler::{extract_links, header_url};
use crate::PagefeedError;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use url::Url;

/// Turns raw pages into plain text and feeds their links back to the crawl
pub struct PreprocessStage {
    input_dir: PathBuf,
    output_dir: PathBuf,
    extractor: Arc<dyn TextExtractor>,
    links: Option<Arc<dyn LinkSink>>,
}

impl PreprocessStage {
    pub fn new(
        input_dir: PathBuf,
        output_dir: PathBuf,
        extractor: Arc<dyn TextExtractor>,
        links: Option<Arc<dyn LinkSink>>,
    ) -> Self {
        Self {
            input_dir,
            output_dir,
            extractor,
            links,
        }
    }

    fn output_path(&self, base: &str) -> PathBuf {
        self.output_dir.join(format!("{}.txt", base))
    }

    /// Offers the page's outbound links to the sink
    fn forward_links(&self, item: &WorkItem) -> Result<usize, PagefeedError> {
        let Some(sink) = &self.links else {
            return Ok(0);
        };

        let content = String::from_utf8_lossy(&fs::read(&item.path)?).into_owned();
        let Some(source) = header_url(&content) else {
            tracing::debug!("No source URL in {}", item.path.display());
            return Ok(0);
        };
        let base_url = match Url::parse(source) {
            Ok(url) => url,
            Err(e) => {
                tracing::debug!("Bad source URL '{}' in {}: {}", source, item.path.display(), e);
                return Ok(0);
            }
        };

        let links = extract_links(&content, &base_url);
        if links.is_empty() {
            return Ok(0);
        }

        let accepted = sink.submit(&links, source);
        tracing::debug!(
            "Queued {} of {} links from {}",
            accepted,
            links.len(),
            source
        );
        Ok(accepted)
    }
}

impl Stage for PreprocessStage {
    fn name(&self) -> &str {
        "preprocess"
    }

    fn input_dir(&self) -> &Path {
        &self.input_dir
    }

    fn candidate(&self, path: &Path) -> Option<WorkItem> {
        let item = WorkItem::with_extension(path, "html")?;
        if self.output_path(&item.base).exists() {
            return None;
        }
        Some(item)
    }

    fn process(&self, item: &WorkItem) -> Result<StageOutcome, PagefeedError> {
        // Links go out before the marker is written, so a stop in between
        // re-sends them on restart instead of losing them
        self.forward_links(item)?;

        let outcome = self
            .extractor
            .extract(&item.path, &self.output_path(&item.base))?;

        if outcome.kept {
            tracing::debug!("Extracted {} chars from {}", outcome.chars, item.base);
            Ok(StageOutcome::Processed)
        } else {
            tracing::debug!(
                "Text of {} too short ({} chars), wrote empty marker",
                item.base,
                outcome.chars
            );
            Ok(StageOutcome::Empty)
        }
    }
}
