//! Text extraction from fetched pages

use crate::PagefeedError;
use scraper::{Html, Node};
use std::fs;
use std::path::Path;

/// What an extractor produced for one input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractOutcome {
    /// Characters of text extracted
    pub chars: usize,

    /// Whether the text was long enough to be written out; otherwise the
    /// output is an empty marker
    pub kept: bool,
}

/// Converts one input file into plain text at `output`
///
/// Implementations must create `output` in every successful case, even when
/// there is no usable text, because its presence marks the input as done.
pub trait TextExtractor: Send + Sync {
    fn extract(&self, input: &Path, output: &Path) -> Result<ExtractOutcome, PagefeedError>;
}

/// HTML extractor built on [`html_to_text`]
#[derive(Debug, Clone)]
pub struct HtmlTextExtractor {
    min_text_length: usize,
}

impl HtmlTextExtractor {
    pub fn new(min_text_length: usize) -> Self {
        Self { min_text_length }
    }
}

impl Default for HtmlTextExtractor {
    fn default() -> Self {
        Self::new(100)
    }
}

impl TextExtractor for HtmlTextExtractor {
    fn extract(&self, input: &Path, output: &Path) -> Result<ExtractOutcome, PagefeedError> {
        let bytes = fs::read(input)?;
        let text = html_to_text(&String::from_utf8_lossy(&bytes));
        let chars = text.chars().count();
        let kept = chars >= self.min_text_length;

        let content = if kept { format!("{}\n", text) } else { String::new() };

        let temp = output.with_extension("txt.part");
        fs::write(&temp, content)?;
        fs::rename(&temp, output)?;

        Ok(ExtractOutcome { chars, kept })
    }
}

/// Elements whose contents are never page text
const SKIPPED_ELEMENTS: [&str; 4] = ["script", "style", "noscript", "template"];

/// Extracts the visible text of an HTML document
///
/// The document is parsed with `scraper`, so entities are decoded and markup
/// inside attribute values is handled the way a browser would. Text inside
/// `<script>`, `<style>`, `<noscript>` and `<template>` is dropped, adjacent
/// elements are separated by a space, and whitespace is collapsed.
///
/// # Examples
///
/// ```
/// use pagefeed::pipeline::html_to_text;
///
/// let html = "<p>Fish &amp; chips</p><script>var x = 1;</script><p>daily</p>";
/// assert_eq!(html_to_text(html), "Fish & chips daily");
/// ```
pub fn html_to_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut words: Vec<&str> = Vec::new();

    // Depth-first in document order; children are pushed in reverse
    let mut stack = vec![document.tree.root()];
    while let Some(node) = stack.pop() {
        match node.value() {
            Node::Text(text) => words.extend(text.split_whitespace()),
            Node::Element(element) if SKIPPED_ELEMENTS.contains(&element.name()) => continue,
            _ => {}
        }
        stack.extend(node.children().rev());
    }

    words.join(" ")
}
