//! Document chunking.
//!
//! A [`Chunker`] turns one document into an ordered, lazy sequence of
//! passages that are embedded independently. Every strategy yields only
//! trimmed, non-empty slices of the input, in source order.

use serde::{Deserialize, Serialize};

/// A strategy for splitting text into passages.
pub trait Chunker: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Split `text` into passages.
    ///
    /// The iterator borrows `text`; calling again restarts from the beginning.
    fn chunks<'a>(&'a self, text: &'a str) -> Box<dyn Iterator<Item = &'a str> + 'a>;
}

/// Splits on sentence terminators.
///
/// The default terminator set is just `.`. This breaks decimals and
/// abbreviations apart; use [`ParagraphChunker`] for text where that matters.
#[derive(Debug, Clone)]
pub struct SentenceChunker {
    terminators: Vec<char>,
}

impl SentenceChunker {
    /// Create a chunker splitting on `.` only.
    pub fn new() -> Self {
        Self {
            terminators: vec!['.'],
        }
    }

    /// Create a chunker splitting on any of the given characters.
    pub fn with_terminators(terminators: impl IntoIterator<Item = char>) -> Self {
        Self {
            terminators: terminators.into_iter().collect(),
        }
    }
}

impl Default for SentenceChunker {
    fn default() -> Self {
        Self::new()
    }
}

impl Chunker for SentenceChunker {
    fn name(&self) -> &str {
        "sentence"
    }

    fn chunks<'a>(&'a self, text: &'a str) -> Box<dyn Iterator<Item = &'a str> + 'a> {
        Box::new(
            text.split(move |c: char| self.terminators.contains(&c))
                .map(str::trim)
                .filter(|piece| !piece.is_empty()),
        )
    }
}

/// Splits on blank lines, keeping each paragraph whole.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParagraphChunker;

impl Chunker for ParagraphChunker {
    fn name(&self) -> &str {
        "paragraph"
    }

    fn chunks<'a>(&'a self, text: &'a str) -> Box<dyn Iterator<Item = &'a str> + 'a> {
        Box::new(Paragraphs { text, pos: 0 })
    }
}

/// Iterator over runs of non-blank lines.
struct Paragraphs<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> Iterator for Paragraphs<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        let rest = &self.text[self.pos..];
        let mut start = None;
        let mut end = 0;
        let mut offset = 0;

        for line in rest.split_inclusive('\n') {
            let line_start = offset;
            offset += line.len();

            if line.trim().is_empty() {
                if start.is_some() {
                    break;
                }
            } else {
                start.get_or_insert(line_start);
                end = offset;
            }
        }

        self.pos += offset;
        start.map(|start| rest[start..end].trim())
    }
}

/// Chunking strategies selectable from configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkingStrategy {
    /// Split on `.`.
    #[default]
    Sentence,
    /// Split on blank lines.
    Paragraph,
}

impl ChunkingStrategy {
    /// Build the chunker for this strategy.
    pub fn build(self) -> Box<dyn Chunker> {
        match self {
            Self::Sentence => Box::new(SentenceChunker::new()),
            Self::Paragraph => Box::new(ParagraphChunker),
        }
    }
}
