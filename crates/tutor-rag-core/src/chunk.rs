//! Recursive separator-aware text splitter.
//!
//! Splits raw document text into overlapping windows no longer than
//! `chunk_size` characters. Split points prefer the configured separators
//! in order (paragraph break, line break, sentence punctuation, …) and
//! fall back to cutting between characters only when no separator is
//! present in the piece being split.
//!
//! # Algorithm
//!
//! 1. Pick the first separator that occurs in the text (the empty
//!    separator always matches and means "split into characters").
//! 2. Split the text, keeping each separator at the start of the piece
//!    that follows it.
//! 3. Buffer pieces shorter than `chunk_size` and merge them greedily into
//!    windows. When a window is emitted, drop pieces from the front of the
//!    buffer until the retained tail is at most `chunk_overlap` characters
//!    and leaves room for the next piece.
//! 4. Pieces of `chunk_size` characters or more are split recursively with
//!    the remaining separators.
//! 5. Windows are trimmed; empty windows are discarded.
//!
//! Lengths are counted in Unicode scalar values, not bytes.
//!
//! # Example
//!
//! ```rust
//! use tutor_rag_core::chunk::TextSplitter;
//!
//! let splitter = TextSplitter::new(500, 50).unwrap();
//! let chunks = splitter.split("First paragraph.\n\nSecond paragraph.");
//! assert_eq!(chunks, vec!["First paragraph.\n\nSecond paragraph."]);
//! ```

use std::collections::VecDeque;

use anyhow::{bail, Result};

/// Separators tried in order: paragraph, line, CJK sentence and clause
/// punctuation, space, then single characters.
pub const DEFAULT_SEPARATORS: &[&str] = &["\n\n", "\n", "。", "！", "？", "；", "，", " ", ""];

/// Splits text into overlapping, size-bounded windows.
#[derive(Debug, Clone)]
pub struct TextSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
    separators: Vec<String>,
}

impl TextSplitter {
    /// Build a splitter with [`DEFAULT_SEPARATORS`].
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        Self::with_separators(
            chunk_size,
            chunk_overlap,
            DEFAULT_SEPARATORS.iter().map(|s| s.to_string()).collect(),
        )
    }

    /// Build a splitter with a custom separator list.
    ///
    /// The empty separator is appended when missing so that oversized
    /// pieces can always be cut.
    pub fn with_separators(
        chunk_size: usize,
        chunk_overlap: usize,
        mut separators: Vec<String>,
    ) -> Result<Self> {
        if chunk_size == 0 {
            bail!("chunk_size must be > 0");
        }
        if chunk_overlap >= chunk_size {
            bail!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                chunk_overlap,
                chunk_size
            );
        }
        if !separators.iter().any(|s| s.is_empty()) {
            separators.push(String::new());
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
            separators,
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Split `text` into windows. Empty or whitespace-only input yields
    /// an empty vector.
    pub fn split(&self, text: &str) -> Vec<String> {
        self.split_recursive(text, &self.separators)
    }

    fn split_recursive(&self, text: &str, separators: &[String]) -> Vec<String> {
        let mut separator = "";
        let mut finer: &[String] = &[];
        for (i, sep) in separators.iter().enumerate() {
            if sep.is_empty() {
                break;
            }
            if text.contains(sep.as_str()) {
                separator = sep;
                finer = &separators[i + 1..];
                break;
            }
        }

        let mut chunks = Vec::new();
        let mut pending: Vec<&str> = Vec::new();

        for piece in split_keeping_separator(text, separator) {
            if char_len(piece) < self.chunk_size {
                pending.push(piece);
                continue;
            }
            if !pending.is_empty() {
                chunks.extend(self.merge(&pending));
                pending.clear();
            }
            if finer.is_empty() {
                let trimmed = piece.trim();
                if !trimmed.is_empty() {
                    chunks.push(trimmed.to_string());
                }
            } else {
                chunks.extend(self.split_recursive(piece, finer));
            }
        }

        if !pending.is_empty() {
            chunks.extend(self.merge(&pending));
        }
        chunks
    }

    /// Greedily merge small pieces into windows, carrying an overlap tail.
    fn merge(&self, pieces: &[&str]) -> Vec<String> {
        let mut windows = Vec::new();
        let mut current: VecDeque<&str> = VecDeque::new();
        let mut total = 0usize;

        for piece in pieces {
            let len = char_len(piece);
            if total + len > self.chunk_size && !current.is_empty() {
                if let Some(window) = join_trimmed(&current) {
                    windows.push(window);
                }
                while total > self.chunk_overlap || (total > 0 && total + len > self.chunk_size) {
                    match current.pop_front() {
                        Some(front) => total -= char_len(front),
                        None => break,
                    }
                }
            }
            current.push_back(piece);
            total += len;
        }

        if let Some(window) = join_trimmed(&current) {
            windows.push(window);
        }
        windows
    }
}

/// Split on `sep`, attaching each separator to the start of the piece
/// after it. Empty pieces are dropped. The empty separator splits into
/// single characters.
fn split_keeping_separator<'a>(text: &'a str, sep: &str) -> Vec<&'a str> {
    if sep.is_empty() {
        return text
            .char_indices()
            .map(|(i, c)| &text[i..i + c.len_utf8()])
            .collect();
    }

    let mut pieces = Vec::new();
    let mut start = 0;
    for (idx, _) in text.match_indices(sep) {
        if idx > start {
            pieces.push(&text[start..idx]);
        }
        start = idx;
    }
    if start < text.len() {
        pieces.push(&text[start..]);
    }
    pieces
}

fn join_trimmed(pieces: &VecDeque<&str>) -> Option<String> {
    let joined: String = pieces.iter().copied().collect();
    let trimmed = joined.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}
