//! Recursive character chunker.
//!
//! Splits on the coarsest separator present (paragraph, line, sentence, word,
//! character), recursing into any piece still too long, then greedily merges
//! all pieces back into windows of at most `chunk_size` characters. Each new
//! window starts with the tail of the previous one, at least `chunk_overlap`
//! characters long whenever that tail still leaves room for the next piece.
//!
//! Lengths are counted in `char`s, not bytes.

use std::collections::VecDeque;

use persona_core::error::{PersonaError, Result};

use crate::loader::{Chunk, Document};

/// Separators in priority order. The empty separator splits into characters.
pub const DEFAULT_SEPARATORS: &[&str] = &["\n\n", "\n", ". ", " ", ""];

/// Window size and overlap, both in characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl ChunkConfig {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(PersonaError::Config("chunk_size must be positive".into()));
        }
        if chunk_overlap >= chunk_size {
            return Err(PersonaError::Config(format!(
                "chunk_overlap ({chunk_overlap}) must be smaller than chunk_size ({chunk_size})"
            )));
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
        })
    }
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            chunk_size: 600,
            chunk_overlap: 100,
        }
    }
}

pub struct RecursiveChunker {
    config: ChunkConfig,
    separators: Vec<String>,
}

impl RecursiveChunker {
    pub fn new(config: ChunkConfig) -> Self {
        Self {
            config,
            separators: DEFAULT_SEPARATORS.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Chunk every document, tagging each chunk with its parent's provenance.
    pub fn split_documents(&self, documents: &[Document]) -> Vec<Chunk> {
        documents
            .iter()
            .flat_map(|doc| {
                self.split_text(&doc.content)
                    .into_iter()
                    .map(move |text| Chunk {
                        text,
                        provenance: doc.provenance,
                        page: doc.page,
                    })
            })
            .collect()
    }

    pub fn split_text(&self, text: &str) -> Vec<String> {
        let mut pieces = Vec::new();
        self.collect_pieces(text, &self.separators, &mut pieces);
        self.merge(&pieces)
    }

    /// Break `text` into pieces shorter than `chunk_size`, in document order.
    ///
    /// Pieces from every separator level feed one merge, so the overlap
    /// carries across paragraph and line boundaries too.
    fn collect_pieces(&self, text: &str, separators: &[String], out: &mut Vec<String>) {
        // Coarsest separator that occurs in the text; "" always matches.
        let (separator, finer) = separators
            .iter()
            .enumerate()
            .find(|(_, sep)| sep.is_empty() || text.contains(sep.as_str()))
            .map(|(i, sep)| {
                let finer = if sep.is_empty() { &[][..] } else { &separators[i + 1..] };
                (sep.as_str(), finer)
            })
            .unwrap_or(("", &[][..]));

        for piece in split_keeping_separator(text, separator) {
            if char_len(&piece) < self.config.chunk_size || finer.is_empty() {
                out.push(piece);
            } else {
                self.collect_pieces(&piece, finer, out);
            }
        }
    }

    /// Greedy merge of small pieces into overlapping windows.
    fn merge(&self, pieces: &[String]) -> Vec<String> {
        let ChunkConfig {
            chunk_size,
            chunk_overlap,
        } = self.config;

        let mut out = Vec::new();
        let mut window: VecDeque<&str> = VecDeque::new();
        let mut total = 0usize;

        for piece in pieces {
            let len = char_len(piece);
            if total + len > chunk_size && !window.is_empty() {
                if let Some(doc) = join(window.iter().copied()) {
                    out.push(doc);
                }
                // Drop from the front while the window is too full for the
                // next piece, or the remaining tail still covers the overlap.
                while let Some(front) = window.front() {
                    let overflowing = total + len > chunk_size;
                    let tail_len = join(window.iter().skip(1).copied())
                        .map(|t| char_len(&t))
                        .unwrap_or(0);
                    if overflowing || tail_len >= chunk_overlap {
                        total -= char_len(front);
                        window.pop_front();
                    } else {
                        break;
                    }
                }
            }
            window.push_back(piece.as_str());
            total += len;
        }
        if let Some(doc) = join(window.iter().copied()) {
            out.push(doc);
        }
        out
    }
}

/// Split on `separator`, attaching it to the start of each following piece.
fn split_keeping_separator(text: &str, separator: &str) -> Vec<String> {
    if separator.is_empty() {
        return text.chars().map(String::from).collect();
    }
    let mut parts = text.split(separator);
    let mut out = Vec::new();
    if let Some(first) = parts.next() {
        out.push(first.to_string());
    }
    out.extend(parts.map(|p| format!("{separator}{p}")));
    out.retain(|p| !p.is_empty());
    out
}

fn join<'a>(pieces: impl Iterator<Item = &'a str>) -> Option<String> {
    let joined: String = pieces.collect();
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
