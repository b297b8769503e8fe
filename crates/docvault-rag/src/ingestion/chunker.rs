//! Recursive text chunking with overlap
//!
//! Splits normalized text on a priority list of separators, coarsest first,
//! then packs the pieces into chunks of at most `chunk_size` characters.
//! Each chunk after the first is seeded with the trailing `overlap`
//! characters of its predecessor, so neighbouring chunks share context.
//! Nothing is trimmed: concatenating the non-overlap portions of all chunks
//! reproduces the input exactly.

use unicode_segmentation::UnicodeSegmentation;

/// Separator priority, coarsest to finest; character fallback when none match
const SEPARATORS: [&str; 4] = ["\n\n", "\n", ". ", " "];

/// A chunk of text with its position in the source
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkSpan {
    /// Chunk text, including any overlap prefix
    pub content: String,
    /// Byte offset of the chunk start in the source text
    pub char_start: usize,
    /// Byte offset one past the chunk end in the source text
    pub char_end: usize,
}

/// Recursive character chunker, a pure function of its input
#[derive(Debug, Clone)]
pub struct RecursiveChunker {
    chunk_size: usize,
    overlap: usize,
}

impl RecursiveChunker {
    /// Create a chunker; callers validate `overlap < chunk_size` up front
    /// via `ChunkingConfig::validate`
    pub fn new(chunk_size: usize, overlap: usize) -> Self {
        Self {
            chunk_size,
            overlap: overlap.min(chunk_size.saturating_sub(1)),
        }
    }

    /// Split text into ordered, overlapping chunks
    ///
    /// Empty text yields no chunks; text at or under the target size yields
    /// exactly one.
    pub fn split(&self, text: &str) -> Vec<ChunkSpan> {
        if text.is_empty() {
            return Vec::new();
        }
        if text.len() <= self.chunk_size {
            return vec![ChunkSpan {
                content: text.to_string(),
                char_start: 0,
                char_end: text.len(),
            }];
        }

        let pieces = self.atomize(text, &SEPARATORS);
        self.merge(pieces)
    }

    /// Pieces must leave room for the overlap prefix added during merging,
    /// so a freshly seeded chunk can always accept at least one piece
    /// without exceeding `chunk_size`.
    fn piece_budget(&self) -> usize {
        (self.chunk_size - self.overlap).max(1)
    }

    /// Recursively split text until every piece fits the piece budget,
    /// trying separators from coarsest to finest
    fn atomize<'a>(&self, text: &'a str, separators: &[&str]) -> Vec<&'a str> {
        let budget = self.piece_budget();
        if text.len() <= budget {
            return vec![text];
        }

        let found = separators
            .iter()
            .enumerate()
            .find(|(_, sep)| text.contains(**sep));

        let Some((sep_index, sep)) = found else {
            return hard_windows(text, budget);
        };

        let mut pieces = Vec::new();
        for piece in split_keep(text, sep) {
            if piece.len() <= budget {
                pieces.push(piece);
            } else {
                pieces.extend(self.atomize(piece, &separators[sep_index + 1..]));
            }
        }
        pieces
    }

    /// Pack pieces into chunks, seeding each new chunk with the overlap
    /// suffix of the previous one
    fn merge(&self, pieces: Vec<&str>) -> Vec<ChunkSpan> {
        let mut chunks = Vec::new();
        let mut current = String::new();
        let mut current_start = 0usize;
        let mut offset = 0usize;

        for piece in pieces {
            if !current.is_empty() && current.len() + piece.len() > self.chunk_size {
                let emitted_start = current_start;
                let emitted_len = current.len();
                let tail_start = floor_char_boundary(
                    &current,
                    emitted_len.saturating_sub(self.overlap),
                );
                let tail = current[tail_start..].to_string();

                chunks.push(ChunkSpan {
                    content: std::mem::take(&mut current),
                    char_start: emitted_start,
                    char_end: emitted_start + emitted_len,
                });

                current = tail;
                current_start = emitted_start + tail_start;
            }

            if current.is_empty() {
                current_start = offset;
            }
            current.push_str(piece);
            offset += piece.len();
        }

        if !current.is_empty() {
            let len = current.len();
            chunks.push(ChunkSpan {
                content: current,
                char_start: current_start,
                char_end: current_start + len,
            });
        }

        chunks
    }
}

/// Split text on a separator, keeping the separator attached to the
/// preceding piece so no character is lost
fn split_keep<'a>(text: &'a str, sep: &str) -> Vec<&'a str> {
    let mut pieces = Vec::new();
    let mut start = 0usize;
    let mut search = 0usize;

    while let Some(pos) = text[search..].find(sep) {
        let end = search + pos + sep.len();
        pieces.push(&text[start..end]);
        start = end;
        search = end;
    }

    if start < text.len() {
        pieces.push(&text[start..]);
    }

    pieces
}

/// Fixed-size windows aligned to char boundaries, for text with no separators
fn hard_windows(text: &str, budget: usize) -> Vec<&str> {
    let mut windows = Vec::new();
    let mut start = 0usize;

    while start < text.len() {
        let mut end = (start + budget).min(text.len());
        while end > start && !text.is_char_boundary(end) {
            end -= 1;
        }
        if end == start {
            // budget smaller than one character; take the whole character
            end = start
                + text[start..]
                    .chars()
                    .next()
                    .map(|c| c.len_utf8())
                    .unwrap_or(text.len() - start);
        }
        windows.push(&text[start..end]);
        start = end;
    }

    windows
}

/// Largest char-boundary offset at or below `index`
fn floor_char_boundary(text: &str, mut index: usize) -> usize {
    if index >= text.len() {
        return text.len();
    }
    while index > 0 && !text.is_char_boundary(index) {
        index -= 1;
    }
    index
}

/// Rough token count of a text span
///
/// Word-based estimate standing in for the real tokenizer of whichever
/// embedding model is configured; close enough for context budgeting.
pub fn estimate_token_count(text: &str) -> u32 {
    let words = text.unicode_words().count();
    ((words as f64) * 4.0 / 3.0).ceil() as u32
}
