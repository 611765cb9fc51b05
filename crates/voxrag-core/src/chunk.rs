//! Strategy-driven text chunker.
//!
//! Splits a [`Document`] into [`Chunk`]s using the policy selected by its
//! [`ContentKind`]:
//!
//! | Strategy | Applies to | Policy |
//! |----------|------------|--------|
//! | [`ChunkStrategy::Tabular`] | CSV | fixed runs of raw lines (rows), `start_row`/`end_row` recorded |
//! | [`ChunkStrategy::Structured`] | JSON | recursive splitter, ≈800 chars, ≈100 overlap |
//! | [`ChunkStrategy::Recursive`] | everything else | recursive splitter, ≈1000 chars, ≈200 overlap |
//!
//! # Recursive splitting
//!
//! 1. If the text fits in `chunk_size` characters it is a single piece.
//! 2. Otherwise split it after every occurrence of the first separator that
//!    appears in it (`"\n\n"`, `"\n"`, `". "`, `" "`, then `""` = hard cut).
//! 3. Pieces still larger than `chunk_size` are split again with the
//!    remaining separators. A piece with no remaining separator is emitted
//!    whole (only possible when the separator list has no `""` entry).
//! 4. Adjacent pieces are merged greedily into chunks of at most
//!    `chunk_size` characters; each new chunk re-includes up to `overlap`
//!    characters of trailing pieces from the previous one.
//!
//! Pieces are byte ranges into the original text, so every chunk is an exact
//! substring of its document and records its `start_offset`. Separators stay
//! attached to the preceding piece, which means consecutive chunks tile the
//! document with no character skipped.
//!
//! Sizes are counted in characters, never bytes, so multi-byte text is never
//! cut inside a code point.

use std::collections::VecDeque;
use std::ops::Range;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::models::{Chunk, ChunkStrategy, Document, Metadata};

/// Separator preference for free text.
pub const TEXT_SEPARATORS: &[&str] = &["\n\n", "\n", ". ", " ", ""];
/// Separator preference for flattened structured data.
pub const STRUCTURED_SEPARATORS: &[&str] = &["\n", ". ", " ", ""];

/// Size parameters for every chunking strategy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    #[serde(default = "default_text_chunk_size")]
    pub text_chunk_size: usize,
    #[serde(default = "default_text_overlap")]
    pub text_overlap: usize,
    #[serde(default = "default_structured_chunk_size")]
    pub structured_chunk_size: usize,
    #[serde(default = "default_structured_overlap")]
    pub structured_overlap: usize,
    #[serde(default = "default_tabular_rows")]
    pub tabular_rows_per_chunk: usize,
}

fn default_text_chunk_size() -> usize {
    1000
}
fn default_text_overlap() -> usize {
    200
}
fn default_structured_chunk_size() -> usize {
    800
}
fn default_structured_overlap() -> usize {
    100
}
fn default_tabular_rows() -> usize {
    10
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            text_chunk_size: default_text_chunk_size(),
            text_overlap: default_text_overlap(),
            structured_chunk_size: default_structured_chunk_size(),
            structured_overlap: default_structured_overlap(),
            tabular_rows_per_chunk: default_tabular_rows(),
        }
    }
}

/// Split a document into ordered chunks using its content kind's strategy.
///
/// Empty or whitespace-only documents produce no chunks. Chunk indices are
/// contiguous from 0 and every chunk inherits the document's base metadata
/// plus `parent_id`, `chunk_strategy`, `chunk_index`, and `content_hash`.
pub fn chunk_document(doc: &Document, config: &ChunkingConfig) -> Vec<Chunk> {
    let strategy = doc.content_kind.chunk_strategy();
    let base = doc.base_metadata();

    match strategy {
        ChunkStrategy::Tabular => {
            chunk_rows(&doc.text, config.tabular_rows_per_chunk)
                .into_iter()
                .enumerate()
                .map(|(index, rows)| {
                    let mut meta = base.clone();
                    meta.insert("start_row".into(), rows.start_row.into());
                    meta.insert("end_row".into(), rows.end_row.into());
                    make_chunk(doc, index as i64, &rows.text, strategy, meta)
                })
                .collect()
        }
        ChunkStrategy::Structured | ChunkStrategy::Recursive => {
            let (size, overlap, separators) = match strategy {
                ChunkStrategy::Structured => (
                    config.structured_chunk_size,
                    config.structured_overlap,
                    STRUCTURED_SEPARATORS,
                ),
                _ => (config.text_chunk_size, config.text_overlap, TEXT_SEPARATORS),
            };
            let mut cursor = CharCursor::default();
            split_recursive(&doc.text, size, overlap, separators)
                .into_iter()
                .enumerate()
                .map(|(index, range)| {
                    let mut meta = base.clone();
                    let start_offset = cursor.seek(&doc.text, range.start);
                    meta.insert("start_offset".into(), start_offset.into());
                    make_chunk(doc, index as i64, &doc.text[range], strategy, meta)
                })
                .collect()
        }
    }
}

/// Converts ascending byte offsets into char offsets without rescanning
/// the text from the start each time.
#[derive(Default)]
struct CharCursor {
    byte: usize,
    chars: usize,
}

impl CharCursor {
    fn seek(&mut self, text: &str, byte: usize) -> usize {
        if byte >= self.byte {
            self.chars += text[self.byte..byte].chars().count();
        } else {
            self.chars -= text[byte..self.byte].chars().count();
        }
        self.byte = byte;
        self.chars
    }
}

/// A run of table rows destined for one chunk.
#[derive(Debug, Clone, PartialEq)]
pub struct RowGroup {
    pub text: String,
    /// 1-based index of the first line in the group.
    pub start_row: usize,
    /// 1-based index of the last line in the group (inclusive).
    pub end_row: usize,
}

/// Group non-empty lines into runs of `rows_per_chunk`.
///
/// Row indices count non-empty lines, so they line up with the `Row N:`
/// prefixes the CSV loader writes.
pub fn chunk_rows(text: &str, rows_per_chunk: usize) -> Vec<RowGroup> {
    let rows_per_chunk = rows_per_chunk.max(1);
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();

    lines
        .chunks(rows_per_chunk)
        .enumerate()
        .map(|(group, rows)| {
            let start_row = group * rows_per_chunk + 1;
            RowGroup {
                text: rows.join("\n"),
                start_row,
                end_row: start_row + rows.len() - 1,
            }
        })
        .collect()
}

/// Split `text` into overlapping byte ranges of at most `chunk_size` chars.
///
/// Whitespace-only ranges are dropped. See the module docs for the
/// algorithm and its guarantees.
pub fn split_recursive(
    text: &str,
    chunk_size: usize,
    overlap: usize,
    separators: &[&str],
) -> Vec<Range<usize>> {
    let chunk_size = chunk_size.max(1);
    let overlap = overlap.min(chunk_size.saturating_sub(1));

    if text.trim().is_empty() {
        return Vec::new();
    }

    let pieces = split_pieces(text, 0..text.len(), chunk_size, separators);
    merge_pieces(text, &pieces, chunk_size, overlap)
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Break `range` into contiguous pieces no longer than `chunk_size` chars,
/// except atomic pieces that no separator can split.
fn split_pieces(
    text: &str,
    range: Range<usize>,
    chunk_size: usize,
    separators: &[&str],
) -> Vec<Range<usize>> {
    let slice = &text[range.clone()];
    if char_len(slice) <= chunk_size {
        return vec![range];
    }

    let Some(pos) = separators
        .iter()
        .position(|sep| sep.is_empty() || slice.contains(sep))
    else {
        return vec![range];
    };
    let separator = separators[pos];
    let remaining = &separators[pos + 1..];

    if separator.is_empty() {
        return hard_cut(text, range, chunk_size);
    }

    let mut pieces = Vec::new();
    let mut start = range.start;
    for (idx, _) in slice.match_indices(separator) {
        let end = range.start + idx + separator.len();
        if end > start {
            pieces.push(start..end);
        }
        start = end;
    }
    if start < range.end {
        pieces.push(start..range.end);
    }

    let mut out = Vec::with_capacity(pieces.len());
    for piece in pieces {
        if char_len(&text[piece.clone()]) <= chunk_size {
            out.push(piece);
        } else {
            out.extend(split_pieces(text, piece, chunk_size, remaining));
        }
    }
    out
}

/// Cut `range` every `chunk_size` characters.
fn hard_cut(text: &str, range: Range<usize>, chunk_size: usize) -> Vec<Range<usize>> {
    let slice = &text[range.clone()];
    let mut out = Vec::new();
    let mut start = range.start;
    for (count, (idx, _)) in slice.char_indices().enumerate() {
        if count > 0 && count % chunk_size == 0 {
            out.push(start..range.start + idx);
            start = range.start + idx;
        }
    }
    if start < range.end {
        out.push(start..range.end);
    }
    out
}

/// Greedily merge contiguous pieces into chunks with trailing overlap.
fn merge_pieces(
    text: &str,
    pieces: &[Range<usize>],
    chunk_size: usize,
    overlap: usize,
) -> Vec<Range<usize>> {
    let mut chunks = Vec::new();
    let mut window: VecDeque<(Range<usize>, usize)> = VecDeque::new();
    let mut window_len = 0usize;

    for piece in pieces {
        let len = char_len(&text[piece.clone()]);

        if window_len + len > chunk_size && !window.is_empty() {
            push_window(text, &window, &mut chunks);
            while window_len > overlap || (window_len > 0 && window_len + len > chunk_size) {
                match window.pop_front() {
                    Some((_, dropped)) => window_len -= dropped,
                    None => break,
                }
            }
        }

        window.push_back((piece.clone(), len));
        window_len += len;
    }

    if !window.is_empty() {
        push_window(text, &window, &mut chunks);
    }

    chunks
}

fn push_window(
    text: &str,
    window: &VecDeque<(Range<usize>, usize)>,
    chunks: &mut Vec<Range<usize>>,
) {
    let (Some((first, _)), Some((last, _))) = (window.front(), window.back()) else {
        return;
    };
    let range = first.start..last.end;
    if !text[range.clone()].trim().is_empty() {
        chunks.push(range);
    }
}

/// Create a single [`Chunk`] with a fresh UUID and SHA-256 content hash.
fn make_chunk(
    doc: &Document,
    index: i64,
    text: &str,
    strategy: ChunkStrategy,
    mut metadata: Metadata,
) -> Chunk {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let hash = format!("{:x}", hasher.finalize());

    metadata.insert("parent_id".into(), doc.id.clone().into());
    metadata.insert("chunk_strategy".into(), strategy.as_str().into());
    metadata.insert("chunk_index".into(), index.into());
    metadata.insert("content_hash".into(), hash.clone().into());

    Chunk {
        id: Uuid::new_v4().to_string(),
        document_id: doc.id.clone(),
        chunk_index: index,
        text: text.to_string(),
        hash,
        metadata,
    }
}
