//! Overlapping fixed-window text chunker.
//!
//! Splits raw text into [`TextChunk`]s of at most `chunk_size` characters,
//! each window starting `chunk_size - overlap` characters after the
//! previous one. Sizes and offsets are measured in chars, so multi-byte
//! UTF-8 text is never split inside a code point.
//!
//! # Algorithm
//!
//! 1. Clamp `overlap` to `chunk_size - 1` so the cursor always advances.
//! 2. Slice `[cursor, min(cursor + chunk_size, len))`.
//! 3. Skip whitespace-only slices without consuming an index.
//! 4. Otherwise emit a chunk with a `ceil(chars / 4)` token estimate.
//! 5. Move the cursor to `end - overlap`, or to `end` if that would not
//!    move it forward.
//! 6. Stop after `ceil(len / (chunk_size - overlap)) + 100` iterations
//!    whatever the cursor position.
//!
//! # Example
//!
//! ```rust
//! use graphrag_core::chunk::chunk_text;
//!
//! let chunks = chunk_text("abcdefghij", 4, 2);
//! assert_eq!(chunks[0].content, "abcd");
//! assert_eq!(chunks[1].content, "cdef");
//! assert_eq!((chunks[1].start_char, chunks[1].end_char), (2, 6));
//! ```

use serde_json::Map;
use tracing::{debug, warn};

use crate::models::TextChunk;

/// Default window size, in characters.
pub const DEFAULT_CHUNK_SIZE: usize = 1000;

/// Default overlap between consecutive windows, in characters.
pub const DEFAULT_OVERLAP: usize = 200;

/// Approximate characters-per-token ratio for English text.
const CHARS_PER_TOKEN: usize = 4;

/// Extra iterations allowed beyond the expected window count.
const ITERATION_SLACK: usize = 100;

/// Estimate the token count of `text` as `ceil(chars / 4)`.
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(CHARS_PER_TOKEN)
}

/// Split `text` into overlapping character windows.
///
/// Best effort: this never fails. Empty text and a zero `chunk_size`
/// both produce an empty vector.
///
/// # Guarantees
///
/// - Indices are contiguous from 0; ids are `chunk-{index}`.
/// - `end_char - start_char <= chunk_size` for every chunk.
/// - Consecutive windows overlap by at most the effective overlap.
/// - Whitespace-only windows are dropped.
pub fn chunk_text(text: &str, chunk_size: usize, overlap: usize) -> Vec<TextChunk> {
    if chunk_size == 0 {
        warn!("chunk_size must be > 0; no chunks produced");
        return Vec::new();
    }
    let overlap = overlap.min(chunk_size - 1);

    // Byte offset of every char boundary, including the end of the text.
    let bounds: Vec<usize> = text
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect();
    let len = bounds.len() - 1;
    if len == 0 {
        return Vec::new();
    }

    let max_iterations = len.div_ceil(chunk_size - overlap) + ITERATION_SLACK;
    let mut chunks = Vec::new();
    let mut start = 0usize;
    let mut iterations = 0usize;

    while start < len && iterations < max_iterations {
        iterations += 1;
        let end = (start + chunk_size).min(len);
        let content = &text[bounds[start]..bounds[end]];

        if content.trim().is_empty() {
            start = end;
            continue;
        }

        let index = chunks.len();
        chunks.push(TextChunk {
            id: format!("chunk-{}", index),
            content: content.to_string(),
            index,
            start_char: start,
            end_char: end,
            tokens: (end - start).div_ceil(CHARS_PER_TOKEN),
            metadata: Map::new(),
        });

        let next = end.saturating_sub(overlap);
        start = if next > start { next } else { end };
    }

    if start < len {
        debug!(
            iterations,
            cursor = start,
            len,
            "chunker stopped at iteration cap"
        );
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spans(chunks: &[TextChunk]) -> Vec<(usize, usize, &str)> {
        chunks
            .iter()
            .map(|c| (c.start_char, c.end_char, c.content.as_str()))
            .collect()
    }

    #[test]
    fn test_literal_trace_size_4_overlap_2() {
        let chunks = chunk_text("abcdefghij", 4, 2);
        assert_eq!(
            spans(&chunks),
            vec![
                (0, 4, "abcd"),
                (2, 6, "cdef"),
                (4, 8, "efgh"),
                (6, 10, "ghij"),
                (8, 10, "ij"),
            ]
        );
        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.index, i);
            assert_eq!(c.id, format!("chunk-{}", i));
            assert_eq!(c.tokens, 1);
        }
    }

    #[test]
    fn test_empty_text() {
        assert!(chunk_text("", 1000, 200).is_empty());
        assert!(chunk_text("", 1, 0).is_empty());
        assert!(chunk_text("", 5, 50).is_empty());
    }

    #[test]
    fn test_zero_chunk_size_produces_nothing() {
        assert!(chunk_text("some text", 0, 0).is_empty());
    }

    #[test]
    fn test_defaults_on_long_text() {
        let text = "a".repeat(2500);
        let chunks = chunk_text(&text, DEFAULT_CHUNK_SIZE, DEFAULT_OVERLAP);
        let bounds: Vec<(usize, usize)> =
            chunks.iter().map(|c| (c.start_char, c.end_char)).collect();
        assert_eq!(
            bounds,
            vec![(0, 1000), (800, 1800), (1600, 2500), (2300, 2500)]
        );
        assert_eq!(chunks[0].tokens, 250);
        assert_eq!(chunks[3].tokens, 50);
    }

    #[test]
    fn test_overlap_clamped_below_chunk_size() {
        // overlap 10 >= size 3 behaves exactly like overlap 2
        let clamped = chunk_text("abcdef", 3, 10);
        let explicit = chunk_text("abcdef", 3, 2);
        assert_eq!(clamped, explicit);
        assert_eq!(
            spans(&clamped),
            vec![
                (0, 3, "abc"),
                (1, 4, "bcd"),
                (2, 5, "cde"),
                (3, 6, "def"),
                (4, 6, "ef"),
            ]
        );
    }

    #[test]
    fn test_huge_overlap_terminates() {
        let text = "x".repeat(500);
        let chunks = chunk_text(&text, 50, usize::MAX);
        // effective overlap 49: one-char stride, bounded by the iteration cap
        assert!(!chunks.is_empty());
        assert!(chunks.len() <= 500 + ITERATION_SLACK);
        assert_eq!(chunks[1].start_char, 1);
    }

    #[test]
    fn test_whitespace_windows_skipped_without_consuming_index() {
        let chunks = chunk_text("abcd    efgh", 4, 0);
        assert_eq!(spans(&chunks), vec![(0, 4, "abcd"), (8, 12, "efgh")]);
        assert_eq!(chunks[1].index, 1);
        assert_eq!(chunks[1].id, "chunk-1");
    }

    #[test]
    fn test_whitespace_only_text() {
        assert!(chunk_text("   \n\t  \n ", 4, 1).is_empty());
    }

    #[test]
    fn test_spans_cover_text_without_gaps() {
        // no whitespace, so no window is skipped
        let text = "The_quick_brown_fox_jumps_over_the_lazy_dog,_again_and_again.";
        let len = text.chars().count();
        for size in 1..=20 {
            for overlap in 0..size {
                let chunks = chunk_text(text, size, overlap);
                assert_eq!(chunks.first().map(|c| c.start_char), Some(0));
                assert_eq!(chunks.last().map(|c| c.end_char), Some(len));
                for c in &chunks {
                    assert!(c.start_char < c.end_char);
                    assert!(c.end_char - c.start_char <= size);
                }
                for pair in chunks.windows(2) {
                    assert!(pair[1].start_char > pair[0].start_char);
                    assert!(
                        pair[1].start_char <= pair[0].end_char,
                        "gap between chunks at size={} overlap={}",
                        size,
                        overlap
                    );
                    assert!(pair[0].end_char - pair[1].start_char <= overlap);
                }
            }
        }
    }

    #[test]
    fn test_multibyte_offsets_are_chars() {
        let text = "héllo wörld ✓ done";
        let chunks = chunk_text(text, 5, 1);
        assert_eq!(chunks[0].content, "héllo");
        assert_eq!(chunks[1].content, "o wör");
        assert_eq!((chunks[1].start_char, chunks[1].end_char), (4, 9));
        let rebuilt: String = chunks
            .iter()
            .map(|c| {
                let skip = if c.index == 0 { 0 } else { 1 };
                c.content.chars().skip(skip).collect::<String>()
            })
            .collect();
        assert_eq!(rebuilt, text);
    }

    #[test]
    fn test_estimate_tokens() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("abcd"), 1);
        assert_eq!(estimate_tokens("abcde"), 2);
        assert_eq!(estimate_tokens("✓✓✓✓✓✓✓✓"), 2);
    }

    #[test]
    fn test_deterministic() {
        let text = "Alpha beta gamma delta epsilon zeta eta theta";
        assert_eq!(chunk_text(text, 10, 3), chunk_text(text, 10, 3));
    }
}
