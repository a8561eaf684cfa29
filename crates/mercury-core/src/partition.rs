//! Gap-filling partition of a buffer from a sparse span set.
//!
//! Slices use inclusive ends. A zero-width slice at `p` is written
//! `[p, p - 1]`, which is also how the partition of an empty buffer looks.

use crate::span::Span;

/// One run of a rendered buffer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PartitionSlice {
    pub start: i64,
    /// Inclusive end; `start - 1` for a zero-width slice.
    pub end: i64,
    pub annotated: bool,
    pub score: f64,
    /// Position of the originating span in the caller's input, `None` for gaps.
    pub original_index: Option<usize>,
}

impl PartitionSlice {
    fn gap(start: i64, end: i64) -> Self {
        Self {
            start,
            end,
            annotated: false,
            score: 0.0,
            original_index: None,
        }
    }

    pub fn len(&self) -> usize {
        (self.end - self.start + 1).max(0) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.end < self.start
    }
}

/// Expand `spans` into slices covering `[0, buffer_len - 1]` exactly once.
///
/// Input order does not matter; `original_index` always refers to the
/// position in `spans` as given. Spans past the end of the buffer are
/// dropped, spans running past it are clamped, and a span overlapping an
/// earlier one keeps only its uncovered remainder (or is dropped when
/// nothing remains).
pub fn partition(buffer_len: usize, spans: &[Span]) -> Vec<PartitionSlice> {
    let len = buffer_len as i64;

    let mut indexed: Vec<(usize, &Span)> = spans.iter().enumerate().collect();
    indexed.sort_by(|(_, a), (_, b)| a.offset.cmp(&b.offset).then(a.length.cmp(&b.length)));

    let mut slices = Vec::with_capacity(indexed.len() * 2 + 1);
    // First position not yet covered by an emitted slice.
    let mut cursor: i64 = 0;

    for (index, span) in indexed {
        if span.offset > buffer_len || (span.offset == buffer_len && span.length > 0) {
            continue;
        }
        let mut start = span.offset as i64;
        let mut end = span.end().min(buffer_len) as i64 - 1;

        if start < cursor {
            if span.length > 0 && end < cursor {
                continue;
            }
            start = cursor;
            if span.length == 0 {
                end = cursor - 1;
            }
        }

        if start > cursor {
            slices.push(PartitionSlice::gap(cursor, start - 1));
        }
        slices.push(PartitionSlice {
            start,
            end,
            annotated: true,
            score: span.score,
            original_index: Some(index),
        });
        cursor = end + 1;
    }

    if cursor < len || slices.is_empty() {
        slices.push(PartitionSlice::gap(cursor, len - 1));
    }
    slices
}
