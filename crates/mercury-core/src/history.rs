//! Helpers for displaying persisted label records.

use crate::buffer::BufferId;
use crate::label::LabelRecord;
use crate::span::{Span, TextRange};

/// Order records by source start, then summary start.
pub fn sort_records(records: &mut [LabelRecord]) {
    records.sort_by(|a, b| {
        a.source_start
            .cmp(&b.source_start)
            .then(a.summary_start.cmp(&b.summary_start))
    });
}

/// Synthetic span set a record paints over `buffer`; empty for a missing side.
pub fn record_spans(record: &LabelRecord, buffer: BufferId) -> Vec<Span> {
    record
        .range(buffer)
        .map(|r| vec![Span::user(r, buffer.direction())])
        .unwrap_or_default()
}

/// A run of buffer text in a history row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistorySlice {
    pub text: String,
    pub labeled: bool,
    pub consistent: bool,
}

/// Split `text` into the unlabeled head, labeled middle and unlabeled tail
/// of `[start, end)`. An empty or missing range leaves the text unlabeled.
pub fn history_slices(text: &str, start: i64, end: i64, consistent: bool) -> Vec<HistorySlice> {
    let whole = || {
        vec![HistorySlice {
            text: text.to_string(),
            labeled: false,
            consistent,
        }]
    };
    if start < 0 || end < 0 || start == end {
        return whole();
    }
    let range = TextRange::new(start as usize, end as usize);

    let chars: Vec<char> = text.chars().collect();
    let cut = |from: usize, to: usize| -> String {
        chars[from.min(chars.len())..to.min(chars.len())].iter().collect()
    };

    let head = cut(0, range.start);
    let labeled = cut(range.start, range.end);
    let tail = cut(range.end, chars.len());

    let mut parts = Vec::with_capacity(3);
    if !head.is_empty() {
        parts.push(HistorySlice {
            text: head,
            labeled: false,
            consistent,
        });
    }
    parts.push(HistorySlice {
        text: labeled,
        labeled: true,
        consistent,
    });
    if !tail.is_empty() {
        parts.push(HistorySlice {
            text: tail,
            labeled: false,
            consistent,
        });
    }
    parts
}
