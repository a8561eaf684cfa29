//! Scored spans and the `merge` interval algebra.
//!
//! A span set is kept sorted by `(offset, length)` and, after any merge,
//! pairwise non-overlapping. Spans are values: every operation returns new
//! spans, nothing is patched in place.

use serde::{Deserialize, Serialize};

/// Score reserved for spans drawn by the annotator and not yet scored.
pub const USER_SCORE: f64 = 2.0;

/// Which buffer a span points into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    ToSource,
    ToSummary,
}

/// Half-open `[start, end)` logical range inside one buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TextRange {
    pub start: usize,
    pub end: usize,
}

impl TextRange {
    /// Build a range from two endpoints in either order.
    pub fn new(a: usize, b: usize) -> Self {
        if a <= b {
            Self { start: a, end: b }
        } else {
            Self { start: b, end: a }
        }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// A scored correspondence into one buffer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Span {
    pub offset: usize,
    pub length: usize,
    pub score: f64,
    pub direction: Direction,
}

impl Span {
    pub fn new(offset: usize, length: usize, score: f64, direction: Direction) -> Self {
        Self {
            offset,
            length,
            score,
            direction,
        }
    }

    /// Synthetic span standing for the annotator's own selection.
    pub fn user(range: TextRange, direction: Direction) -> Self {
        Self::new(range.start, range.len(), USER_SCORE, direction)
    }

    /// Exclusive end offset, saturating at `usize::MAX`.
    pub fn end(&self) -> usize {
        self.offset.saturating_add(self.length)
    }

    pub fn range(&self) -> TextRange {
        TextRange {
            start: self.offset,
            end: self.end(),
        }
    }

    pub fn is_user(&self) -> bool {
        self.score == USER_SCORE
    }

    /// Copy of this span restricted to `[start, end)`, keeping score and direction.
    fn with_bounds(&self, start: usize, end: usize) -> Self {
        Self::new(start, end - start, self.score, self.direction)
    }
}

/// How `merge` treats an existing span that extends past both ends of the
/// incoming span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StraddlePolicy {
    /// Keep only the part before the incoming span.
    #[default]
    TruncateHead,
    /// Keep both the part before and the part after.
    Split,
}

/// Sort a span set in place by `(offset, length)`; zero-width markers sort
/// before a span starting at the same offset.
pub fn sort_spans(spans: &mut [Span]) {
    spans.sort_by(|a, b| a.offset.cmp(&b.offset).then(a.length.cmp(&b.length)));
}

/// Carve `incoming` into `existing`, truncating straddling spans to their head.
pub fn merge(existing: &[Span], incoming: Span) -> Vec<Span> {
    merge_with(existing, incoming, StraddlePolicy::TruncateHead)
}

/// Carve `incoming` into `existing` as the authoritative span for its region.
///
/// Spans fully covered by `incoming` are removed, overlapping spans keep only
/// the parts outside it, disjoint spans are untouched. A zero-width `incoming`
/// is still inserted as a marker; it cuts through any span that strictly
/// contains its offset.
pub fn merge_with(existing: &[Span], incoming: Span, policy: StraddlePolicy) -> Vec<Span> {
    let mut sorted = existing.to_vec();
    sort_spans(&mut sorted);

    let mut out = Vec::with_capacity(sorted.len() + 2);
    for span in sorted {
        carve(&span, &incoming, policy, &mut out);
    }

    let at = out
        .iter()
        .position(|s| (s.offset, s.length) > (incoming.offset, incoming.length))
        .unwrap_or(out.len());
    out.insert(at, incoming);
    out
}

/// Push what survives of `span` once `incoming` claims its region.
fn carve(span: &Span, incoming: &Span, policy: StraddlePolicy, out: &mut Vec<Span>) {
    let (s_start, s_end) = (span.offset, span.end());
    let (b_start, b_end) = (incoming.offset, incoming.end());

    if span.length == 0 {
        let covered = if incoming.length == 0 {
            s_start == b_start
        } else {
            b_start <= s_start && s_start < b_end
        };
        if !covered {
            out.push(*span);
        }
        return;
    }

    let overlaps = if incoming.length == 0 {
        s_start < b_start && b_start < s_end
    } else {
        s_start < b_end && s_end > b_start
    };
    if !overlaps {
        out.push(*span);
        return;
    }

    let head = (s_start < b_start).then(|| span.with_bounds(s_start, b_start));
    let tail = (s_end > b_end).then(|| span.with_bounds(b_end, s_end));
    match (head, tail, policy) {
        (Some(head), Some(_), StraddlePolicy::TruncateHead) => out.push(head),
        (head, tail, _) => {
            out.extend(head);
            out.extend(tail);
        }
    }
}
