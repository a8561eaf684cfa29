//! Shapes exchanged with the annotation backend.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::buffer::BufferId;
use crate::span::{Direction, Span, TextRange, sort_spans};

/// Offset used on both ends of a side that has no span.
pub const NO_SPAN: i64 = -1;

/// One source/summary pair to annotate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    #[serde(rename = "doc")]
    pub source: String,
    #[serde(rename = "sum")]
    pub summary: String,
}

impl Task {
    pub fn text(&self, buffer: BufferId) -> &str {
        match buffer {
            BufferId::Source => &self.source,
            BufferId::Summary => &self.summary,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskCount {
    pub all: usize,
}

/// Candidate query sent to the alignment service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionRequest {
    pub start: usize,
    pub end: usize,
    pub from_summary: bool,
}

impl SelectionRequest {
    pub fn new(range: TextRange, from: BufferId) -> Self {
        Self {
            start: range.start,
            end: range.end,
            from_summary: from == BufferId::Summary,
        }
    }
}

/// A candidate span as the alignment service reports it. Missing metadata
/// shows up as `-1`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CandidateSpan {
    pub score: f64,
    pub offset: i64,
    pub len: i64,
    pub to_doc: bool,
}

impl CandidateSpan {
    pub fn into_span(self) -> Option<Span> {
        if self.offset < 0 || self.len < 0 || !self.score.is_finite() {
            return None;
        }
        self.offset.checked_add(self.len)?;
        let direction = if self.to_doc {
            Direction::ToSource
        } else {
            Direction::ToSummary
        };
        Some(Span::new(
            self.offset as usize,
            self.len as usize,
            self.score,
            direction,
        ))
    }
}

/// Convert a candidate response into a sorted span set, dropping unusable entries.
pub fn candidate_set(candidates: Vec<CandidateSpan>) -> Vec<Span> {
    let total = candidates.len();
    let mut spans: Vec<Span> = candidates
        .into_iter()
        .filter_map(CandidateSpan::into_span)
        .collect();
    if spans.len() < total {
        debug!(dropped = total - spans.len(), "discarded malformed candidate spans");
    }
    sort_spans(&mut spans);
    spans
}

/// The annotator's verdict on a pair of ranges.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Verdict {
    pub consistent: bool,
    pub note: Option<String>,
    pub labels: Vec<String>,
}

/// Label submission body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelRequest {
    pub source_start: i64,
    pub source_end: i64,
    pub summary_start: i64,
    pub summary_end: i64,
    pub consistent: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<String>,
}

impl LabelRequest {
    /// Build a request from one range per buffer; `None` marks a missing side.
    pub fn new(source: Option<TextRange>, summary: Option<TextRange>, verdict: Verdict) -> Self {
        let (source_start, source_end) = bounds(source);
        let (summary_start, summary_end) = bounds(summary);
        Self {
            source_start,
            source_end,
            summary_start,
            summary_end,
            consistent: verdict.consistent,
            note: verdict.note,
            labels: verdict.labels,
        }
    }
}

fn bounds(range: Option<TextRange>) -> (i64, i64) {
    range.map_or((NO_SPAN, NO_SPAN), |r| (r.start as i64, r.end as i64))
}

/// Range for a wire `(start, end)` pair; `None` when either side is missing.
pub fn range_of(start: i64, end: i64) -> Option<TextRange> {
    (start >= 0 && end >= 0).then(|| TextRange::new(start as usize, end as usize))
}

/// A persisted label as read back from history or export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelRecord {
    pub record_id: String,
    #[serde(default)]
    pub sample_id: Option<String>,
    pub source_start: i64,
    pub source_end: i64,
    pub summary_start: i64,
    pub summary_end: i64,
    pub consistent: bool,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub task_index: Option<usize>,
    #[serde(default)]
    pub user_id: Option<String>,
}

impl LabelRecord {
    pub fn source_range(&self) -> Option<TextRange> {
        range_of(self.source_start, self.source_end)
    }

    pub fn summary_range(&self) -> Option<TextRange> {
        range_of(self.summary_start, self.summary_end)
    }

    pub fn range(&self, buffer: BufferId) -> Option<TextRange> {
        match buffer {
            BufferId::Source => self.source_range(),
            BufferId::Summary => self.summary_range(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_uses_wire_field_names() {
        let task: Task = serde_json::from_str(r#"{"doc": "full text", "sum": "short"}"#).unwrap();
        assert_eq!(task.text(BufferId::Source), "full text");
        assert_eq!(task.text(BufferId::Summary), "short");
    }

    #[test]
    fn candidates_are_validated_and_sorted() {
        let json = r#"[
            {"score": 0.4, "offset": 30, "len": 5, "to_doc": true},
            {"score": 0.9, "offset": -1, "len": -1, "to_doc": true},
            {"score": 0.7, "offset": 2, "len": 8, "to_doc": true}
        ]"#;
        let wire: Vec<CandidateSpan> = serde_json::from_str(json).unwrap();
        let spans = candidate_set(wire);
        assert_eq!(spans.len(), 2);
        assert_eq!(spans[0], Span::new(2, 8, 0.7, Direction::ToSource));
        assert_eq!(spans[1].offset, 30);
    }

    #[test]
    fn oversized_candidate_is_dropped() {
        let wire = vec![
            CandidateSpan {
                score: 0.5,
                offset: 2,
                len: i64::MAX,
                to_doc: true,
            },
            CandidateSpan {
                score: 0.3,
                offset: 6,
                len: 2,
                to_doc: true,
            },
        ];
        let spans = candidate_set(wire);
        assert_eq!(spans, vec![Span::new(6, 2, 0.3, Direction::ToSource)]);

        let slices = crate::partition::partition(10, &spans);
        assert_eq!(slices.last().map(|s| s.end), Some(9));
        let covered: usize = slices.iter().map(|s| s.len()).sum();
        assert_eq!(covered, 10);
    }

    #[test]
    fn summary_only_request_marks_missing_source() {
        let req = LabelRequest::new(
            None,
            Some(TextRange::new(4, 9)),
            Verdict {
                consistent: false,
                note: None,
                labels: vec![],
            },
        );
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["source_start"], -1);
        assert_eq!(json["source_end"], -1);
        assert_eq!(json["summary_start"], 4);
        assert_eq!(json["summary_end"], 9);
        assert!(json.get("note").is_none());
        assert!(json.get("labels").is_none());
    }

    #[test]
    fn request_carries_note_and_labels() {
        let req = LabelRequest::new(
            Some(TextRange::new(0, 3)),
            Some(TextRange::new(1, 2)),
            Verdict {
                consistent: true,
                note: Some("paraphrase".into()),
                labels: vec!["extrinsic.fact".into()],
            },
        );
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["note"], "paraphrase");
        assert_eq!(json["labels"][0], "extrinsic.fact");
    }

    #[test]
    fn record_with_missing_side() {
        let json = r#"{
            "record_id": "r1",
            "source_start": -1, "source_end": -1,
            "summary_start": 3, "summary_end": 8,
            "consistent": false
        }"#;
        let record: LabelRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.source_range(), None);
        assert_eq!(record.summary_range(), Some(TextRange::new(3, 8)));
        assert!(record.labels.is_empty());
    }
}
