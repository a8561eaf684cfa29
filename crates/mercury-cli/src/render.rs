//! Text rendering of partitioned buffers and history rows.
//!
//! Annotated runs are bracketed in the buffer text and listed underneath
//! with a shade glyph scaled from the candidate scores.

use std::fmt::Write;

use mercury_core::history::{HistorySlice, history_slices};
use mercury_core::{LabelRecord, PartitionSlice, USER_SCORE, slice_text};

/// Shade glyphs from lowest to highest score.
const SHADES: &[char] = &['░', '▒', '▓', '█'];
const USER_MARK: char = '✎';

// ── Score shading ──

/// Scale candidate scores to `[0, 1]`. User spans are left out of the range;
/// a single distinct score maps to 1.
pub fn score_scale(slices: &[PartitionSlice]) -> impl Fn(f64) -> f64 {
    let (lo, hi) = slices
        .iter()
        .filter(|s| s.annotated && s.score != USER_SCORE)
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), s| {
            (lo.min(s.score), hi.max(s.score))
        });
    move |score| {
        if hi <= lo {
            1.0
        } else {
            ((score - lo) / (hi - lo)).clamp(0.0, 1.0)
        }
    }
}

/// Glyph for an annotated slice.
pub fn shade(slice: &PartitionSlice, scaled: f64) -> char {
    if slice.score == USER_SCORE {
        return USER_MARK;
    }
    let last = SHADES.len() - 1;
    SHADES[((scaled * last as f64).round() as usize).min(last)]
}

// ── Partitions ──

/// Buffer text with annotated runs bracketed, then one line per run.
pub fn render_partition(text: &str, slices: &[PartitionSlice]) -> String {
    let scale = score_scale(slices);
    let mut line = String::new();
    let mut legend = String::new();

    for slice in slices.iter().filter(|s| !s.is_empty()) {
        let run = slice_text(text, slice.start, slice.end);
        if !slice.annotated {
            line.push_str(&run);
            continue;
        }
        let glyph = shade(slice, scale(slice.score));
        let _ = write!(line, "[{run}]");
        let score = if slice.score == USER_SCORE {
            "user".to_string()
        } else {
            format!("{:.3}", slice.score)
        };
        let _ = writeln!(
            legend,
            "  {glyph} {:>5}  {:>5}..{:<5} {run:?}",
            score,
            slice.start,
            slice.end + 1
        );
    }

    if legend.is_empty() {
        format!("{line}\n")
    } else {
        format!("{line}\n\n{legend}")
    }
}

// ── History ──

fn history_cell(text: &str, start: i64, end: i64, consistent: bool) -> String {
    let parts = history_slices(text, start, end, consistent);
    if !parts.iter().any(|p| p.labeled) {
        return "-".to_string();
    }
    parts
        .iter()
        .map(|HistorySlice { text, labeled, consistent }| match (*labeled, *consistent) {
            (false, _) => text.clone(),
            (true, true) => format!("[{text}]"),
            (true, false) => format!("{{{text}}}"),
        })
        .collect()
}

/// One block per record: id, verdict, labels and both labelled excerpts.
pub fn render_history(source: &str, summary: &str, records: &[LabelRecord]) -> String {
    let mut out = String::new();
    for record in records {
        let verdict = if record.consistent {
            "consistent"
        } else {
            "inconsistent"
        };
        let _ = writeln!(out, "{}  {verdict}", record.record_id);
        if !record.labels.is_empty() {
            let _ = writeln!(out, "  {:<10} {}", "labels", record.labels.join(", "));
        }
        if let Some(note) = &record.note {
            let _ = writeln!(out, "  {:<10} {note}", "note");
        }
        let _ = writeln!(
            out,
            "  {:<10} {}",
            "source",
            history_cell(source, record.source_start, record.source_end, record.consistent)
        );
        let _ = writeln!(
            out,
            "  {:<10} {}",
            "summary",
            history_cell(summary, record.summary_start, record.summary_end, record.consistent)
        );
    }
    out
}
