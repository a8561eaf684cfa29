//! The two parallel text buffers and char-based offset helpers.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::span::Direction;

/// One of the two buffers of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BufferId {
    Source,
    Summary,
}

impl BufferId {
    pub fn opposite(self) -> Self {
        match self {
            BufferId::Source => BufferId::Summary,
            BufferId::Summary => BufferId::Source,
        }
    }

    /// Direction of a span that lands in this buffer.
    pub fn direction(self) -> Direction {
        match self {
            BufferId::Source => Direction::ToSource,
            BufferId::Summary => Direction::ToSummary,
        }
    }
}

impl fmt::Display for BufferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BufferId::Source => f.write_str("source"),
            BufferId::Summary => f.write_str("summary"),
        }
    }
}

/// Buffer length in logical offsets (chars).
pub fn buffer_len(text: &str) -> usize {
    text.chars().count()
}

/// Text of the inclusive logical run `[start, end]`; empty for zero-width runs.
pub fn slice_text(text: &str, start: i64, end: i64) -> String {
    if end < start || end < 0 {
        return String::new();
    }
    let start = start.max(0) as usize;
    let count = (end as usize + 1).saturating_sub(start);
    text.chars().skip(start).take(count).collect()
}
