//! The active task view: one task's buffers, its selection session and history.

use tracing::debug;

use crate::buffer::{BufferId, buffer_len};
use crate::history::sort_records;
use crate::label::{LabelRecord, Task};
use crate::partition::PartitionSlice;
use crate::resolver::{RenderedBuffer, SelectionGesture};
use crate::session::{Effect, SelectionMachine};

/// Owner of all session state for one task. Switching task means building a
/// new view, which starts from a reset session.
#[derive(Debug)]
pub struct TaskView {
    index: usize,
    task: Task,
    source_len: usize,
    summary_len: usize,
    machine: SelectionMachine,
    history: Vec<LabelRecord>,
}

impl TaskView {
    pub fn new(index: usize, task: Task) -> Self {
        let source_len = buffer_len(&task.source);
        let summary_len = buffer_len(&task.summary);
        debug!(index, source_len, summary_len, "task view opened");
        Self {
            index,
            task,
            source_len,
            summary_len,
            machine: SelectionMachine::new(),
            history: Vec::new(),
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn task(&self) -> &Task {
        &self.task
    }

    pub fn text(&self, buffer: BufferId) -> &str {
        self.task.text(buffer)
    }

    pub fn len(&self, buffer: BufferId) -> usize {
        match buffer {
            BufferId::Source => self.source_len,
            BufferId::Summary => self.summary_len,
        }
    }

    pub fn machine(&self) -> &SelectionMachine {
        &self.machine
    }

    pub fn machine_mut(&mut self) -> &mut SelectionMachine {
        &mut self.machine
    }

    pub fn handle<G: SelectionGesture>(&mut self, gesture: &G) -> Vec<Effect> {
        self.machine.handle(gesture)
    }

    /// Current render partition of `buffer`.
    pub fn partition(&self, buffer: BufferId) -> Vec<PartitionSlice> {
        self.machine.render(buffer, self.len(buffer))
    }

    /// Render tree of `buffer`, for hit-testing gestures.
    pub fn layout(&self, buffer: BufferId) -> RenderedBuffer {
        RenderedBuffer::layout(buffer, self.len(buffer), &self.partition(buffer))
    }

    pub fn history(&self) -> &[LabelRecord] {
        &self.history
    }

    /// Replace the history. A preview of a record that is no longer listed
    /// is ended, and the reset's effects are returned.
    pub fn set_history(&mut self, mut records: Vec<LabelRecord>) -> Vec<Effect> {
        sort_records(&mut records);
        self.history = records;
        let Some(id) = self.machine.previewing() else {
            return Vec::new();
        };
        if self.history.iter().any(|r| r.record_id == id) {
            return Vec::new();
        }
        debug!(record = id, "previewed record left the history");
        self.machine.reset()
    }

    pub fn record(&self, record_id: &str) -> Option<&LabelRecord> {
        self.history.iter().find(|r| r.record_id == record_id)
    }

    /// Preview a history record; `None` when the id is unknown.
    pub fn preview(&mut self, record_id: &str) -> Option<Vec<Effect>> {
        let record = self.history.iter().find(|r| r.record_id == record_id)?;
        Some(self.machine.preview(record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Stage;

    fn view() -> TaskView {
        TaskView::new(
            3,
            Task {
                source: "The committee approved the budget on Monday.".into(),
                summary: "Budget approved.".into(),
            },
        )
    }

    #[test]
    fn lengths_and_plain_partition() {
        let view = view();
        assert_eq!(view.len(BufferId::Source), 44);
        assert_eq!(view.len(BufferId::Summary), 16);
        let slices = view.partition(BufferId::Summary);
        assert_eq!(slices.len(), 1);
        assert_eq!((slices[0].start, slices[0].end), (0, 15));
    }

    #[test]
    fn gestures_hit_test_against_the_current_layout() {
        let mut view = view();
        let gesture = view.layout(BufferId::Summary).gesture(0, 6).unwrap();
        view.handle(&gesture);
        assert_eq!(view.machine().state().stage, Stage::FirstCaptured);

        let anchored = view.partition(BufferId::Summary);
        assert!(anchored[0].annotated);
        assert_eq!((anchored[0].start, anchored[0].end), (0, 5));
    }

    #[test]
    fn preview_unknown_record() {
        let mut view = view();
        assert!(view.preview("missing").is_none());
    }

    #[test]
    fn history_is_kept_sorted() {
        let mut view = view();
        let rec = |id: &str, s: i64| LabelRecord {
            record_id: id.into(),
            sample_id: None,
            source_start: s,
            source_end: s + 3,
            summary_start: 0,
            summary_end: 6,
            consistent: true,
            note: None,
            labels: vec![],
            task_index: Some(3),
            user_id: None,
        };
        view.set_history(vec![rec("late", 20), rec("early", 4)]);
        assert_eq!(view.history()[0].record_id, "early");
        assert!(view.record("late").is_some());

        view.preview("early").unwrap();
        let source = view.partition(BufferId::Source);
        assert!(source.iter().any(|s| s.annotated && s.start == 4 && s.end == 6));

        // Still listed: the preview stays.
        assert!(view.set_history(vec![rec("early", 4)]).is_empty());
        assert_eq!(view.machine().previewing(), Some("early"));

        let effects = view.set_history(vec![rec("late", 20)]);
        assert!(effects.contains(&Effect::ClearNativeSelection));
        assert_eq!(view.machine().previewing(), None);
        assert_eq!(view.machine().state().stage, Stage::None);
        assert!(!view.partition(BufferId::Source).iter().any(|s| s.annotated));
    }
}
