//! Annotation session driver.
//!
//! [`Annotator`] owns the active [`TaskView`] and runs the effects its
//! selection machine emits against a [`Backend`]: candidate queries are
//! debounced on a spawned task, label submissions and history lookups are
//! awaited inline.

use std::sync::Arc;
use std::time::Duration;

use mercury_core::{
    CandidateOutcome, Effect, LabelNode, LabelRecord, LabelRequest, LabelStates, QueryTicket,
    SelectionGesture, Span, TaskView, TextRange, Verdict,
};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::{AnnotatorError, Backend, ClientError};

/// Default delay between the last gesture and the candidate query.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(100);

#[derive(Debug, Clone)]
pub struct AnnotatorConfig {
    /// Quiet period before a candidate query is sent.
    pub debounce: Duration,
}

impl Default for AnnotatorConfig {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
        }
    }
}

struct CandidateReply {
    epoch: u64,
    ticket: QueryTicket,
    result: Result<Vec<Span>, ClientError>,
}

pub struct Annotator<B: Backend + 'static> {
    backend: Arc<B>,
    config: AnnotatorConfig,
    view: Option<TaskView>,
    taxonomy: Vec<LabelNode>,
    labels: LabelStates,
    // Bumped on every task switch; replies from an older view are dropped.
    epoch: u64,
    tx: mpsc::UnboundedSender<CandidateReply>,
    rx: mpsc::UnboundedReceiver<CandidateReply>,
    pending: Option<JoinHandle<()>>,
}

impl<B: Backend + 'static> Annotator<B> {
    pub fn new(backend: Arc<B>, config: AnnotatorConfig) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            backend,
            config,
            view: None,
            taxonomy: Vec::new(),
            labels: LabelStates::default(),
            epoch: 0,
            tx,
            rx,
            pending: None,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Fetch the label taxonomy and reset every checkbox.
    pub async fn load_taxonomy(&mut self) -> Result<&[LabelNode], AnnotatorError> {
        self.taxonomy = self.backend.taxonomy().await?;
        self.labels = LabelStates::new(&self.taxonomy);
        debug!(groups = self.taxonomy.len(), "taxonomy loaded");
        Ok(&self.taxonomy)
    }

    pub fn taxonomy(&self) -> &[LabelNode] {
        &self.taxonomy
    }

    pub fn labels(&self) -> &LabelStates {
        &self.labels
    }

    pub fn labels_mut(&mut self) -> &mut LabelStates {
        &mut self.labels
    }

    /// Verdict carrying the currently checked labels.
    pub fn verdict(&self, consistent: bool, note: Option<String>) -> Verdict {
        Verdict {
            consistent,
            note,
            labels: self.labels.selected(),
        }
    }

    /// Switch to task `index`. The previous view and any query in flight are
    /// discarded. A history failure leaves the view open with no history.
    pub async fn open_task(&mut self, index: usize) -> Result<&TaskView, AnnotatorError> {
        let task = self.backend.task(index).await?;
        self.cancel_pending();
        self.epoch += 1;
        self.labels.clear();
        let mut view = TaskView::new(index, task);
        match self.backend.history(index).await {
            Ok(records) => {
                view.set_history(records);
            }
            Err(e) => warn!(task = index, error = %e, "could not load history"),
        }
        info!(task = index, records = view.history().len(), "task opened");
        Ok(&*self.view.insert(view))
    }

    pub fn view(&self) -> Option<&TaskView> {
        self.view.as_ref()
    }

    fn view_mut(&mut self) -> Result<&mut TaskView, AnnotatorError> {
        self.view.as_mut().ok_or(AnnotatorError::NoTask)
    }

    /// Feed a selection gesture to the open view.
    ///
    /// Candidate queries are scheduled here; the returned effects are the
    /// ones the host must carry out itself. Must be called from within a
    /// tokio runtime.
    pub fn gesture<G: SelectionGesture>(
        &mut self,
        gesture: &G,
    ) -> Result<Vec<Effect>, AnnotatorError> {
        let effects = self.view_mut()?.handle(gesture);
        Ok(self.run(effects))
    }

    /// Drop the selection and any pending query.
    pub fn reset(&mut self) -> Result<Vec<Effect>, AnnotatorError> {
        let effects = self.view_mut()?.machine_mut().reset();
        Ok(self.run(effects))
    }

    /// Preview a history record. `Ok(None)` when the id is unknown.
    pub fn preview(&mut self, record_id: &str) -> Result<Option<Vec<Effect>>, AnnotatorError> {
        let Some(effects) = self.view_mut()?.preview(record_id) else {
            return Ok(None);
        };
        Ok(Some(self.run(effects)))
    }

    fn run(&mut self, effects: Vec<Effect>) -> Vec<Effect> {
        let mut host = Vec::new();
        for effect in effects {
            match effect {
                Effect::QueryCandidates(query) => {
                    let Some(index) = self.view.as_ref().map(TaskView::index) else {
                        continue;
                    };
                    self.cancel_pending();
                    let backend = Arc::clone(&self.backend);
                    let tx = self.tx.clone();
                    let delay = self.config.debounce;
                    let epoch = self.epoch;
                    self.pending = Some(tokio::spawn(async move {
                        tokio::time::sleep(delay).await;
                        let result = backend.candidates(index, &query.request()).await;
                        // Receiver gone means the annotator was dropped.
                        let _ = tx.send(CandidateReply {
                            epoch,
                            ticket: query.ticket,
                            result,
                        });
                    }));
                }
                Effect::CancelQuery => self.cancel_pending(),
                other => host.push(other),
            }
        }
        host
    }

    fn cancel_pending(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }

    /// Wait for the next candidate reply and apply it.
    ///
    /// Returns `None` when nothing is outstanding.
    pub async fn next_candidates(&mut self) -> Option<CandidateOutcome> {
        let waiting = self
            .view
            .as_ref()
            .is_some_and(|v| v.machine().waiting_on().is_some());
        let reply = if waiting {
            self.rx.recv().await?
        } else {
            self.rx.try_recv().ok()?
        };
        Some(self.apply(reply))
    }

    /// Apply a reply that has already arrived, without waiting.
    pub fn try_apply_candidates(&mut self) -> Option<CandidateOutcome> {
        let reply = self.rx.try_recv().ok()?;
        Some(self.apply(reply))
    }

    fn apply(&mut self, reply: CandidateReply) -> CandidateOutcome {
        if reply.epoch != self.epoch {
            debug!(epoch = reply.epoch, "dropping reply for a closed task");
            return CandidateOutcome::Stale;
        }
        match self.view.as_mut() {
            Some(view) => view.machine_mut().apply_candidates(reply.ticket, reply.result),
            None => CandidateOutcome::Stale,
        }
    }

    /// Submit the anchor paired with `counterpart` (a candidate slice range,
    /// or `None` to label the anchor alone).
    pub async fn submit(
        &mut self,
        counterpart: Option<TextRange>,
        verdict: Verdict,
    ) -> Result<Vec<Effect>, AnnotatorError> {
        let view = self.view_mut()?;
        let request = view.machine().label_request(counterpart, verdict)?;
        self.send_label(request).await
    }

    /// Submit the anchor paired with the manually captured counterpart.
    pub async fn submit_manual(&mut self, verdict: Verdict) -> Result<Vec<Effect>, AnnotatorError> {
        let view = self.view_mut()?;
        let request = view.machine().manual_label_request(verdict)?;
        self.send_label(request).await
    }

    async fn send_label(
        &mut self,
        request: LabelRequest,
    ) -> Result<Vec<Effect>, AnnotatorError> {
        let index = self.view_mut()?.index();
        let result = self.backend.submit_label(index, &request).await;
        let effects = self
            .view_mut()?
            .machine_mut()
            .on_submitted(result.as_ref().map(|_| ()));
        result?;
        let mut host = self.run(effects);
        self.labels.clear();
        // The label is stored; a stale history must not read as a failed submit.
        match self.refresh_history().await {
            Ok(more) => host.extend(more),
            Err(e) => warn!(task = index, error = %e, "could not refresh history"),
        }
        Ok(host)
    }

    /// Reload the open task's history. Returns host effects, which are
    /// non-empty when the previewed record has disappeared.
    pub async fn refresh_history(&mut self) -> Result<Vec<Effect>, AnnotatorError> {
        let index = self.view_mut()?.index();
        let records = self.backend.history(index).await?;
        let effects = self.view_mut()?.set_history(records);
        Ok(self.run(effects))
    }

    /// Delete a persisted record and refresh the history.
    pub async fn delete_record(&mut self, record_id: &str) -> Result<Vec<Effect>, AnnotatorError> {
        self.backend.delete_record(record_id).await?;
        info!(record = record_id, "record deleted");
        if self.view.is_none() {
            return Ok(Vec::new());
        }
        self.refresh_history().await
    }

    /// All of the user's records across tasks.
    pub async fn export(&self) -> Result<Vec<LabelRecord>, AnnotatorError> {
        Ok(self.backend.export().await?)
    }
}

impl<B: Backend + 'static> Drop for Annotator<B> {
    fn drop(&mut self) {
        self.cancel_pending();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use mercury_core::{BufferId, Direction, Gesture, SelectionRequest, Stage, SubmitError, Task};

    #[derive(Default)]
    struct FakeBackend {
        candidate_calls: AtomicUsize,
        fail_candidates: bool,
        fail_submit: bool,
        fail_history: bool,
        fail_history_after_submit: bool,
        requests: Mutex<Vec<SelectionRequest>>,
        labels: Mutex<Vec<LabelRequest>>,
        records: Mutex<Vec<LabelRecord>>,
    }

    fn record(id: &str, source_start: i64) -> LabelRecord {
        LabelRecord {
            record_id: id.into(),
            sample_id: None,
            source_start,
            source_end: source_start + 4,
            summary_start: 0,
            summary_end: 3,
            consistent: true,
            note: None,
            labels: vec![],
            task_index: Some(0),
            user_id: None,
        }
    }

    #[async_trait]
    impl Backend for FakeBackend {
        async fn task_count(&self) -> Result<usize, ClientError> {
            Ok(2)
        }

        async fn task(&self, index: usize) -> Result<Task, ClientError> {
            if index >= 2 {
                return Err(ClientError::Api("Invalid task index".into()));
            }
            Ok(Task {
                source: "The council voted to close the library on Sundays.".into(),
                summary: format!("Library closes Sundays ({index})."),
            })
        }

        async fn candidates(
            &self,
            _index: usize,
            request: &SelectionRequest,
        ) -> Result<Vec<Span>, ClientError> {
            self.candidate_calls.fetch_add(1, Ordering::SeqCst);
            self.requests.lock().unwrap().push(*request);
            if self.fail_candidates {
                return Err(ClientError::Server {
                    status: 500,
                    body: "boom".into(),
                });
            }
            let direction = if request.from_summary {
                Direction::ToSource
            } else {
                Direction::ToSummary
            };
            Ok(vec![Span::new(4, 7, 0.9, direction)])
        }

        async fn submit_label(&self, _index: usize, request: &LabelRequest) -> Result<(), ClientError> {
            if self.fail_submit {
                return Err(ClientError::Server {
                    status: 503,
                    body: "unavailable".into(),
                });
            }
            self.labels.lock().unwrap().push(request.clone());
            Ok(())
        }

        async fn history(&self, _index: usize) -> Result<Vec<LabelRecord>, ClientError> {
            if self.fail_history {
                return Err(ClientError::MissingUserKey);
            }
            if self.fail_history_after_submit && !self.labels.lock().unwrap().is_empty() {
                return Err(ClientError::Api("history down".into()));
            }
            Ok(self.records.lock().unwrap().clone())
        }

        async fn export(&self) -> Result<Vec<LabelRecord>, ClientError> {
            Ok(self.records.lock().unwrap().clone())
        }

        async fn delete_record(&self, record_id: &str) -> Result<(), ClientError> {
            self.records.lock().unwrap().retain(|r| r.record_id != record_id);
            Ok(())
        }

        async fn taxonomy(&self) -> Result<Vec<LabelNode>, ClientError> {
            Ok(vec![
                LabelNode::Leaf("consistent".into()),
                LabelNode::Group("extrinsic".into(), vec![LabelNode::Leaf("fact".into())]),
            ])
        }
    }

    fn annotator(backend: FakeBackend) -> Annotator<FakeBackend> {
        Annotator::new(Arc::new(backend), AnnotatorConfig::default())
    }

    fn drag(annotator: &Annotator<FakeBackend>, buffer: BufferId, start: usize, end: usize) -> Gesture {
        annotator
            .view()
            .unwrap()
            .layout(buffer)
            .gesture(start, end)
            .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn query_is_applied_after_debounce() {
        let mut ann = annotator(FakeBackend::default());
        ann.open_task(0).await.unwrap();
        let g = drag(&ann, BufferId::Summary, 0, 7);
        let host = ann.gesture(&g).unwrap();
        assert!(host.is_empty());
        assert_eq!(ann.backend().candidate_calls.load(Ordering::SeqCst), 0);

        assert_eq!(ann.next_candidates().await, Some(CandidateOutcome::Applied(1)));
        let view = ann.view().unwrap();
        assert_eq!(view.machine().candidates().len(), 1);
        let source = view.partition(BufferId::Source);
        assert!(source.iter().any(|s| s.annotated && s.start == 4 && s.end == 10));
        assert_eq!(
            ann.backend().requests.lock().unwrap()[0],
            SelectionRequest {
                start: 0,
                end: 7,
                from_summary: true
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn rapid_gestures_send_one_query() {
        let mut ann = annotator(FakeBackend::default());
        ann.open_task(0).await.unwrap();
        let g = drag(&ann, BufferId::Source, 0, 3);
        ann.gesture(&g).unwrap();
        let g = drag(&ann, BufferId::Source, 0, 11);
        ann.gesture(&g).unwrap();

        assert_eq!(ann.next_candidates().await, Some(CandidateOutcome::Applied(1)));
        assert_eq!(ann.backend().candidate_calls.load(Ordering::SeqCst), 1);
        assert_eq!(ann.backend().requests.lock().unwrap()[0].end, 11);
        assert_eq!(ann.next_candidates().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn reply_for_an_old_anchor_is_stale() {
        let mut ann = annotator(FakeBackend::default());
        ann.open_task(0).await.unwrap();
        let g = drag(&ann, BufferId::Source, 0, 3);
        ann.gesture(&g).unwrap();
        tokio::time::sleep(DEFAULT_DEBOUNCE * 2).await;

        let g = drag(&ann, BufferId::Source, 12, 20);
        ann.gesture(&g).unwrap();
        assert_eq!(ann.next_candidates().await, Some(CandidateOutcome::Stale));
        assert_eq!(ann.next_candidates().await, Some(CandidateOutcome::Applied(1)));
        assert_eq!(ann.backend().candidate_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn reset_cancels_the_query() {
        let mut ann = annotator(FakeBackend::default());
        ann.open_task(0).await.unwrap();
        let g = drag(&ann, BufferId::Source, 0, 3);
        ann.gesture(&g).unwrap();
        let host = ann.reset().unwrap();
        assert_eq!(host, vec![Effect::ClearNativeSelection]);

        tokio::time::sleep(DEFAULT_DEBOUNCE * 2).await;
        assert_eq!(ann.backend().candidate_calls.load(Ordering::SeqCst), 0);
        assert_eq!(ann.next_candidates().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_query_leaves_anchor_in_place() {
        let mut ann = annotator(FakeBackend {
            fail_candidates: true,
            ..Default::default()
        });
        ann.open_task(0).await.unwrap();
        let g = drag(&ann, BufferId::Summary, 0, 7);
        ann.gesture(&g).unwrap();
        assert_eq!(ann.next_candidates().await, Some(CandidateOutcome::Failed));
        let machine = ann.view().unwrap().machine();
        assert_eq!(machine.state().stage, Stage::FirstCaptured);
        assert!(machine.candidates().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn task_switch_drops_pending_reply() {
        let mut ann = annotator(FakeBackend::default());
        ann.open_task(0).await.unwrap();
        let g = drag(&ann, BufferId::Source, 0, 3);
        ann.gesture(&g).unwrap();
        tokio::time::sleep(DEFAULT_DEBOUNCE * 2).await;

        ann.open_task(1).await.unwrap();
        assert_eq!(ann.try_apply_candidates(), Some(CandidateOutcome::Stale));
        let view = ann.view().unwrap();
        assert_eq!(view.index(), 1);
        assert_eq!(view.machine().state().stage, Stage::None);
    }

    #[tokio::test]
    async fn unknown_task_is_an_error() {
        let mut ann = annotator(FakeBackend::default());
        assert!(matches!(
            ann.open_task(9).await,
            Err(AnnotatorError::Client(ClientError::Api(_)))
        ));
        assert!(ann.view().is_none());
        assert!(matches!(ann.reset(), Err(AnnotatorError::NoTask)));
    }

    #[tokio::test]
    async fn history_failure_keeps_the_task_open() {
        let mut ann = annotator(FakeBackend {
            fail_history: true,
            ..Default::default()
        });
        let view = ann.open_task(0).await.unwrap();
        assert!(view.history().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn manual_submission_resets_and_refreshes() {
        let backend = FakeBackend::default();
        backend.records.lock().unwrap().push(record("r1", 4));
        let mut ann = annotator(backend);
        ann.load_taxonomy().await.unwrap();
        ann.open_task(0).await.unwrap();
        assert_eq!(ann.view().unwrap().history().len(), 1);

        let g = drag(&ann, BufferId::Summary, 0, 7);
        ann.gesture(&g).unwrap();
        ann.next_candidates().await;
        let g = drag(&ann, BufferId::Source, 30, 37);
        ann.gesture(&g).unwrap();

        assert!(ann.labels_mut().set("extrinsic.fact", true));
        let verdict = ann.verdict(false, Some("closing day is wrong".into()));
        let host = ann.submit_manual(verdict).await.unwrap();
        assert_eq!(host, vec![Effect::ClearNativeSelection]);

        let sent = ann.backend().labels.lock().unwrap()[0].clone();
        assert_eq!((sent.source_start, sent.source_end), (30, 37));
        assert_eq!((sent.summary_start, sent.summary_end), (0, 7));
        assert!(!sent.consistent);
        assert_eq!(sent.labels, vec!["extrinsic.fact"]);
        assert_eq!(ann.view().unwrap().machine().state().stage, Stage::None);
        assert!(ann.labels().selected().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn failed_submission_keeps_selection() {
        let mut ann = annotator(FakeBackend {
            fail_submit: true,
            ..Default::default()
        });
        ann.open_task(0).await.unwrap();
        let g = drag(&ann, BufferId::Source, 0, 3);
        ann.gesture(&g).unwrap();

        let err = ann.submit(None, Verdict::default()).await.unwrap_err();
        assert!(matches!(err, AnnotatorError::Client(ClientError::Server { status: 503, .. })));
        assert_eq!(ann.view().unwrap().machine().state().stage, Stage::FirstCaptured);
    }

    #[tokio::test]
    async fn submission_without_ranges() {
        let mut ann = annotator(FakeBackend::default());
        ann.open_task(0).await.unwrap();
        assert!(matches!(
            ann.submit(None, Verdict::default()).await,
            Err(AnnotatorError::Submit(SubmitError::NoAnchor))
        ));
        assert!(ann.backend().labels.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_refreshes_history() {
        let backend = FakeBackend::default();
        backend
            .records
            .lock()
            .unwrap()
            .extend([record("r1", 4), record("r2", 10)]);
        let mut ann = annotator(backend);
        ann.open_task(0).await.unwrap();
        assert!(ann.preview("r2").unwrap().is_some());
        assert_eq!(ann.view().unwrap().machine().previewing(), Some("r2"));

        let host = ann.delete_record("r2").await.unwrap();
        assert_eq!(host, vec![Effect::ClearNativeSelection]);
        let view = ann.view().unwrap();
        assert_eq!(view.history().len(), 1);
        assert_eq!(view.history()[0].record_id, "r1");
        assert_eq!(view.machine().previewing(), None);
        assert_eq!(view.machine().state().stage, Stage::None);
        assert!(!view.partition(BufferId::Source).iter().any(|s| s.annotated));
        assert_eq!(ann.export().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn deleting_another_record_keeps_the_preview() {
        let backend = FakeBackend::default();
        backend
            .records
            .lock()
            .unwrap()
            .extend([record("r1", 4), record("r2", 10)]);
        let mut ann = annotator(backend);
        ann.open_task(0).await.unwrap();
        ann.preview("r1").unwrap();

        assert!(ann.delete_record("r2").await.unwrap().is_empty());
        assert_eq!(ann.view().unwrap().machine().previewing(), Some("r1"));
    }

    #[tokio::test(start_paused = true)]
    async fn stored_label_is_success_even_if_history_refresh_fails() {
        let mut ann = annotator(FakeBackend {
            fail_history_after_submit: true,
            ..Default::default()
        });
        ann.open_task(0).await.unwrap();
        let g = drag(&ann, BufferId::Source, 0, 3);
        ann.gesture(&g).unwrap();

        let host = ann.submit(None, Verdict::default()).await.unwrap();
        assert_eq!(host, vec![Effect::ClearNativeSelection]);
        assert_eq!(ann.backend().labels.lock().unwrap().len(), 1);
        assert_eq!(ann.view().unwrap().machine().state().stage, Stage::None);
        assert!(matches!(
            ann.refresh_history().await,
            Err(AnnotatorError::Client(ClientError::Api(_)))
        ));
    }
}
