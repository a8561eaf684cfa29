//! Selection capture state machine.
//!
//! The machine pins an anchor range in one buffer, lets the annotator refine
//! it, and captures a counterpart range in the other buffer. It never talks
//! to collaborators itself: it returns [`Effect`]s for the caller to run and
//! takes their results back through [`SelectionMachine::apply_candidates`]
//! and [`SelectionMachine::on_submitted`].
//!
//! Every candidate query carries a [`QueryTicket`]. Reset, re-anchoring and
//! task changes bump the generation, so a response holding an older ticket
//! is dropped on arrival.

use std::fmt::Display;

use tracing::{debug, info, warn};

use crate::buffer::BufferId;
use crate::error::{ResolveError, SubmitError};
use crate::history::record_spans;
use crate::label::{LabelRecord, LabelRequest, SelectionRequest, Verdict};
use crate::partition::{PartitionSlice, partition};
use crate::resolver::{SelectionGesture, resolve};
use crate::span::{Span, StraddlePolicy, TextRange, merge_with, sort_spans};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Stage {
    #[default]
    None,
    FirstCaptured,
}

/// Session fields for the active task view.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SelectionState {
    pub stage: Stage,
    pub anchor_range: Option<TextRange>,
    pub anchor_buffer: Option<BufferId>,
    pub counterpart_range: Option<TextRange>,
}

/// Identifies one issued candidate query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QueryTicket(u64);

/// A candidate query the caller should run after the debounce delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CandidateQuery {
    pub ticket: QueryTicket,
    pub range: TextRange,
    pub from: BufferId,
}

impl CandidateQuery {
    pub fn request(&self) -> SelectionRequest {
        SelectionRequest::new(self.range, self.from)
    }
}

/// Work the caller runs on the machine's behalf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    QueryCandidates(CandidateQuery),
    /// Any pending query is void; its response will be discarded.
    CancelQuery,
    /// Drop the host's native text selection.
    ClearNativeSelection,
}

/// What happened to a candidate response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateOutcome {
    Applied(usize),
    Stale,
    Failed,
}

/// Two-stage selection capture for one task view.
#[derive(Debug, Default)]
pub struct SelectionMachine {
    state: SelectionState,
    candidates: Vec<Span>,
    generation: u64,
    pending: Option<QueryTicket>,
    preview: Option<String>,
}

impl SelectionMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &SelectionState {
        &self.state
    }

    /// Current server candidates for the counterpart buffer, sorted.
    pub fn candidates(&self) -> &[Span] {
        &self.candidates
    }

    /// Buffer waiting on a candidate response, if any.
    pub fn waiting_on(&self) -> Option<BufferId> {
        self.pending
            .and(self.state.anchor_buffer)
            .map(BufferId::opposite)
    }

    /// Record id being previewed, if any.
    pub fn previewing(&self) -> Option<&str> {
        self.preview.as_deref()
    }

    /// Whether `ticket` is still the one the machine is waiting on.
    pub fn is_current(&self, ticket: QueryTicket) -> bool {
        self.pending == Some(ticket)
    }

    /// Feed one selection gesture through the machine.
    pub fn handle<G: SelectionGesture>(&mut self, gesture: &G) -> Vec<Effect> {
        let buffer = match gesture.buffer() {
            Ok(buffer) => buffer,
            Err(ResolveError::OutsideBuffers) => return self.outside(),
            Err(e) => {
                debug!(error = %e, "ignoring gesture");
                return Vec::new();
            }
        };
        if gesture.is_collapsed() {
            return Vec::new();
        }
        let range = match resolve(gesture) {
            Ok((a, b)) => TextRange::new(a, b),
            Err(e) => {
                debug!(error = %e, "ignoring gesture");
                return Vec::new();
            }
        };
        if range.is_empty() {
            return Vec::new();
        }

        let mut effects = Vec::new();
        if self.preview.is_some() {
            effects.extend(self.reset());
        }

        match (self.state.stage, self.state.anchor_buffer) {
            (Stage::FirstCaptured, Some(anchor)) if anchor != buffer => {
                debug!(%buffer, start = range.start, end = range.end, "counterpart captured");
                self.state.counterpart_range = Some(range);
            }
            _ => effects.push(self.capture_anchor(buffer, range)),
        }
        effects
    }

    /// Pin (or re-pin) the anchor range and ask for fresh candidates.
    fn capture_anchor(&mut self, buffer: BufferId, range: TextRange) -> Effect {
        debug!(%buffer, start = range.start, end = range.end, "anchor captured");
        self.state = SelectionState {
            stage: Stage::FirstCaptured,
            anchor_range: Some(range),
            anchor_buffer: Some(buffer),
            counterpart_range: None,
        };
        self.candidates.clear();
        self.generation += 1;
        let ticket = QueryTicket(self.generation);
        self.pending = Some(ticket);
        Effect::QueryCandidates(CandidateQuery {
            ticket,
            range,
            from: buffer,
        })
    }

    /// A gesture outside both buffers drops the counterpart first, then everything.
    fn outside(&mut self) -> Vec<Effect> {
        if self.state.counterpart_range.take().is_some() {
            return Vec::new();
        }
        self.reset()
    }

    /// Return to `Stage::None`, voiding any pending query.
    pub fn reset(&mut self) -> Vec<Effect> {
        self.state = SelectionState::default();
        self.candidates.clear();
        self.preview = None;
        self.generation += 1;
        let mut effects = Vec::with_capacity(2);
        if self.pending.take().is_some() {
            effects.push(Effect::CancelQuery);
        }
        effects.push(Effect::ClearNativeSelection);
        effects
    }

    /// Install a candidate response if it answers the current query.
    pub fn apply_candidates<E: Display>(
        &mut self,
        ticket: QueryTicket,
        result: Result<Vec<Span>, E>,
    ) -> CandidateOutcome {
        if !self.is_current(ticket) {
            debug!(?ticket, "dropping stale candidate response");
            return CandidateOutcome::Stale;
        }
        self.pending = None;
        match result {
            Ok(mut spans) => {
                let target = self.state.anchor_buffer.map(|b| b.opposite().direction());
                spans.retain(|s| Some(s.direction) == target);
                sort_spans(&mut spans);
                debug!(count = spans.len(), "candidates applied");
                self.candidates = spans;
                CandidateOutcome::Applied(self.candidates.len())
            }
            Err(e) => {
                warn!(error = %e, "candidate query failed");
                self.candidates.clear();
                CandidateOutcome::Failed
            }
        }
    }

    /// Show a persisted record: its source side becomes the anchor and its
    /// summary side a synthetic candidate. No query is issued.
    pub fn preview(&mut self, record: &LabelRecord) -> Vec<Effect> {
        let effects = self.reset();
        let (anchor_buffer, anchor) = match (record.source_range(), record.summary_range()) {
            (Some(source), _) => (BufferId::Source, source),
            (None, Some(summary)) => (BufferId::Summary, summary),
            (None, None) => return effects,
        };
        let other = anchor_buffer.opposite();
        self.state = SelectionState {
            stage: Stage::FirstCaptured,
            anchor_range: Some(anchor),
            anchor_buffer: Some(anchor_buffer),
            counterpart_range: None,
        };
        self.candidates = record_spans(record, other);
        self.preview = Some(record.record_id.clone());
        effects
    }

    /// Span set rendered over `buffer`.
    ///
    /// The anchor buffer shows the anchor itself; the other buffer shows the
    /// candidates with the manual counterpart carved in over them.
    pub fn spans_for(&self, buffer: BufferId) -> Vec<Span> {
        let (Some(anchor_buffer), Some(anchor)) = (self.state.anchor_buffer, self.state.anchor_range)
        else {
            return Vec::new();
        };
        if buffer == anchor_buffer {
            return vec![Span::user(anchor, buffer.direction())];
        }
        match self.state.counterpart_range {
            Some(counterpart) => merge_with(
                &self.candidates,
                Span::user(counterpart, buffer.direction()),
                StraddlePolicy::Split,
            ),
            None => self.candidates.clone(),
        }
    }

    pub fn render(&self, buffer: BufferId, buffer_len: usize) -> Vec<PartitionSlice> {
        partition(buffer_len, &self.spans_for(buffer))
    }

    /// Build a label request pairing the anchor with `counterpart`.
    ///
    /// `None` submits the anchor alone; the other side is sent as missing.
    pub fn label_request(
        &self,
        counterpart: Option<TextRange>,
        verdict: Verdict,
    ) -> Result<LabelRequest, SubmitError> {
        let (Some(anchor_buffer), Some(anchor)) = (self.state.anchor_buffer, self.state.anchor_range)
        else {
            return Err(SubmitError::NoAnchor);
        };
        Ok(match anchor_buffer {
            BufferId::Source => LabelRequest::new(Some(anchor), counterpart, verdict),
            BufferId::Summary => LabelRequest::new(counterpart, Some(anchor), verdict),
        })
    }

    /// Label request pairing the anchor with the manual counterpart.
    pub fn manual_label_request(&self, verdict: Verdict) -> Result<LabelRequest, SubmitError> {
        let counterpart = self
            .state
            .counterpart_range
            .ok_or(SubmitError::NoCounterpart)?;
        self.label_request(Some(counterpart), verdict)
    }

    /// Settle a label submission: success resets, failure keeps state for a retry.
    pub fn on_submitted<E: Display>(&mut self, result: Result<(), E>) -> Vec<Effect> {
        match result {
            Ok(()) => {
                info!("label submitted");
                self.reset()
            }
            Err(e) => {
                warn!(error = %e, "label submission failed");
                Vec::new()
            }
        }
    }
}

/// Range covered by a rendered counterpart slice, for labelling a candidate.
pub fn slice_range(slice: &PartitionSlice) -> TextRange {
    let start = slice.start.max(0) as usize;
    TextRange::new(start, start + slice.len())
}
