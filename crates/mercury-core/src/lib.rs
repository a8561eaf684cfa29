//! Core engine for source/summary span annotation: span merging, buffer
//! partitioning, selection resolution and the capture state machine.

pub mod buffer;
pub mod error;
pub mod history;
pub mod label;
pub mod partition;
pub mod resolver;
pub mod session;
pub mod span;
pub mod task;
pub mod taxonomy;

pub use buffer::{BufferId, buffer_len, slice_text};
pub use error::{ResolveError, SubmitError, TaxonomyError};
pub use label::{
    CandidateSpan, LabelRecord, LabelRequest, NO_SPAN, SelectionRequest, Task, TaskCount, Verdict,
    candidate_set, range_of,
};
pub use partition::{PartitionSlice, partition};
pub use resolver::{Gesture, LabelMarker, MarkedNode, RenderedBuffer, SelectionGesture, resolve};
pub use session::{
    CandidateOutcome, CandidateQuery, Effect, QueryTicket, SelectionMachine, SelectionState, Stage,
    slice_range,
};
pub use span::{Direction, Span, StraddlePolicy, TextRange, USER_SCORE, merge, merge_with};
pub use task::TaskView;
pub use taxonomy::{LabelNode, LabelStates, parse_taxonomy};
