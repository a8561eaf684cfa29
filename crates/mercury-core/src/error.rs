use thiserror::Error;

use crate::resolver::NodeId;

/// A gesture that cannot be mapped to logical offsets. Callers ignore the
/// gesture; no state changes.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("node {0:?} carries no label marker")]
    MissingMarker(NodeId),

    #[error("selection crosses a buffer boundary")]
    CrossBuffer,

    #[error("selection lies outside both buffers")]
    OutsideBuffers,

    #[error("selection is collapsed")]
    Collapsed,
}

/// A label request asked for before the session holds the ranges it needs.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SubmitError {
    #[error("no anchor range has been captured")]
    NoAnchor,

    #[error("no counterpart range has been chosen")]
    NoCounterpart,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TaxonomyError {
    #[error("unsupported label entry: {0}")]
    Unsupported(String),
}
