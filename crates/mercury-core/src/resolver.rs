//! Range resolver: maps a raw selection gesture onto logical buffer offsets.
//!
//! A buffer is rendered as one root node holding a run node per partition
//! slice. Every node carries a [`LabelMarker`] naming the logical range it
//! stands for, so a point `(node, offset)` resolves to
//! `offset + marker.label_start`.

use crate::buffer::BufferId;
use crate::error::ResolveError;
use crate::partition::PartitionSlice;

/// Identity of a rendered node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub u32);

/// Half-open logical range `[label_start, label_end)` a node represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LabelMarker {
    pub label_start: usize,
    pub label_end: usize,
}

impl LabelMarker {
    /// Marker for the run rendering `slice`.
    pub fn for_slice(slice: &PartitionSlice) -> Self {
        let label_start = slice.start.max(0) as usize;
        Self {
            label_start,
            label_end: label_start + slice.len(),
        }
    }
}

/// A rendered node that may carry a label marker.
pub trait MarkedNode {
    fn id(&self) -> NodeId;

    /// Buffer this node belongs to, `None` for anything outside both buffers.
    fn buffer(&self) -> Option<BufferId>;

    /// Whether this node is the top-level container of its buffer.
    fn is_buffer_root(&self) -> bool;

    fn marker(&self) -> Option<LabelMarker>;
}

/// A selection gesture: where it started (anchor) and where it ended (focus).
pub trait SelectionGesture {
    type Node: MarkedNode;

    fn anchor(&self) -> (&Self::Node, usize);

    fn focus(&self) -> (&Self::Node, usize);

    fn is_collapsed(&self) -> bool {
        let (a, a_off) = self.anchor();
        let (f, f_off) = self.focus();
        a.id() == f.id() && a_off == f_off
    }

    /// Buffer holding the whole gesture.
    fn buffer(&self) -> Result<BufferId, ResolveError> {
        let (a, _) = self.anchor();
        let (f, _) = self.focus();
        match (a.buffer(), f.buffer()) {
            (Some(x), Some(y)) if x == y => Ok(x),
            (None, None) => Err(ResolveError::OutsideBuffers),
            _ => Err(ResolveError::CrossBuffer),
        }
    }
}

/// Translate a gesture into a `(start, end)` pair of logical offsets.
///
/// The pair is in gesture order; callers normalise it. A gesture whose
/// anchor and focus are the same buffer root selects the whole buffer.
pub fn resolve<G: SelectionGesture>(gesture: &G) -> Result<(usize, usize), ResolveError> {
    let (anchor, anchor_offset) = gesture.anchor();
    let (focus, focus_offset) = gesture.focus();

    let anchor_marker = anchor
        .marker()
        .ok_or(ResolveError::MissingMarker(anchor.id()))?;

    if anchor.id() == focus.id() && anchor.is_buffer_root() {
        return Ok((anchor_marker.label_start, anchor_marker.label_end));
    }

    let focus_marker = focus
        .marker()
        .ok_or(ResolveError::MissingMarker(focus.id()))?;

    Ok((
        anchor_offset + anchor_marker.label_start,
        focus_offset + focus_marker.label_start,
    ))
}

// ── Concrete render tree ──

/// A plain rendered node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedNode {
    pub id: NodeId,
    pub buffer: Option<BufferId>,
    pub root: bool,
    pub marker: Option<LabelMarker>,
}

impl MarkedNode for RenderedNode {
    fn id(&self) -> NodeId {
        self.id
    }

    fn buffer(&self) -> Option<BufferId> {
        self.buffer
    }

    fn is_buffer_root(&self) -> bool {
        self.root
    }

    fn marker(&self) -> Option<LabelMarker> {
        self.marker
    }
}

/// A gesture over [`RenderedNode`]s.
#[derive(Debug, Clone)]
pub struct Gesture {
    pub anchor: RenderedNode,
    pub anchor_offset: usize,
    pub focus: RenderedNode,
    pub focus_offset: usize,
}

impl SelectionGesture for Gesture {
    type Node = RenderedNode;

    fn anchor(&self) -> (&RenderedNode, usize) {
        (&self.anchor, self.anchor_offset)
    }

    fn focus(&self) -> (&RenderedNode, usize) {
        (&self.focus, self.focus_offset)
    }
}

/// One buffer laid out as a root node plus one run node per non-empty slice.
#[derive(Debug, Clone)]
pub struct RenderedBuffer {
    pub root: RenderedNode,
    pub runs: Vec<RenderedNode>,
}

impl RenderedBuffer {
    /// Lay out `buffer` from its partition. Node ids are `buffer`-scoped.
    pub fn layout(buffer: BufferId, buffer_len: usize, slices: &[PartitionSlice]) -> Self {
        let base = match buffer {
            BufferId::Source => 0,
            BufferId::Summary => 1 << 16,
        };
        let root = RenderedNode {
            id: NodeId(base),
            buffer: Some(buffer),
            root: true,
            marker: Some(LabelMarker {
                label_start: 0,
                label_end: buffer_len,
            }),
        };
        let runs = slices
            .iter()
            .filter(|s| !s.is_empty())
            .enumerate()
            .map(|(i, s)| RenderedNode {
                id: NodeId(base + 1 + i as u32),
                buffer: Some(buffer),
                root: false,
                marker: Some(LabelMarker::for_slice(s)),
            })
            .collect();
        Self { root, runs }
    }

    /// Node and in-node offset for a logical offset.
    pub fn point_at(&self, offset: usize) -> Option<(&RenderedNode, usize)> {
        self.runs.iter().find_map(|node| {
            let m = node.marker?;
            (m.label_start <= offset && offset <= m.label_end)
                .then(|| (node, offset - m.label_start))
        })
    }

    /// Gesture dragging from logical `start` to logical `end`.
    pub fn gesture(&self, start: usize, end: usize) -> Option<Gesture> {
        let (anchor, anchor_offset) = self.point_at(start)?;
        let (focus, focus_offset) = self.point_at(end)?;
        Some(Gesture {
            anchor: anchor.clone(),
            anchor_offset,
            focus: focus.clone(),
            focus_offset,
        })
    }

    /// Gesture selecting the whole buffer through its root.
    pub fn select_all(&self) -> Gesture {
        Gesture {
            anchor: self.root.clone(),
            anchor_offset: 0,
            focus: self.root.clone(),
            focus_offset: self.runs.len(),
        }
    }
}

/// A node outside both buffers, such as a toolbar button.
pub fn outside_node(id: u32) -> RenderedNode {
    RenderedNode {
        id: NodeId(id),
        buffer: None,
        root: false,
        marker: None,
    }
}
