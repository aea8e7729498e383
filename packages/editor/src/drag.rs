//! # Drag/Drop Resolver
//!
//! Turns a pointer position during a drag into a [`DropPreview`]: which
//! container would receive the dragged nodes, at which child index, and where
//! to draw the insertion indicator.
//!
//! ## Coordinates
//!
//! All resolver math happens in world space. The viewport is only used to
//! convert the finished indicator to screen space for the overlay, so the
//! resolved target and index never depend on zoom.
//!
//! ## Cost
//!
//! Hit-testing walks one root-to-leaf path and index computation looks at the
//! children of one container. Nothing scans the whole document.
//!
//! ## Session states
//!
//! ```text
//! Idle ─begin→ Dragging ─hover→ HoveringValid ⇄ HoveringInvalid
//!                  │                 │                 │
//!                  └──── cancel ─────┴───→ Cancelled   │
//!                                    └─drop→ Dropped   └─drop→ Cancelled
//! ```

use crate::compound::move_nodes;
use crate::config::EditorConfig;
use crate::document::{Document, Node, NodeId};
use crate::errors::EditorResult;
use crate::geometry::{Axis, Point, Rect, Segment, Viewport};
use crate::parent_index::ParentIndex;
use crate::patch::{InsertIndex, PatchOp};
use std::borrow::Cow;
use std::collections::{HashMap, HashSet};
use thiserror::Error;
use tracing::debug;

/// World-space layout bounds, supplied by whatever lays the document out
pub trait NodeBounds {
    fn bounds(&self, id: &str) -> Option<Rect>;
}

/// [`NodeBounds`] backed by a map
#[derive(Debug, Clone, Default)]
pub struct BoundsMap {
    rects: HashMap<NodeId, Rect>,
}

impl BoundsMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: impl Into<NodeId>, rect: Rect) {
        self.rects.insert(id.into(), rect);
    }

    pub fn with(mut self, id: impl Into<NodeId>, rect: Rect) -> Self {
        self.insert(id, rect);
        self
    }
}

impl NodeBounds for BoundsMap {
    fn bounds(&self, id: &str) -> Option<Rect> {
        self.rects.get(id).copied()
    }
}

impl<S: Into<NodeId>> FromIterator<(S, Rect)> for BoundsMap {
    fn from_iter<T: IntoIterator<Item = (S, Rect)>>(iter: T) -> Self {
        Self {
            rects: iter.into_iter().map(|(id, rect)| (id.into(), rect)).collect(),
        }
    }
}

/// Side of one cell of the frame grid, in world units
const FRAME_CELL: f64 = 1024.0;

/// Frame placement for hit-testing, bucketed on a coarse world grid so a
/// lookup only looks at frames near the pointer.
///
/// Built from one document snapshot; a drag session keeps it for the whole
/// gesture.
#[derive(Debug, Clone, Default)]
pub struct FrameIndex {
    /// (outline, root node) in document frame order
    frames: Vec<(Rect, NodeId)>,
    cells: HashMap<(i64, i64), Vec<usize>>,
    roots: HashSet<NodeId>,
}

impl FrameIndex {
    pub fn build<B: NodeBounds>(doc: &Document, bounds: &B) -> Self {
        let mut index = Self::default();
        for frame in doc.frames.values() {
            let rect = bounds
                .bounds(&frame.root_node_id)
                .unwrap_or_else(|| frame.bounds());
            let slot = index.frames.len();
            for cell in cells_covering(rect) {
                index.cells.entry(cell).or_default().push(slot);
            }
            index.frames.push((rect, frame.root_node_id.clone()));
            index.roots.insert(frame.root_node_id.clone());
        }
        index
    }

    pub fn is_frame_root(&self, id: &str) -> bool {
        self.roots.contains(id)
    }

    /// Root of the first frame containing `p`
    pub fn root_at(&self, p: Point) -> Option<&str> {
        self.cells
            .get(&cell_of(p))?
            .iter()
            .filter_map(|&slot| self.frames.get(slot))
            .find(|(rect, _)| rect.contains(p))
            .map(|(_, root)| root.as_str())
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

fn cell_of(p: Point) -> (i64, i64) {
    (
        (p.x / FRAME_CELL).floor() as i64,
        (p.y / FRAME_CELL).floor() as i64,
    )
}

fn cells_covering(rect: Rect) -> impl Iterator<Item = (i64, i64)> {
    let (x0, y0) = cell_of(Point::new(rect.x, rect.y));
    let (x1, y1) = cell_of(Point::new(rect.right(), rect.bottom()));
    (x0..=x1).flat_map(move |x| (y0..=y1).map(move |y| (x, y)))
}

/// Why a hovered position cannot accept the drop
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InvalidReason {
    #[error("nothing is being dragged")]
    NothingDragged,

    #[error("dragged node {0} no longer exists")]
    StaleNode(NodeId),

    #[error("{0} is a frame root and cannot be moved")]
    FrameRoot(NodeId),

    #[error("{0} is not patchable")]
    NotPatchable(NodeId),

    #[error("pointer is outside every frame")]
    OutsideFrames,

    #[error("no valid container")]
    NoValidContainer,

    #[error("cannot drop into a dragged node or its descendants")]
    DropIntoSelf,

    #[error("container too small")]
    ContainerTooSmall,
}

/// Insertion line inside the target container, in world space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Indicator {
    pub segment: Segment,

    /// Main axis of the container; the segment runs along the cross axis
    pub axis: Axis,
}

impl Indicator {
    pub fn length(&self) -> f64 {
        self.segment.length()
    }

    pub fn to_screen(&self, viewport: &Viewport) -> Segment {
        viewport.segment_to_screen(self.segment)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DropPreview {
    pub target_parent_id: Option<NodeId>,
    pub insertion_index: usize,
    pub is_valid: bool,
    pub invalid_reason: Option<InvalidReason>,
    pub indicator: Option<Indicator>,

    /// `indicator` in screen pixels
    pub screen_indicator: Option<Segment>,
}

impl DropPreview {
    fn invalid(reason: InvalidReason) -> Self {
        Self {
            target_parent_id: None,
            insertion_index: 0,
            is_valid: false,
            invalid_reason: Some(reason),
            indicator: None,
            screen_indicator: None,
        }
    }
}

/// Inputs that stay fixed for one pointer event
pub struct DropContext<'a, B: NodeBounds> {
    pub doc: &'a Document,
    pub index: &'a ParentIndex,
    pub bounds: &'a B,
    pub min_indicator_length: f64,
    frames: Cow<'a, FrameIndex>,
}

impl<'a, B: NodeBounds> DropContext<'a, B> {
    /// Context with its own [`FrameIndex`]
    pub fn new(doc: &'a Document, index: &'a ParentIndex, bounds: &'a B) -> Self {
        Self::with_frames(doc, index, bounds, Cow::Owned(FrameIndex::build(doc, bounds)))
    }

    /// Context reusing a [`FrameIndex`] built earlier for the same snapshot
    pub fn with_frame_index(
        doc: &'a Document,
        index: &'a ParentIndex,
        bounds: &'a B,
        frames: &'a FrameIndex,
    ) -> Self {
        Self::with_frames(doc, index, bounds, Cow::Borrowed(frames))
    }

    fn with_frames(
        doc: &'a Document,
        index: &'a ParentIndex,
        bounds: &'a B,
        frames: Cow<'a, FrameIndex>,
    ) -> Self {
        Self {
            doc,
            index,
            bounds,
            min_indicator_length: EditorConfig::default().min_indicator_length,
            frames,
        }
    }

    pub fn with_min_indicator_length(mut self, length: f64) -> Self {
        self.min_indicator_length = length;
        self
    }

    /// Resolve a drop of `dragged` at world position `pointer`
    pub fn resolve(&self, dragged: &[NodeId], pointer: Point, viewport: &Viewport) -> DropPreview {
        let mut preview = match self.check_dragged(dragged) {
            Err(reason) => DropPreview::invalid(reason),
            Ok(dragged) => self.resolve_target(&dragged, pointer),
        };
        preview.screen_indicator = preview.indicator.map(|i| i.to_screen(viewport));
        preview
    }

    fn check_dragged<'d>(&self, dragged: &'d [NodeId]) -> Result<HashSet<&'d str>, InvalidReason> {
        if dragged.is_empty() {
            return Err(InvalidReason::NothingDragged);
        }
        for id in dragged {
            let node = self
                .doc
                .node(id)
                .ok_or_else(|| InvalidReason::StaleNode(id.clone()))?;
            if self.frames.is_frame_root(id) {
                return Err(InvalidReason::FrameRoot(id.clone()));
            }
            if !node.is_patchable() {
                return Err(InvalidReason::NotPatchable(id.clone()));
            }
        }
        Ok(dragged.iter().map(String::as_str).collect())
    }

    fn resolve_target(&self, dragged: &HashSet<&str>, pointer: Point) -> DropPreview {
        let Some((frame_root, hit)) = self.hit_test(pointer) else {
            return DropPreview::invalid(InvalidReason::OutsideFrames);
        };
        let Some(container) = self.container_for(&frame_root, &hit) else {
            return DropPreview::invalid(InvalidReason::NoValidContainer);
        };
        let Some(container_bounds) = self.bounds.bounds(&container.id) else {
            return DropPreview::invalid(InvalidReason::NoValidContainer);
        };

        let axis = container.direction();
        // (position among the non-dragged children, bounds) of every laid-out sibling
        let laid_out: Vec<(usize, Rect)> = container
            .children
            .iter()
            .filter(|c| !dragged.contains(c.as_str()))
            .enumerate()
            .filter_map(|(position, c)| self.bounds.bounds(c).map(|rect| (position, rect)))
            .collect();
        let siblings: Vec<Rect> = laid_out.iter().map(|(_, rect)| *rect).collect();
        let preceding = siblings
            .iter()
            .filter(|r| r.mid(axis) < axis.of(pointer))
            .count();
        let indicator = indicator_for(container, container_bounds, &siblings, preceding);

        // Siblings without bounds still occupy child slots
        let insertion_index = match (laid_out.get(preceding), laid_out.last()) {
            (Some((next, _)), _) => *next,
            (None, Some((last, _))) => last + 1,
            (None, None) => container
                .children
                .iter()
                .filter(|c| !dragged.contains(c.as_str()))
                .count(),
        };

        let invalid_reason = if dragged.contains(container.id.as_str())
            || self.index.ancestors(&container.id).any(|a| dragged.contains(a))
        {
            Some(InvalidReason::DropIntoSelf)
        } else if !container.is_patchable() {
            Some(InvalidReason::NotPatchable(container.id.clone()))
        } else if indicator.length() < self.min_indicator_length {
            Some(InvalidReason::ContainerTooSmall)
        } else {
            None
        };

        DropPreview {
            target_parent_id: Some(container.id.clone()),
            insertion_index,
            is_valid: invalid_reason.is_none(),
            invalid_reason,
            indicator: Some(indicator),
            screen_indicator: None,
        }
    }

    /// Frame root and deepest node under `pointer`
    fn hit_test(&self, pointer: Point) -> Option<(NodeId, NodeId)> {
        let root = self.frames.root_at(pointer)?;

        let mut current = self.doc.node(root)?;
        for _ in 0..self.doc.nodes.len() {
            // Later children paint on top
            let hit = current.children.iter().rev().find_map(|c| {
                let node = self.doc.node(c)?;
                self.bounds.bounds(c)?.contains(pointer).then_some(node)
            });
            match hit {
                Some(child) => current = child,
                None => break,
            }
        }

        Some((root.to_string(), current.id.clone()))
    }

    /// First auto-layout container at or above `hit`, else the frame root
    fn container_for(&self, frame_root: &str, hit: &str) -> Option<&'a Node> {
        let chain = std::iter::once(hit).chain(self.index.ancestors(hit));
        for id in chain {
            let node = self.doc.node(id)?;
            if node.is_auto_layout() {
                return Some(node);
            }
            if id == frame_root {
                break;
            }
        }
        self.doc.node(frame_root).filter(|n| n.is_container())
    }
}

/// Indicator between the siblings around `insertion_index`, clipped to the
/// container's content box
fn indicator_for(container: &Node, bounds: Rect, siblings: &[Rect], insertion_index: usize) -> Indicator {
    let axis = container.direction();
    let content = bounds.inset(container.padding());
    let half_gap = container.gap() / 2.0;

    let position = match (
        insertion_index.checked_sub(1).and_then(|i| siblings.get(i)),
        siblings.get(insertion_index),
    ) {
        (None, None) => content.start(axis),
        (None, Some(next)) => next.start(axis) - half_gap,
        (Some(prev), None) => prev.end(axis) + half_gap,
        (Some(prev), Some(next)) => (prev.end(axis) + next.start(axis)) / 2.0,
    };
    let position = position.clamp(content.start(axis), content.end(axis));

    let cross = axis.cross();
    Indicator {
        segment: Segment {
            start: axis.point(position, content.start(cross)),
            end: axis.point(position, content.end(cross)),
        },
        axis,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragState {
    Idle,
    Dragging,
    HoveringValid,
    HoveringInvalid,
    Dropped,
    Cancelled,
}

impl DragState {
    pub fn is_active(self) -> bool {
        matches!(
            self,
            DragState::Dragging | DragState::HoveringValid | DragState::HoveringInvalid
        )
    }
}

/// One drag gesture. Holds no document state, so cancelling is a plain discard.
#[derive(Debug, Clone)]
pub struct DragSession {
    state: DragState,
    dragged: Vec<NodeId>,
    preview: Option<DropPreview>,
    min_indicator_length: f64,
    /// Built on the first hover of a gesture
    frames: Option<FrameIndex>,
}

impl DragSession {
    pub fn new(config: &EditorConfig) -> Self {
        Self {
            state: DragState::Idle,
            dragged: Vec::new(),
            preview: None,
            min_indicator_length: config.min_indicator_length,
            frames: None,
        }
    }

    pub fn state(&self) -> DragState {
        self.state
    }

    pub fn dragged(&self) -> &[NodeId] {
        &self.dragged
    }

    pub fn preview(&self) -> Option<&DropPreview> {
        self.preview.as_ref()
    }

    fn transition(&mut self, to: DragState) {
        if self.state != to {
            debug!(from = ?self.state, to = ?to, "Drag state");
        }
        self.state = to;
    }

    /// Start dragging `ids`. Any previous gesture is discarded.
    pub fn begin(&mut self, ids: impl IntoIterator<Item = impl Into<NodeId>>) {
        self.dragged = ids.into_iter().map(Into::into).collect();
        self.preview = None;
        self.frames = None;
        self.state = DragState::Idle;
        self.transition(DragState::Dragging);
    }

    /// Re-resolve for a pointer move. Ignored unless a drag is in progress.
    pub fn hover<B: NodeBounds>(
        &mut self,
        doc: &Document,
        index: &ParentIndex,
        bounds: &B,
        pointer: Point,
        viewport: &Viewport,
    ) -> Option<&DropPreview> {
        if !self.state.is_active() {
            return None;
        }

        let frames = self
            .frames
            .get_or_insert_with(|| FrameIndex::build(doc, bounds));
        let preview = DropContext::with_frame_index(doc, index, bounds, frames)
            .with_min_indicator_length(self.min_indicator_length)
            .resolve(&self.dragged, pointer, viewport);
        self.transition(if preview.is_valid {
            DragState::HoveringValid
        } else {
            DragState::HoveringInvalid
        });
        self.preview = Some(preview);
        self.preview.as_ref()
    }

    /// Finish the gesture. Returns the patch to apply if the last hover was
    /// valid; an invalid drop ends as cancelled with no patch.
    pub fn drop(&mut self, doc: &Document, index: &ParentIndex) -> EditorResult<Option<PatchOp>> {
        if !self.state.is_active() {
            return Ok(None);
        }

        let target = match (&self.preview, self.state) {
            (Some(preview), DragState::HoveringValid) => preview
                .target_parent_id
                .clone()
                .map(|parent| (parent, preview.insertion_index)),
            _ => None,
        };
        let Some((parent, position)) = target else {
            self.transition(DragState::Cancelled);
            return Ok(None);
        };

        match move_nodes(doc, index, &self.dragged, &parent, InsertIndex::At(position)) {
            Ok(op) => {
                self.transition(DragState::Dropped);
                Ok(Some(op))
            }
            Err(err) => {
                self.transition(DragState::Cancelled);
                Err(err)
            }
        }
    }

    /// Abandon the gesture
    pub fn cancel(&mut self) {
        if self.state.is_active() {
            self.transition(DragState::Cancelled);
        }
        self.preview = None;
    }

    pub fn reset(&mut self) {
        self.dragged.clear();
        self.preview = None;
        self.frames = None;
        self.transition(DragState::Idle);
    }
}

impl Default for DragSession {
    fn default() -> Self {
        Self::new(&EditorConfig::default())
    }
}
