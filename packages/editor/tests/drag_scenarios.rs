//! Drag/drop resolution scenarios
//!
//! This tests:
//! - Insertion index from sibling midpoints
//! - Zoom invariance of the resolved target
//! - Every invalid reason the resolver reports
//! - Session lifecycle through drop (applied via the store) and cancel

mod common;

use common::{design, design_bounds, ids};
use draftboard_editor::{
    BoundsMap, DocumentStore, DragSession, DragState, DropContext, Frame, InvalidReason, Node,
    ParentIndex, PatchOp, Point, Rect, Viewport,
};

#[test]
fn test_drag_last_child_between_first_two() {
    let doc = design();
    let index = ParentIndex::build(&doc);
    let bounds = design_bounds();

    // A spans y 0..40 (mid 20), B spans 50..90 (mid 70)
    let preview = DropContext::new(&doc, &index, &bounds).resolve(
        &ids(&["D"]),
        Point::new(100.0, 45.0),
        &Viewport::default(),
    );

    assert_eq!(preview.target_parent_id.as_deref(), Some("C"));
    assert_eq!(preview.insertion_index, 1);
    assert!(preview.is_valid);
    assert_eq!(preview.invalid_reason, None);

    let indicator = preview.indicator.unwrap();
    assert_eq!(indicator.segment.start, Point::new(0.0, 45.0));
    assert_eq!(indicator.segment.end, Point::new(200.0, 45.0));
}

#[test]
fn test_resolution_is_zoom_invariant() {
    let doc = design();
    let index = ParentIndex::build(&doc);
    let bounds = design_bounds();
    let ctx = DropContext::new(&doc, &index, &bounds);

    for pointer in [
        Point::new(100.0, 5.0),
        Point::new(100.0, 45.0),
        Point::new(100.0, 95.0),
        Point::new(100.0, 139.0),
        Point::new(450.0, 100.0),
    ] {
        let near = ctx.resolve(&ids(&["B"]), pointer, &Viewport::with_zoom(1.0));
        let far = ctx.resolve(&ids(&["B"]), pointer, &Viewport::with_zoom(4.0));

        assert_eq!(near.target_parent_id, far.target_parent_id);
        assert_eq!(near.insertion_index, far.insertion_index);
        assert_eq!(near.is_valid, far.is_valid);
        assert_eq!(near.indicator, far.indicator);

        if let (Some(a), Some(b)) = (near.screen_indicator, far.screen_indicator) {
            assert_eq!(b.length(), a.length() * 4.0);
        }
    }
}

#[test]
fn test_drop_into_dragged_container() {
    let mut doc = design();
    let stacked = Node::clone(&doc.nodes["A"]).with_layout("mode", "stack");
    doc.insert_node(stacked);
    let index = ParentIndex::build(&doc);
    let bounds = design_bounds();

    // Pointer over A1, whose nearest auto-layout ancestor is A itself
    let preview = DropContext::new(&doc, &index, &bounds).resolve(
        &ids(&["A"]),
        Point::new(50.0, 10.0),
        &Viewport::default(),
    );
    assert_eq!(preview.target_parent_id.as_deref(), Some("A"));
    assert!(!preview.is_valid);
    assert_eq!(preview.invalid_reason, Some(InvalidReason::DropIntoSelf));
}

#[test]
fn test_absolute_container_climbs_to_stack() {
    let doc = design();
    let index = ParentIndex::build(&doc);
    let bounds = design_bounds();

    // A is absolutely positioned, so hovering A1 resolves to C
    let preview = DropContext::new(&doc, &index, &bounds).resolve(
        &ids(&["D"]),
        Point::new(50.0, 10.0),
        &Viewport::default(),
    );
    assert_eq!(preview.target_parent_id.as_deref(), Some("C"));
    assert_eq!(preview.insertion_index, 0);
    assert!(preview.is_valid);
}

#[test]
fn test_unpatchable_target_rejected() {
    let doc = design();
    let index = ParentIndex::build(&doc);
    let bounds = design_bounds();

    let preview = DropContext::new(&doc, &index, &bounds).resolve(
        &ids(&["B"]),
        Point::new(500.0, 100.0),
        &Viewport::default(),
    );
    assert_eq!(preview.target_parent_id.as_deref(), Some("G1"));
    assert_eq!(
        preview.invalid_reason,
        Some(InvalidReason::NotPatchable("G1".to_string()))
    );
}

#[test]
fn test_frame_without_container() {
    let mut doc = design();
    let label = Node::text("T", "label");
    doc.insert_node(label);
    doc.frames.insert(
        "T".to_string(),
        Frame::new("T", "Label", "T", Rect::new(800.0, 0.0, 100.0, 40.0)),
    );
    let index = ParentIndex::build(&doc);
    let bounds = design_bounds();

    let preview = DropContext::new(&doc, &index, &bounds).resolve(
        &ids(&["B"]),
        Point::new(850.0, 20.0),
        &Viewport::default(),
    );
    assert_eq!(preview.invalid_reason, Some(InvalidReason::NoValidContainer));
    assert_eq!(preview.target_parent_id, None);
}

#[test]
fn test_stale_and_unpatchable_dragged_nodes() {
    let doc = design();
    let index = ParentIndex::build(&doc);
    let bounds = design_bounds();
    let ctx = DropContext::new(&doc, &index, &bounds);

    let stale = ctx.resolve(&ids(&["B", "gone"]), Point::new(100.0, 45.0), &Viewport::default());
    assert_eq!(stale.invalid_reason, Some(InvalidReason::StaleNode("gone".to_string())));

    let expanded = ctx.resolve(&ids(&["G1"]), Point::new(100.0, 45.0), &Viewport::default());
    assert_eq!(
        expanded.invalid_reason,
        Some(InvalidReason::NotPatchable("G1".to_string()))
    );
}

#[test]
fn test_narrow_container_too_small() {
    let doc = design();
    let index = ParentIndex::build(&doc);
    let mut bounds = design_bounds();
    bounds.insert("C", Rect::new(0.0, 0.0, 6.0, 140.0));

    let preview = DropContext::new(&doc, &index, &bounds).resolve(
        &ids(&["D"]),
        Point::new(3.0, 45.0),
        &Viewport::default(),
    );
    assert_eq!(preview.target_parent_id.as_deref(), Some("C"));
    assert_eq!(preview.invalid_reason, Some(InvalidReason::ContainerTooSmall));
}

#[test]
fn test_session_drop_applies_through_store() {
    let mut store = DocumentStore::new(design());
    let bounds = design_bounds();
    let mut session = DragSession::default();

    session.begin(["D"]);
    {
        let doc = store.snapshot();
        let preview = session
            .hover(&doc, store.index(), &bounds, Point::new(100.0, 45.0), &Viewport::with_zoom(2.0))
            .unwrap();
        assert!(preview.is_valid);
    }
    assert_eq!(session.state(), DragState::HoveringValid);

    let doc = store.snapshot();
    let op = session.drop(&doc, store.index()).unwrap().unwrap();
    store.apply_patches(&[op], "Move").unwrap();

    assert_eq!(session.state(), DragState::Dropped);
    assert_eq!(store.document().nodes["C"].children, vec!["A", "D", "B"]);
    assert!(store.check_integrity());
}

#[test]
fn test_multi_node_drop_keeps_order() {
    let mut store = DocumentStore::new(design());
    let bounds = design_bounds();
    let mut session = DragSession::default();

    session.begin(["D", "B"]);
    let doc = store.snapshot();
    session.hover(&doc, store.index(), &bounds, Point::new(100.0, 5.0), &Viewport::default());
    let op = session.drop(&doc, store.index()).unwrap().unwrap();
    assert!(matches!(op, PatchOp::Batch { .. }));

    store.apply_patches(&[op], "Move").unwrap();
    assert_eq!(store.document().nodes["C"].children, vec!["B", "D", "A"]);
}

#[test]
fn test_child_without_bounds_keeps_its_slot() {
    let mut doc = design();
    let column = Node::clone(&doc.nodes["C"]).with_children(["A", "X", "B", "D"]);
    doc.insert_node(column);
    doc.insert_node(Node::text("X", "hidden"));
    let mut store = DocumentStore::new(doc);
    let bounds = design_bounds();
    let mut session = DragSession::default();

    // Between the midpoints of B (70) and D (120)
    session.begin(["A"]);
    let doc = store.snapshot();
    let preview = session
        .hover(&doc, store.index(), &bounds, Point::new(100.0, 100.0), &Viewport::default())
        .cloned()
        .unwrap();
    assert!(preview.is_valid);
    assert_eq!(preview.insertion_index, 2);

    let op = session.drop(&doc, store.index()).unwrap().unwrap();
    store.apply_patches(&[op], "Move").unwrap();
    assert_eq!(store.document().nodes["C"].children, vec!["X", "B", "A", "D"]);
}

#[test]
fn test_drop_into_absolute_frame_root() {
    let mut store = DocumentStore::new(design());
    let bounds = design_bounds();
    let mut session = DragSession::default();

    session.begin(["B"]);
    let doc = store.snapshot();
    let preview = session
        .hover(&doc, store.index(), &bounds, Point::new(410.0, 190.0), &Viewport::default())
        .cloned()
        .unwrap();
    assert_eq!(preview.target_parent_id.as_deref(), Some("G0"));
    assert_eq!(preview.insertion_index, 1);

    let op = session.drop(&doc, store.index()).unwrap().unwrap();
    store.apply_patches(&[op], "Move").unwrap();
    assert_eq!(store.document().nodes["G0"].children, vec!["G1", "B"]);
}

#[test]
fn test_cancel_leaves_document_untouched() {
    let store = DocumentStore::new(design());
    let before = store.snapshot();
    let bounds: BoundsMap = design_bounds();
    let mut session = DragSession::default();

    session.begin(["D"]);
    let doc = store.snapshot();
    session.hover(&doc, store.index(), &bounds, Point::new(100.0, 45.0), &Viewport::default());
    session.cancel();

    assert_eq!(session.state(), DragState::Cancelled);
    assert!(session.preview().is_none());
    assert_eq!(session.drop(&doc, store.index()).unwrap(), None);
    assert_eq!(*store.snapshot(), *before);
    assert_eq!(store.revision(), 0);
}
