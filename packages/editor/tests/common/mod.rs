//! Shared fixtures for the editor integration tests

#![allow(dead_code)]

use draftboard_editor::{BoundsMap, Document, Frame, Node, Rect};

/// Frame `F` whose root `C` is a vertical stack (gap 10) of `A`, `B`, `D`.
///
/// `A` is itself a container holding `A1` and `A2`. Frame `G` holds a single
/// absolutely positioned container `G0` with an expanded (unpatchable)
/// stack `G1`.
pub fn design() -> Document {
    let mut doc = Document::new("design-doc");
    for node in [
        Node::container("C")
            .with_name("Column")
            .with_layout("mode", "stack")
            .with_layout("direction", "vertical")
            .with_layout("gap", 10)
            .with_children(["A", "B", "D"]),
        Node::container("A")
            .with_layout("x", 0)
            .with_layout("y", 0)
            .with_children(["A1", "A2"]),
        Node::text("A1", "first").with_layout("x", 4).with_layout("y", 4),
        Node::text("A2", "second").with_layout("x", 4).with_layout("y", 20),
        Node::text("B", "bee").with_style("fill", "#3366FF"),
        Node::text("D", "dee"),
        Node::container("G0").with_children(["G1"]),
        Node::container("G1").with_layout("mode", "stack").expanded(),
    ] {
        doc.insert_node(node);
    }

    doc.frames.insert(
        "F".to_string(),
        Frame::new("F", "Home", "C", Rect::new(0.0, 0.0, 200.0, 140.0)),
    );
    doc.frames.insert(
        "G".to_string(),
        Frame::new("G", "Other", "G0", Rect::new(400.0, 0.0, 200.0, 200.0)),
    );
    doc
}

/// World-space layout for [`design`]
pub fn design_bounds() -> BoundsMap {
    BoundsMap::new()
        .with("C", Rect::new(0.0, 0.0, 200.0, 140.0))
        .with("A", Rect::new(0.0, 0.0, 200.0, 40.0))
        .with("A1", Rect::new(4.0, 4.0, 100.0, 12.0))
        .with("A2", Rect::new(4.0, 20.0, 100.0, 12.0))
        .with("B", Rect::new(0.0, 50.0, 200.0, 40.0))
        .with("D", Rect::new(0.0, 100.0, 200.0, 40.0))
        .with("G0", Rect::new(400.0, 0.0, 200.0, 200.0))
        .with("G1", Rect::new(420.0, 20.0, 160.0, 160.0))
}

pub fn ids(v: &[&str]) -> Vec<String> {
    v.iter().map(|s| s.to_string()).collect()
}
