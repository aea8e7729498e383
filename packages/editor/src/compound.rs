//! # Compound Operations
//!
//! Builders that turn one user intent into a single `Batch`, so the whole
//! intent commits (and undoes) as one step. Builders only read the document;
//! nothing here mutates. Validation is left to the applier.

use crate::document::{Document, Frame, Node, NodeId};
use crate::errors::{EditorResult, NotFoundError, ValidationError};
use crate::parent_index::ParentIndex;
use crate::patch::{InsertIndex, PatchOp};
use crate::selection::{sort_in_document_order, top_level_roots};

/// Remove a frame together with every node in its subtree.
///
/// Edges are detached bottom-up, so every `RemoveNode` targets a node that
/// nothing references any more.
pub fn delete_frame_and_subtree(doc: &Document, frame_id: &str) -> EditorResult<PatchOp> {
    let frame = doc
        .frame(frame_id)
        .ok_or_else(|| NotFoundError::Frame(frame_id.to_string()))?;

    let mut ops = remove_subtree_below(doc, &frame.root_node_id);
    ops.push(PatchOp::RemoveFrame { id: frame.id.clone() });
    ops.push(PatchOp::RemoveNode {
        id: frame.root_node_id.clone(),
    });

    Ok(PatchOp::Batch { ops })
}

/// Detach and remove every descendant of `root`, children before parents
fn remove_subtree_below(doc: &Document, root: &str) -> Vec<PatchOp> {
    let mut ops = Vec::new();
    for (parent, child) in doc.subtree_edges_bottom_up(root) {
        ops.push(PatchOp::detach(parent, child.clone()));
        ops.push(PatchOp::RemoveNode { id: child });
    }
    ops
}

/// Delete the selected nodes and their subtrees. Selecting a frame root
/// deletes the whole frame.
pub fn delete_nodes<I, S>(doc: &Document, index: &ParentIndex, selection: I) -> EditorResult<PatchOp>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let roots = top_level_roots(doc, index, selection)?;
    if roots.is_empty() {
        return Err(NotFoundError::EmptySelection.into());
    }

    let mut ops = Vec::new();
    for root in &roots {
        if let Some(frame) = doc.frame_for_root(root) {
            ops.push(delete_frame_and_subtree(doc, &frame.id)?);
            continue;
        }

        ops.extend(remove_subtree_below(doc, root));
        if let Some(parent) = index.parent_of(root) {
            ops.push(PatchOp::detach(parent, root.clone()));
        }
        ops.push(PatchOp::RemoveNode { id: root.clone() });
    }

    Ok(PatchOp::Batch { ops })
}

/// Insert `root` and a frame anchored on it
pub fn create_frame(frame: Frame, root: Node) -> EditorResult<PatchOp> {
    if frame.root_node_id != root.id {
        return Err(ValidationError::InvalidValue {
            path: "rootNodeId".to_string(),
            reason: format!("frame root {} does not match node {}", frame.root_node_id, root.id),
        }
        .into());
    }

    Ok(PatchOp::Batch {
        ops: vec![PatchOp::InsertNode { node: root }, PatchOp::InsertFrame { frame }],
    })
}

/// Move the top-level roots of `ids` under `new_parent`, keeping their
/// document order, starting at `index`.
///
/// A single node becomes one `MoveNode`; several become a detach pass followed
/// by an attach pass, so `index` refers to the parent's children once all
/// moved nodes have left.
pub fn move_nodes<I, S>(
    doc: &Document,
    parents: &ParentIndex,
    ids: I,
    new_parent: &str,
    index: InsertIndex,
) -> EditorResult<PatchOp>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut roots = top_level_roots(doc, parents, ids)?;
    if roots.is_empty() {
        return Err(NotFoundError::EmptySelection.into());
    }
    sort_in_document_order(doc, parents, &mut roots);

    if let [only] = roots.as_slice() {
        return Ok(PatchOp::move_node(only.clone(), new_parent, index));
    }

    let mut ops: Vec<PatchOp> = roots
        .iter()
        .filter_map(|id| parents.parent_of(id).map(|p| PatchOp::detach(p, id.clone())))
        .collect();
    ops.extend(
        roots
            .iter()
            .enumerate()
            .map(|(i, id)| PatchOp::attach(new_parent, id.clone(), index.offset(i))),
    );

    Ok(PatchOp::Batch { ops })
}

/// Ids `op` would remove, for callers that need to prune their selection
pub fn removed_ids(op: &PatchOp) -> Vec<NodeId> {
    match op {
        PatchOp::RemoveNode { id } => vec![id.clone()],
        PatchOp::Batch { ops } => ops.iter().flat_map(removed_ids).collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::applier::{apply_ops, apply_patch};
    use crate::geometry::Rect;
    use crate::store::integrity_issues;

    fn doc() -> Document {
        let mut doc = Document::new("doc");
        for node in [
            Node::container("root").with_children(["a", "b", "c"]),
            Node::container("a").with_children(["a1", "a2"]),
            Node::text("a1", "x").expanded(),
            Node::text("a2", "y"),
            Node::text("b", "z"),
            Node::text("c", "w"),
            Node::container("other"),
        ] {
            doc.insert_node(node);
        }
        doc.frames.insert(
            "f".to_string(),
            Frame::new("f", "Frame", "root", Rect::new(0.0, 0.0, 100.0, 100.0)),
        );
        doc.frames.insert(
            "g".to_string(),
            Frame::new("g", "Other", "other", Rect::new(200.0, 0.0, 100.0, 100.0)),
        );
        doc
    }

    #[test]
    fn test_delete_frame_removes_everything() {
        let doc = doc();
        let op = delete_frame_and_subtree(&doc, "f").unwrap();
        let after = apply_patch(&doc, &op).unwrap();

        for id in ["root", "a", "a1", "a2", "b", "c"] {
            assert!(!after.nodes.contains_key(id), "{} survived", id);
        }
        assert!(!after.frames.contains_key("f"));
        assert!(integrity_issues(&after, &ParentIndex::build(&after)).is_empty());
    }

    #[test]
    fn test_delete_missing_frame() {
        let err = delete_frame_and_subtree(&doc(), "nope").unwrap_err();
        assert_eq!(err.kind(), crate::errors::ErrorKind::NotFound);
    }

    #[test]
    fn test_delete_nodes_uses_top_level_roots() {
        let doc = doc();
        let index = ParentIndex::build(&doc);
        let op = delete_nodes(&doc, &index, ["a2", "a", "c"]).unwrap();
        let applied = apply_ops(&doc, &index, std::slice::from_ref(&op)).unwrap();

        assert_eq!(applied.document.nodes["root"].children, vec!["b"]);
        assert!(!applied.document.nodes.contains_key("a1"));

        let mut removed = removed_ids(&op);
        removed.sort();
        assert_eq!(removed, vec!["a", "a1", "a2", "c"]);
    }

    #[test]
    fn test_delete_nodes_frame_root_deletes_frame() {
        let doc = doc();
        let index = ParentIndex::build(&doc);
        let op = delete_nodes(&doc, &index, ["other"]).unwrap();
        let after = apply_patch(&doc, &op).unwrap();
        assert!(!after.frames.contains_key("g"));
        assert!(!after.nodes.contains_key("other"));
    }

    #[test]
    fn test_create_frame_requires_matching_root() {
        let frame = Frame::new("h", "New", "n", Rect::new(0.0, 0.0, 10.0, 10.0));
        assert!(create_frame(frame.clone(), Node::container("m")).is_err());

        let op = create_frame(frame, Node::container("n")).unwrap();
        let after = apply_patch(&doc(), &op).unwrap();
        assert_eq!(after.frames["h"].root_node_id, "n");
    }

    #[test]
    fn test_move_nodes_keeps_document_order() {
        let doc = doc();
        let index = ParentIndex::build(&doc);
        let op = move_nodes(&doc, &index, ["c", "b"], "a", InsertIndex::At(1)).unwrap();
        let after = apply_patch(&doc, &op).unwrap();
        assert_eq!(after.nodes["a"].children, vec!["a1", "b", "c", "a2"]);
        assert_eq!(after.nodes["root"].children, vec!["a"]);
    }

    #[test]
    fn test_move_single_node_is_move_op() {
        let doc = doc();
        let index = ParentIndex::build(&doc);
        let op = move_nodes(&doc, &index, ["b"], "root", InsertIndex::End).unwrap();
        assert!(matches!(op, PatchOp::MoveNode { .. }));
    }
}
