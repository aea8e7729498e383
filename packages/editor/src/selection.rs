//! Selection helpers shared by the clipboard, compound ops and drag.

use crate::document::{Document, NodeId};
use crate::errors::{EditorResult, NotFoundError};
use crate::parent_index::ParentIndex;
use std::collections::HashSet;

/// Position of a node in document order: the id of its topmost ancestor, then
/// its child index at every level below that.
pub fn document_order_key(doc: &Document, index: &ParentIndex, id: &str) -> (NodeId, Vec<usize>) {
    let mut path = Vec::new();
    let mut current = id;
    for parent in index.ancestors(id) {
        let position = doc
            .node(parent)
            .and_then(|p| p.children.iter().position(|c| c == current))
            .unwrap_or(usize::MAX);
        path.push(position);
        current = parent;
    }
    path.reverse();
    (current.to_string(), path)
}

/// Sort `ids` into document order (deduplicated)
pub fn sort_in_document_order(doc: &Document, index: &ParentIndex, ids: &mut Vec<NodeId>) {
    ids.sort_by_cached_key(|id| document_order_key(doc, index, id));
    ids.dedup();
}

/// The selected nodes that have no selected ancestor, in document order.
///
/// Fails with [`NotFoundError::Node`] if any id is stale.
pub fn top_level_roots<I, S>(doc: &Document, index: &ParentIndex, selection: I) -> EditorResult<Vec<NodeId>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let selected: HashSet<String> = selection.into_iter().map(|s| s.as_ref().to_string()).collect();

    if let Some(stale) = selected.iter().find(|id| !doc.contains_node(id)) {
        return Err(NotFoundError::Node(stale.clone()).into());
    }

    let mut roots: Vec<NodeId> = selected
        .iter()
        .filter(|id| !index.ancestors(id).any(|a| selected.contains(a)))
        .cloned()
        .collect();
    sort_in_document_order(doc, index, &mut roots);
    Ok(roots)
}
