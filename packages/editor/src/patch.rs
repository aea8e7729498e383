//! # Patch Operations
//!
//! The closed set of document mutations. Every edit, whether it comes from a
//! pointer gesture, the clipboard, or an automation agent, is expressed as a
//! sequence of these and goes through the same applier.
//!
//! ## Wire format
//!
//! Ops are internally tagged JSON records:
//!
//! ```json
//! [
//!   { "op": "setProp", "id": "n1", "path": "style/fill", "value": "#3366FF" },
//!   { "op": "moveNode", "id": "n1", "newParentId": "n7", "index": -1 }
//! ]
//! ```
//!
//! Insertion indexes are integers, `-1` meaning "append".

use crate::document::{Frame, FrameId, Node, NodeId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;

/// Position in a child list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "i64", into = "i64")]
pub enum InsertIndex {
    At(usize),
    End,
}

impl InsertIndex {
    /// Concrete position in a list of `len`, or `None` if out of bounds
    pub fn resolve(self, len: usize) -> Option<usize> {
        match self {
            InsertIndex::At(i) if i <= len => Some(i),
            InsertIndex::At(_) => None,
            InsertIndex::End => Some(len),
        }
    }

    /// Shift by `n` positions (`End` stays `End`)
    pub fn offset(self, n: usize) -> Self {
        match self {
            InsertIndex::At(i) => InsertIndex::At(i + n),
            InsertIndex::End => InsertIndex::End,
        }
    }
}

impl From<i64> for InsertIndex {
    fn from(v: i64) -> Self {
        if v < 0 {
            InsertIndex::End
        } else {
            InsertIndex::At(v as usize)
        }
    }
}

impl From<InsertIndex> for i64 {
    fn from(index: InsertIndex) -> Self {
        match index {
            InsertIndex::At(i) => i as i64,
            InsertIndex::End => -1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum PatchOp {
    /// Set a node attribute; the last path segment is created if missing
    SetProp { id: NodeId, path: String, value: Value },

    /// Delete an existing node attribute
    DeleteProp { id: NodeId, path: String },

    /// Add a node; its initial children must exist and be unattached
    InsertNode { node: Node },

    /// Remove an unreferenced node
    RemoveNode { id: NodeId },

    /// Swap the stored value of an existing node
    ReplaceNode { node: Node },

    AttachChild {
        parent_id: NodeId,
        child_id: NodeId,
        index: InsertIndex,
    },

    DetachChild { parent_id: NodeId, child_id: NodeId },

    /// Reparent and/or reorder; `index` applies after the node left its old slot
    MoveNode {
        id: NodeId,
        new_parent_id: NodeId,
        index: InsertIndex,
    },

    InsertFrame { frame: Frame },

    /// Remove a frame record; the node subtree is left alone
    RemoveFrame { id: FrameId },

    SetFrameProp { id: FrameId, path: String, value: Value },

    /// Ops applied atomically
    Batch { ops: Vec<PatchOp> },
}

/// What a property op touches, used for coalescing
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PropTarget {
    Node { id: NodeId, path: String },
    Frame { id: FrameId, path: String },
}

impl PatchOp {
    pub fn set_prop(id: impl Into<NodeId>, path: impl Into<String>, value: impl Into<Value>) -> Self {
        PatchOp::SetProp {
            id: id.into(),
            path: path.into(),
            value: value.into(),
        }
    }

    pub fn attach(parent_id: impl Into<NodeId>, child_id: impl Into<NodeId>, index: InsertIndex) -> Self {
        PatchOp::AttachChild {
            parent_id: parent_id.into(),
            child_id: child_id.into(),
            index,
        }
    }

    pub fn detach(parent_id: impl Into<NodeId>, child_id: impl Into<NodeId>) -> Self {
        PatchOp::DetachChild {
            parent_id: parent_id.into(),
            child_id: child_id.into(),
        }
    }

    pub fn move_node(id: impl Into<NodeId>, new_parent_id: impl Into<NodeId>, index: InsertIndex) -> Self {
        PatchOp::MoveNode {
            id: id.into(),
            new_parent_id: new_parent_id.into(),
            index,
        }
    }

    /// Debug name of this op
    pub fn name(&self) -> &'static str {
        match self {
            PatchOp::SetProp { .. } => "setProp",
            PatchOp::DeleteProp { .. } => "deleteProp",
            PatchOp::InsertNode { .. } => "insertNode",
            PatchOp::RemoveNode { .. } => "removeNode",
            PatchOp::ReplaceNode { .. } => "replaceNode",
            PatchOp::AttachChild { .. } => "attachChild",
            PatchOp::DetachChild { .. } => "detachChild",
            PatchOp::MoveNode { .. } => "moveNode",
            PatchOp::InsertFrame { .. } => "insertFrame",
            PatchOp::RemoveFrame { .. } => "removeFrame",
            PatchOp::SetFrameProp { .. } => "setFrameProp",
            PatchOp::Batch { .. } => "batch",
        }
    }

    /// Number of primitive ops, counting through nested batches
    pub fn primitive_count(&self) -> usize {
        match self {
            PatchOp::Batch { ops } => ops.iter().map(PatchOp::primitive_count).sum(),
            _ => 1,
        }
    }
}

/// Property targets of a pure property-edit sequence.
///
/// Returns `None` if any op is structural, if there are no ops at all, or if
/// any op deletes a property. A merged undo entry keeps the inverse of its
/// first edit, which only still applies while later edits leave the property
/// in place.
pub fn prop_targets(ops: &[PatchOp]) -> Option<BTreeSet<PropTarget>> {
    let mut targets = BTreeSet::new();
    if collect_targets(ops, &mut targets) && !targets.is_empty() {
        Some(targets)
    } else {
        None
    }
}

fn collect_targets(ops: &[PatchOp], targets: &mut BTreeSet<PropTarget>) -> bool {
    for op in ops {
        let target = match op {
            PatchOp::SetProp { id, path, .. } => PropTarget::Node {
                id: id.clone(),
                path: path.clone(),
            },
            PatchOp::SetFrameProp { id, path, .. } => PropTarget::Frame {
                id: id.clone(),
                path: path.clone(),
            },
            PatchOp::Batch { ops } => {
                if !collect_targets(ops, targets) {
                    return false;
                }
                continue;
            }
            _ => return false,
        };
        targets.insert(target);
    }
    true
}
