//! # Patch Applier
//!
//! Applies patch ops to a document without touching the input.
//!
//! ## Semantics
//!
//! - Every op validates fully before it mutates anything.
//! - A sequence of ops is applied against one working copy. The first failure
//!   discards the working copy, so callers either get a complete new document
//!   or an error and their original value.
//! - For every primitive op applied, the applier records the op that reverses
//!   it. The returned inverse is the reverse of that list, so applying it to the
//!   result restores the input exactly.
//! - The working copy shares unchanged nodes with the input; only nodes an op
//!   writes are copied.
//! - Parent-index changes are recorded as an [`IndexDelta`] against the
//!   caller's committed index instead of rebuilding it.

use crate::document::{Document, Frame, Node};
use crate::errors::{EditorResult, StructuralError, ValidationError};
use crate::parent_index::{IndexDelta, IndexOverlay, ParentIndex};
use crate::patch::{InsertIndex, PatchOp};
use crate::path::{self, PropPath};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

/// Outcome of a successful application
#[derive(Debug, Clone)]
pub struct Applied {
    pub document: Document,

    /// Ops that undo this application, in the order they must run
    pub inverse: Vec<PatchOp>,

    /// Number of primitive ops applied
    pub applied: usize,

    pub(crate) index_delta: IndexDelta,
}

/// Apply one op to `doc`, returning the new document.
///
/// Builds a fresh parent index; use [`apply_ops`] when one is at hand.
pub fn apply_patch(doc: &Document, op: &PatchOp) -> EditorResult<Document> {
    let index = ParentIndex::build(doc);
    apply_ops(doc, &index, std::slice::from_ref(op)).map(|applied| applied.document)
}

/// Apply `ops` atomically against `doc`, whose parent index is `index`.
pub fn apply_ops(doc: &Document, index: &ParentIndex, ops: &[PatchOp]) -> EditorResult<Applied> {
    let mut working = Working {
        doc: doc.clone(),
        index: IndexOverlay::new(index),
        inverse: Vec::new(),
    };

    for (op_index, op) in ops.iter().enumerate() {
        if let Err(err) = working.apply(op) {
            debug!(op_index, op = op.name(), error = %err, "Patch rejected, batch discarded");
            return Err(err);
        }
    }

    let Working {
        doc,
        index,
        mut inverse,
    } = working;
    inverse.reverse();

    Ok(Applied {
        document: doc,
        applied: inverse.len(),
        inverse,
        index_delta: index.into_delta(),
    })
}

struct Working<'a> {
    doc: Document,
    index: IndexOverlay<'a>,
    /// Inverses in application order; reversed at the end
    inverse: Vec<PatchOp>,
}

impl Working<'_> {
    fn apply(&mut self, op: &PatchOp) -> EditorResult<()> {
        match op {
            PatchOp::SetProp { id, path, value } => self.set_prop(id, path, value),
            PatchOp::DeleteProp { id, path } => self.delete_prop(id, path),
            PatchOp::InsertNode { node } => self.insert_node(node),
            PatchOp::RemoveNode { id } => self.remove_node(id),
            PatchOp::ReplaceNode { node } => self.replace_node(node),
            PatchOp::AttachChild {
                parent_id,
                child_id,
                index,
            } => self.attach_child(parent_id, child_id, *index),
            PatchOp::DetachChild { parent_id, child_id } => self.detach_child(parent_id, child_id),
            PatchOp::MoveNode {
                id,
                new_parent_id,
                index,
            } => self.move_node(id, new_parent_id, *index),
            PatchOp::InsertFrame { frame } => self.insert_frame(frame),
            PatchOp::RemoveFrame { id } => self.remove_frame(id),
            PatchOp::SetFrameProp { id, path, value } => self.set_frame_prop(id, path, value),
            PatchOp::Batch { ops } => {
                for op in ops {
                    self.apply(op)?;
                }
                Ok(())
            }
        }
    }

    fn node(&self, id: &str) -> Result<&Node, ValidationError> {
        self.doc
            .node(id)
            .ok_or_else(|| ValidationError::NodeNotFound(id.to_string()))
    }

    fn patchable(&self, id: &str) -> Result<&Node, ValidationError> {
        let node = self.node(id)?;
        if node.is_patchable() {
            Ok(node)
        } else {
            Err(ValidationError::NotPatchable(id.to_string()))
        }
    }

    fn patchable_mut(&mut self, id: &str) -> Result<&mut Node, ValidationError> {
        self.patchable(id)?;
        self.doc
            .node_mut(id)
            .ok_or_else(|| ValidationError::NodeNotFound(id.to_string()))
    }

    fn frame_rooted_at(&self, node_id: &str) -> Option<&Frame> {
        self.doc.frame_for_root(node_id)
    }

    /// A node that is about to gain `parent_id` as its parent
    fn check_attachable(&self, parent_id: &str, child_id: &str) -> EditorResult<()> {
        self.node(child_id)?;

        if child_id == parent_id || self.index.is_ancestor(child_id, parent_id) {
            return Err(StructuralError::CycleDetected {
                node_id: child_id.to_string(),
                parent_id: parent_id.to_string(),
            }
            .into());
        }
        if let Some(existing) = self.index.parent_of(child_id) {
            return Err(StructuralError::AlreadyAttached {
                child_id: child_id.to_string(),
                parent_id: existing.to_string(),
            }
            .into());
        }
        if let Some(frame) = self.frame_rooted_at(child_id) {
            return Err(StructuralError::FrameRoot {
                node_id: child_id.to_string(),
                frame_id: frame.id.clone(),
            }
            .into());
        }
        Ok(())
    }

    fn set_prop(&mut self, id: &str, path: &str, value: &Value) -> EditorResult<()> {
        let prop_path = PropPath::parse(path)?;
        let node = self.patchable_mut(id)?;
        let previous = prop_path.set(node, path, value.clone())?;

        self.inverse.push(match previous {
            Some(previous) => PatchOp::SetProp {
                id: id.to_string(),
                path: path.to_string(),
                value: previous,
            },
            None => PatchOp::DeleteProp {
                id: id.to_string(),
                path: path.to_string(),
            },
        });
        Ok(())
    }

    fn delete_prop(&mut self, id: &str, path: &str) -> EditorResult<()> {
        let prop_path = PropPath::parse(path)?;
        let node = self.patchable_mut(id)?;
        let previous = prop_path.delete(node, path)?;

        self.inverse.push(PatchOp::SetProp {
            id: id.to_string(),
            path: path.to_string(),
            value: previous,
        });
        Ok(())
    }

    fn insert_node(&mut self, node: &Node) -> EditorResult<()> {
        if self.doc.nodes.contains_key(&node.id) {
            return Err(ValidationError::DuplicateNode(node.id.clone()).into());
        }

        let mut seen = HashSet::new();
        for child in &node.children {
            if !seen.insert(child.as_str()) {
                return Err(StructuralError::AlreadyAttached {
                    child_id: child.clone(),
                    parent_id: node.id.clone(),
                }
                .into());
            }
            // A new node has no ancestors, so only self-reference can cycle
            self.check_attachable(&node.id, child)?;
        }

        for child in &node.children {
            self.index.set_parent(child, &node.id);
        }
        self.doc.insert_node(node.clone());

        self.inverse.push(PatchOp::RemoveNode { id: node.id.clone() });
        Ok(())
    }

    fn remove_node(&mut self, id: &str) -> EditorResult<()> {
        self.node(id)?;

        if let Some(parent) = self.index.parent_of(id) {
            return Err(StructuralError::StillReferenced {
                node_id: id.to_string(),
                referrer: format!("node {}", parent),
            }
            .into());
        }
        if let Some(frame) = self.frame_rooted_at(id) {
            return Err(StructuralError::StillReferenced {
                node_id: id.to_string(),
                referrer: format!("frame {}", frame.id),
            }
            .into());
        }

        let Some(removed) = self.doc.nodes.remove(id) else {
            return Err(ValidationError::NodeNotFound(id.to_string()).into());
        };
        for child in &removed.children {
            if self.index.parent_of(child) == Some(id) {
                self.index.clear_parent(child);
            }
        }

        self.inverse.push(PatchOp::InsertNode {
            node: Arc::unwrap_or_clone(removed),
        });
        Ok(())
    }

    fn replace_node(&mut self, node: &Node) -> EditorResult<()> {
        let existing = self.patchable(&node.id)?;
        if existing.patch_target != node.patch_target {
            return Err(ValidationError::InvalidValue {
                path: "patchTarget".to_string(),
                reason: "cannot change through replaceNode".to_string(),
            }
            .into());
        }

        let old_children: HashSet<&str> = existing.children.iter().map(String::as_str).collect();
        let mut new_children = HashSet::new();
        for child in &node.children {
            if !new_children.insert(child.as_str()) {
                return Err(StructuralError::AlreadyAttached {
                    child_id: child.clone(),
                    parent_id: node.id.clone(),
                }
                .into());
            }
            if !old_children.contains(child.as_str()) {
                self.check_attachable(&node.id, child)?;
            }
        }

        let dropped: Vec<String> = old_children
            .iter()
            .filter(|c| !new_children.contains(*c))
            .map(|c| c.to_string())
            .collect();
        let added: Vec<String> = node
            .children
            .iter()
            .filter(|c| !old_children.contains(c.as_str()))
            .cloned()
            .collect();

        for child in &dropped {
            self.index.clear_parent(child);
        }
        for child in &added {
            self.index.set_parent(child, &node.id);
        }

        let Some(previous) = self.doc.insert_node(node.clone()) else {
            return Err(ValidationError::NodeNotFound(node.id.clone()).into());
        };
        self.inverse.push(PatchOp::ReplaceNode {
            node: Arc::unwrap_or_clone(previous),
        });
        Ok(())
    }

    fn attach_child(&mut self, parent_id: &str, child_id: &str, index: InsertIndex) -> EditorResult<()> {
        let len = self.patchable(parent_id)?.children.len();
        self.check_attachable(parent_id, child_id)?;
        let position = index.resolve(len).ok_or_else(|| ValidationError::IndexOutOfBounds {
            parent_id: parent_id.to_string(),
            index: i64::from(index) as usize,
            len,
        })?;

        let parent = self.patchable_mut(parent_id)?;
        parent.children.insert(position, child_id.to_string());
        self.index.set_parent(child_id, parent_id);

        self.inverse.push(PatchOp::detach(parent_id, child_id));
        Ok(())
    }

    fn detach_child(&mut self, parent_id: &str, child_id: &str) -> EditorResult<()> {
        let position = self
            .node(parent_id)?
            .children
            .iter()
            .position(|c| c == child_id)
            .ok_or_else(|| StructuralError::NotAChild {
                child_id: child_id.to_string(),
                parent_id: parent_id.to_string(),
            })?;

        if let Some(parent) = self.doc.node_mut(parent_id) {
            parent.children.remove(position);
        }
        self.index.clear_parent(child_id);

        self.inverse
            .push(PatchOp::attach(parent_id, child_id, InsertIndex::At(position)));
        Ok(())
    }

    fn move_node(&mut self, id: &str, new_parent_id: &str, index: InsertIndex) -> EditorResult<()> {
        self.patchable(id)?;
        let new_parent_len = self.patchable(new_parent_id)?.children.len();

        if id == new_parent_id || self.index.is_ancestor(id, new_parent_id) {
            return Err(StructuralError::CycleDetected {
                node_id: id.to_string(),
                parent_id: new_parent_id.to_string(),
            }
            .into());
        }
        if let Some(frame) = self.frame_rooted_at(id) {
            return Err(StructuralError::FrameRoot {
                node_id: id.to_string(),
                frame_id: frame.id.clone(),
            }
            .into());
        }

        // Where the node sits now
        let old_slot = match self.index.parent_of(id) {
            Some(parent) => {
                let parent = parent.to_string();
                let position = self
                    .node(&parent)?
                    .children
                    .iter()
                    .position(|c| c == id)
                    .ok_or_else(|| StructuralError::NotAChild {
                        child_id: id.to_string(),
                        parent_id: parent.clone(),
                    })?;
                Some((parent, position))
            }
            None => None,
        };

        let len_after_removal = match &old_slot {
            Some((parent, _)) if parent == new_parent_id => new_parent_len - 1,
            _ => new_parent_len,
        };
        let position = index
            .resolve(len_after_removal)
            .ok_or_else(|| ValidationError::IndexOutOfBounds {
                parent_id: new_parent_id.to_string(),
                index: i64::from(index) as usize,
                len: len_after_removal,
            })?;

        // Validation done; mutate
        if let Some((parent, old_position)) = &old_slot {
            if let Some(parent) = self.doc.node_mut(parent) {
                parent.children.remove(*old_position);
            }
        }
        if let Some(parent) = self.doc.node_mut(new_parent_id) {
            parent.children.insert(position, id.to_string());
        }
        self.index.set_parent(id, new_parent_id);

        self.inverse.push(match old_slot {
            Some((parent, old_position)) => {
                PatchOp::move_node(id, parent, InsertIndex::At(old_position))
            }
            None => PatchOp::detach(new_parent_id, id),
        });
        Ok(())
    }

    fn insert_frame(&mut self, frame: &Frame) -> EditorResult<()> {
        if self.doc.frames.contains_key(&frame.id) {
            return Err(ValidationError::DuplicateFrame(frame.id.clone()).into());
        }
        self.node(&frame.root_node_id)?;
        if let Some(parent) = self.index.parent_of(&frame.root_node_id) {
            return Err(StructuralError::AlreadyAttached {
                child_id: frame.root_node_id.clone(),
                parent_id: parent.to_string(),
            }
            .into());
        }
        if let Some(other) = self.frame_rooted_at(&frame.root_node_id) {
            return Err(StructuralError::FrameRoot {
                node_id: frame.root_node_id.clone(),
                frame_id: other.id.clone(),
            }
            .into());
        }

        self.doc.frames.insert(frame.id.clone(), frame.clone());
        self.inverse.push(PatchOp::RemoveFrame { id: frame.id.clone() });
        Ok(())
    }

    fn remove_frame(&mut self, id: &str) -> EditorResult<()> {
        let frame = self
            .doc
            .frames
            .remove(id)
            .ok_or_else(|| ValidationError::FrameNotFound(id.to_string()))?;
        self.inverse.push(PatchOp::InsertFrame { frame });
        Ok(())
    }

    fn set_frame_prop(&mut self, id: &str, path: &str, value: &Value) -> EditorResult<()> {
        let segments = path::parse_segments(path)?;
        if matches!(segments[0].as_str(), "id" | "rootNodeId") {
            return Err(ValidationError::ReadOnlyProperty(path.to_string()).into());
        }

        let frame = self
            .doc
            .frames
            .get(id)
            .ok_or_else(|| ValidationError::FrameNotFound(id.to_string()))?;
        let invalid = |reason: String| ValidationError::InvalidValue {
            path: path.to_string(),
            reason,
        };

        let Value::Object(mut fields) = serde_json::to_value(frame).map_err(|e| invalid(e.to_string()))? else {
            return Err(invalid("frame did not serialize to an object".to_string()).into());
        };

        // Frames have a fixed schema: the full path must already exist
        let not_found = || ValidationError::PathNotFound {
            id: id.to_string(),
            path: path.to_string(),
        };
        let previous = path::get(&fields, &segments).cloned().ok_or_else(not_found)?;
        let (last, parents) = segments.split_last().ok_or_else(not_found)?;
        path::walk_mut(&mut fields, parents)
            .ok_or_else(not_found)?
            .insert(last.clone(), value.clone());

        let updated: Frame =
            serde_json::from_value(Value::Object(fields)).map_err(|e| invalid(e.to_string()))?;
        self.doc.frames.insert(id.to_string(), updated);

        self.inverse.push(PatchOp::SetFrameProp {
            id: id.to_string(),
            path: path.to_string(),
            value: previous,
        });
        Ok(())
    }
}
