//! # Document Store
//!
//! Owns the current document, its parent index and the undo history.
//!
//! Every edit goes through [`DocumentStore::apply_patches`]. A batch either
//! commits completely (new document, folded index delta, history entry) or
//! leaves the store exactly as it was. Readers take an [`Arc`] snapshot and
//! never observe a half-applied batch.
//!
//! The store is a plain value: construct one per open document and pass it
//! where it is needed. [`SharedStore`] wraps it in a mutex for callers that
//! mutate from several threads or tasks.

use crate::applier::{apply_ops, Applied};
use crate::config::EditorConfig;
use crate::document::Document;
use crate::errors::EditorResult;
use crate::parent_index::ParentIndex;
use crate::patch::{prop_targets, PatchOp};
use crate::undo_stack::{PushOutcome, UndoEntry, UndoStack};
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, instrument, warn};

/// Result of a successful [`DocumentStore::apply_patches`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Commit {
    pub revision: u64,

    /// Merged into the previous undo entry
    pub coalesced: bool,

    /// Primitive ops applied (0 for an empty batch)
    pub applied: usize,
}

#[derive(Debug)]
pub struct DocumentStore {
    document: Arc<Document>,
    index: ParentIndex,
    history: UndoStack,
    revision: u64,
}

impl DocumentStore {
    pub fn new(document: Document) -> Self {
        Self::with_config(document, &EditorConfig::default())
    }

    pub fn with_config(document: Document, config: &EditorConfig) -> Self {
        let index = ParentIndex::build(&document);
        Self {
            document: Arc::new(document),
            index,
            history: UndoStack::with_max_levels(config.history_limit)
                .with_coalesce_window(config.coalesce_window()),
            revision: 0,
        }
    }

    /// Cheap read-only handle on the current document
    pub fn snapshot(&self) -> Arc<Document> {
        Arc::clone(&self.document)
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn index(&self) -> &ParentIndex {
        &self.index
    }

    /// Bumped by every commit, undo, redo and replace
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn apply_patches(&mut self, ops: &[PatchOp], label: &str) -> EditorResult<Commit> {
        self.apply_patches_at(ops, label, Utc::now())
    }

    /// Like [`apply_patches`](Self::apply_patches) with an explicit timestamp
    /// for the history entry
    #[instrument(skip(self, ops), fields(ops = ops.len()))]
    pub fn apply_patches_at(
        &mut self,
        ops: &[PatchOp],
        label: &str,
        at: DateTime<Utc>,
    ) -> EditorResult<Commit> {
        if ops.is_empty() {
            return Ok(Commit {
                revision: self.revision,
                coalesced: false,
                applied: 0,
            });
        }

        let applied = apply_ops(&self.document, &self.index, ops)?;
        let count = applied.applied;
        let entry = UndoEntry::new(label, applied.inverse.clone(), at).with_coalesce_key(prop_targets(ops));
        self.install(applied);

        let outcome = self.history.push(entry);
        match outcome {
            PushOutcome::Coalesced => debug!(revision = self.revision, "Coalesced into previous entry"),
            PushOutcome::Evicted => debug!(limit = self.history.max_levels(), "Evicted oldest history entry"),
            PushOutcome::Pushed => {}
        }
        debug!(revision = self.revision, applied = count, "Committed batch");

        Ok(Commit {
            revision: self.revision,
            coalesced: outcome == PushOutcome::Coalesced,
            applied: count,
        })
    }

    /// Undo the most recent step. Returns `false` if there was nothing to undo.
    #[instrument(skip(self))]
    pub fn undo(&mut self) -> EditorResult<bool> {
        let Some(entry) = self.history.pop_undo() else {
            return Ok(false);
        };

        match apply_ops(&self.document, &self.index, &entry.inverse) {
            Ok(applied) => {
                let redo = UndoEntry {
                    inverse: applied.inverse.clone(),
                    ..entry
                };
                self.install(applied);
                debug!(label = %redo.label, revision = self.revision, "Undo");
                self.history.push_redo(redo);
                Ok(true)
            }
            Err(err) => {
                warn!(label = %entry.label, error = %err, "Undo entry no longer applies");
                self.history.restore_undo(entry);
                Err(err)
            }
        }
    }

    /// Redo the most recently undone step. Returns `false` if there was nothing to redo.
    #[instrument(skip(self))]
    pub fn redo(&mut self) -> EditorResult<bool> {
        let Some(entry) = self.history.pop_redo() else {
            return Ok(false);
        };

        match apply_ops(&self.document, &self.index, &entry.inverse) {
            Ok(applied) => {
                let undo = UndoEntry {
                    inverse: applied.inverse.clone(),
                    ..entry
                };
                self.install(applied);
                debug!(label = %undo.label, revision = self.revision, "Redo");
                self.history.restore_undo(undo);
                Ok(true)
            }
            Err(err) => {
                warn!(label = %entry.label, error = %err, "Redo entry no longer applies");
                self.history.push_redo(entry);
                Err(err)
            }
        }
    }

    /// Swap in a different document (load / new). Clears all history and
    /// rebuilds the parent index from scratch.
    #[instrument(skip(self, document), fields(document_id = %document.id, nodes = document.nodes.len()))]
    pub fn replace_document(&mut self, document: Document) {
        self.index = ParentIndex::build(&document);
        self.document = Arc::new(document);
        self.history.clear();
        self.revision += 1;

        let issues = self.integrity_issues();
        if !issues.is_empty() {
            warn!(issues = issues.len(), "Loaded document has integrity issues");
        }
        info!(revision = self.revision, "Document replaced");
    }

    fn install(&mut self, applied: Applied) {
        self.index.apply_delta(applied.index_delta);
        self.document = Arc::new(applied.document);
        self.revision += 1;
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn undo_levels(&self) -> usize {
        self.history.undo_levels()
    }

    pub fn redo_levels(&self) -> usize {
        self.history.redo_levels()
    }

    pub fn undo_label(&self) -> Option<&str> {
        self.history.undo_label()
    }

    pub fn redo_label(&self) -> Option<&str> {
        self.history.redo_label()
    }

    /// Every violated document invariant, as human-readable lines
    pub fn integrity_issues(&self) -> Vec<String> {
        integrity_issues(&self.document, &self.index)
    }

    pub fn check_integrity(&self) -> bool {
        self.integrity_issues().is_empty()
    }
}

/// Check `doc` and `index` against the document invariants:
/// frame roots exist and are unparented, children exist, the index matches the
/// child lists, there are no cycles, and every node is reachable from a frame or
/// component root.
pub fn integrity_issues(doc: &Document, index: &ParentIndex) -> Vec<String> {
    let mut issues = Vec::new();

    for frame in doc.frames.values() {
        if !doc.contains_node(&frame.root_node_id) {
            issues.push(format!("frame {} root {} is missing", frame.id, frame.root_node_id));
        } else if let Some(parent) = index.parent_of(&frame.root_node_id) {
            issues.push(format!(
                "frame {} root {} has parent {}",
                frame.id, frame.root_node_id, parent
            ));
        }
    }

    for node in doc.nodes.values() {
        for child in &node.children {
            if !doc.contains_node(child) {
                issues.push(format!("{} lists missing child {}", node.id, child));
            }
        }
    }

    issues.extend(index.consistency_issues(doc));

    // Cycles: walking up from any node must reach an unparented node
    let fresh = ParentIndex::build(doc);
    for id in doc.nodes.keys() {
        let mut seen = HashSet::new();
        let mut current = id.as_str();
        while let Some(parent) = fresh.parent_of(current) {
            if !seen.insert(parent) {
                issues.push(format!("{} sits on a cycle", id));
                break;
            }
            current = parent;
        }
    }

    let mut reachable = HashSet::new();
    let roots = doc
        .frames
        .values()
        .map(|f| &f.root_node_id)
        .chain(doc.components.values().map(|c| &c.root_node_id));
    for root in roots {
        reachable.extend(doc.subtree(root));
    }
    for id in doc.nodes.keys() {
        if !reachable.contains(id) {
            issues.push(format!("{} is not reachable from any frame or component", id));
        }
    }

    issues
}

/// Store shared between threads; every call holds the lock for its duration
#[derive(Debug, Clone)]
pub struct SharedStore {
    inner: Arc<Mutex<DocumentStore>>,
}

impl SharedStore {
    pub fn new(store: DocumentStore) -> Self {
        Self {
            inner: Arc::new(Mutex::new(store)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, DocumentStore> {
        // A panic mid-call cannot leave a half-applied batch behind
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` with exclusive access to the store
    pub fn with<R>(&self, f: impl FnOnce(&mut DocumentStore) -> R) -> R {
        f(&mut self.lock())
    }

    pub fn snapshot(&self) -> Arc<Document> {
        self.lock().snapshot()
    }

    pub fn apply_patches(&self, ops: &[PatchOp], label: &str) -> EditorResult<Commit> {
        self.lock().apply_patches(ops, label)
    }

    pub fn undo(&self) -> EditorResult<bool> {
        self.lock().undo()
    }

    pub fn redo(&self) -> EditorResult<bool> {
        self.lock().redo()
    }
}
