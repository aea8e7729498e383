//! # Parent Index
//!
//! Derived `child → parent` lookup.
//!
//! The index is never a source of truth: [`ParentIndex::build`] reconstructs
//! it from the child lists in a document. During editing it is maintained
//! incrementally. The applier records changes in an [`IndexOverlay`] on top of
//! the committed index, and the store folds the resulting [`IndexDelta`] in
//! only once the whole batch has succeeded.

use crate::document::{Document, NodeId};
use std::collections::HashMap;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParentIndex {
    parents: HashMap<NodeId, NodeId>,
}

impl ParentIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Full rebuild from the document's child lists
    pub fn build(doc: &Document) -> Self {
        let mut parents = HashMap::with_capacity(doc.nodes.len());
        for node in doc.nodes.values() {
            for child in &node.children {
                parents.entry(child.clone()).or_insert_with(|| node.id.clone());
            }
        }
        Self { parents }
    }

    pub fn parent_of(&self, id: &str) -> Option<&str> {
        self.parents.get(id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.parents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parents.is_empty()
    }

    /// Ancestors of `id`, nearest first
    pub fn ancestors<'a>(&'a self, id: &str) -> Ancestors<'a, Self> {
        Ancestors::new(self, id).with_budget(self.len() + 1)
    }

    /// True if `ancestor` lies strictly above `node`
    pub fn is_ancestor(&self, ancestor: &str, node: &str) -> bool {
        self.ancestors(node).any(|a| a == ancestor)
    }

    /// Topmost ancestor of `id` (itself if unparented)
    pub fn root_of(&self, id: &str) -> NodeId {
        self.ancestors(id).last().unwrap_or(id).to_string()
    }

    pub(crate) fn apply_delta(&mut self, delta: IndexDelta) {
        for (child, parent) in delta.changes {
            match parent {
                Some(parent) => {
                    self.parents.insert(child, parent);
                }
                None => {
                    self.parents.remove(&child);
                }
            }
        }
    }

    /// Differences between this index and the document's child lists.
    ///
    /// Empty when the index is consistent.
    pub fn consistency_issues(&self, doc: &Document) -> Vec<String> {
        let mut issues = Vec::new();
        let mut expected: HashMap<&str, &str> = HashMap::new();

        for node in doc.nodes.values() {
            for child in &node.children {
                if let Some(other) = expected.insert(child, &node.id) {
                    issues.push(format!("{} appears under both {} and {}", child, other, node.id));
                }
            }
        }

        for (child, parent) in &expected {
            match self.parent_of(child) {
                Some(indexed) if indexed == *parent => {}
                Some(indexed) => issues.push(format!(
                    "index maps {} to {}, document has {}",
                    child, indexed, parent
                )),
                None => issues.push(format!("index is missing {} → {}", child, parent)),
            }
        }

        for (child, parent) in &self.parents {
            if !expected.contains_key(child.as_str()) {
                issues.push(format!("index has stale entry {} → {}", child, parent));
            }
        }

        issues.sort();
        issues
    }
}

/// Anything that can answer "who is the parent of X"
pub trait ParentLookup {
    fn lookup_parent(&self, id: &str) -> Option<&str>;
}

impl ParentLookup for ParentIndex {
    fn lookup_parent(&self, id: &str) -> Option<&str> {
        self.parent_of(id)
    }
}

/// Iterator over ancestors. Stops after as many steps as the index could
/// possibly hold so a corrupted (cyclic) index cannot hang a caller.
pub struct Ancestors<'a, L: ParentLookup> {
    lookup: &'a L,
    current: Option<&'a str>,
    budget: usize,
}

impl<'a, L: ParentLookup> Ancestors<'a, L> {
    fn new(lookup: &'a L, id: &str) -> Self {
        Self {
            lookup,
            current: lookup.lookup_parent(id),
            budget: usize::MAX,
        }
    }

    fn with_budget(mut self, budget: usize) -> Self {
        self.budget = budget;
        self
    }
}

impl<'a, L: ParentLookup> Iterator for Ancestors<'a, L> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        if self.budget == 0 {
            return None;
        }
        self.budget -= 1;
        let current = self.current?;
        self.current = self.lookup.lookup_parent(current);
        Some(current)
    }
}

/// Pending index changes from one batch. `None` means "no parent".
#[derive(Debug, Clone, Default)]
pub struct IndexDelta {
    changes: HashMap<NodeId, Option<NodeId>>,
}

impl IndexDelta {
    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

/// Copy-on-write view over a committed index
pub(crate) struct IndexOverlay<'a> {
    base: &'a ParentIndex,
    delta: IndexDelta,
}

impl<'a> IndexOverlay<'a> {
    pub fn new(base: &'a ParentIndex) -> Self {
        Self {
            base,
            delta: IndexDelta::default(),
        }
    }

    pub fn set_parent(&mut self, child: &str, parent: &str) {
        self.delta
            .changes
            .insert(child.to_string(), Some(parent.to_string()));
    }

    pub fn clear_parent(&mut self, child: &str) {
        self.delta.changes.insert(child.to_string(), None);
    }

    pub fn parent_of(&self, id: &str) -> Option<&str> {
        match self.delta.changes.get(id) {
            Some(parent) => parent.as_deref(),
            None => self.base.parent_of(id),
        }
    }

    pub fn is_ancestor(&self, ancestor: &str, node: &str) -> bool {
        let budget = self.base.len() + self.delta.len() + 1;
        Ancestors::new(self, node)
            .with_budget(budget)
            .any(|a| a == ancestor)
    }

    pub fn into_delta(self) -> IndexDelta {
        self.delta
    }
}

impl ParentLookup for IndexOverlay<'_> {
    fn lookup_parent(&self, id: &str) -> Option<&str> {
        self.parent_of(id)
    }
}
