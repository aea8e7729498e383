//! # Undo/Redo Stack
//!
//! Bounded history of committed patch batches.
//!
//! ## Design
//!
//! - Each entry stores the ops that reverse one commit, already in the order
//!   they must be applied
//! - Undo applies the entry's ops; the applier hands back their own inverse,
//!   which becomes the redo entry (and vice versa)
//! - New commits clear the redo stack
//! - Consecutive property edits with the same label and the same targets inside
//!   the coalescing window merge into one entry that keeps the *oldest* inverse
//! - When the stack exceeds `max_levels` the oldest entry is evicted

use crate::patch::{PatchOp, PropTarget};
use chrono::{DateTime, Duration, Utc};
use std::collections::{BTreeSet, VecDeque};

/// One undoable step
#[derive(Debug, Clone)]
pub struct UndoEntry {
    pub label: String,

    /// Ops that reverse this step (in application order)
    pub inverse: Vec<PatchOp>,

    /// Property targets when the step was a pure property edit
    pub coalesce_key: Option<BTreeSet<PropTarget>>,

    pub timestamp: DateTime<Utc>,
}

impl UndoEntry {
    pub fn new(label: impl Into<String>, inverse: Vec<PatchOp>, timestamp: DateTime<Utc>) -> Self {
        Self {
            label: label.into(),
            inverse,
            coalesce_key: None,
            timestamp,
        }
    }

    pub fn with_coalesce_key(mut self, key: Option<BTreeSet<PropTarget>>) -> Self {
        self.coalesce_key = key;
        self
    }

    /// True if `next` continues the same gesture as this entry
    fn absorbs(&self, next: &UndoEntry, window: Duration) -> bool {
        if self.label != next.label {
            return false;
        }
        match (&self.coalesce_key, &next.coalesce_key) {
            (Some(a), Some(b)) if a == b => {}
            _ => return false,
        }
        let elapsed = next.timestamp - self.timestamp;
        elapsed >= Duration::zero() && elapsed <= window
    }
}

/// What happened when an entry was pushed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    Pushed,
    Coalesced,
    /// Pushed, and the oldest entry was dropped to make room
    Evicted,
}

/// Undo/redo stack for document editing
#[derive(Debug)]
pub struct UndoStack {
    /// Oldest first, most recent last
    undo_stack: VecDeque<UndoEntry>,

    /// Most recent last
    redo_stack: Vec<UndoEntry>,

    /// Maximum number of undo levels (0 = unlimited)
    max_levels: usize,

    coalesce_window: Duration,
}

impl UndoStack {
    /// Create a new undo stack with default max levels (100)
    pub fn new() -> Self {
        Self::with_max_levels(100)
    }

    pub fn with_max_levels(max_levels: usize) -> Self {
        Self {
            undo_stack: VecDeque::new(),
            redo_stack: Vec::new(),
            max_levels,
            coalesce_window: Duration::milliseconds(1000),
        }
    }

    pub fn with_coalesce_window(mut self, window: Duration) -> Self {
        self.coalesce_window = window;
        self
    }

    /// Record a fresh commit. Clears the redo stack.
    pub fn push(&mut self, entry: UndoEntry) -> PushOutcome {
        self.redo_stack.clear();

        if let Some(last) = self.undo_stack.back_mut() {
            if last.absorbs(&entry, self.coalesce_window) {
                // The older inverse already restores the pre-gesture state
                last.timestamp = entry.timestamp;
                return PushOutcome::Coalesced;
            }
        }

        self.push_undo(entry)
    }

    fn push_undo(&mut self, entry: UndoEntry) -> PushOutcome {
        self.undo_stack.push_back(entry);
        if self.max_levels > 0 && self.undo_stack.len() > self.max_levels {
            self.undo_stack.pop_front();
            return PushOutcome::Evicted;
        }
        PushOutcome::Pushed
    }

    pub fn pop_undo(&mut self) -> Option<UndoEntry> {
        self.undo_stack.pop_back()
    }

    pub fn pop_redo(&mut self) -> Option<UndoEntry> {
        self.redo_stack.pop()
    }

    /// Put an entry back on the undo stack without touching redo
    pub fn restore_undo(&mut self, entry: UndoEntry) {
        self.push_undo(entry);
    }

    pub fn push_redo(&mut self, entry: UndoEntry) {
        self.redo_stack.push(entry);
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_levels(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_levels(&self) -> usize {
        self.redo_stack.len()
    }

    pub fn max_levels(&self) -> usize {
        self.max_levels
    }

    /// Clear all undo/redo history
    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }

    /// Label of the next undo operation
    pub fn undo_label(&self) -> Option<&str> {
        self.undo_stack.back().map(|entry| entry.label.as_str())
    }

    /// Label of the next redo operation
    pub fn redo_label(&self) -> Option<&str> {
        self.redo_stack.last().map(|entry| entry.label.as_str())
    }
}

impl Default for UndoStack {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patch::prop_targets;
    use chrono::TimeZone;

    fn at(ms: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(1_700_000_000_000 + ms).unwrap()
    }

    fn fill_edit(ms: i64, value: &str) -> UndoEntry {
        let ops = vec![PatchOp::set_prop("a", "style/fill", value)];
        UndoEntry::new("Change fill", ops.clone(), at(ms)).with_coalesce_key(prop_targets(&ops))
    }

    #[test]
    fn test_undo_stack_creation() {
        let stack = UndoStack::new();
        assert_eq!(stack.undo_levels(), 0);
        assert_eq!(stack.redo_levels(), 0);
        assert!(!stack.can_undo());
        assert!(!stack.can_redo());
        assert_eq!(stack.max_levels(), 100);
    }

    #[test]
    fn test_coalesces_within_window() {
        let mut stack = UndoStack::new();
        assert_eq!(stack.push(fill_edit(0, "red")), PushOutcome::Pushed);
        assert_eq!(stack.push(fill_edit(400, "green")), PushOutcome::Coalesced);
        assert_eq!(stack.push(fill_edit(800, "blue")), PushOutcome::Coalesced);
        assert_eq!(stack.undo_levels(), 1);

        // Oldest inverse survives
        let entry = stack.pop_undo().unwrap();
        assert_eq!(entry.inverse, vec![PatchOp::set_prop("a", "style/fill", "red")]);
        assert_eq!(entry.timestamp, at(800));
    }

    #[test]
    fn test_window_measured_from_last_merge() {
        let mut stack = UndoStack::new();
        stack.push(fill_edit(0, "red"));
        stack.push(fill_edit(900, "green"));
        assert_eq!(stack.push(fill_edit(1800, "blue")), PushOutcome::Coalesced);
        assert_eq!(stack.push(fill_edit(3000, "black")), PushOutcome::Pushed);
        assert_eq!(stack.undo_levels(), 2);
    }

    #[test]
    fn test_different_label_or_target_not_coalesced() {
        let mut stack = UndoStack::new();
        stack.push(fill_edit(0, "red"));

        let mut renamed = fill_edit(10, "green");
        renamed.label = "Other".to_string();
        assert_eq!(stack.push(renamed), PushOutcome::Pushed);

        let ops = vec![PatchOp::set_prop("a", "style/stroke", "red")];
        let other_target =
            UndoEntry::new("Other", ops.clone(), at(20)).with_coalesce_key(prop_targets(&ops));
        assert_eq!(stack.push(other_target), PushOutcome::Pushed);

        let structural = UndoEntry::new("Other", vec![PatchOp::detach("p", "a")], at(30));
        assert_eq!(stack.push(structural), PushOutcome::Pushed);
        assert_eq!(stack.undo_levels(), 4);
    }

    #[test]
    fn test_new_push_clears_redo() {
        let mut stack = UndoStack::new();
        stack.push(fill_edit(0, "red"));
        let entry = stack.pop_undo().unwrap();
        stack.push_redo(entry);
        assert_eq!(stack.redo_levels(), 1);
        assert_eq!(stack.redo_label(), Some("Change fill"));

        stack.push(fill_edit(5000, "blue"));
        assert_eq!(stack.redo_levels(), 0);
    }

    #[test]
    fn test_max_levels_enforced() {
        let mut stack = UndoStack::with_max_levels(2);
        for i in 0..3 {
            let entry = UndoEntry::new(format!("Step {}", i), Vec::new(), at(i * 10_000));
            let outcome = stack.push(entry);
            assert_eq!(outcome == PushOutcome::Evicted, i == 2);
        }
        assert_eq!(stack.undo_levels(), 2);
        assert_eq!(stack.undo_label(), Some("Step 2"));
    }
}
