//! # Draftboard Editor
//!
//! Document mutation engine for Draftboard.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ intents: drag/drop, clipboard, compound ops │
//! │  - resolve geometry / selection             │
//! │  - emit one Batch per user intent           │
//! └─────────────────────────────────────────────┘
//!                     ↓  PatchOp
//! ┌─────────────────────────────────────────────┐
//! │ store: current Document + history           │
//! │  - apply atomically through the applier     │
//! │  - fold parent-index delta                  │
//! │  - push (coalesced) undo entry              │
//! └─────────────────────────────────────────────┘
//!                     ↓  Arc<Document>
//! ┌─────────────────────────────────────────────┐
//! │ renderer (external): read-only snapshots    │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Core Principles
//!
//! 1. **One mutation path**: UI gestures and automation agents both submit
//!    patch batches; nothing writes to a document directly
//! 2. **Atomic batches**: a batch fully commits or changes nothing
//! 3. **Every op is invertible**: undo is just applying recorded inverses
//! 4. **Flat storage**: nodes live in an id-keyed map, parents are derived
//!
//! ## Usage
//!
//! ```rust
//! use draftboard_editor::{Document, DocumentStore, Frame, Node, PatchOp, Rect};
//!
//! let mut doc = Document::new("doc-1");
//! let root = Node::container("root").with_children(["title"]);
//! let title = Node::text("title", "Hello");
//! doc.insert_node(root);
//! doc.insert_node(title);
//! doc.frames.insert(
//!     "home".to_string(),
//!     Frame::new("home", "Home", "root", Rect::new(0.0, 0.0, 375.0, 812.0)),
//! );
//!
//! let mut store = DocumentStore::new(doc);
//! store.apply_patches(&[PatchOp::set_prop("title", "props/text", "Hi")], "Edit text")?;
//! assert_eq!(store.document().nodes["title"].props["text"], "Hi");
//!
//! store.undo()?;
//! assert_eq!(store.document().nodes["title"].props["text"], "Hello");
//! # Ok::<(), draftboard_editor::EditorError>(())
//! ```

mod applier;
mod clipboard;
mod compound;
mod config;
mod document;
mod drag;
mod errors;
mod geometry;
mod id_generator;
mod parent_index;
mod patch;
mod path;
mod persist;
mod selection;
mod store;
mod undo_stack;

pub use applier::{apply_ops, apply_patch, Applied};
pub use clipboard::{
    apply_paste, build_payload, compute_paste_offset, frame_local_position, paste_ops, remap,
    resolve_paste_parent, translate_roots, ClipboardPayload, ClipboardService, ClipboardSource,
    InternalClipboard, MemoryClipboard, PastePlacement, Pasted, SystemClipboard, CLIPBOARD_TYPE,
    CLIPBOARD_VERSION,
};
pub use compound::{create_frame, delete_frame_and_subtree, delete_nodes, move_nodes, removed_ids};
pub use config::{EditorConfig, DEFAULT_CONFIG_NAME};
pub use document::{
    as_node_ref, node_ref, ComponentDef, ComponentId, Document, Frame, FrameId, LayoutMode, Node,
    NodeId, NodeKind, PropMap, NODE_REF_KEY,
};
pub use drag::{
    BoundsMap, DragSession, DragState, DropContext, DropPreview, FrameIndex, Indicator,
    InvalidReason, NodeBounds,
};
pub use errors::{
    ClipboardError, EditorError, EditorResult, ErrorKind, NotFoundError, StructuralError,
    ValidationError,
};
pub use geometry::{Axis, EdgeInsets, Point, Rect, Segment, Size, Viewport};
pub use id_generator::{document_seed, IdGenerator};
pub use parent_index::{Ancestors, IndexDelta, ParentIndex, ParentLookup};
pub use patch::{prop_targets, InsertIndex, PatchOp, PropTarget};
pub use path::{parse_segments, PropPath, PropRoot};
pub use persist::{PersistedDocument, CURRENT_VERSION, DOCUMENT_TYPE};
pub use selection::{document_order_key, sort_in_document_order, top_level_roots};
pub use store::{integrity_issues, Commit, DocumentStore, SharedStore};
pub use undo_stack::{PushOutcome, UndoEntry, UndoStack};
