//! Error types for the editor
//!
//! Every failure the engine reports falls in one of four buckets:
//!
//! - [`ValidationError`]: a patch names something that does not exist, an
//!   unresolvable property path, or a value with the wrong shape.
//! - [`StructuralError`]: the patch would break the tree (cycles, double
//!   parents, dangling references).
//! - [`NotFoundError`]: a drag, paste or automation request refers to a
//!   frame, node or selection that is gone from the current snapshot.
//! - [`ClipboardError`]: the clipboard is empty or holds something we can't read.
//!
//! None of them are fatal. A rejected batch leaves the document untouched.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Node not found: {0}")]
    NodeNotFound(String),

    #[error("Frame not found: {0}")]
    FrameNotFound(String),

    #[error("Node already exists: {0}")]
    DuplicateNode(String),

    #[error("Frame already exists: {0}")]
    DuplicateFrame(String),

    #[error("Invalid property path: '{0}'")]
    InvalidPath(String),

    #[error("Property path '{path}' does not resolve on {id}")]
    PathNotFound { id: String, path: String },

    #[error("Invalid value for '{path}': {reason}")]
    InvalidValue { path: String, reason: String },

    #[error("Property '{0}' is read-only")]
    ReadOnlyProperty(String),

    #[error("Index {index} out of bounds for {parent_id} ({len} children)")]
    IndexOutOfBounds {
        parent_id: String,
        index: usize,
        len: usize,
    },

    #[error("Node {0} is part of an expanded instance and cannot be patched")]
    NotPatchable(String),

    #[error("Unsupported document format: {0}")]
    UnsupportedFormat(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StructuralError {
    #[error("Moving {node_id} under {parent_id} would create a cycle")]
    CycleDetected { node_id: String, parent_id: String },

    #[error("{child_id} is already attached to {parent_id}")]
    AlreadyAttached { child_id: String, parent_id: String },

    #[error("{child_id} is not a child of {parent_id}")]
    NotAChild { child_id: String, parent_id: String },

    #[error("{node_id} is still referenced by {referrer}")]
    StillReferenced { node_id: String, referrer: String },

    #[error("{node_id} is the root of frame {frame_id}")]
    FrameRoot { node_id: String, frame_id: String },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum NotFoundError {
    #[error("Frame no longer exists: {0}")]
    Frame(String),

    #[error("Node no longer exists: {0}")]
    Node(String),

    #[error("Selection is empty")]
    EmptySelection,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ClipboardError {
    #[error("Clipboard is empty")]
    Empty,

    #[error("Clipboard content is not a payload: {0}")]
    Malformed(String),

    #[error("Clipboard payload has type '{0}'")]
    WrongType(String),

    #[error("Clipboard payload version {found} is newer than supported {supported}")]
    UnsupportedVersion { found: u32, supported: u32 },

    #[error("Clipboard payload is inconsistent: {0}")]
    Inconsistent(String),

    #[error("System clipboard unavailable: {0}")]
    Unavailable(String),
}

/// Crate-wide error
#[derive(Error, Debug)]
pub enum EditorError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Structural error: {0}")]
    Structural(#[from] StructuralError),

    #[error("Not found: {0}")]
    NotFound(#[from] NotFoundError),

    #[error("Clipboard error: {0}")]
    Clipboard(#[from] ClipboardError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse classification of an [`EditorError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Structural,
    NotFound,
    Clipboard,
    Io,
}

impl EditorError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EditorError::Validation(_) | EditorError::Serialization(_) => ErrorKind::Validation,
            EditorError::Structural(_) => ErrorKind::Structural,
            EditorError::NotFound(_) => ErrorKind::NotFound,
            EditorError::Clipboard(_) => ErrorKind::Clipboard,
            EditorError::Io(_) => ErrorKind::Io,
        }
    }
}

pub type EditorResult<T> = Result<T, EditorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_follows_variant() {
        let err: EditorError = StructuralError::CycleDetected {
            node_id: "a".to_string(),
            parent_id: "b".to_string(),
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::Structural);

        let err: EditorError = ClipboardError::Empty.into();
        assert_eq!(err.kind(), ErrorKind::Clipboard);
    }

    #[test]
    fn test_messages_name_the_offender() {
        let err = EditorError::from(ValidationError::PathNotFound {
            id: "n1".to_string(),
            path: "style/fill".to_string(),
        });
        let message = err.to_string();
        assert!(message.contains("n1"));
        assert!(message.contains("style/fill"));
    }
}
