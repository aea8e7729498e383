//! Versioned on-disk wrapper: `{ "type": "document", "version": 2, "document": {...} }`.
//!
//! Older versions are migrated on the raw JSON before typed deserialization.
//!
//! | version | change                                          |
//! |---------|-------------------------------------------------|
//! | 1       | nodes have no `patchTarget`                     |
//! | 2       | `patchTarget` on every node (own id, or null)   |

use crate::document::Document;
use crate::errors::{EditorResult, ValidationError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use tracing::debug;

pub const DOCUMENT_TYPE: &str = "document";
pub const CURRENT_VERSION: u32 = 2;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedDocument {
    #[serde(rename = "type")]
    pub kind: String,
    pub version: u32,
    pub document: Document,
}

impl PersistedDocument {
    pub fn new(document: Document) -> Self {
        Self {
            kind: DOCUMENT_TYPE.to_string(),
            version: CURRENT_VERSION,
            document,
        }
    }

    pub fn from_json(text: &str) -> EditorResult<Self> {
        let value: Value = serde_json::from_str(text)?;
        Self::from_value(value)
    }

    pub fn from_value(mut value: Value) -> EditorResult<Self> {
        match value.get("type").and_then(Value::as_str) {
            Some(DOCUMENT_TYPE) => {}
            other => {
                return Err(ValidationError::UnsupportedFormat(format!(
                    "expected type 'document', found {:?}",
                    other
                ))
                .into())
            }
        }

        let version = value
            .get("version")
            .and_then(Value::as_u64)
            .ok_or_else(|| ValidationError::UnsupportedFormat("missing version".to_string()))?;
        if version > u64::from(CURRENT_VERSION) {
            return Err(ValidationError::UnsupportedFormat(format!(
                "version {} is newer than supported {}",
                version, CURRENT_VERSION
            ))
            .into());
        }

        if version < 2 {
            debug!(from = version, to = CURRENT_VERSION, "Migrating document");
            migrate_v1(&mut value);
        }
        if let Some(obj) = value.as_object_mut() {
            obj.insert("version".to_string(), Value::from(CURRENT_VERSION));
        }

        Ok(serde_json::from_value(value)?)
    }

    pub fn to_json(&self) -> EditorResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn load(path: impl AsRef<Path>) -> EditorResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> EditorResult<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    pub fn into_document(self) -> Document {
        self.document
    }
}

/// Every v1 node was patchable: point `patchTarget` at itself
fn migrate_v1(value: &mut Value) {
    let Some(nodes) = value
        .get_mut("document")
        .and_then(|d| d.get_mut("nodes"))
        .and_then(Value::as_object_mut)
    else {
        return;
    };

    for (id, node) in nodes.iter_mut() {
        if let Some(node) = node.as_object_mut() {
            node.entry("patchTarget")
                .or_insert_with(|| Value::String(id.clone()));
        }
    }
}
