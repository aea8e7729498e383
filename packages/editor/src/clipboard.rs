//! # Clipboard / Paste Service
//!
//! Copy, paste and duplicate on top of the ordinary patch path.
//!
//! ## Flow
//!
//! ```text
//! copy:      selection → top-level roots → ClipboardPayload → internal slot
//!                                                           → system clipboard (text)
//! paste:     internal slot (if fresh) or system clipboard (async read)
//!              → ClipboardPayload → remap ids → translate roots
//!              → Batch[InsertNode.., AttachChild..] → store
//! duplicate: selection → payload → same as paste, synchronous, next to originals
//! ```
//!
//! The only asynchronous step is reading the system clipboard. It is resolved
//! to a payload value before the store is touched, so the store never waits on
//! it.

use crate::config::EditorConfig;
use crate::document::{as_node_ref, Document, FrameId, Node, NodeId, NODE_REF_KEY};
use crate::errors::{ClipboardError, EditorError, EditorResult, NotFoundError};
use crate::geometry::Point;
use crate::id_generator::IdGenerator;
use crate::parent_index::ParentIndex;
use crate::patch::{InsertIndex, PatchOp};
use crate::selection::top_level_roots;
use crate::store::{DocumentStore, SharedStore};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, warn};

pub const CLIPBOARD_TYPE: &str = "clipboard";
pub const CLIPBOARD_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClipboardSource {
    pub document_id: String,
    #[serde(default)]
    pub frame_id: Option<FrameId>,
}

/// Serialized selection, as written to the clipboard
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClipboardPayload {
    #[serde(rename = "type")]
    pub kind: String,
    pub version: u32,
    pub source: ClipboardSource,
    pub root_ids: Vec<NodeId>,
    /// Every node of every root's subtree
    pub nodes: Vec<Node>,
    /// Top-left of the roots' positions
    pub anchor: Point,
}

impl ClipboardPayload {
    pub fn to_json(&self) -> EditorResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse and validate clipboard text
    pub fn from_json(text: &str) -> Result<Self, ClipboardError> {
        let value: Value =
            serde_json::from_str(text).map_err(|e| ClipboardError::Malformed(e.to_string()))?;

        match value.get("type").and_then(Value::as_str) {
            Some(CLIPBOARD_TYPE) => {}
            Some(other) => return Err(ClipboardError::WrongType(other.to_string())),
            None => return Err(ClipboardError::Malformed("missing type".to_string())),
        }
        if let Some(found) = value.get("version").and_then(Value::as_u64) {
            if found > u64::from(CLIPBOARD_VERSION) {
                return Err(ClipboardError::UnsupportedVersion {
                    found: u32::try_from(found).unwrap_or(u32::MAX),
                    supported: CLIPBOARD_VERSION,
                });
            }
        }

        let payload: ClipboardPayload =
            serde_json::from_value(value).map_err(|e| ClipboardError::Malformed(e.to_string()))?;
        payload.validate()?;
        Ok(payload)
    }

    /// Roots present, ids unique, and every child reference inside the payload
    pub fn validate(&self) -> Result<(), ClipboardError> {
        if self.root_ids.is_empty() {
            return Err(ClipboardError::Inconsistent("no roots".to_string()));
        }

        let mut ids = HashSet::new();
        for node in &self.nodes {
            if !ids.insert(node.id.as_str()) {
                return Err(ClipboardError::Inconsistent(format!("duplicate node {}", node.id)));
            }
        }
        for root in &self.root_ids {
            if !ids.contains(root.as_str()) {
                return Err(ClipboardError::Inconsistent(format!("root {} has no node", root)));
            }
        }

        let roots: HashSet<&str> = self.root_ids.iter().map(String::as_str).collect();
        for node in &self.nodes {
            for child in &node.children {
                if !ids.contains(child.as_str()) {
                    return Err(ClipboardError::Inconsistent(format!(
                        "{} references {} outside the payload",
                        node.id, child
                    )));
                }
                if roots.contains(child.as_str()) {
                    return Err(ClipboardError::Inconsistent(format!("root {} has a parent", child)));
                }
            }
        }
        Ok(())
    }

    fn node_map(&self) -> HashMap<&str, &Node> {
        self.nodes.iter().map(|n| (n.id.as_str(), n)).collect()
    }
}

/// Position of `id` relative to the top of its tree (the frame root): its own
/// offset plus those of every ancestor below the top.
pub fn frame_local_position(doc: &Document, index: &ParentIndex, id: &str) -> Point {
    let own = doc.node(id).map(Node::position).unwrap_or(Point::ZERO);
    let ancestors: Vec<&str> = index.ancestors(id).collect();
    let below_top = ancestors.len().saturating_sub(1);

    ancestors[..below_top]
        .iter()
        .filter_map(|a| doc.node(a))
        .fold(own, |position, ancestor| position + ancestor.position())
}

/// Collect the top-level roots of `selection` and their subtrees
pub fn build_payload<I, S>(
    doc: &Document,
    index: &ParentIndex,
    selection: I,
    frame_id: Option<&str>,
) -> EditorResult<ClipboardPayload>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let root_ids = top_level_roots(doc, index, selection)?;
    if root_ids.is_empty() {
        return Err(NotFoundError::EmptySelection.into());
    }

    let nodes: Vec<Node> = root_ids
        .iter()
        .flat_map(|root| doc.subtree(root))
        .filter_map(|id| doc.node(&id).cloned())
        .collect();

    let anchor = root_ids
        .iter()
        .map(|id| frame_local_position(doc, index, id))
        .reduce(|a, b| Point::new(a.x.min(b.x), a.y.min(b.y)))
        .unwrap_or(Point::ZERO);

    Ok(ClipboardPayload {
        kind: CLIPBOARD_TYPE.to_string(),
        version: CLIPBOARD_VERSION,
        source: ClipboardSource {
            document_id: doc.id.clone(),
            frame_id: frame_id.map(str::to_string),
        },
        root_ids,
        nodes,
        anchor,
    })
}

/// Give every node in `payload` a fresh id and rewrite all references to it:
/// child lists, `patchTarget` and `{"$node": id}` markers inside layout, style
/// and props. Plain string values are left alone.
///
/// `taken` reports ids already in use at the destination. New ids also avoid
/// every id in the payload itself, so the old and new id sets are disjoint.
/// Root order is preserved.
pub fn remap(payload: &ClipboardPayload, ids: &mut IdGenerator, taken: impl Fn(&str) -> bool) -> ClipboardPayload {
    let old: HashSet<&str> = payload.nodes.iter().map(|n| n.id.as_str()).collect();
    let mapping: HashMap<String, NodeId> = payload
        .nodes
        .iter()
        .map(|n| {
            let fresh = ids.next_unused(|id| taken(id) || old.contains(id));
            (n.id.clone(), fresh)
        })
        .collect();
    let lookup = |id: &str| mapping.get(id).cloned().unwrap_or_else(|| id.to_string());

    let nodes = payload
        .nodes
        .iter()
        .map(|node| {
            let mut node = node.clone();
            node.id = lookup(node.id.as_str());
            node.children = node.children.iter().map(|c| lookup(c.as_str())).collect();
            node.patch_target = node.patch_target.as_deref().map(lookup);
            for map in [&mut node.layout, &mut node.style, &mut node.props] {
                for value in map.values_mut() {
                    rewrite_ids(value, &mapping);
                }
            }
            node
        })
        .collect();

    ClipboardPayload {
        root_ids: payload.root_ids.iter().map(|r| lookup(r.as_str())).collect(),
        nodes,
        ..payload.clone()
    }
}

/// Point every node reference marker at the remapped id
fn rewrite_ids(value: &mut Value, mapping: &HashMap<String, NodeId>) {
    if let Some(new) = as_node_ref(value).and_then(|old| mapping.get(old)) {
        *value = Value::Object(
            [(NODE_REF_KEY.to_string(), Value::String(new.clone()))]
                .into_iter()
                .collect(),
        );
        return;
    }
    match value {
        Value::Array(items) => items.iter_mut().for_each(|v| rewrite_ids(v, mapping)),
        Value::Object(map) => map.values_mut().for_each(|v| rewrite_ids(v, mapping)),
        _ => {}
    }
}

/// Where pasted roots land
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PastePlacement {
    /// Anchor moves to this frame-local point
    Cursor(Point),
    /// Fixed translation (duplicate)
    Offset(Point),
    InPlace,
}

pub fn compute_paste_offset(anchor: Point, placement: PastePlacement) -> Point {
    match placement {
        PastePlacement::Cursor(cursor) => cursor - anchor,
        PastePlacement::Offset(offset) => offset,
        PastePlacement::InPlace => Point::ZERO,
    }
}

/// Shift the root nodes by `offset`; children stay relative to their parent
pub fn translate_roots(payload: &mut ClipboardPayload, offset: Point) {
    if offset == Point::ZERO {
        return;
    }
    let roots: HashSet<&str> = payload.root_ids.iter().map(String::as_str).collect();
    for node in payload.nodes.iter_mut().filter(|n| roots.contains(n.id.as_str())) {
        let position = node.position() + offset;
        node.layout.insert("x".to_string(), Value::from(position.x));
        node.layout.insert("y".to_string(), Value::from(position.y));
    }
}

/// `InsertNode` for every payload node, children before parents
fn insert_ops(payload: &ClipboardPayload) -> Vec<PatchOp> {
    let nodes = payload.node_map();
    let mut seen = HashSet::new();
    let mut ops = Vec::with_capacity(payload.nodes.len());

    for root in &payload.root_ids {
        let mut preorder = Vec::new();
        let mut stack = vec![root.as_str()];
        while let Some(id) = stack.pop() {
            let Some(node) = nodes.get(id) else {
                continue;
            };
            if !seen.insert(id) {
                continue;
            }
            preorder.push(*node);
            stack.extend(node.children.iter().rev().map(String::as_str));
        }
        ops.extend(
            preorder
                .into_iter()
                .rev()
                .map(|node| PatchOp::InsertNode { node: node.clone() }),
        );
    }
    ops
}

/// One batch inserting the payload and attaching its roots under `target`
pub fn paste_ops(payload: &ClipboardPayload, target: &str, index: InsertIndex) -> PatchOp {
    let mut ops = insert_ops(payload);
    ops.extend(
        payload
            .root_ids
            .iter()
            .enumerate()
            .map(|(k, root)| PatchOp::attach(target, root.clone(), index.offset(k))),
    );
    PatchOp::Batch { ops }
}

/// Parent that receives a paste: the first selected container, else the parent
/// of the first selected root, else the root of `frame_id`
pub fn resolve_paste_parent(
    doc: &Document,
    index: &ParentIndex,
    selection: &[NodeId],
    frame_id: Option<&str>,
) -> EditorResult<NodeId> {
    let roots = top_level_roots(doc, index, selection)?;

    if let Some(container) = roots
        .iter()
        .filter_map(|id| doc.node(id))
        .find(|n| n.is_container() && n.is_patchable())
    {
        return Ok(container.id.clone());
    }
    if let Some(parent) = roots.first().and_then(|id| index.parent_of(id)) {
        return Ok(parent.to_string());
    }

    match frame_id {
        Some(frame_id) => doc
            .frame(frame_id)
            .map(|f| f.root_node_id.clone())
            .ok_or_else(|| NotFoundError::Frame(frame_id.to_string()).into()),
        None => Err(NotFoundError::EmptySelection.into()),
    }
}

/// Text clipboard owned by the host platform
#[allow(async_fn_in_trait)]
pub trait SystemClipboard {
    async fn read_text(&self) -> Result<Option<String>, ClipboardError>;
    async fn write_text(&self, text: &str) -> Result<(), ClipboardError>;
}

/// In-process [`SystemClipboard`] for tests and headless use
#[derive(Debug, Clone, Default)]
pub struct MemoryClipboard {
    text: Arc<Mutex<Option<String>>>,
}

impl MemoryClipboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_text(&self, text: impl Into<String>) {
        *self.text.lock().unwrap_or_else(PoisonError::into_inner) = Some(text.into());
    }

    pub fn text(&self) -> Option<String> {
        self.text.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl SystemClipboard for MemoryClipboard {
    async fn read_text(&self) -> Result<Option<String>, ClipboardError> {
        Ok(self.text())
    }

    async fn write_text(&self, text: &str) -> Result<(), ClipboardError> {
        self.set_text(text);
        Ok(())
    }
}

/// Last payload copied in this process
#[derive(Debug, Clone)]
pub struct InternalClipboard {
    pub payload: ClipboardPayload,
    pub copied_at: DateTime<Utc>,
}

impl InternalClipboard {
    pub fn is_fresh(&self, now: DateTime<Utc>, window: Duration) -> bool {
        let age = now - self.copied_at;
        age >= Duration::zero() && age <= window
    }
}

/// Outcome of a paste or duplicate
#[derive(Debug, Clone, PartialEq)]
pub struct Pasted {
    pub parent_id: NodeId,
    pub root_ids: Vec<NodeId>,
}

pub struct ClipboardService<C: SystemClipboard> {
    system: C,
    internal: Option<InternalClipboard>,
    freshness: Duration,
    duplicate_offset: Point,
}

impl<C: SystemClipboard> ClipboardService<C> {
    pub fn new(system: C, config: &EditorConfig) -> Self {
        Self {
            system,
            internal: None,
            freshness: config.clipboard_freshness(),
            duplicate_offset: config.duplicate_offset,
        }
    }

    pub fn system(&self) -> &C {
        &self.system
    }

    pub fn internal(&self) -> Option<&InternalClipboard> {
        self.internal.as_ref()
    }

    pub async fn copy(
        &mut self,
        doc: &Document,
        index: &ParentIndex,
        selection: &[NodeId],
        frame_id: Option<&str>,
    ) -> EditorResult<ClipboardPayload> {
        self.copy_at(doc, index, selection, frame_id, Utc::now()).await
    }

    /// Copy with an explicit timestamp for the freshness window
    pub async fn copy_at(
        &mut self,
        doc: &Document,
        index: &ParentIndex,
        selection: &[NodeId],
        frame_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> EditorResult<ClipboardPayload> {
        let payload = build_payload(doc, index, selection, frame_id)?;
        debug!(roots = payload.root_ids.len(), nodes = payload.nodes.len(), "Copied selection");

        // Paste still works from the internal slot if the system write fails
        if let Err(err) = self.system.write_text(&payload.to_json()?).await {
            warn!(error = %err, "Could not write system clipboard");
        }
        self.internal = Some(InternalClipboard {
            payload: payload.clone(),
            copied_at: now,
        });
        Ok(payload)
    }

    /// The payload a paste at `now` would use
    pub async fn resolve_payload(&self, now: DateTime<Utc>) -> EditorResult<ClipboardPayload> {
        if let Some(internal) = &self.internal {
            if internal.is_fresh(now, self.freshness) {
                return Ok(internal.payload.clone());
            }
            debug!(copied_at = %internal.copied_at, "Internal clipboard stale, reading system clipboard");
        }

        let text = self.system.read_text().await?;
        match text {
            Some(text) if !text.trim().is_empty() => Ok(ClipboardPayload::from_json(&text)?),
            _ => Err(ClipboardError::Empty.into()),
        }
    }

    pub async fn paste(
        &self,
        store: &SharedStore,
        selection: &[NodeId],
        frame_id: Option<&str>,
        placement: PastePlacement,
    ) -> EditorResult<Option<Pasted>> {
        self.paste_at(store, selection, frame_id, placement, Utc::now()).await
    }

    /// Paste into `store`. An empty clipboard is a no-op (`Ok(None)`).
    pub async fn paste_at(
        &self,
        store: &SharedStore,
        selection: &[NodeId],
        frame_id: Option<&str>,
        placement: PastePlacement,
        now: DateTime<Utc>,
    ) -> EditorResult<Option<Pasted>> {
        let payload = match self.resolve_payload(now).await {
            Ok(payload) => payload,
            Err(EditorError::Clipboard(ClipboardError::Empty)) => {
                debug!("Nothing to paste");
                return Ok(None);
            }
            Err(err) => return Err(err),
        };

        store
            .with(|store| apply_paste(store, &payload, selection, frame_id, placement))
            .map(Some)
    }

    /// Copy the selection next to itself. Frame roots are skipped.
    pub fn duplicate(&self, store: &mut DocumentStore, selection: &[NodeId]) -> EditorResult<Vec<NodeId>> {
        let doc = store.snapshot();
        let index = store.index();

        let roots: Vec<NodeId> = top_level_roots(&doc, index, selection)?
            .into_iter()
            .filter(|id| {
                let keep = !doc.is_frame_root(id) && index.parent_of(id).is_some();
                if !keep {
                    debug!(node_id = %id, "Skipping unparented node in duplicate");
                }
                keep
            })
            .collect();
        if roots.is_empty() {
            return Ok(Vec::new());
        }

        let original = build_payload(&doc, index, &roots, None)?;
        let mut ids = IdGenerator::for_document(&doc);
        let mut payload = remap(&original, &mut ids, |id| doc.contains_node(id));
        translate_roots(
            &mut payload,
            compute_paste_offset(original.anchor, PastePlacement::Offset(self.duplicate_offset)),
        );

        // Copies go right after the last original sharing their parent
        let mut next: HashMap<&str, usize> = HashMap::new();
        for old in &original.root_ids {
            let Some(parent) = index.parent_of(old) else {
                continue;
            };
            let position = doc
                .node(parent)
                .and_then(|p| p.children.iter().position(|c| c == old))
                .unwrap_or(0);
            let slot = next.entry(parent).or_insert(0);
            *slot = (*slot).max(position + 1);
        }

        let mut ops = insert_ops(&payload);
        for (old, new) in original.root_ids.iter().zip(&payload.root_ids) {
            let Some(parent) = index.parent_of(old) else {
                continue;
            };
            let Some(slot) = next.get_mut(parent) else {
                continue;
            };
            ops.push(PatchOp::attach(parent, new.clone(), InsertIndex::At(*slot)));
            *slot += 1;
        }

        store.apply_patches(&[PatchOp::Batch { ops }], "Duplicate")?;
        Ok(payload.root_ids)
    }
}

/// Remap, translate and insert `payload` under the resolved paste parent
pub fn apply_paste(
    store: &mut DocumentStore,
    payload: &ClipboardPayload,
    selection: &[NodeId],
    frame_id: Option<&str>,
    placement: PastePlacement,
) -> EditorResult<Pasted> {
    payload.validate()?;
    let doc = store.snapshot();
    let parent_id = resolve_paste_parent(&doc, store.index(), selection, frame_id)?;

    let mut ids = IdGenerator::for_document(&doc);
    let mut remapped = remap(payload, &mut ids, |id| doc.contains_node(id));
    translate_roots(&mut remapped, compute_paste_offset(payload.anchor, placement));

    let op = paste_ops(&remapped, &parent_id, InsertIndex::End);
    store.apply_patches(&[op], "Paste")?;

    Ok(Pasted {
        parent_id,
        root_ids: remapped.root_ids,
    })
}
