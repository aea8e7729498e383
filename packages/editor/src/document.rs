//! # Document Model
//!
//! Immutable value types for a design document.
//!
//! A Document is a flat arena: every node lives in one document-wide map keyed
//! by id, and tree structure is expressed only through each node's ordered
//! `children` list. Frames anchor one subtree each via `root_node_id`.
//!
//! ```text
//! Document
//!  ├─ frames:     frameId → Frame ──rootNodeId──┐
//!  ├─ nodes:      nodeId  → Node  ◄─────────────┘
//!  │                         └─ children: [nodeId, ...]
//!  └─ components: componentId → ComponentDef
//! ```
//!
//! Nothing here holds a parent pointer. Parents are derived by
//! [`ParentIndex`](crate::ParentIndex).

use crate::geometry::{Axis, EdgeInsets, Point, Rect, Size};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

pub type NodeId = String;
pub type FrameId = String;
pub type ComponentId = String;

/// Nested attribute mapping (layout, style, props)
pub type PropMap = serde_json::Map<String, Value>;

/// Key of the one-entry object that marks a property value as a node id,
/// e.g. `{"$node": "n12"}`. Plain strings are never treated as references.
pub const NODE_REF_KEY: &str = "$node";

/// Property value referring to node `id`
pub fn node_ref(id: impl Into<NodeId>) -> Value {
    let mut marker = serde_json::Map::new();
    marker.insert(NODE_REF_KEY.to_string(), Value::String(id.into()));
    Value::Object(marker)
}

/// The node id `value` refers to, if it is a reference marker
pub fn as_node_ref(value: &Value) -> Option<&str> {
    match value {
        Value::Object(map) if map.len() == 1 => map.get(NODE_REF_KEY).and_then(Value::as_str),
        _ => None,
    }
}

/// Node variants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Container,
    Text,
    Image,
    Icon,
    Spacer,
    Instance,
    Slot,
}

/// How a container places its children
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutMode {
    /// Children are positioned by their own `x`/`y`
    Absolute,
    /// Children flow along `direction` (auto-layout)
    Stack,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: NodeId,

    #[serde(rename = "type")]
    pub kind: NodeKind,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default)]
    pub layout: PropMap,

    #[serde(default)]
    pub style: PropMap,

    #[serde(default)]
    pub props: PropMap,

    #[serde(default)]
    pub children: Vec<NodeId>,

    /// Self-reference for patchable nodes, `None` for expanded instance content
    pub patch_target: Option<NodeId>,
}

impl Node {
    pub fn new(id: impl Into<NodeId>, kind: NodeKind) -> Self {
        let id = id.into();
        Self {
            patch_target: Some(id.clone()),
            id,
            kind,
            name: None,
            layout: PropMap::new(),
            style: PropMap::new(),
            props: PropMap::new(),
            children: Vec::new(),
        }
    }

    pub fn container(id: impl Into<NodeId>) -> Self {
        Self::new(id, NodeKind::Container)
    }

    pub fn text(id: impl Into<NodeId>, content: &str) -> Self {
        Self::new(id, NodeKind::Text).with_prop("text", Value::from(content))
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_layout(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.layout.insert(key.to_string(), value.into());
        self
    }

    pub fn with_style(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.style.insert(key.to_string(), value.into());
        self
    }

    pub fn with_prop(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.props.insert(key.to_string(), value.into());
        self
    }

    pub fn with_children<I, S>(mut self, children: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<NodeId>,
    {
        self.children = children.into_iter().map(Into::into).collect();
        self
    }

    /// Mark as expanded instance content (not independently patchable)
    pub fn expanded(mut self) -> Self {
        self.patch_target = None;
        self
    }

    pub fn is_patchable(&self) -> bool {
        self.patch_target.is_some()
    }

    /// Position relative to the parent, from `layout.x` / `layout.y`
    pub fn position(&self) -> Point {
        Point::new(number(&self.layout, "x"), number(&self.layout, "y"))
    }

    pub fn layout_mode(&self) -> LayoutMode {
        match self.layout.get("mode").and_then(Value::as_str) {
            Some("stack") => LayoutMode::Stack,
            _ => LayoutMode::Absolute,
        }
    }

    pub fn direction(&self) -> Axis {
        match self.layout.get("direction").and_then(Value::as_str) {
            Some("horizontal") => Axis::Horizontal,
            _ => Axis::Vertical,
        }
    }

    pub fn gap(&self) -> f64 {
        number(&self.layout, "gap")
    }

    /// `layout.padding` as either a number or `{top, right, bottom, left}`
    pub fn padding(&self) -> EdgeInsets {
        match self.layout.get("padding") {
            Some(Value::Number(n)) => EdgeInsets::uniform(n.as_f64().unwrap_or(0.0)),
            Some(Value::Object(sides)) => EdgeInsets {
                top: number(sides, "top"),
                right: number(sides, "right"),
                bottom: number(sides, "bottom"),
                left: number(sides, "left"),
            },
            _ => EdgeInsets::default(),
        }
    }

    pub fn is_container(&self) -> bool {
        self.kind == NodeKind::Container
    }

    pub fn is_auto_layout(&self) -> bool {
        self.is_container() && self.layout_mode() == LayoutMode::Stack
    }
}

fn number(map: &PropMap, key: &str) -> f64 {
    map.get(key).and_then(Value::as_f64).unwrap_or(0.0)
}

/// A named canvas region anchoring one node subtree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Frame {
    pub id: FrameId,
    pub name: String,
    pub root_node_id: NodeId,
    pub position: Point,
    pub size: Size,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Frame {
    pub fn new(
        id: impl Into<FrameId>,
        name: impl Into<String>,
        root_node_id: impl Into<NodeId>,
        placement: Rect,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            name: name.into(),
            root_node_id: root_node_id.into(),
            position: Point::new(placement.x, placement.y),
            size: Size::new(placement.width, placement.height),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn bounds(&self) -> Rect {
        Rect::from_origin_size(self.position, self.size)
    }
}

/// Reusable component definition (instances refer to it by id)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentDef {
    pub id: ComponentId,
    pub name: String,
    pub root_node_id: NodeId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: String,

    /// Saved revision; the engine never bumps it
    #[serde(default)]
    pub version: u64,

    #[serde(default)]
    pub frames: BTreeMap<FrameId, Frame>,

    /// Shared between snapshots; a write copies only the node it touches
    #[serde(default)]
    pub nodes: BTreeMap<NodeId, Arc<Node>>,

    #[serde(default)]
    pub components: BTreeMap<ComponentId, ComponentDef>,

    /// Theme / token set reference
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theme: Option<String>,
}

impl Document {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            version: 0,
            frames: BTreeMap::new(),
            nodes: BTreeMap::new(),
            components: BTreeMap::new(),
            theme: None,
        }
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id).map(Arc::as_ref)
    }

    /// Writable node, unshared from other snapshots first
    pub fn node_mut(&mut self, id: &str) -> Option<&mut Node> {
        self.nodes.get_mut(id).map(Arc::make_mut)
    }

    /// Store `node` under its own id, returning the value it replaced
    pub fn insert_node(&mut self, node: Node) -> Option<Arc<Node>> {
        self.nodes.insert(node.id.clone(), Arc::new(node))
    }

    pub fn frame(&self, id: &str) -> Option<&Frame> {
        self.frames.get(id)
    }

    pub fn contains_node(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    /// Frame whose root is `node_id`, if any
    pub fn frame_for_root(&self, node_id: &str) -> Option<&Frame> {
        self.frames.values().find(|f| f.root_node_id == node_id)
    }

    pub fn is_frame_root(&self, node_id: &str) -> bool {
        self.frame_for_root(node_id).is_some()
    }

    /// Pre-order ids of `root` and all its descendants.
    ///
    /// Ids referenced but missing from the node map are skipped, and a node is
    /// visited at most once even if the tree is malformed.
    pub fn subtree(&self, root: &str) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut seen = HashSet::new();
        let mut stack = vec![root.to_string()];

        while let Some(id) = stack.pop() {
            let Some(node) = self.nodes.get(&id) else {
                continue;
            };
            if !seen.insert(id.clone()) {
                continue;
            }
            stack.extend(node.children.iter().rev().cloned());
            out.push(id);
        }

        out
    }

    /// Post-order `(parent, child)` edges below `root`: every edge into a
    /// node appears after all edges below that node.
    pub fn subtree_edges_bottom_up(&self, root: &str) -> Vec<(NodeId, NodeId)> {
        let mut edges = Vec::new();
        let mut seen = HashSet::new();
        seen.insert(root.to_string());

        // (node, next child index to visit)
        let mut stack: Vec<(String, usize)> = vec![(root.to_string(), 0)];
        while let Some((id, next)) = stack.pop() {
            let child = self
                .nodes
                .get(&id)
                .and_then(|n| n.children.get(next))
                .cloned();

            match child {
                Some(child) => {
                    stack.push((id, next + 1));
                    if self.nodes.contains_key(&child) && seen.insert(child.clone()) {
                        stack.push((child, 0));
                    }
                }
                None => {
                    if let Some((parent, _)) = stack.last() {
                        edges.push((parent.clone(), id));
                    }
                }
            }
        }

        edges
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tree() -> Document {
        let mut doc = Document::new("doc");
        for node in [
            Node::container("root").with_children(["a", "b"]),
            Node::container("a").with_children(["a1", "a2"]),
            Node::text("a1", "one"),
            Node::text("a2", "two"),
            Node::text("b", "three"),
        ] {
            doc.insert_node(node);
        }
        doc
    }

    #[test]
    fn test_subtree_is_preorder() {
        let doc = tree();
        assert_eq!(doc.subtree("root"), vec!["root", "a", "a1", "a2", "b"]);
        assert_eq!(doc.subtree("a"), vec!["a", "a1", "a2"]);
        assert!(doc.subtree("missing").is_empty());
    }

    #[test]
    fn test_bottom_up_edges_visit_children_first() {
        let doc = tree();
        let edges = doc.subtree_edges_bottom_up("root");
        let pos = |child: &str| edges.iter().position(|(_, c)| c == child).unwrap();

        assert_eq!(edges.len(), 4);
        assert!(pos("a1") < pos("a"));
        assert!(pos("a2") < pos("a"));
        assert_eq!(edges[pos("a")].0, "root");
    }

    #[test]
    fn test_node_mut_leaves_other_snapshots_alone() {
        let before = tree();
        let mut after = before.clone();
        after.node_mut("a1").unwrap().children.push("b".to_string());

        assert!(before.nodes["a1"].children.is_empty());
        assert_eq!(after.nodes["a1"].children, vec!["b"]);
        assert!(Arc::ptr_eq(&before.nodes["a2"], &after.nodes["a2"]));
        assert!(!Arc::ptr_eq(&before.nodes["a1"], &after.nodes["a1"]));
    }

    #[test]
    fn test_layout_accessors() {
        let node = Node::container("c")
            .with_layout("mode", "stack")
            .with_layout("direction", "horizontal")
            .with_layout("gap", 12)
            .with_layout("padding", json!({"top": 1, "left": 4}))
            .with_layout("x", 30)
            .with_layout("y", 40.5);

        assert!(node.is_auto_layout());
        assert_eq!(node.direction(), Axis::Horizontal);
        assert_eq!(node.gap(), 12.0);
        assert_eq!(node.padding().left, 4.0);
        assert_eq!(node.padding().right, 0.0);
        assert_eq!(node.position(), Point::new(30.0, 40.5));
    }

    #[test]
    fn test_node_ref_marker() {
        assert_eq!(node_ref("n1"), json!({"$node": "n1"}));
        assert_eq!(as_node_ref(&node_ref("n1")), Some("n1"));
        assert_eq!(as_node_ref(&json!("n1")), None);
        assert_eq!(as_node_ref(&json!({"$node": "n1", "extra": true})), None);
    }

    #[test]
    fn test_node_wire_format() {
        let node = Node::text("t1", "Hello").expanded();
        let json = serde_json::to_value(&node).unwrap();

        assert_eq!(json["type"], "text");
        assert_eq!(json["patchTarget"], Value::Null);
        assert_eq!(json["props"]["text"], "Hello");

        let back: Node = serde_json::from_value(json).unwrap();
        assert_eq!(back, node);
    }
}
