//! Slash-delimited property paths.
//!
//! Node paths start at one of the node's attribute roots (`layout`, `style`,
//! `props`) and walk nested mappings, e.g. `layout/padding/top`. Segments use
//! JSON Pointer escaping (`~1` for `/`, `~0` for `~`).
//!
//! Intermediate segments are never created implicitly. Only the last segment
//! of a set may be new.

use crate::document::{Node, PropMap};
use crate::errors::ValidationError;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropRoot {
    Layout,
    Style,
    Props,
}

/// A parsed node property path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropPath {
    pub root: PropRoot,
    pub segments: Vec<String>,
}

/// Split a path into unescaped segments. Leading `/` is optional.
pub fn parse_segments(path: &str) -> Result<Vec<String>, ValidationError> {
    let trimmed = path.strip_prefix('/').unwrap_or(path);
    if trimmed.is_empty() {
        return Err(ValidationError::InvalidPath(path.to_string()));
    }

    trimmed
        .split('/')
        .map(|segment| {
            if segment.is_empty() {
                Err(ValidationError::InvalidPath(path.to_string()))
            } else {
                Ok(unescape(segment))
            }
        })
        .collect()
}

fn unescape(segment: &str) -> String {
    if !segment.contains('~') {
        return segment.to_string();
    }
    segment.replace("~1", "/").replace("~0", "~")
}

impl PropPath {
    pub fn parse(path: &str) -> Result<Self, ValidationError> {
        let mut segments = parse_segments(path)?;
        let root = match segments[0].as_str() {
            "layout" => PropRoot::Layout,
            "style" => PropRoot::Style,
            "props" => PropRoot::Props,
            _ => return Err(ValidationError::InvalidPath(path.to_string())),
        };
        segments.remove(0);
        Ok(Self { root, segments })
    }

    fn root_map<'a>(&self, node: &'a mut Node) -> &'a mut PropMap {
        match self.root {
            PropRoot::Layout => &mut node.layout,
            PropRoot::Style => &mut node.style,
            PropRoot::Props => &mut node.props,
        }
    }

    /// Set the value, returning what was there before (`None` if absent).
    pub fn set(&self, node: &mut Node, path: &str, value: Value) -> Result<Option<Value>, ValidationError> {
        let id = node.id.clone();
        let root = self.root_map(node);

        let Some((last, parents)) = self.segments.split_last() else {
            // Replacing a whole root
            let Value::Object(map) = value else {
                return Err(ValidationError::InvalidValue {
                    path: path.to_string(),
                    reason: "attribute roots must be objects".to_string(),
                });
            };
            let previous = std::mem::replace(root, map);
            return Ok(Some(Value::Object(previous)));
        };

        let parent = walk_mut(root, parents).ok_or_else(|| ValidationError::PathNotFound {
            id,
            path: path.to_string(),
        })?;
        Ok(parent.insert(last.clone(), value))
    }

    /// Delete the value, returning it. The full path must exist.
    pub fn delete(&self, node: &mut Node, path: &str) -> Result<Value, ValidationError> {
        let id = node.id.clone();
        let not_found = || ValidationError::PathNotFound {
            id: id.clone(),
            path: path.to_string(),
        };

        let Some((last, parents)) = self.segments.split_last() else {
            return Err(ValidationError::ReadOnlyProperty(path.to_string()));
        };

        let root = self.root_map(node);
        let parent = walk_mut(root, parents).ok_or_else(not_found)?;
        parent.remove(last).ok_or_else(not_found)
    }
}

/// Walk nested objects along `segments`
pub(crate) fn walk_mut<'a>(mut map: &'a mut PropMap, segments: &[String]) -> Option<&'a mut PropMap> {
    for segment in segments {
        map = match map.get_mut(segment) {
            Some(Value::Object(inner)) => inner,
            _ => return None,
        };
    }
    Some(map)
}

pub(crate) fn get<'a>(map: &'a PropMap, segments: &[String]) -> Option<&'a Value> {
    let (last, parents) = segments.split_last()?;
    let mut current = map;
    for segment in parents {
        current = match current.get(segment) {
            Some(Value::Object(inner)) => inner,
            _ => return None,
        };
    }
    current.get(last)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn node() -> Node {
        Node::container("n").with_layout("padding", json!({"top": 4}))
    }

    #[test]
    fn test_parse_roots() {
        let p = PropPath::parse("/style/fill").unwrap();
        assert_eq!(p.root, PropRoot::Style);
        assert_eq!(p.segments, vec!["fill"]);

        assert!(PropPath::parse("children/0").is_err());
        assert!(PropPath::parse("style//fill").is_err());
        assert!(PropPath::parse("").is_err());
    }

    #[test]
    fn test_escaped_segments() {
        let p = PropPath::parse("props/a~1b/~0c").unwrap();
        assert_eq!(p.segments, vec!["a/b", "~c"]);
    }

    #[test]
    fn test_set_creates_only_last_segment() {
        let mut n = node();

        let p = PropPath::parse("layout/padding/left").unwrap();
        assert_eq!(p.set(&mut n, "layout/padding/left", json!(8)).unwrap(), None);
        assert_eq!(n.layout["padding"]["left"], 8);

        let p = PropPath::parse("layout/margin/left").unwrap();
        let err = p.set(&mut n, "layout/margin/left", json!(8)).unwrap_err();
        assert!(matches!(err, ValidationError::PathNotFound { .. }));
    }

    #[test]
    fn test_set_returns_previous() {
        let mut n = node();
        let p = PropPath::parse("layout/padding/top").unwrap();
        assert_eq!(p.set(&mut n, "layout/padding/top", json!(9)).unwrap(), Some(json!(4)));
    }

    #[test]
    fn test_root_replacement_requires_object() {
        let mut n = node();
        let p = PropPath::parse("style").unwrap();
        assert!(p.set(&mut n, "style", json!(3)).is_err());
        assert!(p.set(&mut n, "style", json!({"fill": "red"})).is_ok());
        assert_eq!(n.style["fill"], "red");
    }

    #[test]
    fn test_delete_requires_existing_path() {
        let mut n = node();
        let p = PropPath::parse("layout/padding/top").unwrap();
        assert_eq!(p.delete(&mut n, "layout/padding/top").unwrap(), json!(4));
        assert!(p.delete(&mut n, "layout/padding/top").is_err());

        let root = PropPath::parse("layout").unwrap();
        assert!(matches!(
            root.delete(&mut n, "layout"),
            Err(ValidationError::ReadOnlyProperty(_))
        ));
    }

    #[test]
    fn test_get_nested() {
        let n = node();
        let segments = vec!["padding".to_string(), "top".to_string()];
        assert_eq!(get(&n.layout, &segments), Some(&json!(4)));
        assert_eq!(get(&n.layout, &[]), None);
    }
}
