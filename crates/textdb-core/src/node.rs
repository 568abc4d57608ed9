//! The document tree.
//!
//! A [`Node`] is either a [`Leaf`](Node::Leaf) holding a scalar or sequence
//! verbatim, or a [`Branch`] holding named children. JSON objects are always
//! turned into Branches, so path lookups never need to look inside a Leaf.

use crate::attr_path::{AttrPath, AttrPathError};
use crate::validity::ValidityLog;
use indexmap::IndexMap;
use serde_json::{Map, Value};
use std::sync::Arc;
use thiserror::Error;

/// File suffixes dropped when forming a key from a source name.
const DOCUMENT_SUFFIXES: [&str; 3] = [".json", ".yaml", ".yml"];

/// Strip a `.json` / `.yaml` / `.yml` suffix from `name`.
///
/// `"file3.json"` and `"file3"` name the same key.
pub fn strip_document_suffix(name: &str) -> &str {
    DOCUMENT_SUFFIXES
        .iter()
        .find_map(|suffix| name.strip_suffix(suffix))
        .filter(|stem| !stem.is_empty())
        .unwrap_or(name)
}

/// Error returned by direct (single-record) lookups.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookupError {
    /// A segment of the path does not exist (or its parent is not a mapping).
    #[error("key '{segment}' not found while resolving '{path}'")]
    KeyAbsent { path: String, segment: String },
    #[error(transparent)]
    InvalidPath(#[from] AttrPathError),
}

// ============================================================================
// Node
// ============================================================================

/// A value in the document tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// Terminal value: scalar, null or sequence.
    Leaf(Value),
    /// Named children (a directory or a document object).
    Branch(Branch),
}

impl Node {
    /// Convert a parsed JSON value, turning every object into a Branch.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(map) => Node::Branch(Branch::from_object(map)),
            other => Node::Leaf(other),
        }
    }

    /// Convert back to JSON. Branches become objects in key order.
    pub fn to_value(&self) -> Value {
        match self {
            Node::Leaf(value) => value.clone(),
            Node::Branch(branch) => branch.to_value(),
        }
    }

    pub fn as_branch(&self) -> Option<&Branch> {
        match self {
            Node::Branch(branch) => Some(branch),
            Node::Leaf(_) => None,
        }
    }

    pub fn as_branch_mut(&mut self) -> Option<&mut Branch> {
        match self {
            Node::Branch(branch) => Some(branch),
            Node::Leaf(_) => None,
        }
    }

    pub fn as_leaf(&self) -> Option<&Value> {
        match self {
            Node::Leaf(value) => Some(value),
            Node::Branch(_) => None,
        }
    }

    pub fn is_branch(&self) -> bool {
        matches!(self, Node::Branch(_))
    }

    /// Shorthand for string leaves.
    pub fn as_str(&self) -> Option<&str> {
        self.as_leaf().and_then(Value::as_str)
    }

    /// Shorthand for integer leaves.
    pub fn as_i64(&self) -> Option<i64> {
        self.as_leaf().and_then(Value::as_i64)
    }

    /// Total lookup: `None` when any segment is missing.
    pub fn resolve(&self, path: &AttrPath) -> Option<&Node> {
        path.resolve(self)
    }

    /// Point lookup of a dotted path; a missing key is an explicit error.
    pub fn lookup(&self, path: &str) -> Result<&Node, LookupError> {
        AttrPath::parse(path)?.lookup(self)
    }
}

impl From<Value> for Node {
    fn from(value: Value) -> Self {
        Node::from_value(value)
    }
}

impl From<Branch> for Node {
    fn from(branch: Branch) -> Self {
        Node::Branch(branch)
    }
}

// ============================================================================
// Branch
// ============================================================================

/// An insertion-ordered mapping of keys to nodes, optionally carrying the
/// validity log of the directory it was loaded from.
#[derive(Debug, Clone, Default)]
pub struct Branch {
    children: IndexMap<String, Node>,
    /// Shared so that resolved copies keep the log identity used as cache key.
    validity: Option<Arc<ValidityLog>>,
}

impl PartialEq for Branch {
    fn eq(&self, other: &Self) -> bool {
        self.children == other.children
            && self.validity.as_deref() == other.validity.as_deref()
    }
}

impl Branch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_object(map: Map<String, Value>) -> Self {
        let children = map
            .into_iter()
            .map(|(key, value)| (key, Node::from_value(value)))
            .collect();
        Self {
            children,
            validity: None,
        }
    }

    pub fn to_value(&self) -> Value {
        let map: Map<String, Value> = self
            .children
            .iter()
            .map(|(key, node)| (key.clone(), node.to_value()))
            .collect();
        Value::Object(map)
    }

    pub fn validity(&self) -> Option<&ValidityLog> {
        self.validity.as_deref()
    }

    pub fn set_validity(&mut self, log: ValidityLog) {
        self.validity = Some(Arc::new(log));
    }

    pub fn with_validity(mut self, log: ValidityLog) -> Self {
        self.set_validity(log);
        self
    }

    pub fn get(&self, key: &str) -> Option<&Node> {
        self.children.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Node> {
        self.children.get_mut(key)
    }

    /// Insert or overwrite `key`. An existing key keeps its position.
    pub fn insert(&mut self, key: impl Into<String>, node: impl Into<Node>) -> Option<Node> {
        self.children.insert(key.into(), node.into())
    }

    /// Remove `key`, preserving the order of the remaining children.
    pub fn remove(&mut self, key: &str) -> Option<Node> {
        self.children.shift_remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.children.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.children.keys().map(String::as_str)
    }

    pub fn values(&self) -> impl Iterator<Item = &Node> {
        self.children.values()
    }

    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut Node> {
        self.children.values_mut()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Node)> {
        self.children.iter().map(|(key, node)| (key.as_str(), node))
    }

    /// Return the child Branch at `key`, creating an empty one if needed.
    ///
    /// A Leaf already stored under `key` is replaced.
    pub fn branch_entry(&mut self, key: impl Into<String>) -> &mut Branch {
        let slot = self
            .children
            .entry(key.into())
            .or_insert_with(|| Node::Branch(Branch::new()));
        if !slot.is_branch() {
            *slot = Node::Branch(Branch::new());
        }
        match slot {
            Node::Branch(branch) => branch,
            Node::Leaf(_) => unreachable!("slot was just replaced by a branch"),
        }
    }

    /// Merge `other` into `self` by recursive key union.
    ///
    /// Branch + Branch merges recursively; every other collision is won by
    /// `other`. A validity log on `other` replaces the one on `self`.
    pub fn merge(&mut self, other: Branch) {
        let Branch { children, validity } = other;
        if validity.is_some() {
            self.validity = validity;
        }
        for (key, incoming) in children {
            match (self.children.get_mut(&key), incoming) {
                (Some(Node::Branch(existing)), Node::Branch(incoming)) => existing.merge(incoming),
                (_, incoming) => {
                    self.children.insert(key, incoming);
                }
            }
        }
    }

    /// Non-mutating form of [`Branch::merge`].
    pub fn merged(&self, other: &Branch) -> Branch {
        let mut result = self.clone();
        result.merge(other.clone());
        result
    }

    /// Point lookup of a dotted attribute path (`"group.label"`).
    pub fn lookup(&self, path: &str) -> Result<&Node, LookupError> {
        AttrPath::parse(path)?.lookup_in(self)
    }

    /// Point lookup of a slash-separated database path (`"dir1/file3.json"`).
    ///
    /// Each segment has its document suffix stripped before lookup.
    pub fn get_path(&self, path: &str) -> Result<&Node, LookupError> {
        let mut segments = path
            .split('/')
            .filter(|segment| !segment.is_empty() && *segment != ".");
        let absent = |segment: &str| LookupError::KeyAbsent {
            path: path.to_string(),
            segment: segment.to_string(),
        };

        let Some(first) = segments.next() else {
            return Err(AttrPathError::Empty.into());
        };
        let first = strip_document_suffix(first);
        let mut current = self.get(first).ok_or_else(|| absent(first))?;
        for segment in segments {
            let segment = strip_document_suffix(segment);
            current = current
                .as_branch()
                .and_then(|branch| branch.get(segment))
                .ok_or_else(|| absent(segment))?;
        }
        Ok(current)
    }
}

impl<K: Into<String>, N: Into<Node>> FromIterator<(K, N)> for Branch {
    fn from_iter<I: IntoIterator<Item = (K, N)>>(iter: I) -> Self {
        let children = iter
            .into_iter()
            .map(|(key, node)| (key.into(), node.into()))
            .collect();
        Self {
            children,
            validity: None,
        }
    }
}

impl<'a> IntoIterator for &'a Branch {
    type Item = (&'a String, &'a Node);
    type IntoIter = indexmap::map::Iter<'a, String, Node>;

    fn into_iter(self) -> Self::IntoIter {
        self.children.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn branch(value: Value) -> Branch {
        match Node::from_value(value) {
            Node::Branch(branch) => branch,
            Node::Leaf(other) => panic!("expected object, got {other}"),
        }
    }

    #[test]
    fn objects_become_branches_and_arrays_stay_leaves() {
        let node = Node::from_value(json!({"a": {"b": 1}, "list": [{"x": 1}]}));
        let root = node.as_branch().unwrap();
        assert!(root.get("a").unwrap().is_branch());
        assert!(!root.get("list").unwrap().is_branch());
        assert_eq!(node.to_value(), json!({"a": {"b": 1}, "list": [{"x": 1}]}));
    }

    #[test]
    fn key_order_is_preserved() {
        let root = branch(json!({"z": 1, "a": 2, "m": 3}));
        assert_eq!(root.keys().collect::<Vec<_>>(), vec!["z", "a", "m"]);
    }

    #[test]
    fn merge_is_recursive_union_with_last_writer_wins() {
        let mut a = branch(json!({"x": {"p": 1, "q": 2}, "leaf": 1, "only_a": true}));
        let b = branch(json!({"x": {"q": 3, "r": 4}, "leaf": {"now": "branch"}, "only_b": 0}));
        a.merge(b);
        assert_eq!(
            a.to_value(),
            json!({
                "x": {"p": 1, "q": 3, "r": 4},
                "leaf": {"now": "branch"},
                "only_a": true,
                "only_b": 0
            })
        );
    }

    #[test]
    fn branch_overwritten_by_leaf() {
        let mut a = branch(json!({"x": {"p": 1}}));
        a.merge(branch(json!({"x": 5})));
        assert_eq!(a.get("x").unwrap().as_i64(), Some(5));
    }

    #[test]
    fn merged_leaves_inputs_untouched() {
        let a = branch(json!({"a": 1}));
        let b = branch(json!({"b": 2}));
        let c = a.merged(&b);
        assert_eq!(a.len(), 1);
        assert_eq!(b.len(), 1);
        assert_eq!(c.to_value(), json!({"a": 1, "b": 2}));
    }

    #[test]
    fn lookup_reports_the_absent_segment() {
        let root = branch(json!({"a": {"b": 1}}));
        assert_eq!(root.lookup("a.b").unwrap().as_i64(), Some(1));
        assert_eq!(
            root.lookup("a.c"),
            Err(LookupError::KeyAbsent {
                path: "a.c".into(),
                segment: "c".into()
            })
        );
        // descending through a leaf is also an absent key, not a panic
        assert!(matches!(
            root.lookup("a.b.c"),
            Err(LookupError::KeyAbsent { segment, .. }) if segment == "c"
        ));
    }

    #[test]
    fn get_path_strips_document_suffixes() {
        let root = branch(json!({"dir1": {"file3": {"data": 1}}}));
        assert!(root.get_path("dir1/file3.json").is_ok());
        assert!(root.get_path("dir1/file3").is_ok());
        assert!(root.get_path("./dir1/file3.yaml").is_ok());
        assert!(matches!(
            root.get_path("dir1/nope"),
            Err(LookupError::KeyAbsent { segment, .. }) if segment == "nope"
        ));
    }

    #[test]
    fn suffix_stripping_keeps_bare_suffix_names() {
        assert_eq!(strip_document_suffix("file.json"), "file");
        assert_eq!(strip_document_suffix("file.yml"), "file");
        assert_eq!(strip_document_suffix("file"), "file");
        assert_eq!(strip_document_suffix(".json"), ".json");
    }

    #[test]
    fn branch_entry_replaces_leaf() {
        let mut root = branch(json!({"a": 1}));
        root.branch_entry("a").insert("b", json!(2));
        assert_eq!(root.to_value(), json!({"a": {"b": 2}}));
    }
}
