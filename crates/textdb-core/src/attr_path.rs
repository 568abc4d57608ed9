//! Dotted attribute paths (`"daq.card.id"`).
//!
//! Resolution is total: a missing key, or an intermediate value that is not
//! a Branch (sequences included), simply yields `None`.

use crate::node::{Branch, LookupError, Node};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AttrPathError {
    #[error("attribute path is empty")]
    Empty,
    #[error("attribute path '{path}' has an empty segment")]
    EmptySegment { path: String },
}

/// A parsed, non-empty sequence of key segments.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AttrPath {
    segments: Vec<String>,
}

impl AttrPath {
    pub fn parse(path: &str) -> Result<Self, AttrPathError> {
        if path.is_empty() {
            return Err(AttrPathError::Empty);
        }
        let segments: Vec<String> = path.split('.').map(str::to_string).collect();
        if segments.iter().any(String::is_empty) {
            return Err(AttrPathError::EmptySegment {
                path: path.to_string(),
            });
        }
        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Walk `node` segment by segment.
    pub fn resolve<'a>(&self, node: &'a Node) -> Option<&'a Node> {
        self.segments
            .iter()
            .try_fold(node, |current, segment| current.as_branch()?.get(segment))
    }

    /// Same as [`AttrPath::resolve`] starting from a Branch.
    pub fn resolve_in<'a>(&self, branch: &'a Branch) -> Option<&'a Node> {
        let (first, rest) = self.segments.split_first()?;
        rest.iter()
            .try_fold(branch.get(first)?, |current, segment| {
                current.as_branch()?.get(segment)
            })
    }

    /// Like `resolve`, but reports which segment was missing.
    pub fn lookup<'a>(&self, node: &'a Node) -> Result<&'a Node, LookupError> {
        let mut current = node;
        for segment in &self.segments {
            current = current
                .as_branch()
                .and_then(|branch| branch.get(segment))
                .ok_or_else(|| self.absent(segment))?;
        }
        Ok(current)
    }

    pub fn lookup_in<'a>(&self, branch: &'a Branch) -> Result<&'a Node, LookupError> {
        let (first, rest) = self
            .segments
            .split_first()
            .ok_or(LookupError::InvalidPath(AttrPathError::Empty))?;
        let mut current = branch.get(first).ok_or_else(|| self.absent(first))?;
        for segment in rest {
            current = current
                .as_branch()
                .and_then(|branch| branch.get(segment))
                .ok_or_else(|| self.absent(segment))?;
        }
        Ok(current)
    }

    fn absent(&self, segment: &str) -> LookupError {
        LookupError::KeyAbsent {
            path: self.to_string(),
            segment: segment.to_string(),
        }
    }
}

impl FromStr for AttrPath {
    type Err = AttrPathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for AttrPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("."))
    }
}

/// Resolve a path string against `record`, treating a malformed path as
/// not found.
pub fn resolve<'a>(record: &'a Node, path: &str) -> Option<&'a Node> {
    AttrPath::parse(path).ok()?.resolve(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_rejects_empty_segments() {
        assert_eq!(AttrPath::parse(""), Err(AttrPathError::Empty));
        for bad in ["a..b", ".a", "a."] {
            assert!(matches!(
                AttrPath::parse(bad),
                Err(AttrPathError::EmptySegment { .. })
            ));
        }
        let path: AttrPath = "daq.card.id".parse().unwrap();
        assert_eq!(path.segments(), ["daq", "card", "id"]);
        assert_eq!(path.to_string(), "daq.card.id");
    }

    #[test]
    fn resolve_is_total() {
        let record = Node::from_value(json!({"a": {"b": 1}, "list": [{"c": 2}]}));
        assert_eq!(resolve(&record, "a.b").and_then(Node::as_i64), Some(1));
        assert!(resolve(&record, "a.b.c").is_none());
        assert!(resolve(&record, "missing").is_none());
        assert!(resolve(&record, "list.c").is_none());
        assert!(resolve(&record, "a..b").is_none());
    }

    #[test]
    fn resolve_in_matches_resolve() {
        let node = Node::from_value(json!({"x": {"y": {"z": "deep"}}}));
        let branch = node.as_branch().unwrap();
        let path = AttrPath::parse("x.y.z").unwrap();
        assert_eq!(path.resolve_in(branch), path.resolve(&node));
        assert_eq!(path.resolve_in(branch).and_then(Node::as_str), Some("deep"));
    }
}
