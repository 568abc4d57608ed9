//! Re-indexing a collection of records by a nested attribute.
//!
//! A collection is any [`Branch`] whose values are records (Branches).
//! `map` builds `value -> record` and refuses duplicates; `group` builds
//! `value -> {ordinal -> record}`. Records without the attribute are skipped.

use crate::attr_path::{AttrPath, AttrPathError};
use crate::node::{Branch, Node};
use indexmap::map::Entry;
use indexmap::IndexMap;
use serde_json::{Map, Number, Value};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemapError {
    #[error("'{path}' values are not unique: {key} appears more than once")]
    DuplicateKey { path: String, key: RemapKey },
    #[error("'{path}' in record '{record}' is not a number, string or boolean")]
    UnsupportedKey { path: String, record: String },
    #[error("'{path}' values {first} and {second} both render as key \"{rendered}\"")]
    KeyCollision {
        path: String,
        first: RemapKey,
        second: RemapKey,
        rendered: String,
    },
    #[error(transparent)]
    InvalidPath(#[from] AttrPathError),
}

// ============================================================================
// Keys
// ============================================================================

/// The scalar a record is re-indexed by.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RemapKey {
    Bool(bool),
    Number(Number),
    String(String),
}

impl RemapKey {
    fn from_node(node: &Node) -> Option<Self> {
        match node.as_leaf()? {
            Value::Bool(b) => Some(RemapKey::Bool(*b)),
            Value::Number(n) => Some(RemapKey::Number(normalize_number(n))),
            Value::String(s) => Some(RemapKey::String(s.clone())),
            Value::Null | Value::Array(_) | Value::Object(_) => None,
        }
    }

    /// Key as used when the result is rendered into a JSON object.
    pub fn to_key_string(&self) -> String {
        match self {
            RemapKey::Bool(b) => b.to_string(),
            RemapKey::Number(n) => n.to_string(),
            RemapKey::String(s) => s.clone(),
        }
    }
}

impl fmt::Display for RemapKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemapKey::String(s) => write!(f, "'{s}'"),
            other => f.write_str(&other.to_key_string()),
        }
    }
}

impl From<&str> for RemapKey {
    fn from(value: &str) -> Self {
        RemapKey::String(value.to_string())
    }
}

impl From<String> for RemapKey {
    fn from(value: String) -> Self {
        RemapKey::String(value)
    }
}

impl From<i64> for RemapKey {
    fn from(value: i64) -> Self {
        RemapKey::Number(value.into())
    }
}

impl From<u64> for RemapKey {
    fn from(value: u64) -> Self {
        RemapKey::Number(value.into())
    }
}

impl From<i32> for RemapKey {
    fn from(value: i32) -> Self {
        RemapKey::Number(i64::from(value).into())
    }
}

impl From<bool> for RemapKey {
    fn from(value: bool) -> Self {
        RemapKey::Bool(value)
    }
}

/// Integral floats compare equal to the matching integer (`1.0 == 1`).
fn normalize_number(n: &Number) -> Number {
    match n.as_f64() {
        Some(f) if n.is_f64() && f.fract() == 0.0 => {
            if f >= i64::MIN as f64 && f < i64::MAX as f64 {
                Number::from(f as i64)
            } else if f >= 0.0 && f < u64::MAX as f64 {
                Number::from(f as u64)
            } else {
                n.clone()
            }
        }
        _ => n.clone(),
    }
}

/// Render `(key, item)` pairs under string keys, refusing two keys that
/// render the same (`1` and `"1"`).
fn render<'a, T: 'a, U>(
    path: &str,
    entries: impl Iterator<Item = (&'a RemapKey, T)>,
    convert: impl Fn(T) -> U,
) -> Result<IndexMap<String, U>, RemapError> {
    let mut rendered: IndexMap<String, (&RemapKey, U)> = IndexMap::new();
    for (key, item) in entries {
        match rendered.entry(key.to_key_string()) {
            Entry::Occupied(slot) => {
                return Err(RemapError::KeyCollision {
                    path: path.to_string(),
                    first: slot.get().0.clone(),
                    second: key.clone(),
                    rendered: slot.key().clone(),
                })
            }
            Entry::Vacant(slot) => {
                slot.insert((key, convert(item)));
            }
        }
    }
    Ok(rendered.into_iter().map(|(name, (_, item))| (name, item)).collect())
}

// ============================================================================
// Results
// ============================================================================

/// Unique re-index: one record per key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Remapped {
    path: String,
    entries: IndexMap<RemapKey, Node>,
}

impl Remapped {
    pub fn get(&self, key: impl Into<RemapKey>) -> Option<&Node> {
        self.entries.get(&key.into())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &RemapKey> {
        self.entries.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&RemapKey, &Node)> {
        self.entries.iter()
    }

    /// The result as a collection, keys rendered as strings.
    ///
    /// Fails with [`RemapError::KeyCollision`] when two keys render alike.
    pub fn into_branch(self) -> Result<Branch, RemapError> {
        let rendered = render(&self.path, self.entries.iter(), Node::clone)?;
        Ok(rendered.into_iter().collect())
    }

    pub fn to_value(&self) -> Result<Value, RemapError> {
        let rendered = render(&self.path, self.entries.iter(), Node::to_value)?;
        Ok(Value::Object(rendered.into_iter().collect::<Map<String, Value>>()))
    }
}

/// Grouping re-index: each key holds a bucket keyed by ordinal (`"0"`, `"1"`, ...).
///
/// Buckets are Branches, so they can be remapped again.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Grouped {
    path: String,
    buckets: IndexMap<RemapKey, Branch>,
}

impl Grouped {
    pub fn get(&self, key: impl Into<RemapKey>) -> Option<&Branch> {
        self.buckets.get(&key.into())
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &RemapKey> {
        self.buckets.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&RemapKey, &Branch)> {
        self.buckets.iter()
    }

    /// True when no bucket holds more than one record.
    pub fn is_unique(&self) -> bool {
        self.buckets.values().all(|bucket| bucket.len() <= 1)
    }

    /// Buckets under string keys; see [`Remapped::into_branch`].
    pub fn into_branch(self) -> Result<Branch, RemapError> {
        let rendered = render(&self.path, self.buckets.iter(), Branch::clone)?;
        Ok(rendered.into_iter().collect())
    }

    pub fn to_value(&self) -> Result<Value, RemapError> {
        let rendered = render(&self.path, self.buckets.iter(), Branch::to_value)?;
        Ok(Value::Object(rendered.into_iter().collect::<Map<String, Value>>()))
    }
}

/// Result of [`remap`], depending on the uniqueness flag.
#[derive(Debug, Clone, PartialEq)]
pub enum Remap {
    Unique(Remapped),
    Grouped(Grouped),
}

impl Remap {
    pub fn is_empty(&self) -> bool {
        match self {
            Remap::Unique(remapped) => remapped.is_empty(),
            Remap::Grouped(grouped) => grouped.is_empty(),
        }
    }

    pub fn to_value(&self) -> Result<Value, RemapError> {
        match self {
            Remap::Unique(remapped) => remapped.to_value(),
            Remap::Grouped(grouped) => grouped.to_value(),
        }
    }
}

// ============================================================================
// Operations
// ============================================================================

/// Yield `(key, record)` for every record that has a value at `path`.
fn keyed_records<'a>(
    collection: &'a Branch,
    path: &'a AttrPath,
) -> impl Iterator<Item = Result<(RemapKey, &'a Node), RemapError>> + 'a {
    collection.iter().filter_map(move |(name, record)| {
        let value = path.resolve(record)?;
        Some(
            RemapKey::from_node(value)
                .map(|key| (key, record))
                .ok_or_else(|| RemapError::UnsupportedKey {
                    path: path.to_string(),
                    record: name.to_string(),
                }),
        )
    })
}

fn warn_if_unmatched(collection: &Branch, path: &AttrPath, matched: usize) {
    if matched == 0 && !collection.is_empty() {
        tracing::warn!(%path, records = collection.len(), "no record has a value at this path");
    }
}

/// Unique re-index of `collection` by `path`.
pub fn map_unique(collection: &Branch, path: &str) -> Result<Remapped, RemapError> {
    let path = AttrPath::parse(path)?;
    let mut entries = IndexMap::new();
    for item in keyed_records(collection, &path) {
        let (key, record) = item?;
        match entries.entry(key) {
            Entry::Occupied(slot) => {
                return Err(RemapError::DuplicateKey {
                    path: path.to_string(),
                    key: slot.key().clone(),
                })
            }
            Entry::Vacant(slot) => {
                slot.insert(record.clone());
            }
        }
    }
    warn_if_unmatched(collection, &path, entries.len());
    Ok(Remapped {
        path: path.to_string(),
        entries,
    })
}

/// Grouping re-index of `collection` by `path`.
///
/// Ordinals count from zero per key, in the collection's iteration order.
pub fn group(collection: &Branch, path: &str) -> Result<Grouped, RemapError> {
    let path = AttrPath::parse(path)?;
    let mut buckets: IndexMap<RemapKey, Branch> = IndexMap::new();
    for item in keyed_records(collection, &path) {
        let (key, record) = item?;
        let bucket = buckets.entry(key).or_default();
        let ordinal = bucket.len().to_string();
        bucket.insert(ordinal, record.clone());
    }
    warn_if_unmatched(collection, &path, buckets.len());
    Ok(Grouped {
        path: path.to_string(),
        buckets,
    })
}

pub fn remap(collection: &Branch, path: &str, unique: bool) -> Result<Remap, RemapError> {
    if unique {
        map_unique(collection, path).map(Remap::Unique)
    } else {
        group(collection, path).map(Remap::Grouped)
    }
}

impl Branch {
    /// Unique re-index by `path`; see [`map_unique`].
    pub fn map(&self, path: &str) -> Result<Remapped, RemapError> {
        map_unique(self, path)
    }

    /// Grouping re-index by `path`; see [`group`].
    pub fn group(&self, path: &str) -> Result<Grouped, RemapError> {
        group(self, path)
    }
}
