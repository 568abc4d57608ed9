//! Point-in-time views of a tree.
//!
//! A Branch with a validity log resolves to the union of its active
//! children. A Branch without one resolves child by child, so one query at
//! the root resolves every log below it.

use crate::node::{Branch, Node};
use crate::overlay::{resolve_active, ActiveSet, WILDCARD_SELECTOR};
use crate::time::{IntoTimestamp, TimestampError};
use crate::validity::ValidityLog;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use parking_lot::RwLock;
use regex::Regex;
use uuid::Uuid;

/// Parameters of a temporal query.
#[derive(Debug, Clone)]
pub struct TemporalQuery {
    at: DateTime<Utc>,
    selector: String,
    /// Only active keys matching this pattern are merged.
    pattern: Option<Regex>,
}

impl TemporalQuery {
    pub fn new(at: impl IntoTimestamp) -> Result<Self, TimestampError> {
        Ok(Self::at(at.into_timestamp()?))
    }

    pub fn at(at: DateTime<Utc>) -> Self {
        Self {
            at,
            selector: WILDCARD_SELECTOR.to_string(),
            pattern: None,
        }
    }

    pub fn with_selector(mut self, selector: impl Into<String>) -> Self {
        self.selector = selector.into();
        self
    }

    pub fn with_pattern(mut self, pattern: Regex) -> Self {
        self.pattern = Some(pattern);
        self
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.at
    }

    pub fn selector(&self) -> &str {
        &self.selector
    }

    pub fn pattern(&self) -> Option<&Regex> {
        self.pattern.as_ref()
    }

    fn admits(&self, key: &str) -> bool {
        self.pattern.as_ref().map_or(true, |re| re.is_match(key))
    }
}

// ============================================================================
// Active-set cache
// ============================================================================

type CacheKey = (Uuid, String, DateTime<Utc>);

/// Memoised replays, keyed by (log identity, selector, instant).
///
/// Holds at most `capacity` entries; once full, the oldest insertion is
/// evicted. Rebuilt logs get a new identity, so stale entries are never hit;
/// [`ActiveSetCache::clear`] releases them all at once after a reload.
#[derive(Debug)]
pub struct ActiveSetCache {
    entries: RwLock<IndexMap<CacheKey, ActiveSet>>,
    capacity: usize,
}

impl Default for ActiveSetCache {
    fn default() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }
}

impl ActiveSetCache {
    pub const DEFAULT_CAPACITY: usize = 4096;

    pub fn new() -> Self {
        Self::default()
    }

    /// A cache holding at most `capacity` active sets (at least one).
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: RwLock::new(IndexMap::new()),
            capacity: capacity.max(1),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn get_or_resolve(&self, log: &ValidityLog, selector: &str, at: DateTime<Utc>) -> ActiveSet {
        let key = (log.id(), selector.to_string(), at);
        if let Some(hit) = self.entries.read().get(&key) {
            return hit.clone();
        }
        let active = resolve_active(log, selector, at);
        tracing::trace!(log = %log.id(), selector, keys = active.len(), "active set cached");

        let mut entries = self.entries.write();
        if !entries.contains_key(&key) && entries.len() >= self.capacity {
            entries.shift_remove_index(0);
        }
        entries.insert(key, active.clone());
        active
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }
}

// ============================================================================
// Resolution
// ============================================================================

fn resolve_branch(branch: &Branch, query: &TemporalQuery, cache: Option<&ActiveSetCache>) -> Branch {
    let Some(log) = branch.validity() else {
        return branch
            .iter()
            .map(|(key, node)| (key, resolve_node(node, query, cache)))
            .collect();
    };

    let active = match cache {
        Some(cache) => cache.get_or_resolve(log, &query.selector, query.at),
        None => resolve_active(log, &query.selector, query.at),
    };

    let mut merged = Branch::new();
    for key in active.iter().filter(|key| query.admits(key)) {
        match branch.get(key) {
            Some(Node::Branch(child)) => merged.merge(resolve_branch(child, query, cache)),
            // A non-mapping document cannot be merged; keep it under its key.
            Some(leaf @ Node::Leaf(_)) => {
                merged.insert(key, leaf.clone());
            }
            None => {
                tracing::warn!(key, selector = %query.selector, "validity target has no matching entry");
            }
        }
    }
    merged
}

fn resolve_node(node: &Node, query: &TemporalQuery, cache: Option<&ActiveSetCache>) -> Node {
    match node {
        Node::Branch(branch) => Node::Branch(resolve_branch(branch, query, cache)),
        Node::Leaf(_) => node.clone(),
    }
}

impl Branch {
    /// Resolve this Branch (and everything below it) as of `query`.
    pub fn on(&self, query: &TemporalQuery) -> Branch {
        resolve_branch(self, query, None)
    }

    /// Same as [`Branch::on`], memoising replays in `cache`.
    pub fn on_cached(&self, query: &TemporalQuery, cache: &ActiveSetCache) -> Branch {
        resolve_branch(self, query, Some(cache))
    }

    /// Active keys of this Branch's own log; `None` without a log.
    pub fn active(&self, selector: &str, at: DateTime<Utc>) -> Option<ActiveSet> {
        self.validity().map(|log| resolve_active(log, selector, at))
    }
}
