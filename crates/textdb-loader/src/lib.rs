//! Filesystem loader for TextDB.
//!
//! A database is a directory tree of JSON/YAML documents. Every directory
//! becomes a [`Branch`], every document becomes a child keyed by its file
//! name without suffix, and a directory may carry one validity log
//! (`*.jsonl` or `validity.yaml`) that drives temporal queries.
//!
//! ```text
//!   <root>/
//!     file1.json          -> root["file1"]
//!     dir1/
//!       validity.jsonl    -> root["dir1"].validity()
//!       file3.json        -> root["dir1"]["file3"]
//! ```
//!
//! [`TextDb`] owns the loaded tree and an [`ActiveSetCache`] shared by all
//! temporal queries against it.

pub mod config;
pub mod document;
mod error;
mod scan;

pub use config::LoaderConfig;
pub use document::{read_document, read_validity, DocumentFormat};
pub use error::LoadError;

use std::path::PathBuf;
use textdb_core::{
    ActiveSet, ActiveSetCache, Branch, IntoTimestamp, Node, Remap, TemporalQuery,
};

/// A loaded database.
#[derive(Debug)]
pub struct TextDb {
    config: LoaderConfig,
    root: Branch,
    cache: ActiveSetCache,
}

impl TextDb {
    /// Load every root in `config`, merging later roots over earlier ones.
    pub fn open(config: LoaderConfig) -> Result<Self, LoadError> {
        let root = load_roots(&config)?;
        let cache = ActiveSetCache::with_capacity(config.active_set_cache_capacity);
        Ok(Self { config, root, cache })
    }

    /// Load a single root directory with default settings.
    pub fn open_path(path: impl Into<PathBuf>) -> Result<Self, LoadError> {
        Self::open(LoaderConfig::for_path(path))
    }

    /// Wrap an already-built tree.
    pub fn from_branch(root: Branch) -> Self {
        Self {
            config: LoaderConfig::default(),
            root,
            cache: ActiveSetCache::new(),
        }
    }

    /// Re-read all roots from disk and drop cached active sets.
    pub fn reload(&mut self) -> Result<(), LoadError> {
        self.root = load_roots(&self.config)?;
        self.cache.clear();
        tracing::info!(roots = self.config.roots.len(), "database reloaded");
        Ok(())
    }

    pub fn root(&self) -> &Branch {
        &self.root
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    pub fn cache(&self) -> &ActiveSetCache {
        &self.cache
    }

    /// Node at a slash-separated path such as `"dir1/file3.json"`.
    pub fn get(&self, path: &str) -> Result<&Node, LoadError> {
        Ok(self.root.get_path(path)?)
    }

    /// Branch at `path`; any path made only of `/` and `.` segments names the root.
    pub fn branch(&self, path: &str) -> Result<&Branch, LoadError> {
        if is_root_path(path) {
            return Ok(&self.root);
        }
        self.get(path)?
            .as_branch()
            .ok_or_else(|| LoadError::NotABranch(path.to_string()))
    }

    /// Temporal view of the directory at `dir`.
    pub fn on(&self, dir: &str, query: &TemporalQuery) -> Result<Branch, LoadError> {
        let branch = self.branch(dir)?;
        let view = if self.config.cache_active_sets {
            branch.on_cached(query, &self.cache)
        } else {
            branch.on(query)
        };
        tracing::debug!(dir, selector = query.selector(), keys = view.len(), "temporal query");
        Ok(view)
    }

    /// Active keys of the log attached to `dir`.
    pub fn active(
        &self,
        dir: &str,
        selector: &str,
        at: impl IntoTimestamp,
    ) -> Result<ActiveSet, LoadError> {
        let at = at.into_timestamp()?;
        let branch = self.branch(dir)?;
        let log = branch
            .validity()
            .ok_or_else(|| LoadError::NoValidityLog(dir.to_string()))?;
        Ok(if self.config.cache_active_sets {
            self.cache.get_or_resolve(log, selector, at)
        } else {
            log.resolve_active(selector, at)
        })
    }

    /// Re-index the collection at `dir` by the dotted `label`.
    pub fn map(&self, dir: &str, label: &str, unique: bool) -> Result<Remap, LoadError> {
        let collection = self.branch(dir)?;
        Ok(textdb_core::remap(collection, label, unique)?)
    }
}

/// Whether a slash-separated path names the database root (`""`, `"."`, `"./"`).
pub fn is_root_path(path: &str) -> bool {
    path.split('/').all(|segment| segment.is_empty() || segment == ".")
}

fn load_roots(config: &LoaderConfig) -> Result<Branch, LoadError> {
    let mut merged = Branch::new();
    for root in &config.roots {
        merged.merge(scan::load_root(root, config)?);
    }
    Ok(merged)
}
