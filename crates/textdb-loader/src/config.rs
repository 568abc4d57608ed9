//! Loader configuration.

use crate::document::DocumentFormat;
use crate::LoadError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use textdb_core::ActiveSetCache;

/// How a database is discovered and built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Root directories, merged in order (later roots win conflicts).
    pub roots: Vec<PathBuf>,
    /// Extensions (without dot) loaded as documents.
    pub document_extensions: Vec<String>,
    /// File names treated as a directory's validity log, besides any `*.jsonl`.
    pub validity_files: Vec<String>,
    /// Expand `$_` to the root directory in string values.
    pub substitute_root: bool,
    /// Abort on unreadable documents instead of skipping them with a warning.
    pub strict: bool,
    pub follow_links: bool,
    /// Memoise active-set replays across queries.
    pub cache_active_sets: bool,
    /// Upper bound on memoised active sets; the oldest are evicted first.
    pub active_set_cache_capacity: usize,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            roots: Vec::new(),
            document_extensions: vec!["json".into(), "yaml".into(), "yml".into()],
            validity_files: vec!["validity.yaml".into(), "validity.yml".into()],
            substitute_root: true,
            strict: false,
            follow_links: true,
            cache_active_sets: true,
            active_set_cache_capacity: ActiveSetCache::DEFAULT_CAPACITY,
        }
    }
}

impl LoaderConfig {
    /// Default configuration for a single root.
    pub fn for_path(root: impl Into<PathBuf>) -> Self {
        Self {
            roots: vec![root.into()],
            ..Self::default()
        }
    }

    /// Read a configuration file (JSON or YAML, by extension).
    pub fn from_file(path: &Path) -> Result<Self, LoadError> {
        let text = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        match DocumentFormat::from_path(path) {
            Some(DocumentFormat::Json) => {
                serde_json::from_str(&text).map_err(|source| LoadError::Json {
                    path: path.to_path_buf(),
                    source,
                })
            }
            Some(DocumentFormat::Yaml) => {
                serde_yaml::from_str(&text).map_err(|source| LoadError::Yaml {
                    path: path.to_path_buf(),
                    source,
                })
            }
            _ => Err(LoadError::UnsupportedFormat(path.to_path_buf())),
        }
    }

    pub(crate) fn is_document(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| self.document_extensions.iter().any(|e| e == ext))
    }

    pub(crate) fn is_validity_file(&self, path: &Path) -> bool {
        if DocumentFormat::from_path(path) == Some(DocumentFormat::JsonLines) {
            return true;
        }
        path.file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| self.validity_files.iter().any(|v| v == name))
    }
}
