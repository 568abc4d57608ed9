//! Parsing of individual files: documents and validity logs.

use crate::LoadError;
use serde_json::Value;
use std::path::Path;
use textdb_core::{Node, RawValidityRecord, ValidityLog};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Json,
    Yaml,
    /// One JSON value per line; used for validity logs.
    JsonLines,
}

impl DocumentFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()? {
            "json" => Some(DocumentFormat::Json),
            "yaml" | "yml" => Some(DocumentFormat::Yaml),
            "jsonl" => Some(DocumentFormat::JsonLines),
            _ => None,
        }
    }
}

fn read_text(path: &Path) -> Result<String, LoadError> {
    std::fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Parse `text` as a single JSON or YAML value.
pub fn parse_value(text: &str, format: DocumentFormat, path: &Path) -> Result<Value, LoadError> {
    match format {
        DocumentFormat::Json => serde_json::from_str(text).map_err(|source| LoadError::Json {
            path: path.to_path_buf(),
            source,
        }),
        // An empty YAML file is a null document.
        DocumentFormat::Yaml => serde_yaml::from_str::<Option<Value>>(text)
            .map(Option::unwrap_or_default)
            .map_err(|source| LoadError::Yaml {
                path: path.to_path_buf(),
                source,
            }),
        DocumentFormat::JsonLines => text
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| {
                serde_json::from_str(line).map_err(|source| LoadError::Json {
                    path: path.to_path_buf(),
                    source,
                })
            })
            .collect::<Result<Vec<Value>, _>>()
            .map(Value::Array),
    }
}

/// Read one document file into a node.
pub fn read_document(path: &Path) -> Result<Node, LoadError> {
    let format = DocumentFormat::from_path(path)
        .ok_or_else(|| LoadError::UnsupportedFormat(path.to_path_buf()))?;
    let text = read_text(path)?;
    tracing::debug!(path = %path.display(), ?format, "loading document");
    parse_value(&text, format, path).map(Node::from_value)
}

/// Parse validity records from `text`.
///
/// `.jsonl` holds one record per line; JSON and YAML hold a sequence of records.
pub fn parse_validity(text: &str, format: DocumentFormat, path: &Path) -> Result<ValidityLog, LoadError> {
    let value = parse_value(text, format, path)?;
    let value = match value {
        Value::Null => Value::Array(Vec::new()),
        other => other,
    };
    let records: Vec<RawValidityRecord> =
        serde_json::from_value(value).map_err(|source| LoadError::Json {
            path: path.to_path_buf(),
            source,
        })?;
    ValidityLog::from_raw(records).map_err(|source| LoadError::Validity {
        path: path.to_path_buf(),
        source,
    })
}

/// Read and validate a validity log file.
pub fn read_validity(path: &Path) -> Result<ValidityLog, LoadError> {
    let format = DocumentFormat::from_path(path)
        .ok_or_else(|| LoadError::UnsupportedFormat(path.to_path_buf()))?;
    let text = read_text(path)?;
    let log = parse_validity(&text, format, path)?;
    tracing::debug!(path = %path.display(), records = log.len(), "loaded validity log");
    Ok(log)
}
