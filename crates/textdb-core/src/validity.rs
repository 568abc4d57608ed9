//! Validity logs: timestamped edits to the set of active entries of a directory.
//!
//! A log is built once from already-parsed records. Construction validates
//! every record (timestamp, mode) so that a bad document fails at load time
//! instead of on every later query.

use crate::node::{strip_document_suffix, Branch};
use crate::overlay::{self, ActiveSet, WILDCARD_SELECTOR};
use crate::time::{parse_timestamp, TimestampError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidityError {
    #[error("validity record {index}: {source}")]
    InvalidTimestamp {
        index: usize,
        #[source]
        source: TimestampError,
    },
    #[error("validity record {index}: unknown mode '{mode}'")]
    UnknownMode { index: usize, mode: String },
    #[error("unknown validity mode '{0}'")]
    InvalidMode(String),
}

// ============================================================================
// Mode
// ============================================================================

/// How a record edits the active set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidityMode {
    /// No mode given; adds targets like `Append`.
    #[default]
    Default,
    Append,
    Remove,
    Reset,
    Replace,
}

impl ValidityMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidityMode::Default => "default",
            ValidityMode::Append => "append",
            ValidityMode::Remove => "remove",
            ValidityMode::Reset => "reset",
            ValidityMode::Replace => "replace",
        }
    }
}

impl FromStr for ValidityMode {
    type Err = ValidityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "default" => Ok(ValidityMode::Default),
            "append" => Ok(ValidityMode::Append),
            "remove" => Ok(ValidityMode::Remove),
            "reset" => Ok(ValidityMode::Reset),
            "replace" => Ok(ValidityMode::Replace),
            other => Err(ValidityError::InvalidMode(other.to_string())),
        }
    }
}

impl fmt::Display for ValidityMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Records
// ============================================================================

/// A record as it appears in a validity document, before validation.
///
/// Accepts the historical field names `select`/`category` and `apply`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawValidityRecord {
    pub valid_from: String,
    #[serde(default, alias = "select", alias = "category")]
    pub selector: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    #[serde(default, alias = "apply", deserialize_with = "one_or_many")]
    pub targets: Vec<String>,
}

fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(target) => vec![target],
        OneOrMany::Many(targets) => targets,
    })
}

/// A validated record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidityRecord {
    pub valid_from: DateTime<Utc>,
    pub selector: String,
    pub mode: ValidityMode,
    /// Child keys, document suffixes already stripped.
    pub targets: Vec<String>,
}

impl ValidityRecord {
    pub fn new(
        valid_from: DateTime<Utc>,
        selector: impl Into<String>,
        mode: ValidityMode,
        targets: impl IntoIterator<Item = impl AsRef<str>>,
    ) -> Self {
        Self {
            valid_from,
            selector: selector.into(),
            mode,
            targets: targets
                .into_iter()
                .map(|target| strip_document_suffix(target.as_ref()).to_string())
                .collect(),
        }
    }

    /// Whether this record takes part in a query for `selector`.
    pub fn applies_to(&self, selector: &str) -> bool {
        self.selector == selector || self.selector == WILDCARD_SELECTOR
    }

    fn from_raw(index: usize, raw: RawValidityRecord) -> Result<Self, ValidityError> {
        let valid_from = parse_timestamp(&raw.valid_from)
            .map_err(|source| ValidityError::InvalidTimestamp { index, source })?;
        let mode = match raw.mode.as_deref() {
            None => ValidityMode::Default,
            Some(mode) => mode.parse().map_err(|_| ValidityError::UnknownMode {
                index,
                mode: mode.to_string(),
            })?,
        };
        let selector = raw
            .selector
            .unwrap_or_else(|| WILDCARD_SELECTOR.to_string());
        Ok(Self::new(valid_from, selector, mode, raw.targets))
    }
}

// ============================================================================
// Log
// ============================================================================

/// Time-ordered validity records of one directory.
#[derive(Debug, Clone)]
pub struct ValidityLog {
    /// Fresh for every constructed log; keys the active-set cache.
    id: Uuid,
    records: Vec<ValidityRecord>,
}

impl PartialEq for ValidityLog {
    fn eq(&self, other: &Self) -> bool {
        self.records == other.records
    }
}

impl ValidityLog {
    /// Build a log, ordering records by `valid_from`.
    ///
    /// The sort is stable: records sharing a timestamp keep declaration order.
    pub fn new(mut records: Vec<ValidityRecord>) -> Self {
        records.sort_by_key(|record| record.valid_from);
        Self {
            id: Uuid::new_v4(),
            records,
        }
    }

    /// Validate and build from document records; the first bad record fails.
    pub fn from_raw(
        raw: impl IntoIterator<Item = RawValidityRecord>,
    ) -> Result<Self, ValidityError> {
        let records = raw
            .into_iter()
            .enumerate()
            .map(|(index, record)| ValidityRecord::from_raw(index, record))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(records))
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn records(&self) -> &[ValidityRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records with `valid_from <= at`, in log order.
    pub fn until(&self, at: DateTime<Utc>) -> &[ValidityRecord] {
        let end = self.records.partition_point(|record| record.valid_from <= at);
        &self.records[..end]
    }

    /// Distinct selectors, in first-seen order.
    pub fn selectors(&self) -> Vec<&str> {
        let mut seen: Vec<&str> = Vec::new();
        for record in &self.records {
            if !seen.contains(&record.selector.as_str()) {
                seen.push(&record.selector);
            }
        }
        seen
    }

    /// Targets that name no key of `siblings`, each reported once.
    pub fn dangling_targets<'a>(&'a self, siblings: &Branch) -> Vec<&'a str> {
        let mut dangling: Vec<&str> = Vec::new();
        for target in self.records.iter().flat_map(|record| &record.targets) {
            if !siblings.contains_key(target) && !dangling.contains(&target.as_str()) {
                dangling.push(target);
            }
        }
        dangling
    }

    /// Replay this log for `selector` at `at`.
    pub fn resolve_active(&self, selector: &str, at: DateTime<Utc>) -> ActiveSet {
        overlay::resolve_active(self, selector, at)
    }
}
