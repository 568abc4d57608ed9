//! TextDB core: point-in-time resolution of hierarchical configuration trees.
//!
//! The crate is pure and in-memory. A document loader (see `textdb-loader`)
//! builds a [`Branch`] tree once; everything here reads that frozen tree and
//! returns new values.
//!
//! ```text
//!   Branch ──(ValidityLog)──► resolve_active(selector, at) ──► ActiveSet
//!      │                                                         │
//!      └────────────── Branch::on(query) ◄───────────────────────┘
//!                            │
//!                            ▼
//!                  merged Branch ──► Branch::map / Branch::group
//! ```
//!
//! ## Module Organization
//!
//! - `node`: the Leaf/Branch tree and recursive merge
//! - `attr_path`: dotted path parsing and total lookup
//! - `remap`: unique and grouping re-index of record collections
//! - `validity`: validity records and the per-directory log
//! - `overlay`: replay of a log into an active key set
//! - `temporal`: timestamp queries over whole trees, plus the active-set cache
//! - `subst`: `$var` expansion in string leaves
//! - `time`: timestamp parsing

pub mod attr_path;
pub mod node;
pub mod overlay;
pub mod remap;
pub mod subst;
pub mod temporal;
pub mod time;
pub mod validity;

pub use attr_path::{AttrPath, AttrPathError};
pub use node::{strip_document_suffix, Branch, LookupError, Node};
pub use overlay::{resolve_active, ActiveSet, WILDCARD_SELECTOR};
pub use remap::{Grouped, Remap, RemapError, RemapKey, Remapped};
pub use subst::{SubstError, Vars};
pub use temporal::{ActiveSetCache, TemporalQuery};
pub use time::{format_timestamp, parse_timestamp, IntoTimestamp, TimestampError};
pub use validity::{RawValidityRecord, ValidityError, ValidityLog, ValidityMode, ValidityRecord};

/// Resolve `branch` at `at` for `selector`.
///
/// This is the temporal entry point: `at` may be a `DateTime<Utc>` or a
/// string in `YYYYMMDDTHHMMSSZ` / RFC 3339 form.
pub fn on(
    branch: &Branch,
    at: impl IntoTimestamp,
    selector: &str,
) -> Result<Branch, TimestampError> {
    let query = TemporalQuery::new(at)?.with_selector(selector);
    Ok(branch.on(&query))
}

/// Re-index `collection` by the value found at the dotted `path` of each record.
///
/// With `unique = false` this is the same as [`Branch::group`].
pub fn remap(collection: &Branch, path: &str, unique: bool) -> Result<Remap, RemapError> {
    remap::remap(collection, path, unique)
}
