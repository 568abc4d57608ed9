//! Replaying a validity log into the set of active keys.

use crate::validity::{ValidityLog, ValidityMode, ValidityRecord};
use chrono::{DateTime, Utc};
use indexmap::IndexSet;

/// Selector whose records apply to every query.
pub const WILDCARD_SELECTOR: &str = "all";

/// Ordered set of child keys in effect at one instant for one selector.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActiveSet {
    keys: IndexSet<String>,
}

impl ActiveSet {
    pub fn contains(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.keys.iter().map(String::as_str)
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.keys.iter().cloned().collect()
    }

    fn extend(&mut self, targets: &[String]) {
        for target in targets {
            self.keys.insert(target.clone());
        }
    }

    fn apply(&mut self, record: &ValidityRecord) {
        match record.mode {
            ValidityMode::Default | ValidityMode::Append => self.extend(&record.targets),
            ValidityMode::Remove => {
                for target in &record.targets {
                    self.keys.shift_remove(target);
                }
            }
            ValidityMode::Reset => {
                self.keys.clear();
                self.extend(&record.targets);
            }
            // Replace discards what every selector contributed so far, same
            // as reset; a log ending in either yields exactly its targets.
            ValidityMode::Replace => {
                self.keys.clear();
                self.extend(&record.targets);
            }
        }
    }
}

impl<'a> IntoIterator for &'a ActiveSet {
    type Item = &'a String;
    type IntoIter = indexmap::set::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.keys.iter()
    }
}

/// Replay `log` up to and including `at` for `selector`.
///
/// Records of the wildcard selector take part in every query. A query
/// before the first record, or for a selector with no records, is empty.
pub fn resolve_active(log: &ValidityLog, selector: &str, at: DateTime<Utc>) -> ActiveSet {
    let mut active = ActiveSet::default();
    for record in log
        .until(at)
        .iter()
        .filter(|record| record.applies_to(selector))
    {
        active.apply(record);
    }
    active
}
