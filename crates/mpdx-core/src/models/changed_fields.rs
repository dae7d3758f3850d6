//! Dirty field set

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

/// Separator used when the set is persisted as a single column.
pub const FIELD_DELIMITER: char = ',';

/// Set of field names edited locally but not yet pushed to the server.
///
/// The set is only flattened to a delimited string at the storage boundary;
/// in memory it is a real set, so duplicates cannot exist and insertion order
/// carries no meaning. Field names are compared by exact string equality.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct ChangedFieldSet(BTreeSet<String>);

impl ChangedFieldSet {
    /// Create an empty set
    #[must_use]
    pub const fn new() -> Self {
        Self(BTreeSet::new())
    }

    /// Parse the stored representation.
    ///
    /// Empty segments are dropped, so `""` and `",,"` both yield an empty set.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        raw.split(FIELD_DELIMITER)
            .filter(|field| !field.is_empty())
            .collect()
    }

    /// Render the stored representation.
    #[must_use]
    pub fn to_storage_string(&self) -> String {
        let mut out = String::new();
        for (index, field) in self.0.iter().enumerate() {
            if index > 0 {
                out.push(FIELD_DELIMITER);
            }
            out.push_str(field);
        }
        out
    }

    /// Add a field. Returns `false` if it was already present, empty, or
    /// contains [`FIELD_DELIMITER`].
    pub fn insert(&mut self, field: impl Into<String>) -> bool {
        let field = field.into();
        if field.is_empty() || field.contains(FIELD_DELIMITER) {
            return false;
        }
        self.0.insert(field)
    }

    /// Remove a field. Returns `false` if it was absent.
    pub fn remove(&mut self, field: &str) -> bool {
        self.0.remove(field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains(field)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> + '_ {
        self.0.iter().map(String::as_str)
    }

    /// Keep only the fields for which `keep` returns true.
    pub fn retain(&mut self, mut keep: impl FnMut(&str) -> bool) {
        self.0.retain(|field| keep(field));
    }
}

impl<S: Into<String>> FromIterator<S> for ChangedFieldSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = Self::new();
        for field in iter {
            set.insert(field);
        }
        set
    }
}

impl fmt::Display for ChangedFieldSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_storage_string())
    }
}

impl FromStr for ChangedFieldSet {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl From<String> for ChangedFieldSet {
    fn from(value: String) -> Self {
        Self::parse(&value)
    }
}

impl From<ChangedFieldSet> for String {
    fn from(value: ChangedFieldSet) -> Self {
        value.to_storage_string()
    }
}
