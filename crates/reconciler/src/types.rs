//! Core types for the reconciler.

use std::collections::BTreeMap;
use std::fmt;

/// A named property discovered in the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyRecord {
    pub name: String,
    pub value: String,
}

impl PropertyRecord {
    /// Create a new property record.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Static mapping from property names to output keys.
///
/// Loaded once at startup and never mutated, so it can be shared freely
/// behind an `Arc`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TranslationTable {
    entries: BTreeMap<String, String>,
}

impl TranslationTable {
    /// Create a translation table from a name mapping.
    pub const fn new(entries: BTreeMap<String, String>) -> Self {
        Self { entries }
    }

    /// Translate a property name into its output key.
    ///
    /// Unmapped names, and names mapped to an empty string, are returned
    /// unchanged.
    pub fn translate<'a>(&'a self, name: &'a str) -> &'a str {
        self.entries
            .get(name)
            .map(String::as_str)
            .filter(|mapped| !mapped.is_empty())
            .unwrap_or(name)
    }

    /// Number of entries in the table.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the table has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for TranslationTable {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self::new(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Desired key-value state computed from one poll cycle.
///
/// Immutable once built. Collecting pairs with a repeated key keeps the last
/// value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    entries: BTreeMap<String, String>,
}

impl Snapshot {
    /// Create an empty snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the value for a key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Iterate over key-value pairs in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Iterate over keys in order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Number of keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the snapshot is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Consume the snapshot, returning the underlying map.
    pub fn into_inner(self) -> BTreeMap<String, String> {
        self.entries
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Snapshot {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Identity of a persisted document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentRef {
    pub namespace: String,
    pub name: String,
}

impl DocumentRef {
    /// Create a new document reference.
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for DocumentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// A persisted document as seen by the reconciler.
///
/// `data` is the document's data container, mapping keys to text blobs.
/// `None` means the document exists but has no data container yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub reference: DocumentRef,
    /// Opaque version token assigned by the store.
    pub resource_version: Option<String>,
    pub data: Option<BTreeMap<String, String>>,
}

impl Document {
    /// Create a document with no data container.
    pub const fn new(reference: DocumentRef) -> Self {
        Self {
            reference,
            resource_version: None,
            data: None,
        }
    }

    /// Set a data entry, creating the data container if needed.
    #[must_use]
    pub fn with_entry(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.data
            .get_or_insert_with(BTreeMap::new)
            .insert(key.into(), value.into());
        self
    }

    /// Get a data entry.
    pub fn entry(&self, key: &str) -> Option<&str> {
        self.data
            .as_ref()
            .and_then(|data| data.get(key))
            .map(String::as_str)
    }
}
