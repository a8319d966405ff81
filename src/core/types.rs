//! In-memory data model: item keys, per-item records and the whole document.
//!
//! `Record` and `Document` are backed by `im::OrdMap`, so cloning either is
//! O(1). The store relies on that to snapshot the document when a batch
//! starts and to hand statistics a consistent copy without holding its lock
//! while counting.

use im::OrdMap;
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Component, Path, PathBuf};

// ============================================================================
// ItemKey
// ============================================================================

/// Normalized identifier of one logical item, usually a media file's
/// absolute path.
///
/// Normalization trims surrounding whitespace, makes the path absolute
/// against the current directory, resolves `.` and `..` lexically and uses
/// the platform separator. On Windows the key is also lower-cased. Symlinks
/// are not resolved because the item may no longer exist. Normalizing an
/// already normalized key is a no-op.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct ItemKey(String);

impl ItemKey {
    pub fn new(raw: impl AsRef<Path>) -> Self {
        Self(normalize_path(raw.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_path(&self) -> &Path {
        Path::new(&self.0)
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

fn normalize_path(raw: &Path) -> String {
    let trimmed = raw.to_string_lossy();
    let trimmed = Path::new(trimmed.trim());

    let absolute = if trimmed.is_absolute() {
        trimmed.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(trimmed))
            .unwrap_or_else(|_| trimmed.to_path_buf())
    };

    let mut cleaned = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                cleaned.pop();
            }
            other => cleaned.push(other.as_os_str()),
        }
    }

    let key = cleaned.to_string_lossy().into_owned();
    if cfg!(windows) {
        key.replace('/', "\\").to_lowercase()
    } else {
        key
    }
}

impl fmt::Display for ItemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ItemKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ItemKey {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl From<String> for ItemKey {
    fn from(raw: String) -> Self {
        Self::new(raw)
    }
}

impl From<&Path> for ItemKey {
    fn from(path: &Path) -> Self {
        Self::new(path)
    }
}

impl From<PathBuf> for ItemKey {
    fn from(path: PathBuf) -> Self {
        Self::new(path)
    }
}

// ============================================================================
// Record
// ============================================================================

/// Field values stored for one item. Absent fields are simply missing; an
/// empty record never stays in a document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    fields: OrdMap<String, String>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// Returns true when the stored value changed.
    pub fn insert(&mut self, field: &str, value: &str) -> bool {
        if self.get(field) == Some(value) {
            return false;
        }
        self.fields.insert(field.to_string(), value.to_string());
        true
    }

    pub fn remove(&mut self, field: &str) -> Option<String> {
        self.fields.remove(field)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn field_keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_map(self.fields.iter())
    }
}

// ============================================================================
// Document
// ============================================================================

/// Shape of the backing file as it is read from disk, before key
/// normalization. `null` values are accepted and treated as absent.
pub(crate) type RawDocument = BTreeMap<String, BTreeMap<String, Option<String>>>;

/// The full mapping ItemKey -> Record, owned exclusively by the store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Document {
    items: OrdMap<ItemKey, Record>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a document from its on-disk shape.
    ///
    /// Keys are re-normalized; keys that collapse to the same item are
    /// merged with later fields winning. Null and blank values, and records
    /// left empty, are dropped. Field keys nobody registered are kept as they are.
    ///
    /// The flag is true when any of this changed the data, i.e. the
    /// document no longer matches what was read.
    pub(crate) fn from_raw(raw: RawDocument) -> (Self, bool) {
        let mut document = Self::new();
        let mut normalized = false;
        for (raw_key, fields) in raw {
            let key = ItemKey::new(&raw_key);
            if key.as_str() != raw_key || fields.is_empty() {
                normalized = true;
            }
            for (field, value) in fields {
                match value {
                    Some(value) if !value.trim().is_empty() => {
                        document.set_field(&key, &field, &value);
                    }
                    _ => normalized = true,
                }
            }
        }
        (document, normalized)
    }

    pub fn get(&self, key: &ItemKey) -> Option<&Record> {
        self.items.get(key)
    }

    pub fn field(&self, key: &ItemKey, field: &str) -> Option<&str> {
        self.items.get(key).and_then(|record| record.get(field))
    }

    pub fn contains_key(&self, key: &ItemKey) -> bool {
        self.items.contains_key(key)
    }

    /// Creates the record on first write. Returns true when the document
    /// changed.
    pub fn set_field(&mut self, key: &ItemKey, field: &str, value: &str) -> bool {
        if let Some(record) = self.items.get_mut(key) {
            return record.insert(field, value);
        }
        let mut record = Record::new();
        record.insert(field, value);
        self.items.insert(key.clone(), record);
        true
    }

    /// Removes one field and drops the record if it became empty. Returns
    /// true when something was removed.
    pub fn clear_field(&mut self, key: &ItemKey, field: &str) -> bool {
        let Some(record) = self.items.get_mut(key) else {
            return false;
        };
        if record.remove(field).is_none() {
            return false;
        }
        if record.is_empty() {
            self.items.remove(key);
        }
        true
    }

    pub fn remove(&mut self, key: &ItemKey) -> Option<Record> {
        self.items.remove(key)
    }

    /// Keys in sorted order.
    pub fn keys(&self) -> Vec<ItemKey> {
        self.items.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Total number of stored field values across all records.
    pub fn field_count(&self) -> usize {
        self.items.values().map(Record::len).sum()
    }

    /// Number of records holding each field key.
    pub fn field_counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for record in self.items.values() {
            for field in record.field_keys() {
                *counts.entry(field.to_string()).or_insert(0) += 1;
            }
        }
        counts
    }
}

impl Serialize for Document {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_map(self.items.iter())
    }
}
