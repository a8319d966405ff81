use crate::core::Result;
use crate::registry::FieldKind;
use crate::storage::StoreSnapshot;
use crate::storage::persistence::serialize_document;
use crate::validation::CacheStats;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Derived, read-only view of the store. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Statistics {
    pub total_entries: usize,
    pub total_fields: usize,
    /// Number of items holding each field key
    pub field_counts: BTreeMap<String, usize>,
    /// Size the document would have if flushed now
    pub serialized_size_bytes: u64,
    /// Size of the backing file currently on disk (0 if absent)
    pub file_size_bytes: u64,
    pub is_dirty: bool,
    pub batch_active: bool,
    /// Set after a corrupted file was discarded, until the next flush
    pub recovered_from_corruption: bool,
    pub flush_count: u64,
    pub cache_entries: usize,
    pub cache_capacity: usize,
}

impl Statistics {
    /// Builds the statistics from a snapshot taken under the store lock.
    /// Serialization happens here, outside the lock.
    pub(crate) fn from_snapshot(
        snapshot: &StoreSnapshot,
        file_size_bytes: Option<u64>,
        cache: CacheStats,
        pretty: bool,
    ) -> Result<Self> {
        let serialized = serialize_document(&snapshot.document, pretty)?;
        Ok(Self {
            total_entries: snapshot.document.len(),
            total_fields: snapshot.document.field_count(),
            field_counts: snapshot.document.field_counts(),
            serialized_size_bytes: serialized.len() as u64,
            file_size_bytes: file_size_bytes.unwrap_or(0),
            is_dirty: snapshot.dirty,
            batch_active: snapshot.batch_active,
            recovered_from_corruption: snapshot.recovered_from_corruption,
            flush_count: snapshot.writes,
            cache_entries: cache.entries,
            cache_capacity: cache.capacity,
        })
    }

    pub fn count_for(&self, kind: FieldKind) -> usize {
        self.field_counts.get(kind.key()).copied().unwrap_or(0)
    }
}

impl fmt::Display for Statistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Items:            {}", self.total_entries)?;
        writeln!(f, "Field values:     {}", self.total_fields)?;
        for (field, count) in &self.field_counts {
            writeln!(f, "  {:<16}{}", field, count)?;
        }
        writeln!(f, "Serialized size:  {} bytes", self.serialized_size_bytes)?;
        writeln!(f, "File size:        {} bytes", self.file_size_bytes)?;
        writeln!(
            f,
            "State:            {}{}",
            if self.is_dirty { "dirty" } else { "clean" },
            if self.batch_active { " (batch active)" } else { "" }
        )?;
        if self.recovered_from_corruption {
            writeln!(f, "Recovered from a corrupted store file")?;
        }
        writeln!(f, "Flushes:          {}", self.flush_count)?;
        write!(
            f,
            "Validation cache: {}/{}",
            self.cache_entries, self.cache_capacity
        )
    }
}
