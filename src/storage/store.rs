//! File-backed, thread-safe item store.
//!
//! A single mutex guards the document, the dirty flag and the batch state.
//! Every public operation holds it for its whole duration, including the
//! disk write inside a flush, so two flushes never interleave and readers
//! never see a half-applied mutation.
//!
//! Outside a batch each mutation that changes the document is flushed
//! immediately. Inside a batch mutations only mark the store dirty;
//! `commit_batch` writes once, `cancel_batch` restores the document that
//! existed when the batch began.

use super::persistence::{DocumentFile, ReadOutcome};
use crate::core::{Document, ItemKey, Record, Result, StoreError};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{Level, event};

// ============================================================================
// State
// ============================================================================

struct BatchSnapshot {
    document: Document,
    dirty: bool,
}

struct StoreState {
    document: Document,
    dirty: bool,
    /// `Some` while a batch is active.
    batch: Option<BatchSnapshot>,
    writes: u64,
    recovered_from_corruption: bool,
}

impl StoreState {
    fn empty() -> Self {
        Self {
            document: Document::new(),
            dirty: false,
            batch: None,
            writes: 0,
            recovered_from_corruption: false,
        }
    }
}

/// Result of [`Store::load`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    /// `normalized` means the file held non-canonical data; the store
    /// starts dirty so the next flush rewrites it.
    Loaded { items: usize, normalized: bool },
    /// No backing file; the store starts empty.
    Missing,
    /// The backing file could not be parsed. The store starts empty and
    /// dirty; the corrupted file stays on disk until the next flush.
    Recovered { reason: String },
}

/// Consistent copy of the store's state, taken under the lock.
#[derive(Debug, Clone)]
pub struct StoreSnapshot {
    pub document: Document,
    pub dirty: bool,
    pub batch_active: bool,
    pub writes: u64,
    pub recovered_from_corruption: bool,
}

// ============================================================================
// Store
// ============================================================================

pub struct Store {
    file: DocumentFile,
    state: Mutex<StoreState>,
}

impl Store {
    /// Creates an empty store bound to `path` without touching the disk.
    pub fn new<P: AsRef<Path>>(path: P, pretty: bool) -> Self {
        Self {
            file: DocumentFile::new(path, pretty),
            state: Mutex::new(StoreState::empty()),
        }
    }

    /// Creates a store and loads the backing file.
    pub fn open<P: AsRef<Path>>(path: P, pretty: bool) -> Result<Self> {
        let store = Self::new(path, pretty);
        store.load()?;
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn is_pretty(&self) -> bool {
        self.file.is_pretty()
    }

    pub fn size_on_disk(&self) -> Option<u64> {
        self.file.size_on_disk()
    }

    fn lock(&self) -> Result<MutexGuard<'_, StoreState>> {
        Ok(self.state.lock()?)
    }

    /// Replaces the in-memory document with the backing file's content.
    ///
    /// A missing file yields an empty store. A corrupted file is logged and
    /// replaced by an empty, dirty document. Rejected while a batch is open.
    pub fn load(&self) -> Result<LoadOutcome> {
        let mut state = self.lock()?;
        if state.batch.is_some() {
            return Err(StoreError::BatchAlreadyActive);
        }

        let outcome = match self.file.read()? {
            ReadOutcome::Missing => {
                state.document = Document::new();
                state.dirty = false;
                state.recovered_from_corruption = false;
                event!(Level::DEBUG, path = %self.path().display(), "no store file, starting empty");
                LoadOutcome::Missing
            }
            ReadOutcome::Parsed {
                document,
                normalized,
            } => {
                let items = document.len();
                state.document = document;
                // A normalized document differs from the file; the next
                // flush rewrites it.
                state.dirty = normalized;
                state.recovered_from_corruption = false;
                event!(
                    Level::DEBUG,
                    path = %self.path().display(),
                    items,
                    normalized,
                    "store loaded"
                );
                LoadOutcome::Loaded { items, normalized }
            }
            ReadOutcome::Corrupted { reason } => {
                state.document = Document::new();
                state.dirty = true;
                state.recovered_from_corruption = true;
                event!(
                    Level::WARN,
                    path = %self.path().display(),
                    reason = %reason,
                    "store file is corrupted, starting empty"
                );
                LoadOutcome::Recovered { reason }
            }
        };
        Ok(outcome)
    }

    // ------------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------------

    pub fn get(&self, key: &ItemKey, field: &str) -> Result<Option<String>> {
        let state = self.lock()?;
        Ok(state.document.field(key, field).map(str::to_string))
    }

    pub fn record(&self, key: &ItemKey) -> Result<Option<Record>> {
        let state = self.lock()?;
        Ok(state.document.get(key).cloned())
    }

    pub fn contains(&self, key: &ItemKey) -> Result<bool> {
        Ok(self.lock()?.document.contains_key(key))
    }

    /// Snapshot of the current keys, sorted.
    pub fn keys(&self) -> Result<Vec<ItemKey>> {
        Ok(self.lock()?.document.keys())
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.lock()?.document.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.lock()?.document.is_empty())
    }

    pub fn is_dirty(&self) -> Result<bool> {
        Ok(self.lock()?.dirty)
    }

    pub fn is_batch_active(&self) -> Result<bool> {
        Ok(self.lock()?.batch.is_some())
    }

    /// Number of physical writes of the backing file since creation.
    pub fn write_count(&self) -> Result<u64> {
        Ok(self.lock()?.writes)
    }

    pub fn snapshot(&self) -> Result<StoreSnapshot> {
        let state = self.lock()?;
        Ok(StoreSnapshot {
            document: state.document.clone(),
            dirty: state.dirty,
            batch_active: state.batch.is_some(),
            writes: state.writes,
            recovered_from_corruption: state.recovered_from_corruption,
        })
    }

    // ------------------------------------------------------------------------
    // Mutations
    // ------------------------------------------------------------------------

    /// Inserts or overwrites one field. Returns true when the document
    /// changed.
    ///
    /// On a flush failure the mutation stays in memory, the store stays
    /// dirty and the error is returned.
    pub fn set(&self, key: &ItemKey, field: &str, value: &str) -> Result<bool> {
        self.mutate(|document| document.set_field(key, field, value))
    }

    /// Removes one field, dropping the record when it becomes empty.
    pub fn clear_field(&self, key: &ItemKey, field: &str) -> Result<bool> {
        self.mutate(|document| document.clear_field(key, field))
    }

    pub fn remove_item(&self, key: &ItemKey) -> Result<bool> {
        self.mutate(|document| document.remove(key).is_some())
    }

    fn mutate<F>(&self, op: F) -> Result<bool>
    where
        F: FnOnce(&mut Document) -> bool,
    {
        let mut state = self.lock()?;
        if !op(&mut state.document) {
            return Ok(false);
        }
        state.dirty = true;
        if state.batch.is_none() {
            self.flush_locked(&mut state)?;
        }
        Ok(true)
    }

    // ------------------------------------------------------------------------
    // Flush
    // ------------------------------------------------------------------------

    /// Writes the document if it is dirty. Returns true when a write
    /// happened.
    ///
    /// While a batch is active this is a no-op: the batch's mutations reach
    /// disk only through `commit_batch`.
    pub fn flush(&self) -> Result<bool> {
        let mut state = self.lock()?;
        if state.batch.is_some() {
            event!(Level::DEBUG, "flush deferred until batch commit");
            return Ok(false);
        }
        self.flush_locked(&mut state)
    }

    pub fn force_save(&self) -> Result<bool> {
        self.flush()
    }

    fn flush_locked(&self, state: &mut StoreState) -> Result<bool> {
        if !state.dirty {
            return Ok(false);
        }
        match self.file.write(&state.document) {
            Ok(bytes) => {
                state.dirty = false;
                state.writes += 1;
                state.recovered_from_corruption = false;
                event!(
                    Level::DEBUG,
                    path = %self.path().display(),
                    bytes,
                    items = state.document.len(),
                    "store flushed"
                );
                Ok(true)
            }
            Err(err) => {
                event!(
                    Level::WARN,
                    path = %self.path().display(),
                    error = %err,
                    "store flush failed, changes kept in memory"
                );
                Err(err)
            }
        }
    }

    // ------------------------------------------------------------------------
    // Batches
    // ------------------------------------------------------------------------

    /// Enters batch mode. Batches do not nest.
    pub fn begin_batch(&self) -> Result<()> {
        let mut state = self.lock()?;
        if state.batch.is_some() {
            return Err(StoreError::BatchAlreadyActive);
        }
        state.batch = Some(BatchSnapshot {
            document: state.document.clone(),
            dirty: state.dirty,
        });
        event!(Level::DEBUG, "batch started");
        Ok(())
    }

    /// Leaves batch mode and flushes once. Returns false when no batch was
    /// active.
    ///
    /// If the flush fails the store is still back in idle mode and stays
    /// dirty, so the next flush retries.
    pub fn commit_batch(&self) -> Result<bool> {
        let mut state = self.lock()?;
        if state.batch.take().is_none() {
            return Ok(false);
        }
        event!(Level::DEBUG, dirty = state.dirty, "batch committed");
        self.flush_locked(&mut state)?;
        Ok(true)
    }

    /// Leaves batch mode, discarding every mutation made since
    /// `begin_batch`. Returns false when no batch was active.
    pub fn cancel_batch(&self) -> Result<bool> {
        let mut state = self.lock()?;
        let Some(snapshot) = state.batch.take() else {
            return Ok(false);
        };
        state.document = snapshot.document;
        state.dirty = snapshot.dirty;
        event!(Level::DEBUG, "batch cancelled");
        Ok(true)
    }
}
