//! Backing file I/O for the store.
//!
//! The whole document lives in one JSON file. Writes go to a temp file in
//! the same directory which is synced and then renamed over the canonical
//! path, so a crash mid-write never leaves a half-written file behind.
//! Reads classify the file as missing, parsed or corrupted; corruption is
//! an outcome, not an error.

use crate::core::types::RawDocument;
use crate::core::{Document, Result, StoreError};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

// ============================================================================
// Read outcome
// ============================================================================

#[derive(Debug)]
pub enum ReadOutcome {
    /// No backing file yet.
    Missing,
    /// `normalized` is set when loading changed the data (renamed keys,
    /// dropped null or blank values), so the file is stale.
    Parsed { document: Document, normalized: bool },
    /// The file exists but could not be parsed. Its content is left on disk.
    Corrupted { reason: String },
}

// ============================================================================
// Document file
// ============================================================================

pub struct DocumentFile {
    path: PathBuf,
    pretty: bool,
}

impl DocumentFile {
    pub fn new<P: AsRef<Path>>(path: P, pretty: bool) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            pretty,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_pretty(&self) -> bool {
        self.pretty
    }

    /// Size of the file currently on disk, if any.
    pub fn size_on_disk(&self) -> Option<u64> {
        fs::metadata(&self.path).ok().map(|meta| meta.len())
    }

    pub fn read(&self) -> Result<ReadOutcome> {
        if !self.path.exists() {
            return Ok(ReadOutcome::Missing);
        }
        let data = fs::read(&self.path).map_err(|e| StoreError::persistence(&self.path, e))?;
        match serde_json::from_slice::<RawDocument>(&data) {
            Ok(raw) => {
                let (document, normalized) = Document::from_raw(raw);
                Ok(ReadOutcome::Parsed {
                    document,
                    normalized,
                })
            }
            Err(e) => Ok(ReadOutcome::Corrupted {
                reason: e.to_string(),
            }),
        }
    }

    /// Atomically replaces the backing file with `document`. Returns the
    /// number of bytes written.
    pub fn write(&self, document: &Document) -> Result<u64> {
        let serialized = serialize_document(document, self.pretty)?;

        let parent = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(parent).map_err(|e| StoreError::persistence(parent, e))?;

        let mut temp = tempfile::Builder::new()
            .prefix(".mediastore")
            .suffix(".tmp")
            .tempfile_in(parent)
            .map_err(|e| StoreError::persistence(parent, e))?;
        temp.write_all(&serialized)
            .map_err(|e| StoreError::persistence(temp.path(), e))?;
        temp.as_file()
            .sync_all()
            .map_err(|e| StoreError::persistence(temp.path(), e))?;
        temp.persist(&self.path)
            .map_err(|e| StoreError::persistence(&self.path, e.error))?;

        Ok(serialized.len() as u64)
    }
}

/// Serializes a document exactly as it would be written to disk.
pub fn serialize_document(document: &Document, pretty: bool) -> Result<Vec<u8>> {
    let mut bytes = if pretty {
        serde_json::to_vec_pretty(document)?
    } else {
        serde_json::to_vec(document)?
    };
    bytes.push(b'\n');
    Ok(bytes)
}
