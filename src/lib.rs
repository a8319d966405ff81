// ============================================================================
// mediastore Library
// ============================================================================
//
// Embedded, file-backed metadata store for media items: per-item titles,
// descriptions and thumbnail paths, validated on write and persisted to a
// single JSON document.

pub mod core;
pub mod facade;
pub mod registry;
pub mod storage;
pub mod validation;

pub use core::{Document, ItemKey, Record, Result, StoreError};
pub use facade::{PersistenceService, Statistics, StoreConfig};
pub use registry::{FieldKind, FieldRegistry, FieldSpec};
pub use storage::{LoadOutcome, Store};
pub use validation::{RuleViolation, UploadRules, ValidationCache};
