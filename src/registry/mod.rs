//! Closed table of known field kinds.
//!
//! Each [`FieldKind`] maps to a [`FieldSpec`]: the key it is stored under,
//! a validator run at write time and a transformer that normalizes the
//! value before storage. The table is built once and shared read-only.
//! Adding a kind means adding an enum variant and a spec here; the store
//! and the service need no change.

pub mod validators;

use crate::core::{Result, StoreError};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Field kinds
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    ImageThumbnail,
    Title,
    Description,
}

impl FieldKind {
    pub const ALL: [FieldKind; 3] = [
        FieldKind::ImageThumbnail,
        FieldKind::Title,
        FieldKind::Description,
    ];

    /// Key used in the backing file.
    pub fn key(self) -> &'static str {
        match self {
            FieldKind::ImageThumbnail => "image_thumbnail",
            FieldKind::Title => "title",
            FieldKind::Description => "description",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.key() == key)
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for FieldKind {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_key(s.trim()).ok_or_else(|| StoreError::UnknownFieldKind(s.to_string()))
    }
}

// ============================================================================
// Field specs
// ============================================================================

pub type Validator = fn(&str) -> bool;
pub type Transformer = fn(&str) -> String;

#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    kind: FieldKind,
    validator: Validator,
    transformer: Transformer,
    /// Validation is expensive (filesystem access) and goes through the
    /// validation cache.
    cached: bool,
}

impl FieldSpec {
    pub fn new(kind: FieldKind, validator: Validator) -> Self {
        Self {
            kind,
            validator,
            transformer: validators::identity,
            cached: false,
        }
    }

    pub fn transformer(mut self, transformer: Transformer) -> Self {
        self.transformer = transformer;
        self
    }

    pub fn cached(mut self) -> Self {
        self.cached = true;
        self
    }

    pub fn kind(&self) -> FieldKind {
        self.kind
    }

    pub fn key(&self) -> &'static str {
        self.kind.key()
    }

    pub fn is_cached(&self) -> bool {
        self.cached
    }

    pub fn validator(&self) -> Validator {
        self.validator
    }

    pub fn validate(&self, value: &str) -> bool {
        (self.validator)(value)
    }

    pub fn transform(&self, value: &str) -> String {
        (self.transformer)(value)
    }
}

// ============================================================================
// Registry
// ============================================================================

#[derive(Debug, Clone)]
pub struct FieldRegistry {
    specs: BTreeMap<FieldKind, FieldSpec>,
}

impl FieldRegistry {
    /// The media metadata fields: thumbnail image path, title, description.
    pub fn standard() -> Self {
        Self::from_specs([
            FieldSpec::new(FieldKind::ImageThumbnail, validators::is_existing_file)
                .transformer(validators::absolute_path)
                .cached(),
            FieldSpec::new(FieldKind::Title, validators::non_blank)
                .transformer(validators::trimmed),
            FieldSpec::new(FieldKind::Description, validators::non_blank),
        ])
    }

    pub fn from_specs(specs: impl IntoIterator<Item = FieldSpec>) -> Self {
        Self {
            specs: specs.into_iter().map(|spec| (spec.kind, spec)).collect(),
        }
    }

    /// Fails with `UnknownFieldKind` if `kind` was never registered.
    pub fn resolve(&self, kind: FieldKind) -> Result<&FieldSpec> {
        self.specs
            .get(&kind)
            .ok_or_else(|| StoreError::UnknownFieldKind(kind.key().to_string()))
    }

    /// Resolves a field by its stored key.
    pub fn resolve_key(&self, key: &str) -> Result<&FieldSpec> {
        let kind: FieldKind = key.parse()?;
        self.resolve(kind)
    }

    pub fn specs(&self) -> impl Iterator<Item = &FieldSpec> {
        self.specs.values()
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}

impl Default for FieldRegistry {
    fn default() -> Self {
        Self::standard()
    }
}
