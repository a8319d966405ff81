//! Public entry point for callers: field-level get/set/clear, batches,
//! cleanup, statistics and shutdown.
//!
//! Writes resolve the field kind through the registry, validate the raw
//! value (through the validation cache for kinds whose check hits the
//! filesystem), transform it and hand it to the store. Reads are never
//! re-validated, except by [`PersistenceService::item_fields`] which hides
//! cached-validator values that no longer pass.
//!
//! An empty or whitespace-only value clears the field: absent data is
//! represented by the field being missing, never by an empty string.

use super::config::StoreConfig;
use super::stats::Statistics;
use crate::core::{ItemKey, Result, StoreError};
use crate::registry::{FieldKind, FieldRegistry, FieldSpec};
use crate::storage::Store;
use crate::validation::{RuleViolation, UploadRules, ValidationCache};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{Level, event, info_span};

pub struct PersistenceService {
    registry: Arc<FieldRegistry>,
    store: Store,
    cache: Arc<ValidationCache>,
    rules: UploadRules,
}

impl PersistenceService {
    /// Opens the backing file named by `config` with the standard field
    /// registry.
    pub fn open(config: StoreConfig) -> Result<Self> {
        config.validate().map_err(StoreError::InvalidConfig)?;
        let store = Store::open(&config.path, config.pretty)?;
        let cache = Arc::new(ValidationCache::new(config.cache_capacity));
        Self::from_parts(Arc::new(FieldRegistry::standard()), store, cache)
    }

    /// Opens the store configured by the environment, see
    /// [`StoreConfig::from_env`].
    pub fn open_default() -> Result<Self> {
        Self::open(StoreConfig::from_env().map_err(StoreError::InvalidConfig)?)
    }

    pub fn from_parts(
        registry: Arc<FieldRegistry>,
        store: Store,
        cache: Arc<ValidationCache>,
    ) -> Result<Self> {
        Ok(Self {
            registry,
            store,
            cache,
            rules: UploadRules::youtube()?,
        })
    }

    /// The validation cache, for collaborators that run the same checks.
    pub fn cache(&self) -> &Arc<ValidationCache> {
        &self.cache
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn path(&self) -> &Path {
        self.store.path()
    }

    fn is_valid(&self, spec: &FieldSpec, value: &str) -> bool {
        if spec.is_cached() {
            self.cache.validate(spec.key(), value, spec.validator())
        } else {
            spec.validate(value)
        }
    }

    // ========================================================================
    // Field operations
    // ========================================================================

    /// Validates, transforms and stores one field value. `None` or a blank
    /// value clears the field instead.
    ///
    /// A rejected value fails with `ValidationFailed` and leaves the store
    /// untouched. A failed flush returns `Persistence` with the new value
    /// kept in memory.
    pub fn save_field(&self, key: &ItemKey, kind: FieldKind, raw: Option<&str>) -> Result<()> {
        let spec = self.registry.resolve(kind)?;

        let Some(raw) = raw.filter(|value| !value.trim().is_empty()) else {
            self.store.clear_field(key, spec.key())?;
            return Ok(());
        };

        if !self.is_valid(spec, raw) {
            event!(
                Level::WARN,
                field = spec.key(),
                item = %key,
                "rejected invalid value"
            );
            return Err(StoreError::ValidationFailed {
                field: spec.key().to_string(),
                value: raw.to_string(),
            });
        }

        let value = spec.transform(raw);
        if value.is_empty() {
            self.store.clear_field(key, spec.key())?;
        } else {
            self.store.set(key, spec.key(), &value)?;
        }
        Ok(())
    }

    pub fn get_field(&self, key: &ItemKey, kind: FieldKind) -> Result<Option<String>> {
        let spec = self.registry.resolve(kind)?;
        self.store.get(key, spec.key())
    }

    pub fn clear_field(&self, key: &ItemKey, kind: FieldKind) -> Result<bool> {
        let spec = self.registry.resolve(kind)?;
        self.store.clear_field(key, spec.key())
    }

    pub fn remove_item(&self, key: &ItemKey) -> Result<bool> {
        self.store.remove_item(key)
    }

    pub fn keys(&self) -> Result<Vec<ItemKey>> {
        self.store.keys()
    }

    /// Every registered field stored for `key`. Values of cached-validator
    /// fields that no longer validate (a thumbnail that was deleted) are
    /// left out of the result but stay stored.
    pub fn item_fields(&self, key: &ItemKey) -> Result<BTreeMap<FieldKind, String>> {
        let Some(record) = self.store.record(key)? else {
            return Ok(BTreeMap::new());
        };

        let mut fields = BTreeMap::new();
        for spec in self.registry.specs() {
            let Some(value) = record.get(spec.key()) else {
                continue;
            };
            if spec.is_cached() && !self.is_valid(spec, value) {
                event!(Level::DEBUG, field = spec.key(), item = %key, "skipping stale value");
                continue;
            }
            fields.insert(spec.kind(), value.to_string());
        }
        Ok(fields)
    }

    /// Stored title and description checked against the upload rules.
    pub fn upload_readiness(&self, key: &ItemKey) -> Result<Vec<RuleViolation>> {
        let record = self.store.record(key)?;
        Ok(self.rules.check(record.as_ref()))
    }

    // ------------------------------------------------------------------------
    // Typed helpers
    // ------------------------------------------------------------------------

    pub fn save_title(&self, key: &ItemKey, title: &str) -> Result<()> {
        self.save_field(key, FieldKind::Title, Some(title))
    }

    pub fn get_title(&self, key: &ItemKey) -> Result<Option<String>> {
        self.get_field(key, FieldKind::Title)
    }

    pub fn clear_title(&self, key: &ItemKey) -> Result<bool> {
        self.clear_field(key, FieldKind::Title)
    }

    pub fn save_description(&self, key: &ItemKey, description: &str) -> Result<()> {
        self.save_field(key, FieldKind::Description, Some(description))
    }

    pub fn get_description(&self, key: &ItemKey) -> Result<Option<String>> {
        self.get_field(key, FieldKind::Description)
    }

    pub fn clear_description(&self, key: &ItemKey) -> Result<bool> {
        self.clear_field(key, FieldKind::Description)
    }

    pub fn save_thumbnail(&self, key: &ItemKey, image: &Path) -> Result<()> {
        let image = image.to_string_lossy();
        self.save_field(key, FieldKind::ImageThumbnail, Some(&image))
    }

    pub fn get_thumbnail(&self, key: &ItemKey) -> Result<Option<PathBuf>> {
        Ok(self
            .get_field(key, FieldKind::ImageThumbnail)?
            .map(PathBuf::from))
    }

    pub fn clear_thumbnail(&self, key: &ItemKey) -> Result<bool> {
        self.clear_field(key, FieldKind::ImageThumbnail)
    }

    // ========================================================================
    // Batches
    // ========================================================================

    /// Fails with `BatchAlreadyActive` if a batch is already open.
    pub fn start_batch_mode(&self) -> Result<()> {
        self.store.begin_batch()
    }

    /// Flushes once and leaves batch mode. A no-op without an active batch.
    pub fn commit_batch(&self) -> Result<bool> {
        self.store.commit_batch()
    }

    pub fn cancel_batch(&self) -> Result<bool> {
        self.store.cancel_batch()
    }

    pub fn is_batch_active(&self) -> Result<bool> {
        self.store.is_batch_active()
    }

    // ========================================================================
    // Maintenance
    // ========================================================================

    /// Removes every item for which `exists` returns false and returns how
    /// many were removed.
    ///
    /// Runs as one batch so all removals reach disk in a single write. If
    /// the caller already has a batch open, the removals join it and are
    /// written by the caller's commit.
    pub fn cleanup_invalid_entries<F>(&self, exists: F) -> Result<usize>
    where
        F: Fn(&ItemKey) -> bool,
    {
        let span = info_span!("cleanup");
        let _enter = span.enter();

        let owns_batch = match self.store.begin_batch() {
            Ok(()) => true,
            Err(StoreError::BatchAlreadyActive) => false,
            Err(err) => return Err(err),
        };

        let result = self.remove_where(|key| !exists(key));
        if owns_batch {
            match &result {
                Ok(_) => {
                    self.store.commit_batch()?;
                }
                Err(_) => {
                    self.store.cancel_batch()?;
                }
            }
        }

        let removed = result?;
        if removed > 0 {
            event!(Level::INFO, removed, "cleaned up entries for missing items");
        }
        Ok(removed)
    }

    fn remove_where<F>(&self, should_remove: F) -> Result<usize>
    where
        F: Fn(&ItemKey) -> bool,
    {
        let mut removed = 0;
        for key in self.store.keys()? {
            if should_remove(&key) && self.store.remove_item(&key)? {
                event!(Level::DEBUG, item = %key, "removed entry");
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// `cleanup_invalid_entries` with a filesystem existence check.
    pub fn cleanup_missing_files(&self) -> Result<usize> {
        self.cleanup_invalid_entries(|key| key.as_path().exists())
    }

    pub fn get_statistics(&self) -> Result<Statistics> {
        let snapshot = self.store.snapshot()?;
        Statistics::from_snapshot(
            &snapshot,
            self.store.size_on_disk(),
            self.cache.stats(),
            self.store.is_pretty(),
        )
    }

    pub fn force_save(&self) -> Result<bool> {
        self.store.force_save()
    }

    /// Commits an open batch, flushes and clears the validation cache.
    /// Meant to be the last call before the process exits.
    pub fn shutdown(&self) -> Result<()> {
        let result = self
            .store
            .commit_batch()
            .and_then(|_| self.store.flush())
            .map(|_| ());
        self.cache.clear();
        match &result {
            Ok(()) => event!(Level::DEBUG, "persistence service shut down"),
            Err(err) => event!(Level::WARN, error = %err, "shutdown could not persist all changes"),
        }
        result
    }
}
