//! Batch mode: deferred flush, atomic cancel and single-write commit.

use mediastore::{FieldKind, ItemKey, PersistenceService, StoreConfig, StoreError};
use std::fs;
use tempfile::TempDir;

fn setup() -> (TempDir, PersistenceService) {
    let temp_dir = TempDir::new().unwrap();
    let service =
        PersistenceService::open(StoreConfig::new(temp_dir.path().join("store.json"))).unwrap();
    (temp_dir, service)
}

#[test]
fn test_commit_coalesces_into_one_write() {
    let (_temp_dir, service) = setup();
    let a = ItemKey::new("/a.mp4");
    let b = ItemKey::new("/b.mp4");

    service.start_batch_mode().unwrap();
    service.save_title(&a, "A").unwrap();
    service.save_title(&b, "B").unwrap();
    service.save_description(&b, "About B").unwrap();
    assert_eq!(service.store().write_count().unwrap(), 0);
    assert!(!service.path().exists());

    assert!(service.commit_batch().unwrap());
    assert_eq!(service.store().write_count().unwrap(), 1);

    let parsed: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(service.path()).unwrap()).unwrap();
    assert_eq!(parsed[a.as_str()]["title"], "A");
    assert_eq!(parsed[b.as_str()]["title"], "B");
    assert_eq!(parsed[b.as_str()]["description"], "About B");
}

#[test]
fn test_cancel_restores_observable_state() {
    let (_temp_dir, service) = setup();
    let a = ItemKey::new("/a.mp4");
    let b = ItemKey::new("/b.mp4");
    service.save_title(&a, "Before").unwrap();
    let on_disk = fs::read_to_string(service.path()).unwrap();

    service.start_batch_mode().unwrap();
    service.save_title(&a, "During").unwrap();
    service.save_title(&b, "New").unwrap();
    service.clear_title(&a).unwrap();
    assert!(service.cancel_batch().unwrap());

    assert_eq!(service.get_title(&a).unwrap().as_deref(), Some("Before"));
    assert_eq!(service.get_title(&b).unwrap(), None);
    assert_eq!(service.keys().unwrap(), vec![a]);
    assert!(!service.store().is_dirty().unwrap());
    assert_eq!(fs::read_to_string(service.path()).unwrap(), on_disk);
    assert_eq!(service.store().write_count().unwrap(), 1);
}

#[test]
fn test_nested_batch_fails_fast() {
    let (_temp_dir, service) = setup();
    service.start_batch_mode().unwrap();

    let err = service.start_batch_mode().unwrap_err();
    assert!(matches!(err, StoreError::BatchAlreadyActive));
    assert!(err.is_programming_error());
    // The outer batch is still usable.
    service.save_title(&ItemKey::new("/a.mp4"), "A").unwrap();
    assert!(service.commit_batch().unwrap());
    assert_eq!(service.store().write_count().unwrap(), 1);
}

#[test]
fn test_redundant_commit_and_cancel_are_noops() {
    let (_temp_dir, service) = setup();
    assert!(!service.commit_batch().unwrap());
    assert!(!service.cancel_batch().unwrap());

    service.start_batch_mode().unwrap();
    assert!(service.commit_batch().unwrap());
    assert!(!service.commit_batch().unwrap());
    assert!(!service.cancel_batch().unwrap());
}

#[test]
fn test_empty_batch_does_not_write() {
    let (_temp_dir, service) = setup();
    service.start_batch_mode().unwrap();
    service.commit_batch().unwrap();
    assert_eq!(service.store().write_count().unwrap(), 0);
}

#[test]
fn test_force_save_during_batch_is_deferred() {
    let (_temp_dir, service) = setup();
    service.start_batch_mode().unwrap();
    service.save_title(&ItemKey::new("/a.mp4"), "A").unwrap();

    assert!(!service.force_save().unwrap());
    assert!(!service.path().exists());
    assert!(service.get_statistics().unwrap().batch_active);

    service.commit_batch().unwrap();
    assert!(service.path().exists());
}

#[test]
fn test_rejected_value_inside_batch_leaves_batch_intact() {
    let (temp_dir, service) = setup();
    let key = ItemKey::new("/a.mp4");

    service.start_batch_mode().unwrap();
    service.save_title(&key, "A").unwrap();
    let missing = temp_dir.path().join("nope.png");
    let err = service
        .save_field(&key, FieldKind::ImageThumbnail, Some(missing.to_str().unwrap()))
        .unwrap_err();
    assert!(matches!(err, StoreError::ValidationFailed { .. }));

    assert!(service.is_batch_active().unwrap());
    service.commit_batch().unwrap();
    assert_eq!(service.get_title(&key).unwrap().as_deref(), Some("A"));
    assert_eq!(service.get_thumbnail(&key).unwrap(), None);
}

#[test]
fn test_cleanup_joins_open_batch() {
    let (_temp_dir, service) = setup();
    service.save_title(&ItemKey::new("/gone.mp4"), "Gone").unwrap();
    assert_eq!(service.store().write_count().unwrap(), 1);

    service.start_batch_mode().unwrap();
    let removed = service.cleanup_invalid_entries(|_| false).unwrap();
    assert_eq!(removed, 1);
    assert!(service.is_batch_active().unwrap());
    assert_eq!(service.store().write_count().unwrap(), 1);

    service.cancel_batch().unwrap();
    assert_eq!(service.keys().unwrap().len(), 1);
}
