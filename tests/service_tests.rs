//! End-to-end behaviour of the persistence service: validation, cleanup,
//! statistics and shutdown.

use mediastore::{
    FieldKind, FieldRegistry, ItemKey, PersistenceService, Store, StoreConfig, StoreError,
    ValidationCache,
};
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;

fn setup() -> (TempDir, PersistenceService) {
    let temp_dir = TempDir::new().unwrap();
    let service =
        PersistenceService::open(StoreConfig::new(temp_dir.path().join("store.json"))).unwrap();
    (temp_dir, service)
}

#[test]
fn test_cleanup_removes_failing_keys_with_one_write() {
    let (_temp_dir, service) = setup();
    let a = ItemKey::new("/library/a");
    let b = ItemKey::new("/library/b");
    let c = ItemKey::new("/library/c");
    for key in [&a, &b, &c] {
        service.save_title(key, "Title").unwrap();
    }
    service.save_description(&b, "Keep me").unwrap();
    let writes_before = service.store().write_count().unwrap();

    let removed = service
        .cleanup_invalid_entries(|key| key == &b)
        .unwrap();

    assert_eq!(removed, 2);
    assert_eq!(service.keys().unwrap(), vec![b.clone()]);
    assert_eq!(service.get_title(&b).unwrap().as_deref(), Some("Title"));
    assert_eq!(service.get_description(&b).unwrap().as_deref(), Some("Keep me"));
    assert_eq!(service.store().write_count().unwrap(), writes_before + 1);
    assert!(!service.is_batch_active().unwrap());
}

#[test]
fn test_cleanup_with_nothing_to_remove() {
    let (_temp_dir, service) = setup();
    service.save_title(&ItemKey::new("/library/a"), "A").unwrap();
    let writes_before = service.store().write_count().unwrap();

    assert_eq!(service.cleanup_invalid_entries(|_| true).unwrap(), 0);
    assert_eq!(service.store().write_count().unwrap(), writes_before);
}

#[test]
fn test_cleanup_missing_files() {
    let (temp_dir, service) = setup();
    let present = temp_dir.path().join("present.mp4");
    fs::write(&present, b"video").unwrap();

    service.save_title(&ItemKey::new(&present), "Here").unwrap();
    service
        .save_title(&ItemKey::new(temp_dir.path().join("deleted.mp4")), "Gone")
        .unwrap();

    assert_eq!(service.cleanup_missing_files().unwrap(), 1);
    assert_eq!(service.keys().unwrap(), vec![ItemKey::new(&present)]);
}

#[test]
fn test_item_key_normalization_addresses_same_record() {
    let (_temp_dir, service) = setup();
    service
        .save_title(&ItemKey::new("  /library/./shows/../clip.mp4 "), "Clip")
        .unwrap();

    assert_eq!(
        service
            .get_title(&ItemKey::new("/library/clip.mp4"))
            .unwrap()
            .as_deref(),
        Some("Clip")
    );
    assert_eq!(service.keys().unwrap().len(), 1);
}

#[test]
fn test_validation_failure_does_not_mutate() {
    let (temp_dir, service) = setup();
    let key = ItemKey::new("/library/a.mp4");
    service.save_title(&key, "Title").unwrap();
    let writes = service.store().write_count().unwrap();

    let err = service
        .save_thumbnail(&key, &temp_dir.path().join("missing.png"))
        .unwrap_err();
    match err {
        StoreError::ValidationFailed { field, .. } => assert_eq!(field, "image_thumbnail"),
        other => panic!("unexpected error: {:?}", other),
    }
    assert!(store_is_settled(&service));
    assert_eq!(service.store().write_count().unwrap(), writes);
    assert_eq!(service.item_fields(&key).unwrap().len(), 1);
}

fn store_is_settled(service: &PersistenceService) -> bool {
    !service.store().is_dirty().unwrap() && !service.is_batch_active().unwrap()
}

#[test]
fn test_thumbnail_is_stored_absolute() {
    let temp_dir = TempDir::new().unwrap();
    let image = temp_dir.path().join("thumb.png");
    fs::write(&image, b"png").unwrap();

    let service =
        PersistenceService::open(StoreConfig::new(temp_dir.path().join("store.json"))).unwrap();
    let key = ItemKey::new("/library/a.mp4");
    service
        .save_field(&key, FieldKind::ImageThumbnail, Some(image.to_str().unwrap()))
        .unwrap();

    let stored = service.get_thumbnail(&key).unwrap().unwrap();
    assert!(stored.is_absolute());
    assert_eq!(stored, image);
}

#[test]
fn test_statistics() {
    let (temp_dir, service) = setup();
    let image = temp_dir.path().join("thumb.png");
    fs::write(&image, b"png").unwrap();

    let a = ItemKey::new("/library/a.mp4");
    let b = ItemKey::new("/library/b.mp4");
    service.save_title(&a, "A").unwrap();
    service.save_description(&a, "About A").unwrap();
    service.save_title(&b, "B").unwrap();
    service.save_thumbnail(&b, &image).unwrap();

    let stats = service.get_statistics().unwrap();
    assert_eq!(stats.total_entries, 2);
    assert_eq!(stats.total_fields, 4);
    assert_eq!(stats.count_for(FieldKind::Title), 2);
    assert_eq!(stats.count_for(FieldKind::Description), 1);
    assert_eq!(stats.count_for(FieldKind::ImageThumbnail), 1);
    assert_eq!(stats.file_size_bytes, stats.serialized_size_bytes);
    assert!(!stats.is_dirty);
    assert!(!stats.batch_active);
    assert_eq!(stats.flush_count, 4);
    assert_eq!(stats.cache_entries, 1);

    let json = serde_json::to_value(&stats).unwrap();
    assert_eq!(json["total_entries"], 2);
}

#[test]
fn test_statistics_do_not_change_state() {
    let (_temp_dir, service) = setup();
    service.start_batch_mode().unwrap();
    service.save_title(&ItemKey::new("/a.mp4"), "A").unwrap();

    let stats = service.get_statistics().unwrap();
    assert!(stats.is_dirty);
    assert!(stats.batch_active);
    assert_eq!(stats.file_size_bytes, 0);
    assert!(service.is_batch_active().unwrap());
    assert!(service.store().is_dirty().unwrap());
}

#[test]
fn test_upload_readiness_reports_violations() {
    let (_temp_dir, service) = setup();
    let key = ItemKey::new("/library/a.mp4");
    service.save_title(&key, "HUGEANNOUNCEMENT TODAY!!!!").unwrap();

    let violations = service.upload_readiness(&key).unwrap();
    let fields: Vec<FieldKind> = violations.iter().map(|v| v.field).collect();
    assert_eq!(
        fields,
        vec![FieldKind::Description, FieldKind::Title, FieldKind::Title]
    );
}

#[test]
fn test_isolated_caches_per_service() {
    let temp_dir = TempDir::new().unwrap();
    let image = temp_dir.path().join("thumb.png");
    fs::write(&image, b"png").unwrap();

    let first = PersistenceService::open(StoreConfig::new(temp_dir.path().join("one.json")))
        .unwrap();
    let second = PersistenceService::open(StoreConfig::new(temp_dir.path().join("two.json")))
        .unwrap();

    first.save_thumbnail(&ItemKey::new("/a.mp4"), &image).unwrap();
    assert_eq!(first.cache().len(), 1);
    assert!(second.cache().is_empty());
}

#[test]
fn test_injected_cache_is_shared() {
    let temp_dir = TempDir::new().unwrap();
    let image = temp_dir.path().join("thumb.png");
    fs::write(&image, b"png").unwrap();

    let cache = Arc::new(ValidationCache::new(4));
    let service = PersistenceService::from_parts(
        Arc::new(FieldRegistry::standard()),
        Store::open(temp_dir.path().join("store.json"), true).unwrap(),
        Arc::clone(&cache),
    )
    .unwrap();

    service.save_thumbnail(&ItemKey::new("/a.mp4"), &image).unwrap();
    assert_eq!(cache.peek("image_thumbnail", image.to_str().unwrap()), Some(true));
}

#[test]
fn test_invalid_config_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let err = PersistenceService::open(
        StoreConfig::new(temp_dir.path().join("store.json")).cache_capacity(0),
    )
    .err()
    .unwrap();
    assert!(matches!(err, StoreError::InvalidConfig(_)));
}

#[test]
fn test_shutdown_persists_and_clears_cache() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("store.json");
    let image = temp_dir.path().join("thumb.png");
    fs::write(&image, b"png").unwrap();
    let key = ItemKey::new("/a.mp4");

    let service = PersistenceService::open(StoreConfig::new(&path)).unwrap();
    service.save_thumbnail(&key, &image).unwrap();
    service.start_batch_mode().unwrap();
    service.save_title(&key, "Last words").unwrap();
    service.shutdown().unwrap();

    assert!(service.cache().is_empty());
    let reopened = PersistenceService::open(StoreConfig::new(&path)).unwrap();
    assert_eq!(reopened.get_title(&key).unwrap().as_deref(), Some("Last words"));
    assert_eq!(reopened.get_thumbnail(&key).unwrap(), Some(image));
}
