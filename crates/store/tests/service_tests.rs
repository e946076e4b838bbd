//! Integration tests for [`InventoryService`] over the memory and file
//! adapters.
//!
//! Covers persistence of both blobs, reload, pool assignment through the
//! service, and that a failed write leaves the live state untouched.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use assert_matches::assert_matches;
use async_trait::async_trait;

use shelfmark_core::backup::RestoreMode;
use shelfmark_core::entity::EntityKind;
use shelfmark_core::error::CoreError;
use shelfmark_core::state::{NewEntity, NewItem, ScanResolution};
use shelfmark_store::{
    FileStore, InventoryService, KeyValueStore, MemoryStore, StoreError, INVENTORY_KEY, POOL_KEY,
};

/// Memory store whose writes to one key can be made to fail.
#[derive(Default)]
struct FlakyStore {
    inner: MemoryStore,
    fail_key: std::sync::Mutex<Option<&'static str>>,
    armed: AtomicBool,
}

impl FlakyStore {
    fn fail_writes_to(&self, key: &'static str) {
        *self.fail_key.lock().unwrap() = Some(key);
        self.armed.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl KeyValueStore for FlakyStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let fail = self.armed.load(Ordering::SeqCst) && *self.fail_key.lock().unwrap() == Some(key);
        if fail {
            return Err(StoreError::io(
                key,
                std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
            ));
        }
        self.inner.set(key, value).await
    }
}

// ---------------------------------------------------------------------------
// Test: load and persist
// ---------------------------------------------------------------------------

/// A fresh store loads as an empty state.
#[tokio::test]
async fn empty_store_loads_empty_state() {
    let service = InventoryService::load(MemoryStore::new()).await.unwrap();
    let state = service.snapshot().await;
    assert_eq!(state.inventory.total_entities(), 0);
    assert!(state.pool.is_empty());
}

/// Changes written through one service are visible to the next load.
#[tokio::test]
async fn state_survives_reload_from_disk() {
    let dir = tempfile::tempdir().unwrap();

    let service = InventoryService::load(FileStore::new(dir.path())).await.unwrap();
    let location = service
        .create_location(NewEntity::named("Garage"), Some("12 Elm St".into()))
        .await
        .unwrap();
    let area = service
        .create_area(&location.id, NewEntity::named("Shelf A"))
        .await
        .unwrap();
    service.generate_pool(4, Some("G")).await.unwrap();
    drop(service);

    let reloaded = InventoryService::load(FileStore::new(dir.path())).await.unwrap();
    let state = reloaded.snapshot().await;
    assert_eq!(state.inventory.locations.len(), 1);
    assert_eq!(state.inventory.area(&area.id).unwrap().location_id, location.id);
    assert_eq!(state.pool.len(), 4);
    assert_eq!(
        state.inventory.locations[0].address.as_deref(),
        Some("12 Elm St")
    );
}

/// The pool blob is a bare JSON array stored under `preGeneratedQRs`.
#[tokio::test]
async fn pool_blob_is_a_json_array() {
    let service = InventoryService::load(MemoryStore::new()).await.unwrap();
    service.generate_pool(2, None).await.unwrap();

    let raw = service.store().get(POOL_KEY).await.unwrap().unwrap();
    let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
    let entries = value.as_array().expect("pool blob should be an array");
    assert_eq!(entries.len(), 2);
    assert!(entries[0]["qrData"].as_str().unwrap().starts_with("PRE:"));
    assert!(entries[0].get("assignedTo").is_none());
}

/// A corrupt blob is reported rather than silently replaced.
#[tokio::test]
async fn corrupt_blob_fails_load() {
    let store = MemoryStore::new();
    store.set(INVENTORY_KEY, "{not json").await.unwrap();

    let err = InventoryService::load(store)
        .await
        .err()
        .expect("corrupt blob should fail the load");
    assert_matches!(err, StoreError::Corrupt { ref key, .. } if key == INVENTORY_KEY);
}

// ---------------------------------------------------------------------------
// Test: mutation semantics
// ---------------------------------------------------------------------------

/// Core errors surface unchanged and nothing is written.
#[tokio::test]
async fn core_error_leaves_store_untouched() {
    let service = InventoryService::load(MemoryStore::new()).await.unwrap();
    let result = service
        .create_area("missing-location", NewEntity::named("Nowhere"))
        .await;

    assert_matches!(result, Err(StoreError::Core(CoreError::NotFound { .. })));
    assert_eq!(service.store().get(INVENTORY_KEY).await.unwrap(), None);
}

/// When the pool write fails, neither the live state nor the inventory
/// blob reflect the attempted change.
#[tokio::test]
async fn failed_pool_write_rolls_back() {
    let service = InventoryService::load(FlakyStore::default()).await.unwrap();
    let location = service
        .create_location(NewEntity::named("Basement"), None)
        .await
        .unwrap();
    let area = service
        .create_area(&location.id, NewEntity::named("Rack"))
        .await
        .unwrap();
    let codes = service.generate_pool(1, None).await.unwrap();
    let item = service
        .create_item(NewItem::new(NewEntity::named("Ladder"), &area.id, None))
        .await
        .unwrap();
    let blob_before = service.store().get(INVENTORY_KEY).await.unwrap();

    service.store().fail_writes_to(POOL_KEY);
    let result = service
        .set_entity_qr(EntityKind::Item, &item.id, &codes[0].qr_data)
        .await;
    assert_matches!(result, Err(StoreError::Io { .. }));

    let state = service.snapshot().await;
    assert_eq!(state.inventory.item(&item.id).unwrap().qr_data, item.qr_data);
    assert!(!state.pool.entries()[0].is_assigned());
    assert_eq!(service.store().get(INVENTORY_KEY).await.unwrap(), blob_before);
}

/// Labelling with a pool code assigns it; deleting the item releases it.
#[tokio::test]
async fn pool_code_is_assigned_then_released() {
    let service = InventoryService::load(MemoryStore::new()).await.unwrap();
    let location = service
        .create_location(NewEntity::named("Office"), None)
        .await
        .unwrap();
    let area = service
        .create_area(&location.id, NewEntity::named("Desk"))
        .await
        .unwrap();
    let codes = service.generate_pool(2, Some("OFFICE")).await.unwrap();

    let mut new = NewEntity::named("Stapler");
    new.qr_data = Some(codes[0].qr_data.clone());
    let item = service
        .create_item(NewItem::new(new, &area.id, None))
        .await
        .unwrap();

    assert_eq!(
        service.resolve_scan(&codes[0].qr_data).await,
        ScanResolution::Entity {
            kind: EntityKind::Item,
            id: item.id.clone(),
        }
    );
    let stats = service.pool_stats().await;
    assert_eq!((stats.total, stats.assigned, stats.unassigned), (2, 1, 1));

    service.delete(EntityKind::Location, &location.id).await.unwrap();
    assert_eq!(
        service.resolve_scan(&codes[0].qr_data).await,
        ScanResolution::Unassigned {
            qr_data: codes[0].qr_data.clone(),
        }
    );
}

/// Assigned pool entries cannot be deleted; clearing keeps them.
#[tokio::test]
async fn clear_pool_keeps_assigned_entries() {
    let service = InventoryService::load(MemoryStore::new()).await.unwrap();
    let location = service
        .create_location(NewEntity::named("Shed"), None)
        .await
        .unwrap();
    let codes = service.generate_pool(3, None).await.unwrap();
    service
        .set_entity_qr(EntityKind::Location, &location.id, &codes[2].qr_data)
        .await
        .unwrap();

    assert_matches!(
        service.delete_pool_entry(&codes[2].qr_data).await,
        Err(StoreError::Core(CoreError::Conflict(_)))
    );
    assert_eq!(service.clear_pool().await.unwrap(), 2);

    let state = service.snapshot().await;
    assert_eq!(state.pool.len(), 1);
    assert!(state.pool.entries()[0].is_assigned_to(&location.id));
}

// ---------------------------------------------------------------------------
// Test: backup through the service
// ---------------------------------------------------------------------------

/// Export from one service and merge-import into another.
#[tokio::test]
async fn export_then_merge_import() {
    let source = InventoryService::load(MemoryStore::new()).await.unwrap();
    source
        .create_location(NewEntity::named("Attic"), None)
        .await
        .unwrap();
    source.generate_pool(2, None).await.unwrap();
    let json = source.export_backup().await.unwrap();

    let target = InventoryService::load(MemoryStore::new()).await.unwrap();
    target
        .create_location(NewEntity::named("Cellar"), None)
        .await
        .unwrap();

    let outcome = target.import_backup(&json, RestoreMode::Merge).await.unwrap();
    assert_eq!(outcome.source_version, "1.1");
    assert_eq!(outcome.summary.locations.added, 1);
    assert_eq!(outcome.summary.pre_generated_qrs.added, 2);

    // Importing again adds nothing.
    let again = target.import_backup(&json, RestoreMode::Merge).await.unwrap();
    assert_eq!(again.summary.locations.added, 0);
    assert_eq!(again.summary.locations.skipped, 1);

    let state = target.snapshot().await;
    assert_eq!(state.inventory.locations.len(), 2);
}

/// Backups from a newer major version are refused and change nothing.
#[tokio::test]
async fn newer_backup_is_incompatible() {
    let service = InventoryService::load(MemoryStore::new()).await.unwrap();
    let json = r#"{"version":"2.0","exportedAt":"2024-01-01T00:00:00Z",
        "inventory":{"locations":[],"areas":[],"sections":[],"items":[]}}"#;

    let result = service.import_backup(json, RestoreMode::Replace).await;
    assert_matches!(result, Err(StoreError::Core(CoreError::Incompatible(_))));
    assert_eq!(service.store().get(INVENTORY_KEY).await.unwrap(), None);
}

/// The service can be driven with an injected id source.
#[tokio::test]
async fn failing_id_source_surfaces_error() {
    struct NoIds;
    impl shelfmark_core::id::IdGenerator for NoIds {
        fn generate(&self) -> Result<String, CoreError> {
            Err(CoreError::IdGeneration("no entropy".into()))
        }
    }

    let service = InventoryService::load(MemoryStore::new())
        .await
        .unwrap()
        .with_id_generator(Arc::new(NoIds));
    assert_matches!(
        service.generate_pool(3, None).await,
        Err(StoreError::Core(CoreError::IdGeneration(_)))
    );
    assert!(service.snapshot().await.pool.is_empty());
}
