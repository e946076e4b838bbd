//! Serialized, persisted access to the live inventory state.
//!
//! [`InventoryService`] owns the [`InventoryState`] behind a mutex so that
//! mutations are applied one at a time. Each mutation runs against a clone
//! of the state; the changed blobs are written through the
//! [`KeyValueStore`] and only then does the clone replace the live state.
//! A failed write leaves both memory and storage as they were.

use std::sync::Arc;

use chrono::Utc;
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;

use shelfmark_core::backup::{self, RestoreMode, RestoreSummary};
use shelfmark_core::entity::{Area, EntityKind, Item, Location, Section};
use shelfmark_core::error::CoreError;
use shelfmark_core::id::{IdGenerator, OsIdGenerator};
use shelfmark_core::inventory::{Inventory, ItemPatch, Removed};
use shelfmark_core::pool::{PoolStats, PreGeneratedQr, QrPool};
use shelfmark_core::state::{InventoryState, NewEntity, NewItem, ScanResolution};

use crate::error::StoreError;
use crate::kv::{KeyValueStore, INVENTORY_KEY, POOL_KEY};

/// Result of importing a backup file.
#[derive(Debug, Clone)]
pub struct ImportOutcome {
    pub source_version: String,
    pub warnings: Vec<String>,
    pub summary: RestoreSummary,
}

pub struct InventoryService<S> {
    store: S,
    state: Mutex<InventoryState>,
    ids: Arc<dyn IdGenerator + Send + Sync>,
}

async fn read_blob<T, S>(store: &S, key: &str) -> Result<T, StoreError>
where
    T: DeserializeOwned + Default,
    S: KeyValueStore,
{
    match store.get(key).await? {
        Some(json) => serde_json::from_str(&json).map_err(|source| StoreError::Corrupt {
            key: key.to_string(),
            source,
        }),
        None => Ok(T::default()),
    }
}

impl<S: KeyValueStore> InventoryService<S> {
    /// Load both blobs from `store`. Missing keys start empty.
    pub async fn load(store: S) -> Result<Self, StoreError> {
        let inventory: Inventory = read_blob(&store, INVENTORY_KEY).await?;
        let pool: QrPool = read_blob(&store, POOL_KEY).await?;

        tracing::info!(
            entities = inventory.total_entities(),
            pool_size = pool.len(),
            "Loaded inventory state",
        );

        Ok(Self {
            store,
            state: Mutex::new(InventoryState::new(inventory, pool)),
            ids: Arc::new(OsIdGenerator),
        })
    }

    /// Replace the id source used for new entities and pool codes.
    pub fn with_id_generator(mut self, ids: Arc<dyn IdGenerator + Send + Sync>) -> Self {
        self.ids = ids;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// A copy of the current state.
    pub async fn snapshot(&self) -> InventoryState {
        self.state.lock().await.clone()
    }

    /// Run a read-only closure against the current state.
    pub async fn read<T>(&self, f: impl FnOnce(&InventoryState) -> T) -> T {
        let state = self.state.lock().await;
        f(&state)
    }

    /// Apply `op` to a draft of the state, persist the result, then commit.
    ///
    /// If `op` fails nothing is written. If a write fails the live state is
    /// left unchanged.
    pub async fn mutate<T>(
        &self,
        op: impl FnOnce(&mut InventoryState, &dyn IdGenerator) -> Result<T, CoreError>,
    ) -> Result<T, StoreError> {
        let mut state = self.state.lock().await;
        let mut draft = state.clone();
        let out = op(&mut draft, self.ids.as_ref())?;

        self.persist(&state, &draft).await?;
        *state = draft;
        Ok(out)
    }

    /// Write the blobs that differ between `previous` and `next`.
    ///
    /// When the pool write fails after the inventory blob was written, the
    /// previous inventory blob is written back.
    async fn persist(&self, previous: &InventoryState, next: &InventoryState) -> Result<(), StoreError> {
        let inventory_json = (previous.inventory != next.inventory)
            .then(|| serde_json::to_string(&next.inventory))
            .transpose()?;
        let pool_json = (previous.pool != next.pool)
            .then(|| serde_json::to_string(&next.pool))
            .transpose()?;

        if let Some(json) = &inventory_json {
            self.store.set(INVENTORY_KEY, json).await?;
        }
        if let Some(json) = &pool_json {
            if let Err(e) = self.store.set(POOL_KEY, json).await {
                if inventory_json.is_some() {
                    let restored = serde_json::to_string(&previous.inventory)?;
                    if let Err(rollback) = self.store.set(INVENTORY_KEY, &restored).await {
                        tracing::error!(
                            error = %rollback,
                            "Failed to restore inventory blob after pool write failure",
                        );
                    }
                }
                return Err(e);
            }
        }
        Ok(())
    }

    // -- entities -----------------------------------------------------------

    pub async fn create_location(
        &self,
        new: NewEntity,
        address: Option<String>,
    ) -> Result<Location, StoreError> {
        let location = self
            .mutate(|state, ids| state.create_location(new, address, ids, Utc::now()))
            .await?;
        tracing::info!(location_id = %location.id, qr_data = %location.qr_data, "Created location");
        Ok(location)
    }

    pub async fn create_area(&self, location_id: &str, new: NewEntity) -> Result<Area, StoreError> {
        let area = self
            .mutate(|state, ids| state.create_area(location_id, new, ids, Utc::now()))
            .await?;
        tracing::info!(area_id = %area.id, location_id, "Created area");
        Ok(area)
    }

    pub async fn create_section(&self, area_id: &str, new: NewEntity) -> Result<Section, StoreError> {
        let section = self
            .mutate(|state, ids| state.create_section(area_id, new, ids, Utc::now()))
            .await?;
        tracing::info!(section_id = %section.id, area_id, "Created section");
        Ok(section)
    }

    pub async fn create_item(&self, new: NewItem) -> Result<Item, StoreError> {
        let item = self
            .mutate(|state, ids| state.create_item(new, ids, Utc::now()))
            .await?;
        tracing::info!(item_id = %item.id, area_id = %item.area_id, "Created item");
        Ok(item)
    }

    /// Rename an entity. Its `qrData` is left as it is.
    pub async fn rename(&self, kind: EntityKind, id: &str, name: &str) -> Result<(), StoreError> {
        self.mutate(|state, _| state.inventory.rename(kind, id, name))
            .await?;
        tracing::info!(kind = %kind, id, "Renamed entity");
        Ok(())
    }

    pub async fn update_item(&self, id: &str, patch: ItemPatch) -> Result<Item, StoreError> {
        self.mutate(|state, _| state.inventory.update_item(id, patch).cloned())
            .await
    }

    pub async fn move_item(
        &self,
        id: &str,
        area_id: &str,
        section_id: Option<&str>,
    ) -> Result<(), StoreError> {
        self.mutate(|state, _| state.inventory.move_item(id, area_id, section_id))
            .await?;
        tracing::info!(item_id = id, area_id, section_id = ?section_id, "Moved item");
        Ok(())
    }

    /// Delete with cascade; pool entries of removed entities are released.
    pub async fn delete(&self, kind: EntityKind, id: &str) -> Result<Vec<Removed>, StoreError> {
        let removed = self
            .mutate(|state, _| state.delete_entity(kind, id))
            .await?;
        tracing::info!(kind = %kind, id, removed = removed.len(), "Deleted entity");
        Ok(removed)
    }

    pub async fn set_entity_qr(
        &self,
        kind: EntityKind,
        id: &str,
        qr_data: &str,
    ) -> Result<(), StoreError> {
        self.mutate(|state, _| state.set_entity_qr(kind, id, qr_data))
            .await?;
        tracing::info!(kind = %kind, id, qr_data, "Assigned QR code");
        Ok(())
    }

    // -- pool ---------------------------------------------------------------

    pub async fn generate_pool(
        &self,
        count: usize,
        prefix: Option<&str>,
    ) -> Result<Vec<PreGeneratedQr>, StoreError> {
        let entries = self
            .mutate(|state, ids| state.generate_pool(count, prefix, ids, Utc::now()))
            .await?;
        tracing::info!(count = entries.len(), prefix = ?prefix, "Generated QR pool");
        Ok(entries)
    }

    pub async fn delete_pool_entry(&self, qr_data: &str) -> Result<PreGeneratedQr, StoreError> {
        let entry = self
            .mutate(|state, _| state.pool.delete_unassigned(qr_data))
            .await?;
        tracing::info!(qr_data, "Deleted pool entry");
        Ok(entry)
    }

    /// Remove every unassigned pool entry. Returns how many were removed.
    pub async fn clear_pool(&self) -> Result<usize, StoreError> {
        let removed = self
            .mutate(|state, _| Ok(state.pool.clear_unassigned()))
            .await?;
        tracing::info!(removed, "Cleared unassigned pool entries");
        Ok(removed)
    }

    pub async fn pool_stats(&self) -> PoolStats {
        self.read(|state| state.pool.stats()).await
    }

    pub async fn resolve_scan(&self, raw: &str) -> ScanResolution {
        self.read(|state| state.resolve_scan(raw)).await
    }

    // -- backup -------------------------------------------------------------

    /// Serialize the current state as a backup document.
    pub async fn export_backup(&self) -> Result<String, StoreError> {
        let json = self
            .read(|state| backup::to_json(&backup::export(state, Utc::now())))
            .await?;
        tracing::info!(bytes = json.len(), "Exported backup");
        Ok(json)
    }

    /// Parse, migrate and apply a backup document.
    pub async fn import_backup(&self, json: &str, mode: RestoreMode) -> Result<ImportOutcome, StoreError> {
        let loaded = backup::parse_backup(json)?;
        for warning in &loaded.warnings {
            tracing::warn!(warning = %warning, "Backup import warning");
        }

        let source_version = loaded.source_version;
        let warnings = loaded.warnings;
        let snapshot = loaded.snapshot;
        let summary = self
            .mutate(|state, _| Ok(backup::restore(state, snapshot, mode)))
            .await?;

        tracing::info!(
            mode = %mode,
            source_version = %source_version,
            items_added = summary.items.added,
            pool_added = summary.pre_generated_qrs.added,
            orphans = summary.orphans.len(),
            "Imported backup",
        );
        Ok(ImportOutcome {
            source_version,
            warnings,
            summary,
        })
    }
}
