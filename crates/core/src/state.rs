//! The complete live state: entity collections plus the QR pool.
//!
//! This is an explicit value handed to and mutated by the operations
//! below; the persistence collaborator loads it, calls into it and saves
//! the two blobs back. Every mutation validates first and writes second,
//! so an `Err` leaves the state exactly as it was.

use serde::{Deserialize, Serialize};

use crate::entity::{Area, EntityKind, Item, ItemCondition, Location, Section, DEFAULT_QUANTITY};
use crate::error::CoreError;
use crate::id::IdGenerator;
use crate::inventory::{Inventory, Removed};
use crate::pool::{generate_pool, Claim, PreGeneratedQr, QrPool};
use crate::qr_payload::{decode, encode, is_valid, PayloadType};
use crate::types::{EntityId, Timestamp};

// ---------------------------------------------------------------------------
// Creation inputs
// ---------------------------------------------------------------------------

/// Fields shared by every create request.
///
/// `qr_data` lets a scanned pre-generated code label the new entity; when
/// `None`, a payload is encoded from the new id, name and `prefix`.
#[derive(Debug, Clone, Default)]
pub struct NewEntity {
    pub name: String,
    pub prefix: Option<String>,
    pub qr_data: Option<String>,
    pub description: Option<String>,
}

impl NewEntity {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewItem {
    pub base: NewEntity,
    pub area_id: EntityId,
    pub section_id: Option<EntityId>,
    pub quantity: u32,
    pub condition: ItemCondition,
    pub image_uri: Option<String>,
}

impl NewItem {
    pub fn new(base: NewEntity, area_id: impl Into<EntityId>, section_id: Option<EntityId>) -> Self {
        Self {
            base,
            area_id: area_id.into(),
            section_id,
            quantity: DEFAULT_QUANTITY,
            condition: ItemCondition::default(),
            image_uri: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Scan resolution
// ---------------------------------------------------------------------------

/// What a scanned string refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanResolution {
    /// An existing entity carries this payload.
    Entity { kind: EntityKind, id: EntityId },
    /// An unassigned pool code, ready to label a new or existing entity.
    Unassigned { qr_data: String },
    /// A valid payload that nothing in this inventory carries, e.g. a
    /// label printed from another device.
    Unknown { payload_type: PayloadType },
    /// Not a valid payload.
    Invalid,
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InventoryState {
    pub inventory: Inventory,
    pub pool: QrPool,
}

impl InventoryState {
    pub fn new(inventory: Inventory, pool: QrPool) -> Self {
        Self { inventory, pool }
    }

    // -- QR assignment ------------------------------------------------------

    /// Check that `entity_id` may carry `qr_data`: the payload passes the
    /// validity gate, no other entity carries it, and any pool entry for it
    /// is free or already owned by this entity.
    fn check_qr_claim(&self, qr_data: &str, entity_id: &str) -> Result<Claim, CoreError> {
        if !is_valid(qr_data) {
            return Err(CoreError::Validation(format!(
                "'{qr_data}' is not a valid QR payload"
            )));
        }
        if let Some((kind, owner)) = self.inventory.find_by_qr(qr_data) {
            if owner != entity_id {
                return Err(CoreError::Conflict(format!(
                    "QR code {qr_data} is already used by {kind} {owner}"
                )));
            }
        }
        self.pool.check_claim(qr_data, entity_id)
    }

    /// Set an entity's `qrData` and reconcile the pool in one step.
    ///
    /// If the new payload is an unassigned pool code it becomes assigned to
    /// this entity; a pool entry bound to the entity's previous payload is
    /// released. A pool code already bound to another entity is a
    /// [`CoreError::Conflict`] and nothing changes.
    pub fn set_entity_qr(
        &mut self,
        kind: EntityKind,
        id: &str,
        qr_data: &str,
    ) -> Result<(), CoreError> {
        let previous = self
            .inventory
            .qr_data_of(kind, id)
            .ok_or_else(|| CoreError::not_found(kind.as_str(), id))?
            .to_string();
        if previous == qr_data {
            return Ok(());
        }
        self.check_qr_claim(qr_data, id)?;

        let owns_previous = self
            .pool
            .find(&previous)
            .is_some_and(|entry| entry.is_assigned_to(id));
        if owns_previous {
            self.pool.release_entity(id);
        }
        self.inventory.set_qr_data(kind, id, qr_data.to_string())?;
        self.pool.assign(qr_data, kind, id)?;
        Ok(())
    }

    /// Choose the payload for a new entity and check it can be claimed.
    fn payload_for_new(
        &self,
        kind: EntityKind,
        id: &str,
        new: &NewEntity,
    ) -> Result<String, CoreError> {
        match &new.qr_data {
            Some(qr_data) => {
                crate::qr_payload::validate_name(&new.name)?;
                self.check_qr_claim(qr_data, id)?;
                Ok(qr_data.clone())
            }
            None => encode(kind, &new.name, id, new.prefix.as_deref()),
        }
    }

    // -- creation -----------------------------------------------------------

    pub fn create_location(
        &mut self,
        new: NewEntity,
        address: Option<String>,
        ids: &dyn IdGenerator,
        now: Timestamp,
    ) -> Result<Location, CoreError> {
        let id = ids.generate()?;
        let qr_data = self.payload_for_new(EntityKind::Location, &id, &new)?;
        let location = Location {
            id,
            name: new.name,
            qr_data,
            created_at: now,
            description: new.description,
            address,
        };
        self.inventory.insert_location(location.clone());
        self.pool
            .assign(&location.qr_data, EntityKind::Location, &location.id)?;
        Ok(location)
    }

    pub fn create_area(
        &mut self,
        location_id: &str,
        new: NewEntity,
        ids: &dyn IdGenerator,
        now: Timestamp,
    ) -> Result<Area, CoreError> {
        if self.inventory.location(location_id).is_none() {
            return Err(CoreError::not_found("location", location_id));
        }
        let id = ids.generate()?;
        let qr_data = self.payload_for_new(EntityKind::Area, &id, &new)?;
        let area = Area {
            id,
            name: new.name,
            qr_data,
            created_at: now,
            location_id: location_id.to_string(),
            description: new.description,
        };
        self.inventory.insert_area(area.clone())?;
        self.pool.assign(&area.qr_data, EntityKind::Area, &area.id)?;
        Ok(area)
    }

    /// Create a section in an area; its location is taken from the area.
    pub fn create_section(
        &mut self,
        area_id: &str,
        new: NewEntity,
        ids: &dyn IdGenerator,
        now: Timestamp,
    ) -> Result<Section, CoreError> {
        let location_id = self
            .inventory
            .area(area_id)
            .ok_or_else(|| CoreError::not_found("area", area_id))?
            .location_id
            .clone();
        let id = ids.generate()?;
        let qr_data = self.payload_for_new(EntityKind::Section, &id, &new)?;
        let section = Section {
            id,
            name: new.name,
            qr_data,
            created_at: now,
            location_id,
            area_id: area_id.to_string(),
            description: new.description,
        };
        self.inventory.insert_section(section.clone())?;
        self.pool
            .assign(&section.qr_data, EntityKind::Section, &section.id)?;
        Ok(section)
    }

    /// Create an item in an area, optionally inside one of its sections.
    pub fn create_item(
        &mut self,
        new: NewItem,
        ids: &dyn IdGenerator,
        now: Timestamp,
    ) -> Result<Item, CoreError> {
        let location_id = self
            .inventory
            .area(&new.area_id)
            .ok_or_else(|| CoreError::not_found("area", &new.area_id))?
            .location_id
            .clone();
        let id = ids.generate()?;
        let qr_data = self.payload_for_new(EntityKind::Item, &id, &new.base)?;
        let item = Item {
            id,
            name: new.base.name,
            qr_data,
            created_at: now,
            location_id,
            area_id: new.area_id,
            section_id: new.section_id,
            quantity: new.quantity,
            condition: new.condition,
            description: new.base.description,
            image_uri: new.image_uri,
        };
        self.inventory.insert_item(item.clone())?;
        self.pool.assign(&item.qr_data, EntityKind::Item, &item.id)?;
        Ok(item)
    }

    // -- deletion -----------------------------------------------------------

    /// Delete an entity with cascade, releasing the pool entries of every
    /// removed entity back to unassigned.
    pub fn delete_entity(&mut self, kind: EntityKind, id: &str) -> Result<Vec<Removed>, CoreError> {
        let removed = self.inventory.delete(kind, id)?;
        for r in &removed {
            self.pool.release_entity(&r.id);
        }
        Ok(removed)
    }

    // -- pool ---------------------------------------------------------------

    /// Mint `count` new pool codes and append them to the pool.
    pub fn generate_pool(
        &mut self,
        count: usize,
        prefix: Option<&str>,
        ids: &dyn IdGenerator,
        now: Timestamp,
    ) -> Result<Vec<PreGeneratedQr>, CoreError> {
        let entries = generate_pool(count, prefix, ids, now)?;
        self.pool.extend(entries.clone());
        Ok(entries)
    }

    // -- scanning -----------------------------------------------------------

    /// Resolve an untrusted scanned string. Never fails.
    pub fn resolve_scan(&self, raw: &str) -> ScanResolution {
        let raw = raw.trim();
        if !is_valid(raw) {
            return ScanResolution::Invalid;
        }
        if let Some((kind, id)) = self.inventory.find_by_qr(raw) {
            return ScanResolution::Entity {
                kind,
                id: id.to_string(),
            };
        }
        if let Some(entry) = self.pool.find(raw) {
            if let Some(a) = &entry.assignment {
                // Owner no longer carries the code; report the owner anyway.
                return ScanResolution::Entity {
                    kind: a.kind,
                    id: a.entity_id.clone(),
                };
            }
            return ScanResolution::Unassigned {
                qr_data: raw.to_string(),
            };
        }
        match decode(raw) {
            Some(decoded) => ScanResolution::Unknown {
                payload_type: decoded.payload_type,
            },
            None => ScanResolution::Invalid,
        }
    }
}
