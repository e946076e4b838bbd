//! The entity collections and their hierarchy rules.
//!
//! [`Inventory`] is the `inventory` blob that the persistence collaborator
//! stores and the `inventory` object inside a backup. Operations here keep
//! parent references resolvable and apply the cascade rules:
//!
//! - deleting a location removes its areas, sections and items;
//! - deleting an area removes its sections and items;
//! - deleting a section detaches its items (`sectionId` becomes null).
//!
//! Anything that touches QR payloads goes through
//! [`crate::state::InventoryState`] so the pool stays reconciled.

use serde::{Deserialize, Serialize};

use crate::entity::{Area, Entity, EntityKind, Item, ItemCondition, Location, Section};
use crate::error::CoreError;
use crate::types::EntityId;

/// A removed entity, reported so callers can release its pool entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Removed {
    pub kind: EntityKind,
    pub id: EntityId,
}

/// A parent reference that does not resolve.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrphanRef {
    pub kind: EntityKind,
    pub id: EntityId,
    pub missing_parent: EntityKind,
    pub parent_id: EntityId,
}

/// Optional field changes for an item.
#[derive(Debug, Clone, Default)]
pub struct ItemPatch {
    pub quantity: Option<u32>,
    pub condition: Option<ItemCondition>,
    pub description: Option<Option<String>>,
    pub image_uri: Option<Option<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Inventory {
    pub locations: Vec<Location>,
    pub areas: Vec<Area>,
    pub sections: Vec<Section>,
    pub items: Vec<Item>,
}

fn find<'a, T: Entity>(list: &'a [T], id: &str) -> Option<&'a T> {
    list.iter().find(|e| e.id() == id)
}

fn find_mut<'a, T: Entity>(list: &'a mut [T], id: &str) -> Result<&'a mut T, CoreError> {
    list.iter_mut()
        .find(|e| e.id() == id)
        .ok_or_else(|| CoreError::not_found(T::KIND.as_str(), id))
}

fn drain_where<T: Entity>(list: &mut Vec<T>, pred: impl Fn(&T) -> bool) -> Vec<Removed> {
    let mut removed = Vec::new();
    list.retain(|e| {
        if pred(e) {
            removed.push(Removed {
                kind: T::KIND,
                id: e.id().to_string(),
            });
            false
        } else {
            true
        }
    });
    removed
}

impl Inventory {
    // -- lookups ------------------------------------------------------------

    pub fn location(&self, id: &str) -> Option<&Location> {
        find(&self.locations, id)
    }

    pub fn area(&self, id: &str) -> Option<&Area> {
        find(&self.areas, id)
    }

    pub fn section(&self, id: &str) -> Option<&Section> {
        find(&self.sections, id)
    }

    pub fn item(&self, id: &str) -> Option<&Item> {
        find(&self.items, id)
    }

    pub fn contains(&self, kind: EntityKind, id: &str) -> bool {
        match kind {
            EntityKind::Location => self.location(id).is_some(),
            EntityKind::Area => self.area(id).is_some(),
            EntityKind::Section => self.section(id).is_some(),
            EntityKind::Item => self.item(id).is_some(),
        }
    }

    /// The `qrData` of an entity, if it exists.
    pub fn qr_data_of(&self, kind: EntityKind, id: &str) -> Option<&str> {
        match kind {
            EntityKind::Location => self.location(id).map(Entity::qr_data),
            EntityKind::Area => self.area(id).map(Entity::qr_data),
            EntityKind::Section => self.section(id).map(Entity::qr_data),
            EntityKind::Item => self.item(id).map(Entity::qr_data),
        }
    }

    /// Find the entity carrying a payload.
    pub fn find_by_qr(&self, qr_data: &str) -> Option<(EntityKind, &str)> {
        fn hit<'a, T: Entity>(list: &'a [T], qr: &str) -> Option<(EntityKind, &'a str)> {
            list.iter()
                .find(|e| e.qr_data() == qr)
                .map(|e| (T::KIND, e.id()))
        }
        hit(&self.locations, qr_data)
            .or_else(|| hit(&self.areas, qr_data))
            .or_else(|| hit(&self.sections, qr_data))
            .or_else(|| hit(&self.items, qr_data))
    }

    pub fn areas_in(&self, location_id: &str) -> impl Iterator<Item = &Area> {
        let location_id = location_id.to_string();
        self.areas.iter().filter(move |a| a.location_id == location_id)
    }

    pub fn sections_in(&self, area_id: &str) -> impl Iterator<Item = &Section> {
        let area_id = area_id.to_string();
        self.sections.iter().filter(move |s| s.area_id == area_id)
    }

    /// Items in an area, including those inside its sections.
    pub fn items_in_area(&self, area_id: &str) -> impl Iterator<Item = &Item> {
        let area_id = area_id.to_string();
        self.items.iter().filter(move |i| i.area_id == area_id)
    }

    pub fn items_in_section(&self, section_id: &str) -> impl Iterator<Item = &Item> {
        let section_id = section_id.to_string();
        self.items
            .iter()
            .filter(move |i| i.section_id.as_deref() == Some(section_id.as_str()))
    }

    pub fn total_entities(&self) -> usize {
        self.locations.len() + self.areas.len() + self.sections.len() + self.items.len()
    }

    // -- inserts ------------------------------------------------------------

    pub(crate) fn insert_location(&mut self, location: Location) {
        self.locations.push(location);
    }

    pub(crate) fn insert_area(&mut self, area: Area) -> Result<(), CoreError> {
        if self.location(&area.location_id).is_none() {
            return Err(CoreError::not_found("location", &area.location_id));
        }
        self.areas.push(area);
        Ok(())
    }

    pub(crate) fn insert_section(&mut self, section: Section) -> Result<(), CoreError> {
        self.check_area_chain(&section.location_id, &section.area_id)?;
        self.sections.push(section);
        Ok(())
    }

    pub(crate) fn insert_item(&mut self, item: Item) -> Result<(), CoreError> {
        self.check_item_chain(&item.location_id, &item.area_id, item.section_id.as_deref())?;
        self.items.push(item);
        Ok(())
    }

    fn check_area_chain(&self, location_id: &str, area_id: &str) -> Result<(), CoreError> {
        let area = self
            .area(area_id)
            .ok_or_else(|| CoreError::not_found("area", area_id))?;
        if area.location_id != location_id {
            return Err(CoreError::Validation(format!(
                "Area {area_id} does not belong to location {location_id}"
            )));
        }
        Ok(())
    }

    fn check_item_chain(
        &self,
        location_id: &str,
        area_id: &str,
        section_id: Option<&str>,
    ) -> Result<(), CoreError> {
        self.check_area_chain(location_id, area_id)?;
        if let Some(section_id) = section_id {
            let section = self
                .section(section_id)
                .ok_or_else(|| CoreError::not_found("section", section_id))?;
            if section.area_id != area_id {
                return Err(CoreError::Validation(format!(
                    "Section {section_id} does not belong to area {area_id}"
                )));
            }
        }
        Ok(())
    }

    // -- updates ------------------------------------------------------------

    /// Rename an entity. The printed `qrData` is left as it is.
    pub fn rename(&mut self, kind: EntityKind, id: &str, name: &str) -> Result<(), CoreError> {
        crate::qr_payload::validate_name(name)?;
        let name = name.to_string();
        match kind {
            EntityKind::Location => find_mut(&mut self.locations, id)?.set_name(name),
            EntityKind::Area => find_mut(&mut self.areas, id)?.set_name(name),
            EntityKind::Section => find_mut(&mut self.sections, id)?.set_name(name),
            EntityKind::Item => find_mut(&mut self.items, id)?.set_name(name),
        }
        Ok(())
    }

    pub(crate) fn set_qr_data(
        &mut self,
        kind: EntityKind,
        id: &str,
        qr_data: String,
    ) -> Result<(), CoreError> {
        match kind {
            EntityKind::Location => find_mut(&mut self.locations, id)?.set_qr_data(qr_data),
            EntityKind::Area => find_mut(&mut self.areas, id)?.set_qr_data(qr_data),
            EntityKind::Section => find_mut(&mut self.sections, id)?.set_qr_data(qr_data),
            EntityKind::Item => find_mut(&mut self.items, id)?.set_qr_data(qr_data),
        }
        Ok(())
    }

    pub fn update_item(&mut self, id: &str, patch: ItemPatch) -> Result<&Item, CoreError> {
        let item = find_mut(&mut self.items, id)?;
        if let Some(quantity) = patch.quantity {
            item.quantity = quantity;
        }
        if let Some(condition) = patch.condition {
            item.condition = condition;
        }
        if let Some(description) = patch.description {
            item.description = description;
        }
        if let Some(image_uri) = patch.image_uri {
            item.image_uri = image_uri;
        }
        Ok(item)
    }

    /// Move an item to another area, optionally into one of its sections.
    /// The item's location follows the target area.
    pub fn move_item(
        &mut self,
        id: &str,
        area_id: &str,
        section_id: Option<&str>,
    ) -> Result<(), CoreError> {
        let location_id = self
            .area(area_id)
            .ok_or_else(|| CoreError::not_found("area", area_id))?
            .location_id
            .clone();
        self.check_item_chain(&location_id, area_id, section_id)?;

        let item = find_mut(&mut self.items, id)?;
        item.location_id = location_id;
        item.area_id = area_id.to_string();
        item.section_id = section_id.map(str::to_string);
        Ok(())
    }

    // -- deletes ------------------------------------------------------------

    /// Delete an entity and apply the cascade rules. Returns every entity
    /// that was removed (detached items are not included).
    pub(crate) fn delete(&mut self, kind: EntityKind, id: &str) -> Result<Vec<Removed>, CoreError> {
        if !self.contains(kind, id) {
            return Err(CoreError::not_found(kind.as_str(), id));
        }

        let removed = match kind {
            EntityKind::Location => {
                let mut removed = drain_where(&mut self.items, |i| i.location_id == id);
                removed.extend(drain_where(&mut self.sections, |s| s.location_id == id));
                removed.extend(drain_where(&mut self.areas, |a| a.location_id == id));
                removed.extend(drain_where(&mut self.locations, |l| l.id == id));
                removed
            }
            EntityKind::Area => {
                let mut removed = drain_where(&mut self.items, |i| i.area_id == id);
                removed.extend(drain_where(&mut self.sections, |s| s.area_id == id));
                removed.extend(drain_where(&mut self.areas, |a| a.id == id));
                removed
            }
            EntityKind::Section => {
                for item in &mut self.items {
                    if item.section_id.as_deref() == Some(id) {
                        item.section_id = None;
                    }
                }
                drain_where(&mut self.sections, |s| s.id == id)
            }
            EntityKind::Item => drain_where(&mut self.items, |i| i.id == id),
        };
        Ok(removed)
    }

    // -- integrity ----------------------------------------------------------

    /// Every parent reference that does not resolve.
    pub fn orphans(&self) -> Vec<OrphanRef> {
        let mut orphans = Vec::new();
        let mut check = |kind, id: &str, parent_kind, parent_id: &str, ok: bool| {
            if !ok {
                orphans.push(OrphanRef {
                    kind,
                    id: id.to_string(),
                    missing_parent: parent_kind,
                    parent_id: parent_id.to_string(),
                });
            }
        };

        for a in &self.areas {
            let ok = self.location(&a.location_id).is_some();
            check(EntityKind::Area, &a.id, EntityKind::Location, &a.location_id, ok);
        }
        for s in &self.sections {
            let ok = self.location(&s.location_id).is_some();
            check(EntityKind::Section, &s.id, EntityKind::Location, &s.location_id, ok);
            let ok = self.area(&s.area_id).is_some();
            check(EntityKind::Section, &s.id, EntityKind::Area, &s.area_id, ok);
        }
        for i in &self.items {
            let ok = self.location(&i.location_id).is_some();
            check(EntityKind::Item, &i.id, EntityKind::Location, &i.location_id, ok);
            let ok = self.area(&i.area_id).is_some();
            check(EntityKind::Item, &i.id, EntityKind::Area, &i.area_id, ok);
            if let Some(section_id) = &i.section_id {
                let ok = self.section(section_id).is_some();
                check(EntityKind::Item, &i.id, EntityKind::Section, section_id, ok);
            }
        }
        orphans
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use chrono::Utc;

    use super::*;

    fn location(id: &str) -> Location {
        Location {
            id: id.to_string(),
            name: id.to_string(),
            qr_data: format!("LOC:{id}:{id}"),
            created_at: Utc::now(),
            description: None,
            address: None,
        }
    }

    fn area(id: &str, location_id: &str) -> Area {
        Area {
            id: id.to_string(),
            name: id.to_string(),
            qr_data: format!("ARE:{id}:{id}"),
            created_at: Utc::now(),
            location_id: location_id.to_string(),
            description: None,
        }
    }

    fn section(id: &str, location_id: &str, area_id: &str) -> Section {
        Section {
            id: id.to_string(),
            name: id.to_string(),
            qr_data: format!("SEC:{id}:{id}"),
            created_at: Utc::now(),
            location_id: location_id.to_string(),
            area_id: area_id.to_string(),
            description: None,
        }
    }

    fn item(id: &str, location_id: &str, area_id: &str, section_id: Option<&str>) -> Item {
        Item {
            id: id.to_string(),
            name: id.to_string(),
            qr_data: format!("ITE:{id}:{id}"),
            created_at: Utc::now(),
            location_id: location_id.to_string(),
            area_id: area_id.to_string(),
            section_id: section_id.map(str::to_string),
            quantity: 1,
            condition: ItemCondition::Good,
            description: None,
            image_uri: None,
        }
    }

    /// Two locations; `l1` holds areas `a1`/`a2`, `a1` holds section `s1`.
    fn fixture() -> Inventory {
        let mut inv = Inventory::default();
        inv.insert_location(location("l1"));
        inv.insert_location(location("l2"));
        inv.insert_area(area("a1", "l1")).unwrap();
        inv.insert_area(area("a2", "l1")).unwrap();
        inv.insert_area(area("a3", "l2")).unwrap();
        inv.insert_section(section("s1", "l1", "a1")).unwrap();
        inv.insert_item(item("i1", "l1", "a1", Some("s1"))).unwrap();
        inv.insert_item(item("i2", "l1", "a1", None)).unwrap();
        inv.insert_item(item("i3", "l1", "a2", None)).unwrap();
        inv.insert_item(item("i4", "l2", "a3", None)).unwrap();
        inv
    }

    #[test]
    fn insert_rejects_unresolvable_parents() {
        let mut inv = fixture();
        assert_matches!(
            inv.insert_area(area("ax", "nope")),
            Err(CoreError::NotFound { entity: "location", .. })
        );
        assert_matches!(
            inv.insert_section(section("sx", "l2", "a1")),
            Err(CoreError::Validation(_))
        );
        assert_matches!(
            inv.insert_item(item("ix", "l1", "a2", Some("s1"))),
            Err(CoreError::Validation(_))
        );
    }

    #[test]
    fn deleting_location_cascades_to_descendants() {
        let mut inv = fixture();
        let removed = inv.delete(EntityKind::Location, "l1").unwrap();

        assert_eq!(removed.len(), 1 + 2 + 1 + 3);
        assert_eq!(inv.locations.len(), 1);
        assert_eq!(inv.areas.len(), 1);
        assert!(inv.sections.is_empty());
        assert_eq!(inv.items.len(), 1);
        assert!(inv.orphans().is_empty());
    }

    #[test]
    fn deleting_area_cascades_to_sections_and_items() {
        let mut inv = fixture();
        inv.delete(EntityKind::Area, "a1").unwrap();

        assert!(inv.area("a1").is_none());
        assert!(inv.section("s1").is_none());
        assert!(inv.item("i1").is_none());
        assert!(inv.item("i2").is_none());
        assert!(inv.item("i3").is_some());
    }

    #[test]
    fn deleting_section_detaches_items() {
        let mut inv = fixture();
        let removed = inv.delete(EntityKind::Section, "s1").unwrap();

        assert_eq!(
            removed,
            vec![Removed {
                kind: EntityKind::Section,
                id: "s1".to_string()
            }]
        );
        let detached = inv.item("i1").unwrap();
        assert_eq!(detached.section_id, None);
        assert_eq!(detached.area_id, "a1");
    }

    #[test]
    fn delete_missing_entity_is_not_found() {
        let mut inv = fixture();
        assert_matches!(
            inv.delete(EntityKind::Item, "zzz"),
            Err(CoreError::NotFound { entity: "item", .. })
        );
    }

    #[test]
    fn move_item_follows_target_area_location() {
        let mut inv = fixture();
        inv.move_item("i1", "a3", None).unwrap();

        let moved = inv.item("i1").unwrap();
        assert_eq!(moved.location_id, "l2");
        assert_eq!(moved.area_id, "a3");
        assert_eq!(moved.section_id, None);

        assert_matches!(inv.move_item("i2", "a2", Some("s1")), Err(CoreError::Validation(_)));
    }

    #[test]
    fn rename_keeps_qr_data() {
        let mut inv = fixture();
        inv.rename(EntityKind::Area, "a1", "Garage").unwrap();

        let renamed = inv.area("a1").unwrap();
        assert_eq!(renamed.name, "Garage");
        assert_eq!(renamed.qr_data, "ARE:a1:a1");
        assert_matches!(inv.rename(EntityKind::Area, "a1", ""), Err(CoreError::Validation(_)));
    }

    #[test]
    fn update_item_applies_only_given_fields() {
        let mut inv = fixture();
        let patch = ItemPatch {
            quantity: Some(7),
            description: Some(Some("spare".to_string())),
            ..Default::default()
        };
        let updated = inv.update_item("i2", patch).unwrap();

        assert_eq!(updated.quantity, 7);
        assert_eq!(updated.condition, ItemCondition::Good);
        assert_eq!(updated.description.as_deref(), Some("spare"));
    }

    #[test]
    fn find_by_qr_and_listing_helpers() {
        let inv = fixture();
        assert_eq!(inv.find_by_qr("SEC:s1:s1"), Some((EntityKind::Section, "s1")));
        assert_eq!(inv.find_by_qr("nothing"), None);
        assert_eq!(inv.areas_in("l1").count(), 2);
        assert_eq!(inv.sections_in("a1").count(), 1);
        assert_eq!(inv.items_in_area("a1").count(), 2);
        assert_eq!(inv.items_in_section("s1").count(), 1);
        assert_eq!(inv.total_entities(), 2 + 3 + 1 + 4);
    }

    #[test]
    fn orphans_reports_dangling_references() {
        let mut inv = fixture();
        inv.items.push(item("stray", "l1", "gone", None));

        let orphans = inv.orphans();
        assert_eq!(orphans.len(), 1);
        assert_eq!(orphans[0].id, "stray");
        assert_eq!(orphans[0].missing_parent, EntityKind::Area);
    }
}
