//! Inventory entities: the four levels of the storage hierarchy.
//!
//! Field names serialize in camelCase because the same structs are the
//! literal backup interchange format.

use serde::{Deserialize, Serialize};

use crate::types::{EntityId, Timestamp};

// ---------------------------------------------------------------------------
// Entity kind
// ---------------------------------------------------------------------------

/// Which level of the hierarchy an entity belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Location,
    Area,
    Section,
    Item,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Location => "location",
            Self::Area => "area",
            Self::Section => "section",
            Self::Item => "item",
        }
    }

    /// Parse a kind name. Returns `None` for unknown values.
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "location" => Some(Self::Location),
            "area" => Some(Self::Area),
            "section" => Some(Self::Section),
            "item" => Some(Self::Item),
            _ => None,
        }
    }

    pub const ALL: &'static [Self] = &[Self::Location, Self::Area, Self::Section, Self::Item];
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Item condition
// ---------------------------------------------------------------------------

/// Physical condition of an item.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemCondition {
    New,
    #[default]
    Good,
    Fair,
    Poor,
    Broken,
}

impl ItemCondition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Good => "good",
            Self::Fair => "fair",
            Self::Poor => "poor",
            Self::Broken => "broken",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "new" => Some(Self::New),
            "good" => Some(Self::Good),
            "fair" => Some(Self::Fair),
            "poor" => Some(Self::Poor),
            "broken" => Some(Self::Broken),
            _ => None,
        }
    }
}

impl std::fmt::Display for ItemCondition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Default item quantity, also applied when migrating older backups.
pub const DEFAULT_QUANTITY: u32 = 1;

fn default_quantity() -> u32 {
    DEFAULT_QUANTITY
}

// ---------------------------------------------------------------------------
// Entities
// ---------------------------------------------------------------------------

/// Top level of the hierarchy, e.g. a house or a warehouse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub id: EntityId,
    pub name: String,
    pub qr_data: String,
    pub created_at: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

/// A room or zone within a location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Area {
    pub id: EntityId,
    pub name: String,
    pub qr_data: String,
    pub created_at: Timestamp,
    pub location_id: EntityId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A shelf, drawer or bin within an area.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Section {
    pub id: EntityId,
    pub name: String,
    pub qr_data: String,
    pub created_at: Timestamp,
    pub location_id: EntityId,
    pub area_id: EntityId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A stored thing. Lives in a section, or directly in an area when
/// `section_id` is `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: EntityId,
    pub name: String,
    pub qr_data: String,
    pub created_at: Timestamp,
    pub location_id: EntityId,
    pub area_id: EntityId,
    pub section_id: Option<EntityId>,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
    #[serde(default)]
    pub condition: ItemCondition,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_uri: Option<String>,
}

/// Read access to the fields every entity shares.
pub trait Entity {
    const KIND: EntityKind;

    fn id(&self) -> &str;
    fn name(&self) -> &str;
    fn qr_data(&self) -> &str;
    fn set_name(&mut self, name: String);
    fn set_qr_data(&mut self, qr_data: String);
}

macro_rules! impl_entity {
    ($ty:ty, $kind:expr) => {
        impl Entity for $ty {
            const KIND: EntityKind = $kind;

            fn id(&self) -> &str {
                &self.id
            }

            fn name(&self) -> &str {
                &self.name
            }

            fn qr_data(&self) -> &str {
                &self.qr_data
            }

            fn set_name(&mut self, name: String) {
                self.name = name;
            }

            fn set_qr_data(&mut self, qr_data: String) {
                self.qr_data = qr_data;
            }
        }
    };
}

impl_entity!(Location, EntityKind::Location);
impl_entity!(Area, EntityKind::Area);
impl_entity!(Section, EntityKind::Section);
impl_entity!(Item, EntityKind::Item);
