//! Backup snapshot format, validation, version migration and restore.
//!
//! A backup is a point-in-time JSON copy of the whole state:
//!
//! ```json
//! {
//!   "version": "1.1",
//!   "exportedAt": "2024-05-01T12:00:00Z",
//!   "inventory": { "locations": [], "areas": [], "sections": [], "items": [] },
//!   "preGeneratedQRs": []
//! }
//! ```
//!
//! Field names and nesting are the interchange contract between app
//! versions. Older snapshots are migrated forward on import; snapshots
//! from a newer version are refused.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::entity::{ItemCondition, DEFAULT_QUANTITY};
use crate::error::CoreError;
use crate::inventory::{Inventory, OrphanRef};
use crate::pool::{PreGeneratedQr, QrPool};
use crate::state::InventoryState;
use crate::types::Timestamp;

// ---------------------------------------------------------------------------
// Versions
// ---------------------------------------------------------------------------

/// Version written by [`export`].
pub const CURRENT_VERSION: &str = "1.1";

/// Oldest version [`migrate`] can bring forward.
pub const OLDEST_SUPPORTED_VERSION: &str = "1.0";

/// Names of the four entity collections inside `inventory`.
pub const INVENTORY_COLLECTIONS: &[&str] = &["locations", "areas", "sections", "items"];

/// Parse `"major.minor"` (a bare `"major"` means minor 0).
pub fn parse_version(version: &str) -> Option<(u32, u32)> {
    let mut parts = version.trim().split('.');
    let major = parts.next()?.parse().ok()?;
    let minor = match parts.next() {
        Some(m) => m.parse().ok()?,
        None => 0,
    };
    if parts.next().is_some() {
        return None;
    }
    Some((major, minor))
}

fn current() -> (u32, u32) {
    // CURRENT_VERSION is a well-formed constant.
    parse_version(CURRENT_VERSION).unwrap_or((1, 1))
}

fn oldest() -> (u32, u32) {
    parse_version(OLDEST_SUPPORTED_VERSION).unwrap_or((1, 0))
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupSnapshot {
    pub version: String,
    pub exported_at: Timestamp,
    pub inventory: Inventory,
    #[serde(rename = "preGeneratedQRs", default)]
    pub pre_generated_qrs: Vec<PreGeneratedQr>,
}

/// Take a snapshot of the live state.
pub fn export(state: &InventoryState, now: Timestamp) -> BackupSnapshot {
    BackupSnapshot {
        version: CURRENT_VERSION.to_string(),
        exported_at: now,
        inventory: state.inventory.clone(),
        pre_generated_qrs: state.pool.entries().to_vec(),
    }
}

/// Serialize a snapshot as pretty-printed JSON.
pub fn to_json(snapshot: &BackupSnapshot) -> Result<String, CoreError> {
    Ok(serde_json::to_string_pretty(snapshot)?)
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Result of checking the structural shape of a backup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupValidation {
    pub is_valid: bool,
    /// Version the backup claims, if readable.
    pub version: Option<String>,
    /// Non-blocking observations.
    pub warnings: Vec<String>,
    /// Blocking problems.
    pub errors: Vec<String>,
}

/// Check the structural shape of a parsed backup.
///
/// `preGeneratedQRs` may be absent (exports that predate the pool), but
/// when present it must be an array.
pub fn validate_detailed(data: &Value) -> BackupValidation {
    let mut result = BackupValidation::default();

    let Some(obj) = data.as_object() else {
        result.errors.push("Backup must be a JSON object".to_string());
        return result;
    };

    match obj.get("version") {
        Some(Value::String(v)) => result.version = Some(v.clone()),
        Some(_) => result.errors.push("'version' must be a string".to_string()),
        None => result.errors.push("Missing 'version'".to_string()),
    }

    match obj.get("exportedAt") {
        Some(Value::String(_)) => {}
        Some(_) => result.errors.push("'exportedAt' must be a string".to_string()),
        None => result.errors.push("Missing 'exportedAt'".to_string()),
    }

    match obj.get("inventory") {
        Some(Value::Object(inventory)) => {
            for name in INVENTORY_COLLECTIONS {
                match inventory.get(*name) {
                    Some(Value::Array(_)) => {}
                    Some(_) => result
                        .errors
                        .push(format!("'inventory.{name}' must be an array")),
                    None => result.errors.push(format!("Missing 'inventory.{name}'")),
                }
            }
        }
        Some(_) => result.errors.push("'inventory' must be an object".to_string()),
        None => result.errors.push("Missing 'inventory'".to_string()),
    }

    match obj.get("preGeneratedQRs") {
        Some(Value::Array(_)) => {}
        Some(_) => result
            .errors
            .push("'preGeneratedQRs' must be an array".to_string()),
        None => result
            .warnings
            .push("Backup has no pre-generated QR codes section".to_string()),
    }

    result.is_valid = result.errors.is_empty();
    result
}

/// `true` if the backup has the expected structural shape.
pub fn validate(data: &Value) -> bool {
    validate_detailed(data).is_valid
}

// ---------------------------------------------------------------------------
// Compatibility
// ---------------------------------------------------------------------------

/// Whether a backup version can be imported by this build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Compatibility {
    pub compatible: bool,
    pub needs_migration: bool,
    pub warnings: Vec<String>,
}

pub fn check_compatibility(version: &str) -> Compatibility {
    let Some(parsed) = parse_version(version) else {
        return Compatibility {
            compatible: false,
            needs_migration: false,
            warnings: vec![format!("Unrecognised backup version '{version}'")],
        };
    };

    if parsed > current() {
        return Compatibility {
            compatible: false,
            needs_migration: false,
            warnings: vec![format!(
                "Backup version {version} is newer than supported version {CURRENT_VERSION}; \
                 update the app before importing"
            )],
        };
    }
    if parsed < oldest() {
        return Compatibility {
            compatible: false,
            needs_migration: false,
            warnings: vec![format!(
                "Backup version {version} is older than the oldest supported version \
                 {OLDEST_SUPPORTED_VERSION}"
            )],
        };
    }
    if parsed < current() {
        return Compatibility {
            compatible: true,
            needs_migration: true,
            warnings: vec![format!(
                "Backup version {version} will be migrated to {CURRENT_VERSION}"
            )],
        };
    }
    Compatibility {
        compatible: true,
        needs_migration: false,
        warnings: Vec::new(),
    }
}

// ---------------------------------------------------------------------------
// Migration
// ---------------------------------------------------------------------------

/// 1.0 -> 1.1: items gain `quantity` and `condition`.
fn migrate_1_0_to_1_1(data: &mut Value) {
    let Some(items) = data
        .get_mut("inventory")
        .and_then(|inv| inv.get_mut("items"))
        .and_then(Value::as_array_mut)
    else {
        return;
    };

    for item in items.iter_mut().filter_map(Value::as_object_mut) {
        item.entry("quantity")
            .or_insert_with(|| Value::from(DEFAULT_QUANTITY));
        item.entry("condition")
            .or_insert_with(|| Value::from(ItemCondition::default().as_str()));
    }
}

/// Bring a backup forward to [`CURRENT_VERSION`].
///
/// Already-current data is returned unchanged, so applying this twice is
/// the same as applying it once. Newer or unrecognised versions are
/// refused with [`CoreError::Incompatible`].
pub fn migrate(mut data: Value) -> Result<Value, CoreError> {
    let version = data
        .get("version")
        .and_then(Value::as_str)
        .ok_or_else(|| CoreError::Validation("Backup has no string 'version'".to_string()))?
        .to_string();

    let compatibility = check_compatibility(&version);
    if !compatibility.compatible {
        return Err(CoreError::Incompatible(compatibility.warnings.join("; ")));
    }
    if !compatibility.needs_migration {
        return Ok(data);
    }

    let from = parse_version(&version).unwrap_or_else(oldest);
    if from < (1, 1) {
        migrate_1_0_to_1_1(&mut data);
    }

    if let Some(obj) = data.as_object_mut() {
        obj.insert("version".to_string(), Value::from(CURRENT_VERSION));
    }
    Ok(data)
}

// ---------------------------------------------------------------------------
// Import
// ---------------------------------------------------------------------------

/// A backup that passed validation and was migrated to the current version.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedBackup {
    pub snapshot: BackupSnapshot,
    /// Version the file was written with, before migration.
    pub source_version: String,
    pub warnings: Vec<String>,
}

/// Parse, validate, check and migrate a backup file's contents.
pub fn parse_backup(json: &str) -> Result<LoadedBackup, CoreError> {
    let data: Value = serde_json::from_str(json)?;

    let validation = validate_detailed(&data);
    if !validation.is_valid {
        return Err(CoreError::Validation(validation.errors.join("; ")));
    }
    let source_version = validation.version.unwrap_or_default();

    let compatibility = check_compatibility(&source_version);
    if !compatibility.compatible {
        return Err(CoreError::Incompatible(compatibility.warnings.join("; ")));
    }

    let migrated = migrate(data)?;
    let snapshot: BackupSnapshot = serde_json::from_value(migrated)?;

    let mut warnings = validation.warnings;
    warnings.extend(compatibility.warnings);

    Ok(LoadedBackup {
        snapshot,
        source_version,
        warnings,
    })
}

// ---------------------------------------------------------------------------
// Restore
// ---------------------------------------------------------------------------

/// How a snapshot is applied to the live state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RestoreMode {
    /// The snapshot becomes the entire live state.
    Replace,
    /// Records whose key is not already live are appended; live records
    /// are never modified.
    Merge,
}

impl RestoreMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Replace => "replace",
            Self::Merge => "merge",
        }
    }
}

impl std::fmt::Display for RestoreMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Records added and skipped for one collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionCount {
    pub added: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestoreSummary {
    pub mode: RestoreMode,
    pub locations: CollectionCount,
    pub areas: CollectionCount,
    pub sections: CollectionCount,
    pub items: CollectionCount,
    pub pre_generated_qrs: CollectionCount,
    /// Parent references left dangling after the restore.
    pub orphans: Vec<OrphanRef>,
}

fn merge_by_id<T: Clone>(
    live: &mut Vec<T>,
    incoming: Vec<T>,
    id: impl Fn(&T) -> &str,
) -> CollectionCount {
    let mut count = CollectionCount::default();
    for record in incoming {
        if live.iter().any(|existing| id(existing) == id(&record)) {
            count.skipped += 1;
        } else {
            live.push(record);
            count.added += 1;
        }
    }
    count
}

/// Apply a snapshot to the live state.
///
/// `Replace` starts from an empty state, so both modes use the same
/// existence checks: entities keyed by `id`, pool entries by `qrData`.
pub fn restore(
    state: &mut InventoryState,
    snapshot: BackupSnapshot,
    mode: RestoreMode,
) -> RestoreSummary {
    if mode == RestoreMode::Replace {
        *state = InventoryState::default();
    }

    let BackupSnapshot {
        inventory,
        pre_generated_qrs,
        ..
    } = snapshot;
    let live = &mut state.inventory;

    let locations = merge_by_id(&mut live.locations, inventory.locations, |l| l.id.as_str());
    let areas = merge_by_id(&mut live.areas, inventory.areas, |a| a.id.as_str());
    let sections = merge_by_id(&mut live.sections, inventory.sections, |s| s.id.as_str());
    let items = merge_by_id(&mut live.items, inventory.items, |i| i.id.as_str());

    let offered = pre_generated_qrs.len();
    let added = state.pool.extend(pre_generated_qrs);
    let pre_generated_qrs = CollectionCount {
        added,
        skipped: offered - added,
    };

    RestoreSummary {
        mode,
        locations,
        areas,
        sections,
        items,
        pre_generated_qrs,
        orphans: state.inventory.orphans(),
    }
}

/// Build a fresh state from a snapshot.
pub fn into_state(snapshot: BackupSnapshot) -> InventoryState {
    InventoryState::new(snapshot.inventory, QrPool::new(snapshot.pre_generated_qrs))
}
