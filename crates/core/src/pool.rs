//! Pre-generated QR pool.
//!
//! Pool entries are payloads minted before the entity they will label
//! exists, so codes can be printed in bulk. An entry moves from
//! unassigned to assigned when some entity's `qrData` is set to its
//! payload (see [`crate::state::InventoryState::set_entity_qr`]); it is
//! released again when that entity is deleted or relabelled.
//!
//! The pool has no separate id field: `qrData` is the natural key.

use serde::{Deserialize, Serialize};

use crate::entity::EntityKind;
use crate::error::CoreError;
use crate::id::IdGenerator;
use crate::qr_payload::{encode_pregenerated, validate_prefix};
use crate::types::{EntityId, Timestamp};

/// Maximum number of codes minted by one [`generate_pool`] call.
pub const MAX_POOL_BATCH: usize = 500;

// ---------------------------------------------------------------------------
// Pool entry
// ---------------------------------------------------------------------------

/// The entity a pool entry has been bound to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub entity_id: EntityId,
    pub kind: EntityKind,
}

/// A QR payload minted ahead of time.
///
/// On the wire the assignment is two nullable fields, `assignedTo` and
/// `assignedType`. Deserializing a record with exactly one of them set
/// fails.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "PreGeneratedQrRecord", into = "PreGeneratedQrRecord")]
pub struct PreGeneratedQr {
    pub qr_data: String,
    pub prefix: Option<String>,
    pub created_at: Timestamp,
    pub assignment: Option<Assignment>,
}

impl PreGeneratedQr {
    pub fn is_assigned(&self) -> bool {
        self.assignment.is_some()
    }

    pub fn is_assigned_to(&self, entity_id: &str) -> bool {
        self.assignment
            .as_ref()
            .is_some_and(|a| a.entity_id == entity_id)
    }

    pub fn status(&self) -> PoolEntryStatus {
        if self.is_assigned() {
            PoolEntryStatus::Assigned
        } else {
            PoolEntryStatus::Unassigned
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PreGeneratedQrRecord {
    qr_data: String,
    #[serde(default)]
    prefix: Option<String>,
    created_at: Timestamp,
    #[serde(default)]
    assigned_to: Option<EntityId>,
    #[serde(default)]
    assigned_type: Option<EntityKind>,
}

impl TryFrom<PreGeneratedQrRecord> for PreGeneratedQr {
    type Error = String;

    fn try_from(record: PreGeneratedQrRecord) -> Result<Self, Self::Error> {
        let assignment = match (record.assigned_to, record.assigned_type) {
            (Some(entity_id), Some(kind)) => Some(Assignment { entity_id, kind }),
            (None, None) => None,
            _ => {
                return Err(format!(
                    "Pool entry '{}' must set both assignedTo and assignedType or neither",
                    record.qr_data
                ))
            }
        };
        Ok(Self {
            qr_data: record.qr_data,
            prefix: record.prefix,
            created_at: record.created_at,
            assignment,
        })
    }
}

impl From<PreGeneratedQr> for PreGeneratedQrRecord {
    fn from(entry: PreGeneratedQr) -> Self {
        let (assigned_to, assigned_type) = match entry.assignment {
            Some(a) => (Some(a.entity_id), Some(a.kind)),
            None => (None, None),
        };
        Self {
            qr_data: entry.qr_data,
            prefix: entry.prefix,
            created_at: entry.created_at,
            assigned_to,
            assigned_type,
        }
    }
}

/// Lifecycle state of a pool entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolEntryStatus {
    Unassigned,
    Assigned,
}

impl PoolEntryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unassigned => "unassigned",
            Self::Assigned => "assigned",
        }
    }
}

impl std::fmt::Display for PoolEntryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Generation
// ---------------------------------------------------------------------------

/// Mint `count` unassigned pool entries sharing `prefix`.
pub fn generate_pool(
    count: usize,
    prefix: Option<&str>,
    ids: &dyn IdGenerator,
    now: Timestamp,
) -> Result<Vec<PreGeneratedQr>, CoreError> {
    if count == 0 {
        return Err(CoreError::Validation(
            "Pool size must be at least 1".to_string(),
        ));
    }
    if count > MAX_POOL_BATCH {
        return Err(CoreError::Validation(format!(
            "Pool size {count} exceeds maximum of {MAX_POOL_BATCH}"
        )));
    }
    if let Some(p) = prefix {
        validate_prefix(p)?;
    }

    (0..count)
        .map(|_| {
            let id = ids.generate()?;
            Ok(PreGeneratedQr {
                qr_data: encode_pregenerated(&id, prefix)?,
                prefix: prefix.map(str::to_string),
                created_at: now,
                assignment: None,
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Pool
// ---------------------------------------------------------------------------

/// Outcome of checking whether an entity may take a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Claim {
    /// The payload is not a pool code; nothing to reconcile.
    NotPooled,
    /// The pool entry is already bound to the claiming entity.
    AlreadyOwned,
    /// The pool entry is unassigned and will be bound.
    Available,
}

/// Counts over the pool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStats {
    pub total: usize,
    pub assigned: usize,
    pub unassigned: usize,
}

/// The set of pre-generated codes, persisted as a JSON array.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QrPool {
    entries: Vec<PreGeneratedQr>,
}

impl QrPool {
    pub fn new(entries: Vec<PreGeneratedQr>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[PreGeneratedQr] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<PreGeneratedQr> {
        self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn find(&self, qr_data: &str) -> Option<&PreGeneratedQr> {
        self.entries.iter().find(|e| e.qr_data == qr_data)
    }

    pub fn contains(&self, qr_data: &str) -> bool {
        self.find(qr_data).is_some()
    }

    pub fn unassigned(&self) -> impl Iterator<Item = &PreGeneratedQr> {
        self.entries.iter().filter(|e| !e.is_assigned())
    }

    /// Append entries, skipping any whose payload is already pooled.
    /// Returns the number added.
    pub fn extend(&mut self, entries: impl IntoIterator<Item = PreGeneratedQr>) -> usize {
        let mut added = 0;
        for entry in entries {
            if !self.contains(&entry.qr_data) {
                self.entries.push(entry);
                added += 1;
            }
        }
        added
    }

    /// Decide whether `entity_id` may carry `qr_data` without mutating
    /// anything. An entry bound to a different entity is a conflict.
    pub fn check_claim(&self, qr_data: &str, entity_id: &str) -> Result<Claim, CoreError> {
        match self.find(qr_data) {
            None => Ok(Claim::NotPooled),
            Some(entry) => match &entry.assignment {
                None => Ok(Claim::Available),
                Some(a) if a.entity_id == entity_id => Ok(Claim::AlreadyOwned),
                Some(a) => Err(CoreError::Conflict(format!(
                    "QR code {qr_data} is already assigned to {} {}",
                    a.kind, a.entity_id
                ))),
            },
        }
    }

    /// Bind the entry for `qr_data` to an entity. Returns `true` when an
    /// unassigned entry was bound, `false` when the payload is not pooled
    /// or is already bound to this entity.
    pub fn assign(
        &mut self,
        qr_data: &str,
        kind: EntityKind,
        entity_id: &str,
    ) -> Result<bool, CoreError> {
        if self.check_claim(qr_data, entity_id)? != Claim::Available {
            return Ok(false);
        }
        if let Some(entry) = self.entries.iter_mut().find(|e| e.qr_data == qr_data) {
            entry.assignment = Some(Assignment {
                entity_id: entity_id.to_string(),
                kind,
            });
        }
        Ok(true)
    }

    /// Return every entry bound to `entity_id` to unassigned. Returns the
    /// number released.
    pub fn release_entity(&mut self, entity_id: &str) -> usize {
        let mut released = 0;
        for entry in &mut self.entries {
            if entry.is_assigned_to(entity_id) {
                entry.assignment = None;
                released += 1;
            }
        }
        released
    }

    /// Delete a single unassigned entry. Assigned entries are refused.
    pub fn delete_unassigned(&mut self, qr_data: &str) -> Result<PreGeneratedQr, CoreError> {
        let pos = self
            .entries
            .iter()
            .position(|e| e.qr_data == qr_data)
            .ok_or_else(|| CoreError::not_found("pre-generated QR", qr_data))?;

        if let Some(a) = &self.entries[pos].assignment {
            return Err(CoreError::Conflict(format!(
                "QR code {qr_data} is assigned to {} {} and cannot be deleted",
                a.kind, a.entity_id
            )));
        }
        Ok(self.entries.remove(pos))
    }

    /// Drop every unassigned entry. Returns the number removed.
    pub fn clear_unassigned(&mut self) -> usize {
        let before = self.entries.len();
        self.entries.retain(PreGeneratedQr::is_assigned);
        before - self.entries.len()
    }

    pub fn stats(&self) -> PoolStats {
        let assigned = self.entries.iter().filter(|e| e.is_assigned()).count();
        PoolStats {
            total: self.entries.len(),
            assigned,
            unassigned: self.entries.len() - assigned,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::collections::HashSet;

    use assert_matches::assert_matches;

    use super::*;
    use crate::id::OsIdGenerator;
    use crate::qr_payload::{decode, is_valid, PayloadType};

    struct CountingIds(Cell<u32>);

    impl IdGenerator for CountingIds {
        fn generate(&self) -> Result<EntityId, CoreError> {
            let n = self.0.get();
            self.0.set(n + 1);
            Ok(format!("00000000-0000-4000-8000-{n:012}"))
        }
    }

    struct FailingIds;

    impl IdGenerator for FailingIds {
        fn generate(&self) -> Result<EntityId, CoreError> {
            Err(CoreError::IdGeneration("source unavailable".to_string()))
        }
    }

    fn pool_of(count: usize, prefix: Option<&str>) -> QrPool {
        QrPool::new(generate_pool(count, prefix, &CountingIds(Cell::new(0)), chrono::Utc::now()).unwrap())
    }

    #[test]
    fn generates_distinct_prefixed_valid_codes() {
        let entries = generate_pool(5, Some("OFFICE"), &OsIdGenerator, chrono::Utc::now()).unwrap();
        assert_eq!(entries.len(), 5);

        let distinct: HashSet<_> = entries.iter().map(|e| e.qr_data.as_str()).collect();
        assert_eq!(distinct.len(), 5);

        for entry in &entries {
            assert!(entry.qr_data.starts_with("OFFICE-PRE:"));
            assert!(is_valid(&entry.qr_data));
            assert_eq!(entry.prefix.as_deref(), Some("OFFICE"));
            assert!(!entry.is_assigned());
            let decoded = decode(&entry.qr_data).unwrap();
            assert_eq!(decoded.payload_type, PayloadType::PreGenerated);
        }
    }

    #[test]
    fn rejects_zero_and_oversized_batches() {
        let now = chrono::Utc::now();
        assert_matches!(
            generate_pool(0, None, &OsIdGenerator, now),
            Err(CoreError::Validation(_))
        );
        assert_matches!(
            generate_pool(MAX_POOL_BATCH + 1, None, &OsIdGenerator, now),
            Err(CoreError::Validation(_))
        );
        assert!(generate_pool(MAX_POOL_BATCH, None, &OsIdGenerator, now).is_ok());
    }

    #[test]
    fn generator_failure_aborts_batch() {
        assert_matches!(
            generate_pool(3, None, &FailingIds, chrono::Utc::now()),
            Err(CoreError::IdGeneration(_))
        );
    }

    #[test]
    fn assigns_only_matching_entry() {
        let mut pool = pool_of(3, Some("A"));
        let target = pool.entries()[1].qr_data.clone();

        assert!(pool.assign(&target, EntityKind::Item, "item-1").unwrap());

        assert!(pool.entries()[1].is_assigned_to("item-1"));
        assert!(!pool.entries()[0].is_assigned());
        assert!(!pool.entries()[2].is_assigned());
    }

    #[test]
    fn reassigning_to_other_entity_conflicts() {
        let mut pool = pool_of(1, None);
        let qr = pool.entries()[0].qr_data.clone();
        pool.assign(&qr, EntityKind::Item, "item-1").unwrap();

        assert_matches!(
            pool.assign(&qr, EntityKind::Item, "item-2"),
            Err(CoreError::Conflict(_))
        );
        assert!(!pool.assign(&qr, EntityKind::Item, "item-1").unwrap());
        assert!(pool.entries()[0].is_assigned_to("item-1"));
    }

    #[test]
    fn unpooled_payload_is_not_assigned() {
        let mut pool = pool_of(1, None);
        assert!(!pool.assign("LOC:x:y", EntityKind::Location, "l").unwrap());
        assert_eq!(pool.stats().assigned, 0);
    }

    #[test]
    fn release_returns_entry_to_unassigned() {
        let mut pool = pool_of(2, None);
        let qr = pool.entries()[0].qr_data.clone();
        pool.assign(&qr, EntityKind::Area, "area-1").unwrap();

        assert_eq!(pool.release_entity("area-1"), 1);
        assert_eq!(pool.find(&qr).unwrap().status(), PoolEntryStatus::Unassigned);
        assert_eq!(pool.release_entity("area-1"), 0);
    }

    #[test]
    fn delete_and_clear_only_touch_unassigned() {
        let mut pool = pool_of(4, None);
        let assigned = pool.entries()[0].qr_data.clone();
        let loose = pool.entries()[1].qr_data.clone();
        pool.assign(&assigned, EntityKind::Item, "i").unwrap();

        assert_matches!(pool.delete_unassigned(&assigned), Err(CoreError::Conflict(_)));
        assert_eq!(pool.delete_unassigned(&loose).unwrap().qr_data, loose);
        assert_matches!(pool.delete_unassigned(&loose), Err(CoreError::NotFound { .. }));

        assert_eq!(pool.clear_unassigned(), 2);
        assert_eq!(
            pool.stats(),
            PoolStats {
                total: 1,
                assigned: 1,
                unassigned: 0
            }
        );
    }

    #[test]
    fn extend_skips_existing_payloads() {
        let mut pool = pool_of(2, None);
        let again = pool.entries().to_vec();
        assert_eq!(pool.extend(again), 0);
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn wire_format_uses_paired_nullable_fields() {
        let mut pool = pool_of(1, Some("B"));
        let qr = pool.entries()[0].qr_data.clone();
        let json = serde_json::to_value(&pool).unwrap();
        assert!(json[0]["assignedTo"].is_null());
        assert!(json[0]["assignedType"].is_null());
        assert_eq!(json[0]["prefix"], "B");

        pool.assign(&qr, EntityKind::Section, "s-1").unwrap();
        let json = serde_json::to_value(&pool).unwrap();
        assert_eq!(json[0]["assignedTo"], "s-1");
        assert_eq!(json[0]["assignedType"], "section");

        let back: QrPool = serde_json::from_value(json).unwrap();
        assert_eq!(back, pool);
    }

    #[test]
    fn half_assigned_record_is_rejected() {
        let json = serde_json::json!([{
            "qrData": "PRE:00000000-0000-4000-8000-000000000000",
            "prefix": null,
            "createdAt": "2024-01-01T00:00:00Z",
            "assignedTo": "item-1",
            "assignedType": null
        }]);
        assert!(serde_json::from_value::<QrPool>(json).is_err());
    }
}
