//! Identifier generation for entities and pre-generated QR codes.
//!
//! Ids are random (version 4) UUIDs rendered in canonical lowercase
//! 8-4-4-4-12 form. Generation goes through the [`IdGenerator`] strategy
//! so callers can inject a source; the default [`OsIdGenerator`] reads the
//! operating-system CSPRNG and reports an unavailable source as
//! [`CoreError::IdGeneration`] instead of handing back a degenerate id.

use rand::rngs::OsRng;
use rand::TryRngCore;

use crate::error::CoreError;
use crate::types::EntityId;

/// Length of a hyphenated UUID string.
pub const UUID_LENGTH: usize = 36;

/// Byte offsets of the four hyphens in a hyphenated UUID.
const HYPHEN_POSITIONS: [usize; 4] = [8, 13, 18, 23];

/// Source of fresh identifiers.
pub trait IdGenerator {
    fn generate(&self) -> Result<EntityId, CoreError>;
}

/// UUIDv4 generator backed by the operating-system random source.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsIdGenerator;

impl IdGenerator for OsIdGenerator {
    fn generate(&self) -> Result<EntityId, CoreError> {
        let mut bytes = [0u8; 16];
        OsRng
            .try_fill_bytes(&mut bytes)
            .map_err(|e| CoreError::IdGeneration(format!("OS random source unavailable: {e}")))?;

        let id = uuid::Builder::from_random_bytes(bytes).into_uuid();
        Ok(id.hyphenated().to_string())
    }
}

/// Generate an id with the default OS-backed generator.
pub fn generate_id() -> Result<EntityId, CoreError> {
    OsIdGenerator.generate()
}

/// Returns `true` if `value` has canonical UUID shape (8-4-4-4-12 hex digits).
///
/// Either letter case is accepted; the version nibble is not checked so
/// codes printed by other tools with the same layout still scan.
pub fn is_uuid(value: &str) -> bool {
    if value.len() != UUID_LENGTH {
        return false;
    }
    value.bytes().enumerate().all(|(i, b)| {
        if HYPHEN_POSITIONS.contains(&i) {
            b == b'-'
        } else {
            b.is_ascii_hexdigit()
        }
    })
}
