//! QR payload codec.
//!
//! Every entity carries a `qrData` string with the grammar
//!
//! ```text
//! [PREFIX-]TYPECODE:ID:URLENCODED_NAME
//! ```
//!
//! and pre-generated pool codes omit the name: `[PREFIX-]PRE:ID`.
//! Printed codes in the field depend on this grammar, so it must not
//! change.
//!
//! Names are percent-encoded with the same reserved set as JavaScript's
//! `encodeURIComponent`. That keeps every payload pure ASCII, which the
//! one-byte-per-character [`crate::hex_code`] transcoder relies on.
//!
//! Unknown type codes are rejected by [`decode`] (strict policy).

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::{Deserialize, Serialize};

use crate::entity::EntityKind;
use crate::error::CoreError;
use crate::id::is_uuid;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Separator between payload segments.
pub const SEGMENT_SEPARATOR: char = ':';

/// Separator between the optional prefix and the type code.
pub const PREFIX_SEPARATOR: char = '-';

/// Maximum length of a classification prefix.
pub const MAX_PREFIX_LENGTH: usize = 32;

/// Maximum length of an entity name, before encoding.
pub const MAX_NAME_LENGTH: usize = 200;

/// Characters escaped in names: everything `encodeURIComponent` escapes.
const NAME_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

// ---------------------------------------------------------------------------
// Payload type
// ---------------------------------------------------------------------------

/// The type a payload refers to, identified on the wire by a 3-letter code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayloadType {
    Location,
    Area,
    Section,
    Item,
    /// A pool code minted before any entity exists.
    #[serde(rename = "pregenerated")]
    PreGenerated,
}

impl PayloadType {
    /// The 3-letter type code written into the payload.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Location => "LOC",
            Self::Area => "ARE",
            Self::Section => "SEC",
            Self::Item => "ITE",
            Self::PreGenerated => "PRE",
        }
    }

    /// Map a type code back to its type. Returns `None` for unknown codes.
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "LOC" => Some(Self::Location),
            "ARE" => Some(Self::Area),
            "SEC" => Some(Self::Section),
            "ITE" => Some(Self::Item),
            "PRE" => Some(Self::PreGenerated),
            _ => None,
        }
    }

    /// Semantic type name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Location => "location",
            Self::Area => "area",
            Self::Section => "section",
            Self::Item => "item",
            Self::PreGenerated => "pregenerated",
        }
    }

    /// The entity kind this payload names, or `None` for pool codes.
    pub fn entity_kind(&self) -> Option<EntityKind> {
        match self {
            Self::Location => Some(EntityKind::Location),
            Self::Area => Some(EntityKind::Area),
            Self::Section => Some(EntityKind::Section),
            Self::Item => Some(EntityKind::Item),
            Self::PreGenerated => None,
        }
    }
}

impl From<EntityKind> for PayloadType {
    fn from(kind: EntityKind) -> Self {
        match kind {
            EntityKind::Location => Self::Location,
            EntityKind::Area => Self::Area,
            EntityKind::Section => Self::Section,
            EntityKind::Item => Self::Item,
        }
    }
}

impl std::fmt::Display for PayloadType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Decoded payload
// ---------------------------------------------------------------------------

/// The parts of a payload recovered by [`decode`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodedPayload {
    pub payload_type: PayloadType,
    pub id: String,
    /// Decoded name; `None` when the payload has no name segment.
    pub name: Option<String>,
    pub prefix: Option<String>,
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validate a classification prefix.
///
/// Prefixes are printed verbatim in front of the type code, so they are
/// limited to ASCII alphanumerics, `_` and `-`. A `-` inside a prefix is
/// safe because decoding splits on the last one.
pub fn validate_prefix(prefix: &str) -> Result<(), CoreError> {
    if prefix.is_empty() {
        return Err(CoreError::Validation("Prefix cannot be empty".to_string()));
    }
    if prefix.len() > MAX_PREFIX_LENGTH {
        return Err(CoreError::Validation(format!(
            "Prefix exceeds maximum length of {MAX_PREFIX_LENGTH} characters"
        )));
    }
    if !prefix
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(CoreError::Validation(format!(
            "Prefix '{prefix}' may only contain letters, digits, '_' and '-'"
        )));
    }
    Ok(())
}

/// Validate an entity name before it is encoded.
pub fn validate_name(name: &str) -> Result<(), CoreError> {
    if name.trim().is_empty() {
        return Err(CoreError::Validation("Name cannot be empty".to_string()));
    }
    if name.chars().count() > MAX_NAME_LENGTH {
        return Err(CoreError::Validation(format!(
            "Name exceeds maximum length of {MAX_NAME_LENGTH} characters"
        )));
    }
    Ok(())
}

fn validate_id_segment(id: &str) -> Result<(), CoreError> {
    if id.is_empty() || id.contains(SEGMENT_SEPARATOR) || !id.is_ascii() {
        return Err(CoreError::Validation(format!(
            "Id '{id}' cannot be used in a QR payload"
        )));
    }
    Ok(())
}

fn head(payload_type: PayloadType, prefix: Option<&str>) -> Result<String, CoreError> {
    match prefix {
        Some(p) => {
            validate_prefix(p)?;
            Ok(format!("{p}{PREFIX_SEPARATOR}{}", payload_type.code()))
        }
        None => Ok(payload_type.code().to_string()),
    }
}

// ---------------------------------------------------------------------------
// Encode / decode
// ---------------------------------------------------------------------------

/// Encode an entity payload: `[PREFIX-]TYPECODE:ID:URLENCODED_NAME`.
pub fn encode(
    kind: EntityKind,
    name: &str,
    id: &str,
    prefix: Option<&str>,
) -> Result<String, CoreError> {
    validate_name(name)?;
    validate_id_segment(id)?;
    let head = head(kind.into(), prefix)?;
    let name = utf8_percent_encode(name, NAME_ENCODE_SET);
    Ok(format!("{head}{SEGMENT_SEPARATOR}{id}{SEGMENT_SEPARATOR}{name}"))
}

/// Encode a pre-generated pool payload: `[PREFIX-]PRE:ID`.
pub fn encode_pregenerated(id: &str, prefix: Option<&str>) -> Result<String, CoreError> {
    validate_id_segment(id)?;
    let head = head(PayloadType::PreGenerated, prefix)?;
    Ok(format!("{head}{SEGMENT_SEPARATOR}{id}"))
}

/// Decode a payload. Returns `None` for anything that does not follow
/// the grammar; never panics on untrusted input.
pub fn decode(payload: &str) -> Option<DecodedPayload> {
    let mut segments = payload.split(SEGMENT_SEPARATOR);
    let first = segments.next()?;
    let id = segments.next()?;
    let rest: Vec<&str> = segments.collect();

    let (prefix, code) = match first.rfind(PREFIX_SEPARATOR) {
        Some(pos) => (Some(&first[..pos]), &first[pos + 1..]),
        None => (None, first),
    };
    let payload_type = PayloadType::from_code(code)?;

    let name = if rest.is_empty() {
        None
    } else {
        let joined = rest.join(":");
        Some(percent_decode_str(&joined).decode_utf8().ok()?.into_owned())
    };

    Some(DecodedPayload {
        payload_type,
        id: id.to_string(),
        name,
        prefix: prefix.filter(|p| !p.is_empty()).map(str::to_string),
    })
}

/// `true` iff the payload decodes and its id has canonical UUID shape.
///
/// This is the gate for every externally scanned or hand-typed payload.
pub fn is_valid(payload: &str) -> bool {
    decode(payload).is_some_and(|decoded| is_uuid(&decoded.id))
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    const ID: &str = "123e4567-e89b-42d3-a456-426614174000";

    #[test]
    fn encodes_entity_payload() {
        let payload = encode(EntityKind::Location, "Storage Room", ID, None).unwrap();
        assert_eq!(payload, format!("LOC:{ID}:Storage%20Room"));
    }

    #[test]
    fn encodes_prefix_and_escapes_colon() {
        let payload = encode(EntityKind::Item, "Box: winter", ID, Some("GARAGE")).unwrap();
        assert_eq!(payload, format!("GARAGE-ITE:{ID}:Box%3A%20winter"));
    }

    #[test]
    fn round_trips_every_kind() {
        for kind in EntityKind::ALL {
            let payload = encode(*kind, "Shelf #3 (top)", ID, None).unwrap();
            let decoded = decode(&payload).unwrap();
            assert_eq!(decoded.payload_type, PayloadType::from(*kind));
            assert_eq!(decoded.id, ID);
            assert_eq!(decoded.name.as_deref(), Some("Shelf #3 (top)"));
            assert_eq!(decoded.prefix, None);
        }
    }

    #[test]
    fn round_trips_non_ascii_name_as_ascii_payload() {
        let payload = encode(EntityKind::Area, "Küche 厨房", ID, None).unwrap();
        assert!(payload.is_ascii());
        assert_eq!(decode(&payload).unwrap().name.as_deref(), Some("Küche 厨房"));
    }

    #[test]
    fn decodes_prefixed_location() {
        let decoded = decode(&format!("WAREHOUSE-LOC:{ID}:Storage%20Room")).unwrap();
        assert_eq!(
            decoded,
            DecodedPayload {
                payload_type: PayloadType::Location,
                id: ID.to_string(),
                name: Some("Storage Room".to_string()),
                prefix: Some("WAREHOUSE".to_string()),
            }
        );
    }

    #[test]
    fn prefix_split_uses_last_hyphen() {
        let decoded = decode(&format!("NORTH-WING-SEC:{ID}:Top")).unwrap();
        assert_eq!(decoded.prefix.as_deref(), Some("NORTH-WING"));
        assert_eq!(decoded.payload_type, PayloadType::Section);
    }

    #[test]
    fn unescaped_colons_in_name_are_rejoined() {
        let decoded = decode(&format!("ITE:{ID}:a:b:c")).unwrap();
        assert_eq!(decoded.name.as_deref(), Some("a:b:c"));
    }

    #[test]
    fn pregenerated_payload_has_no_name() {
        let payload = encode_pregenerated(ID, Some("OFFICE")).unwrap();
        assert_eq!(payload, format!("OFFICE-PRE:{ID}"));

        let decoded = decode(&payload).unwrap();
        assert_eq!(decoded.payload_type, PayloadType::PreGenerated);
        assert_eq!(decoded.name, None);
        assert_eq!(decoded.prefix.as_deref(), Some("OFFICE"));
    }

    #[test]
    fn unknown_type_code_is_rejected() {
        assert_eq!(decode(&format!("BOX:{ID}:Thing")), None);
        assert_eq!(decode(&format!("loc:{ID}:Thing")), None);
        assert!(!is_valid(&format!("XYZ:{ID}")));
    }

    #[test]
    fn too_few_segments_is_rejected() {
        assert_eq!(decode("garbage"), None);
        assert_eq!(decode(""), None);
    }

    #[test]
    fn invalid_utf8_escape_is_rejected() {
        assert_eq!(decode(&format!("ITE:{ID}:%FF%FE")), None);
    }

    #[test]
    fn validity_gate() {
        let payload = encode(EntityKind::Section, "Drawer", ID, Some("A")).unwrap();
        assert!(is_valid(&payload));
        assert!(is_valid(&encode_pregenerated(ID, None).unwrap()));
        assert!(!is_valid("garbage"));
        assert!(!is_valid("LOC:not-a-uuid:Name"));
        assert!(!is_valid(&format!("LOC::{ID}")));
    }

    #[test]
    fn empty_prefix_decodes_as_none() {
        let decoded = decode(&format!("-ARE:{ID}:Hall")).unwrap();
        assert_eq!(decoded.prefix, None);
    }

    #[test]
    fn encode_rejects_bad_prefix() {
        assert_matches!(
            encode(EntityKind::Item, "x", ID, Some("BAD:PREFIX")),
            Err(CoreError::Validation(_))
        );
        assert_matches!(encode_pregenerated(ID, Some("")), Err(CoreError::Validation(_)));
        let long = "P".repeat(MAX_PREFIX_LENGTH + 1);
        assert_matches!(encode_pregenerated(ID, Some(&long)), Err(CoreError::Validation(_)));
    }

    #[test]
    fn encode_rejects_empty_name_and_colon_id() {
        assert_matches!(
            encode(EntityKind::Item, "   ", ID, None),
            Err(CoreError::Validation(_))
        );
        assert_matches!(
            encode(EntityKind::Item, "x", "a:b", None),
            Err(CoreError::Validation(_))
        );
    }
}
