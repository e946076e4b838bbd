//! Hex transcoding of QR payloads for printing and manual entry.
//!
//! A payload is rendered as two uppercase hex digits per byte with no
//! separator. Payloads produced by [`crate::qr_payload`] are ASCII, so one
//! byte is one character and the hex form is exactly twice the payload
//! length.

use crate::qr_payload::is_valid;

/// Characters per display group in [`format_for_display`].
pub const DISPLAY_GROUP_SIZE: usize = 4;

/// Render a payload as uppercase hex, two digits per byte.
pub fn to_hex(payload: &str) -> String {
    hex::encode_upper(payload.as_bytes())
}

/// Parse hex produced by [`to_hex`] (or typed by hand) back into a payload.
///
/// Whitespace anywhere in the input is ignored and either case is
/// accepted. Returns `None` for odd length, non-hex digits, or bytes that
/// do not form valid UTF-8.
pub fn from_hex(input: &str) -> Option<String> {
    let cleaned: String = input
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| c.to_ascii_uppercase())
        .collect();

    if cleaned.len() % 2 != 0 {
        return None;
    }
    let bytes = hex::decode(&cleaned).ok()?;
    String::from_utf8(bytes).ok()
}

/// Insert a space every four characters. Purely cosmetic; strip the
/// whitespace (or let [`from_hex`] do it) before decoding.
pub fn format_for_display(hex: &str) -> String {
    let chars: Vec<char> = hex.chars().collect();
    chars
        .chunks(DISPLAY_GROUP_SIZE)
        .map(|group| group.iter().collect::<String>())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Accept a hand-typed code: either the raw payload or its hex form
/// (display spacing allowed). Returns the payload only if it passes the
/// validity gate.
pub fn parse_manual_entry(input: &str) -> Option<String> {
    let trimmed = input.trim();
    if is_valid(trimmed) {
        return Some(trimmed.to_string());
    }
    from_hex(trimmed).filter(|payload| is_valid(payload))
}
