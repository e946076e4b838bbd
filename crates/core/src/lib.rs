//! `shelfmark-core` -- QR identity for a four-level storage inventory.
//!
//! Pure logic only: no I/O, no async, no logging. Persistence and scanning
//! are collaborators that call into these modules and store their output
//! verbatim.

pub mod backup;
pub mod entity;
pub mod error;
pub mod hex_code;
pub mod id;
pub mod inventory;
pub mod pool;
pub mod qr_payload;
pub mod state;
pub mod types;
