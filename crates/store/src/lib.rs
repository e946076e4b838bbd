//! `shelfmark-store` -- persistence and serialized mutation of the
//! inventory state.
//!
//! - [`kv`]: the [`KeyValueStore`](kv::KeyValueStore) port and an
//!   in-memory adapter.
//! - [`file`]: a directory-backed adapter with atomic writes.
//! - [`service`]: [`InventoryService`](service::InventoryService), which
//!   loads the state once and persists every change before committing it.

pub mod error;
pub mod file;
pub mod kv;
pub mod service;

pub use error::StoreError;
pub use file::FileStore;
pub use kv::{KeyValueStore, MemoryStore, INVENTORY_KEY, POOL_KEY};
pub use service::{ImportOutcome, InventoryService};
