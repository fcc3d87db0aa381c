//! TALLY Storage
//!
//! The key-value contract every cache layer is written against, the key
//! naming conventions they share, and two backends: an in-process map and a
//! file-backed `redb` database.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod keys;
pub mod memory;
pub mod persistent;
pub mod store;

pub use config::{BackendKind, StoreConfig};
pub use memory::{MemoryStore, StoreStats};
pub use persistent::RedbStore;
pub use store::{KeyValueStore, SharedStore, resolve_range};
