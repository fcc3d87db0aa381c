//! Backend selection.

use crate::memory::MemoryStore;
use crate::persistent::RedbStore;
use crate::store::SharedStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tally_core::{CoreResult, SharedClock};

/// Which backend to open
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// In-process map, lost on exit
    Memory,
    /// `redb` database file
    Redb,
}

/// Store configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Backend to open
    pub backend: BackendKind,
    /// Database file for the `redb` backend
    pub path: String,
    /// Remove every key right after opening
    pub flush_on_open: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Redb,
            path: ".tally/store.redb".to_string(),
            flush_on_open: false,
        }
    }
}

impl StoreConfig {
    /// In-memory configuration
    #[must_use]
    pub fn memory() -> Self {
        Self {
            backend: BackendKind::Memory,
            ..Default::default()
        }
    }

    /// Open the configured backend on `clock`
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Backend` if the backend cannot be opened
    pub fn open(&self, clock: SharedClock) -> CoreResult<SharedStore> {
        let store: SharedStore = match self.backend {
            BackendKind::Memory => Arc::new(MemoryStore::with_clock(clock)),
            BackendKind::Redb => Arc::new(RedbStore::open_with_clock(&self.path, clock)?),
        };
        if self.flush_on_open {
            store.flush()?;
        }
        tracing::info!(backend = store.name(), "store opened");
        Ok(store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_core::SystemClock;

    #[test]
    fn test_store_config_default() {
        let config = StoreConfig::default();
        assert_eq!(config.backend, BackendKind::Redb);
        assert_eq!(config.path, ".tally/store.redb");
        assert!(!config.flush_on_open);
    }

    #[test]
    fn test_open_memory() {
        let store = StoreConfig::memory().open(Arc::new(SystemClock)).unwrap();
        assert_eq!(store.name(), "memory");
    }

    #[test]
    fn test_open_redb_with_flush() {
        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig {
            backend: BackendKind::Redb,
            path: dir.path().join("db.redb").to_string_lossy().into_owned(),
            flush_on_open: false,
        };
        let store = config.open(Arc::new(SystemClock)).unwrap();
        store.set("k", b"v").unwrap();
        drop(store);

        let flushing = StoreConfig {
            flush_on_open: true,
            ..config
        };
        let store = flushing.open(Arc::new(SystemClock)).unwrap();
        assert_eq!(store.name(), "redb");
        assert_eq!(store.get("k").unwrap(), None);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let json = r#"{"backend": "memory"}"#;
        let config: StoreConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.backend, BackendKind::Memory);
        assert_eq!(config.path, ".tally/store.redb");
    }
}
