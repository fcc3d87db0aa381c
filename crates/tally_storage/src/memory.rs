//! In-process key-value store.

use crate::store::{KeyValueStore, resolve_range};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tally_core::value::decode_int;
use tally_core::{CoreError, CoreResult, SharedClock, SystemClock, Timestamp};

/// Store statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStats {
    /// Number of reads (values and logs)
    pub read_count: u64,
    /// Number of writes (sets, increments, appends)
    pub write_count: u64,
    /// Number of entries dropped because their expiry passed
    pub expired_count: u64,
}

#[derive(Debug, Clone)]
enum Slot {
    Value(Vec<u8>),
    Log(Vec<Vec<u8>>),
}

#[derive(Debug, Clone)]
struct Entry {
    slot: Slot,
    expires_at: Option<Timestamp>,
}

impl Entry {
    fn value(data: Vec<u8>, expires_at: Option<Timestamp>) -> Self {
        Self {
            slot: Slot::Value(data),
            expires_at,
        }
    }

    fn is_expired(&self, now: Timestamp) -> bool {
        self.expires_at.is_some_and(|at| at.is_reached_at(now))
    }
}

/// In-memory store with lazy expiry
///
/// Expired entries read as absent immediately and are physically dropped on
/// the next write to the same key or by [`MemoryStore::purge_expired`].
pub struct MemoryStore {
    clock: SharedClock,
    entries: RwLock<HashMap<String, Entry>>,
    stats: Mutex<StoreStats>,
}

impl MemoryStore {
    /// Create a store on the system clock
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Create a store on a caller-supplied clock
    #[must_use]
    pub fn with_clock(clock: SharedClock) -> Self {
        Self {
            clock,
            entries: RwLock::new(HashMap::new()),
            stats: Mutex::new(StoreStats::default()),
        }
    }

    /// Drop every expired entry, returning how many were removed
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        let removed = before - entries.len();
        if removed > 0 {
            self.stats.lock().expired_count += removed as u64;
            tracing::debug!(removed, "purged expired entries");
        }
        removed
    }

    /// Get store statistics
    #[must_use]
    pub fn stats(&self) -> StoreStats {
        self.stats.lock().clone()
    }

    /// Number of live keys
    #[must_use]
    pub fn len(&self) -> usize {
        let now = self.clock.now();
        self.entries
            .read()
            .values()
            .filter(|entry| !entry.is_expired(now))
            .count()
    }

    /// Whether no live keys remain
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn record_read(&self) {
        self.stats.lock().read_count += 1;
    }

    fn record_write(&self) {
        self.stats.lock().write_count += 1;
    }

    /// Remove `key` if its expiry has passed
    fn evict_if_expired(&self, entries: &mut HashMap<String, Entry>, key: &str) {
        let now = self.clock.now();
        if entries.get(key).is_some_and(|entry| entry.is_expired(now)) {
            entries.remove(key);
            self.stats.lock().expired_count += 1;
        }
    }

    /// Write a plain value; a live log under `key` is never overwritten
    fn put(&self, key: &str, value: &[u8], expires_at: Option<Timestamp>) -> CoreResult<()> {
        self.record_write();
        let mut entries = self.entries.write();
        self.evict_if_expired(&mut entries, key);
        if matches!(entries.get(key), Some(Entry { slot: Slot::Log(_), .. })) {
            return Err(wrong_type(key));
        }
        entries.insert(key.to_string(), Entry::value(value.to_vec(), expires_at));
        Ok(())
    }

    fn with_live<T>(&self, key: &str, f: impl FnOnce(Option<&Entry>) -> T) -> T {
        let now = self.clock.now();
        let entries = self.entries.read();
        f(entries.get(key).filter(|entry| !entry.is_expired(now)))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyValueStore for MemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn get(&self, key: &str) -> CoreResult<Option<Vec<u8>>> {
        self.record_read();
        self.with_live(key, |entry| match entry.map(|e| &e.slot) {
            None => Ok(None),
            Some(Slot::Value(data)) => Ok(Some(data.clone())),
            Some(Slot::Log(_)) => Err(wrong_type(key)),
        })
    }

    fn set(&self, key: &str, value: &[u8]) -> CoreResult<()> {
        self.put(key, value, None)
    }

    fn set_with_expiry(&self, key: &str, value: &[u8], ttl: Duration) -> CoreResult<()> {
        if ttl.is_zero() {
            return Err(zero_ttl());
        }
        let expires_at = self.clock.now().add(ttl);
        self.put(key, value, Some(expires_at))
    }

    fn increment(&self, key: &str) -> CoreResult<i64> {
        self.record_write();
        let mut entries = self.entries.write();
        self.evict_if_expired(&mut entries, key);

        let entry = entries
            .entry(key.to_string())
            .or_insert_with(|| Entry::value(b"0".to_vec(), None));
        let Slot::Value(data) = &mut entry.slot else {
            return Err(wrong_type(key));
        };
        let next = decode_int(data)?
            .checked_add(1)
            .ok_or_else(|| CoreError::decoding("integer", "increment would overflow"))?;
        *data = next.to_string().into_bytes();
        Ok(next)
    }

    fn exists(&self, key: &str) -> CoreResult<bool> {
        self.record_read();
        Ok(self.with_live(key, |entry| entry.is_some()))
    }

    fn append_to_log(&self, key: &str, entry: &[u8]) -> CoreResult<u64> {
        self.record_write();
        let mut entries = self.entries.write();
        self.evict_if_expired(&mut entries, key);

        let slot = entries.entry(key.to_string()).or_insert_with(|| Entry {
            slot: Slot::Log(Vec::new()),
            expires_at: None,
        });
        let Slot::Log(log) = &mut slot.slot else {
            return Err(wrong_type(key));
        };
        log.push(entry.to_vec());
        Ok(log.len() as u64)
    }

    fn read_log(&self, key: &str, start: i64, end: i64) -> CoreResult<Vec<Vec<u8>>> {
        self.record_read();
        self.with_live(key, |entry| match entry.map(|e| &e.slot) {
            None => Ok(Vec::new()),
            Some(Slot::Log(log)) => Ok(resolve_range(log.len() as u64, start, end)
                .map(|range| log[range.start as usize..range.end as usize].to_vec())
                .unwrap_or_default()),
            Some(Slot::Value(_)) => Err(wrong_type(key)),
        })
    }

    fn log_len(&self, key: &str) -> CoreResult<u64> {
        self.record_read();
        self.with_live(key, |entry| match entry.map(|e| &e.slot) {
            None => Ok(0),
            Some(Slot::Log(log)) => Ok(log.len() as u64),
            Some(Slot::Value(_)) => Err(wrong_type(key)),
        })
    }

    fn flush(&self) -> CoreResult<()> {
        self.entries.write().clear();
        *self.stats.lock() = StoreStats::default();
        Ok(())
    }
}

fn wrong_type(key: &str) -> CoreError {
    CoreError::WrongType {
        key: key.to_string(),
    }
}

pub(crate) fn zero_ttl() -> CoreError {
    CoreError::InvalidArgument {
        name: "ttl".to_string(),
        reason: "expiry must be greater than zero".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_core::ManualClock;

    fn store_with_clock() -> (MemoryStore, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(Timestamp::from_millis(1_000)));
        (MemoryStore::with_clock(clock.clone()), clock)
    }

    #[test]
    fn test_store_new() {
        let store = MemoryStore::new();
        assert!(store.is_empty());
        assert_eq!(store.name(), "memory");
    }

    #[test]
    fn test_set_get() {
        let store = MemoryStore::new();
        store.set("k", b"hello").unwrap();
        assert_eq!(store.get("k").unwrap(), Some(b"hello".to_vec()));
    }

    #[test]
    fn test_get_missing_is_none() {
        let store = MemoryStore::new();
        assert_eq!(store.get("missing").unwrap(), None);
    }

    #[test]
    fn test_empty_value_is_not_missing() {
        let store = MemoryStore::new();
        store.set("k", b"").unwrap();
        assert_eq!(store.get("k").unwrap(), Some(Vec::new()));
        assert!(store.exists("k").unwrap());
    }

    #[test]
    fn test_increment_from_missing() {
        let store = MemoryStore::new();
        assert_eq!(store.increment("c").unwrap(), 1);
        assert_eq!(store.increment("c").unwrap(), 2);
        assert_eq!(store.get("c").unwrap(), Some(b"2".to_vec()));
    }

    #[test]
    fn test_increment_non_integer() {
        let store = MemoryStore::new();
        store.set("c", b"abc").unwrap();
        assert!(matches!(store.increment("c"), Err(CoreError::Decoding { .. })));
    }

    #[test]
    fn test_expiry() {
        let (store, clock) = store_with_clock();
        store
            .set_with_expiry("cached:x", b"body", Duration::from_secs(10))
            .unwrap();

        clock.advance(Duration::from_secs(9));
        assert_eq!(store.get("cached:x").unwrap(), Some(b"body".to_vec()));

        clock.advance(Duration::from_secs(1));
        assert_eq!(store.get("cached:x").unwrap(), None);
        assert!(!store.exists("cached:x").unwrap());
    }

    #[test]
    fn test_set_clears_expiry() {
        let (store, clock) = store_with_clock();
        store.set_with_expiry("k", b"a", Duration::from_secs(1)).unwrap();
        store.set("k", b"b").unwrap();
        clock.advance(Duration::from_secs(5));
        assert_eq!(store.get("k").unwrap(), Some(b"b".to_vec()));
    }

    #[test]
    fn test_zero_ttl_rejected() {
        let store = MemoryStore::new();
        let result = store.set_with_expiry("k", b"a", Duration::ZERO);
        assert!(matches!(result, Err(CoreError::InvalidArgument { .. })));
    }

    #[test]
    fn test_increment_after_expiry_restarts() {
        let (store, clock) = store_with_clock();
        store.set_with_expiry("c", b"41", Duration::from_secs(1)).unwrap();
        assert_eq!(store.increment("c").unwrap(), 42);
        clock.advance(Duration::from_secs(1));
        assert_eq!(store.increment("c").unwrap(), 1);
        assert_eq!(store.stats().expired_count, 1);
    }

    #[test]
    fn test_log_append_and_read() {
        let store = MemoryStore::new();
        assert_eq!(store.append_to_log("log", b"a").unwrap(), 1);
        assert_eq!(store.append_to_log("log", b"b").unwrap(), 2);
        assert_eq!(store.append_to_log("log", b"c").unwrap(), 3);

        let all = store.read_log("log", 0, -1).unwrap();
        assert_eq!(all, vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()]);
        assert_eq!(store.read_log("log", 1, 1).unwrap(), vec![b"b".to_vec()]);
        assert_eq!(store.log_len("log").unwrap(), 3);
    }

    #[test]
    fn test_read_missing_log_is_empty() {
        let store = MemoryStore::new();
        assert!(store.read_log("nothing", 0, -1).unwrap().is_empty());
        assert_eq!(store.log_len("nothing").unwrap(), 0);
    }

    #[test]
    fn test_wrong_type() {
        let store = MemoryStore::new();
        store.set("v", b"1").unwrap();
        store.append_to_log("l", b"x").unwrap();

        assert!(matches!(store.append_to_log("v", b"x"), Err(CoreError::WrongType { .. })));
        assert!(matches!(store.read_log("v", 0, -1), Err(CoreError::WrongType { .. })));
        assert!(matches!(store.get("l"), Err(CoreError::WrongType { .. })));
        assert!(matches!(store.increment("l"), Err(CoreError::WrongType { .. })));
        assert!(matches!(store.set("l", b"1"), Err(CoreError::WrongType { .. })));
        assert_eq!(store.log_len("l").unwrap(), 1);
    }

    #[test]
    fn test_purge_expired() {
        let (store, clock) = store_with_clock();
        store.set_with_expiry("a", b"1", Duration::from_secs(1)).unwrap();
        store.set("b", b"2").unwrap();
        clock.advance(Duration::from_secs(2));

        assert_eq!(store.purge_expired(), 1);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_flush() {
        let store = MemoryStore::new();
        store.set("a", b"1").unwrap();
        store.append_to_log("l", b"x").unwrap();
        store.flush().unwrap();
        assert!(store.is_empty());
        assert_eq!(store.stats(), StoreStats::default());
    }

    #[test]
    fn test_stats() {
        let store = MemoryStore::new();
        store.set("a", b"1").unwrap();
        store.get("a").unwrap();
        store.get("b").unwrap();

        let stats = store.stats();
        assert_eq!(stats.write_count, 1);
        assert_eq!(stats.read_count, 2);
    }
}
