//! Value cache keyed by random identifiers.

use crate::instrument::{Counted, History, Instrument, Operation};
use crate::replay::{HistoryReplayer, Transcript};
use tally_core::value::{decode_float, decode_int, decode_text};
use tally_core::{CoreResult, StoredValue, ValueKey, ValueKind};
use tally_storage::SharedStore;

/// Identity under which [`ValueCache::store`] is counted and logged
pub const STORE_IDENTITY: &str = "ValueCache::store";

/// The uninstrumented write: fresh key, one `set`
struct ValueWriter {
    store: SharedStore,
}

impl Operation for ValueWriter {
    type Input = (StoredValue,);
    type Output = ValueKey;

    fn identity(&self) -> &str {
        STORE_IDENTITY
    }

    fn call(&self, (value,): Self::Input) -> CoreResult<ValueKey> {
        let key = ValueKey::new();
        self.store.set(&key.to_key(), &value.to_bytes())?;
        Ok(key)
    }
}

/// Stores values under fresh keys and reads them back with coercion
///
/// Every `store` call is counted and logged, so [`ValueCache::history`]
/// can replay it.
pub struct ValueCache {
    store: SharedStore,
    writer: History<Counted<ValueWriter>>,
}

impl ValueCache {
    /// Create a cache over an existing store
    #[must_use]
    pub fn new(store: SharedStore) -> Self {
        let writer = ValueWriter {
            store: store.clone(),
        }
        .counted(store.clone())
        .logged(store.clone());
        Self { store, writer }
    }

    /// Create a cache over a store emptied first
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Backend` if the flush fails
    pub fn fresh(store: SharedStore) -> CoreResult<Self> {
        store.flush()?;
        Ok(Self::new(store))
    }

    /// Backing store handle
    #[must_use]
    pub fn store_handle(&self) -> &SharedStore {
        &self.store
    }

    /// Store a value under a new key
    ///
    /// # Errors
    ///
    /// Returns error if the backend write fails
    pub fn store(&self, value: impl Into<StoredValue>) -> CoreResult<ValueKey> {
        self.writer.call((value.into(),))
    }

    /// Raw bytes stored under `key`, `None` if absent
    ///
    /// # Errors
    ///
    /// Returns error if the backend read fails
    pub fn retrieve(&self, key: &ValueKey) -> CoreResult<Option<Vec<u8>>> {
        self.store.get(&key.to_key())
    }

    /// Stored bytes passed through `transform`, `None` if absent
    ///
    /// # Errors
    ///
    /// Returns error if the read or the transform fails
    pub fn retrieve_with<T>(
        &self,
        key: &ValueKey,
        transform: impl FnOnce(Vec<u8>) -> CoreResult<T>,
    ) -> CoreResult<Option<T>> {
        self.retrieve(key)?.map(transform).transpose()
    }

    /// Stored value decoded as `kind`
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Decoding` if the bytes are not a valid `kind`
    pub fn retrieve_as(&self, key: &ValueKey, kind: ValueKind) -> CoreResult<Option<StoredValue>> {
        self.retrieve_with(key, |raw| StoredValue::decode(raw, kind))
    }

    /// Stored value as UTF-8 text
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Decoding` if the bytes are not UTF-8
    pub fn get_str(&self, key: &ValueKey) -> CoreResult<Option<String>> {
        self.retrieve_with(key, decode_text)
    }

    /// Stored value as a base-10 integer
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Decoding` if the bytes are not an integer
    pub fn get_int(&self, key: &ValueKey) -> CoreResult<Option<i64>> {
        self.retrieve_with(key, |raw| decode_int(&raw))
    }

    /// Stored value as a float
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Decoding` if the bytes are not a float
    pub fn get_float(&self, key: &ValueKey) -> CoreResult<Option<f64>> {
        self.retrieve_with(key, |raw| decode_float(&raw))
    }

    /// Replay of every recorded `store` call
    ///
    /// # Errors
    ///
    /// Returns error if the backend read or decoding fails
    pub fn history(&self) -> CoreResult<Transcript> {
        HistoryReplayer::new(self.store.clone()).replay(STORE_IDENTITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::Arc;
    use tally_core::CoreError;
    use tally_storage::MemoryStore;

    fn cache() -> ValueCache {
        ValueCache::new(Arc::new(MemoryStore::new()))
    }

    #[test]
    fn test_store_and_get_str() {
        let cache = cache();
        let key = cache.store("abc").unwrap();
        assert_eq!(cache.get_str(&key).unwrap(), Some("abc".to_string()));
    }

    #[test]
    fn test_store_and_get_int() {
        let cache = cache();
        let key = cache.store(42).unwrap();
        assert_eq!(cache.get_int(&key).unwrap(), Some(42));
    }

    #[test]
    fn test_store_bytes_and_float() {
        let cache = cache();
        let bytes = cache.store(vec![0u8, 159, 146, 150]).unwrap();
        assert_eq!(cache.retrieve(&bytes).unwrap(), Some(vec![0u8, 159, 146, 150]));

        let float = cache.store(2.5).unwrap();
        assert_eq!(cache.get_float(&float).unwrap(), Some(2.5));
    }

    #[test]
    fn test_keys_are_unique() {
        let cache = cache();
        let a = cache.store("same").unwrap();
        let b = cache.store("same").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_missing_key_is_none() {
        let cache = cache();
        let key = ValueKey::new();
        assert_eq!(cache.retrieve(&key).unwrap(), None);
        assert_eq!(cache.get_str(&key).unwrap(), None);
        assert_eq!(cache.get_int(&key).unwrap(), None);
    }

    #[test]
    fn test_empty_value_is_not_missing() {
        let cache = cache();
        let key = cache.store("").unwrap();
        assert_eq!(cache.get_str(&key).unwrap(), Some(String::new()));
    }

    #[test]
    fn test_coercion_failure_propagates() {
        let cache = cache();
        let key = cache.store("forty-two").unwrap();
        assert!(matches!(cache.get_int(&key), Err(CoreError::Decoding { .. })));

        let key = cache.store(vec![0xffu8, 0xfe]).unwrap();
        assert!(matches!(cache.get_str(&key), Err(CoreError::Decoding { .. })));
    }

    #[test]
    fn test_retrieve_with_transform() {
        let cache = cache();
        let key = cache.store("hello").unwrap();
        let len = cache.retrieve_with(&key, |raw| Ok(raw.len())).unwrap();
        assert_eq!(len, Some(5));
    }

    #[test]
    fn test_retrieve_as_kind() {
        let cache = cache();
        let key = cache.store(7).unwrap();
        assert_eq!(
            cache.retrieve_as(&key, ValueKind::Integer).unwrap(),
            Some(StoredValue::Integer(7))
        );
        assert_eq!(
            cache.retrieve_as(&key, ValueKind::Text).unwrap(),
            Some(StoredValue::Text("7".to_string()))
        );
    }

    #[test]
    fn test_store_is_counted_and_logged() {
        let cache = cache();
        let first = cache.store("abc").unwrap();
        let second = cache.store(42).unwrap();

        let history = cache.history().unwrap();
        assert_eq!(history.calls, 2);
        assert_eq!(history.records.len(), 2);
        assert_eq!(history.records[0].input, r#"["abc"]"#);
        assert_eq!(history.records[0].output, format!("\"{}\"", first));
        assert_eq!(history.records[1].input, "[42]");
        assert_eq!(history.records[1].output, format!("\"{}\"", second));
        assert_eq!(history.lines().len(), 3);
        assert_eq!(history.header(), "ValueCache::store was called 2 times:");
    }

    #[test]
    fn test_fresh_flushes_store() {
        let store: SharedStore = Arc::new(MemoryStore::new());
        let old = ValueCache::new(store.clone());
        let key = old.store("stale").unwrap();

        let cache = ValueCache::fresh(store).unwrap();
        assert_eq!(cache.retrieve(&key).unwrap(), None);
        assert_eq!(cache.history().unwrap().calls, 0);
    }

    proptest! {
        #[test]
        fn prop_text_round_trip(s in ".*") {
            let cache = cache();
            let key = cache.store(s.as_str()).unwrap();
            prop_assert_eq!(cache.get_str(&key).unwrap(), Some(s));
        }

        #[test]
        fn prop_int_round_trip(n in any::<i64>()) {
            let cache = cache();
            let key = cache.store(n).unwrap();
            prop_assert_eq!(cache.get_int(&key).unwrap(), Some(n));
        }

        #[test]
        fn prop_bytes_round_trip(raw in proptest::collection::vec(any::<u8>(), 0..64)) {
            let cache = cache();
            let key = cache.store(raw.clone()).unwrap();
            prop_assert_eq!(cache.retrieve(&key).unwrap(), Some(raw));
        }

        #[test]
        fn prop_float_round_trip(
            x in proptest::num::f64::NORMAL | proptest::num::f64::ZERO | proptest::num::f64::SUBNORMAL
        ) {
            let cache = cache();
            let key = cache.store(x).unwrap();
            prop_assert_eq!(cache.get_float(&key).unwrap(), Some(x));
        }
    }
}
