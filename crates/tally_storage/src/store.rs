//! Key-value store contract.

use std::ops::Range;
use std::sync::Arc;
use std::time::Duration;
use tally_core::CoreResult;

/// Minimal persistent key-value contract consumed by the cache layers
///
/// Each method is atomic for the single key it touches. Nothing here is
/// atomic across keys; callers that update a counter and a log do so as two
/// independent operations.
pub trait KeyValueStore: Send + Sync {
    /// Short backend name for logs
    fn name(&self) -> &'static str;

    /// Read a value; `None` if absent or expired
    ///
    /// # Errors
    ///
    /// Returns `CoreError::WrongType` if the key holds a log
    fn get(&self, key: &str) -> CoreResult<Option<Vec<u8>>>;

    /// Write a value, clearing any previous expiry
    ///
    /// # Errors
    ///
    /// Returns error if the backend write fails
    fn set(&self, key: &str, value: &[u8]) -> CoreResult<()>;

    /// Write a value that disappears after `ttl`
    ///
    /// # Errors
    ///
    /// Returns `CoreError::InvalidArgument` for a zero `ttl`
    fn set_with_expiry(&self, key: &str, value: &[u8], ttl: Duration) -> CoreResult<()>;

    /// Increment an integer value by one and return the new value
    ///
    /// A missing key counts from zero. An existing expiry is kept.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Decoding` if the current value is not an integer
    fn increment(&self, key: &str) -> CoreResult<i64>;

    /// Whether a live value or log exists under `key`
    ///
    /// # Errors
    ///
    /// Returns error if the backend read fails
    fn exists(&self, key: &str) -> CoreResult<bool>;

    /// Append an entry to the ordered log at `key`, returning the new length
    ///
    /// # Errors
    ///
    /// Returns `CoreError::WrongType` if the key holds a plain value
    fn append_to_log(&self, key: &str, entry: &[u8]) -> CoreResult<u64>;

    /// Read log entries from `start` to `end` inclusive
    ///
    /// Negative indices count from the end, so `(0, -1)` reads the whole
    /// log. Out-of-range bounds are clamped; a missing log reads as empty.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::WrongType` if the key holds a plain value
    fn read_log(&self, key: &str, start: i64, end: i64) -> CoreResult<Vec<Vec<u8>>>;

    /// Number of entries in the log at `key`
    ///
    /// # Errors
    ///
    /// Returns `CoreError::WrongType` if the key holds a plain value
    fn log_len(&self, key: &str) -> CoreResult<u64>;

    /// Remove every key
    ///
    /// # Errors
    ///
    /// Returns error if the backend write fails
    fn flush(&self) -> CoreResult<()>;
}

/// Shared store handle, constructed by the caller and passed in
pub type SharedStore = Arc<dyn KeyValueStore>;

/// Resolve inclusive, possibly negative log bounds against a log of `len`
/// entries
#[must_use]
pub fn resolve_range(len: u64, start: i64, end: i64) -> Option<Range<u64>> {
    let len = i64::try_from(len).unwrap_or(i64::MAX);
    let start = if start < 0 { (start + len).max(0) } else { start };
    let end = if end < 0 { end + len } else { end.min(len - 1) };

    if len == 0 || start > end || start >= len {
        return None;
    }
    // both bounds are non-negative here
    Some(start as u64..end as u64 + 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_resolve_whole_log() {
        assert_eq!(resolve_range(5, 0, -1), Some(0..5));
    }

    #[test]
    fn test_resolve_empty_log() {
        assert_eq!(resolve_range(0, 0, -1), None);
    }

    #[test]
    fn test_resolve_clamps_end() {
        assert_eq!(resolve_range(3, 1, 100), Some(1..3));
    }

    #[test]
    fn test_resolve_negative_start() {
        assert_eq!(resolve_range(5, -2, -1), Some(3..5));
        assert_eq!(resolve_range(5, -100, 1), Some(0..2));
    }

    #[test]
    fn test_resolve_start_past_end() {
        assert_eq!(resolve_range(5, 5, 10), None);
        assert_eq!(resolve_range(5, 3, 2), None);
        assert_eq!(resolve_range(5, 0, -6), None);
    }

    proptest! {
        #[test]
        fn prop_resolved_range_stays_in_bounds(
            len in 0u64..50,
            start in -60i64..60,
            end in -60i64..60
        ) {
            if let Some(range) = resolve_range(len, start, end) {
                prop_assert!(range.start < range.end);
                prop_assert!(range.end <= len);
            }
        }
    }
}
