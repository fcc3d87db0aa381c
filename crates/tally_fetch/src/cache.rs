//! Expiring fetch cache.
//!
//! Per resource: `Unseen -> CachedFresh -> CachedExpired -> CachedFresh ...`.
//! The only transition out of `CachedFresh` is the TTL elapsing; nothing here
//! deletes a cache entry.
//!
//! The access counter is incremented before the cache lookup and before any
//! fetch, so it counts requests, including ones whose fetch then fails.
//! Concurrent misses on the same resource each fetch and each write the
//! entry; the last write wins.

use crate::fetcher::Fetcher;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tally_core::value::{decode_int, decode_text};
use tally_core::{CoreError, CoreResult};
use tally_storage::{KeyValueStore, SharedStore, keys};

/// Fetch cache configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchCacheConfig {
    /// Seconds a fetched body stays cached
    pub ttl_secs: u64,
    /// HTTP request timeout in seconds
    pub request_timeout_secs: u64,
}

impl Default for FetchCacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 10,
            request_timeout_secs: 30,
        }
    }
}

impl FetchCacheConfig {
    /// Cache time-to-live
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    /// HTTP request timeout
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Reject settings the store cannot honor
    ///
    /// # Errors
    ///
    /// Returns `CoreError::InvalidArgument` for a zero TTL
    pub fn validate(&self) -> CoreResult<()> {
        if self.ttl_secs == 0 {
            return Err(CoreError::InvalidArgument {
                name: "ttl_secs".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

/// Where a resource sits in its cache lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResourceState {
    /// Never requested
    Unseen,
    /// Cached and not yet expired
    CachedFresh,
    /// Requested before, but no live cache entry
    ///
    /// Covers both an expired entry and a resource whose every fetch
    /// failed, since only the access counter records that it was seen.
    CachedExpired,
}

/// Memoizes a [`Fetcher`] in a key-value store
pub struct ExpiringFetchCache<F> {
    store: SharedStore,
    fetcher: F,
    config: FetchCacheConfig,
}

impl<F: Fetcher> ExpiringFetchCache<F> {
    /// Create a cache with the default ten-second TTL
    #[must_use]
    pub fn new(store: SharedStore, fetcher: F) -> Self {
        Self {
            store,
            fetcher,
            config: FetchCacheConfig::default(),
        }
    }

    /// Replace the default config
    ///
    /// # Errors
    ///
    /// Returns `CoreError::InvalidArgument` if `config` fails validation
    pub fn with_config(mut self, config: FetchCacheConfig) -> CoreResult<Self> {
        config.validate()?;
        self.config = config;
        Ok(self)
    }

    /// Active configuration
    #[must_use]
    pub fn config(&self) -> &FetchCacheConfig {
        &self.config
    }

    /// Content of `resource`, from cache when fresh
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Fetch` if a miss cannot be fetched; the access is
    /// still counted and nothing is cached
    pub fn fetch(&self, resource: &str) -> CoreResult<String> {
        let accesses = self.store.increment(&keys::count_key(resource))?;
        let cache_key = keys::cached_key(resource);

        if let Some(raw) = self.store.get(&cache_key)? {
            tracing::debug!(resource, accesses, "fetch cache hit");
            return decode_text(raw);
        }

        tracing::debug!(resource, accesses, "fetch cache miss");
        let content = self.fetcher.fetch(resource).map_err(|err| {
            tracing::warn!(resource, error = %err, "fetch failed");
            err.into_core(resource)
        })?;

        self.store
            .set_with_expiry(&cache_key, content.as_bytes(), self.config.ttl())?;
        Ok(content)
    }

    /// Number of requests made for `resource`
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Decoding` if the counter is corrupt
    pub fn access_count(&self, resource: &str) -> CoreResult<u64> {
        access_count(self.store.as_ref(), resource)
    }

    /// Whether a live cache entry exists for `resource`
    ///
    /// # Errors
    ///
    /// Returns error if the backend read fails
    pub fn is_cached(&self, resource: &str) -> CoreResult<bool> {
        self.store.exists(&keys::cached_key(resource))
    }

    /// Lifecycle state of `resource`
    ///
    /// # Errors
    ///
    /// Returns error if the backend read fails
    pub fn state(&self, resource: &str) -> CoreResult<ResourceState> {
        if self.is_cached(resource)? {
            Ok(ResourceState::CachedFresh)
        } else if self.store.exists(&keys::count_key(resource))? {
            Ok(ResourceState::CachedExpired)
        } else {
            Ok(ResourceState::Unseen)
        }
    }
}

/// Number of requests recorded for `resource`, read straight from `store`
///
/// # Errors
///
/// Returns `CoreError::Decoding` if the counter is corrupt
pub fn access_count(store: &dyn KeyValueStore, resource: &str) -> CoreResult<u64> {
    match store.get(&keys::count_key(resource))? {
        Some(raw) => {
            u64::try_from(decode_int(&raw)?).map_err(|e| CoreError::decoding("access count", e))
        }
        None => Ok(0),
    }
}
