//! TALLY Fetch Cache
//!
//! Memoizes an external fetch for a fixed time-to-live and counts every
//! access per resource, hit or miss.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cache;
pub mod fetcher;

pub use cache::{ExpiringFetchCache, FetchCacheConfig, ResourceState, access_count};
pub use fetcher::{FetchError, Fetcher, HttpFetcher};
