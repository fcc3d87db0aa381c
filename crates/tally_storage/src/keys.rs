//! Key naming conventions shared by the cache layers.
//!
//! | Key | Holds |
//! |-----|-------|
//! | `{operation}` | call counter |
//! | `{operation}:inputs` | argument log |
//! | `{operation}:outputs` | result log |
//! | `cached:{resource}` | fetched content, with expiry |
//! | `count:{resource}` | access counter |

/// Prefix for cached fetch results
pub const CACHED_PREFIX: &str = "cached:";

/// Prefix for per-resource access counters
pub const COUNT_PREFIX: &str = "count:";

/// Counter key for an operation
#[must_use]
pub fn counter_key(operation: &str) -> String {
    operation.to_string()
}

/// Argument log key for an operation
#[must_use]
pub fn inputs_key(operation: &str) -> String {
    format!("{}:inputs", operation)
}

/// Result log key for an operation
#[must_use]
pub fn outputs_key(operation: &str) -> String {
    format!("{}:outputs", operation)
}

/// Cache entry key for a fetched resource
#[must_use]
pub fn cached_key(resource: &str) -> String {
    format!("{}{}", CACHED_PREFIX, resource)
}

/// Access counter key for a fetched resource
#[must_use]
pub fn count_key(resource: &str) -> String {
    format!("{}{}", COUNT_PREFIX, resource)
}
