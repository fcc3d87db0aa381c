//! Unique identifiers for stored values.
//!
//! Keys are random UUIDs rendered in hyphenated form, so a key is never
//! handed out twice within a store's lifetime.

use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

/// Value key - identifies a single stored value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ValueKey(Uuid);

impl ValueKey {
    /// Create a new random ValueKey
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create from UUID bytes
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(Uuid::from_bytes(bytes))
    }

    /// Get as UUID
    #[must_use]
    pub const fn as_uuid(&self) -> Uuid {
        self.0
    }

    /// Store key for this value
    #[must_use]
    pub fn to_key(&self) -> String {
        self.0.to_string()
    }
}

impl Default for ValueKey {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ValueKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ValueKey {
    type Err = CoreError;

    fn from_str(s: &str) -> CoreResult<Self> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| CoreError::InvalidArgument {
                name: "key".to_string(),
                reason: e.to_string(),
            })
    }
}
