//! TALLY Core Types
//!
//! This crate contains pure types and logic with no I/O.
//! Values, keys and errors shared by every storage backend and cache layer.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod id;
pub mod time;
pub mod value;

// Re-exports
pub use error::{CoreError, CoreResult};
pub use id::ValueKey;
pub use time::{Clock, ManualClock, SharedClock, SystemClock, Timestamp};
pub use value::{StoredValue, ValueKind};
