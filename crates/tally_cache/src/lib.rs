//! TALLY Value Cache
//!
//! Stores values under fresh random keys, counts and logs every call to the
//! store operation, and replays the recorded history as a transcript.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cache;
pub mod instrument;
pub mod replay;

pub use cache::{STORE_IDENTITY, ValueCache};
pub use instrument::{Counted, FnOperation, History, Instrument, Operation};
pub use replay::{CallRecord, HistoryReplayer, Transcript};
