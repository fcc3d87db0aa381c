//! Replay of recorded call history.

use serde::{Deserialize, Serialize};
use tally_core::value::{decode_int, decode_text};
use tally_core::{CoreError, CoreResult};
use tally_storage::{SharedStore, keys};

/// One paired (arguments, result) entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallRecord {
    /// JSON-encoded positional arguments
    pub input: String,
    /// JSON-encoded result
    pub output: String,
}

/// Rendered call history of one operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transcript {
    /// Operation identity
    pub identity: String,
    /// Counter value, zero if never counted
    pub calls: u64,
    /// Paired entries, truncated to the shorter log
    pub records: Vec<CallRecord>,
    /// Input entries with no matching output
    pub unmatched_inputs: u64,
}

impl Transcript {
    /// Header line reporting the call count
    #[must_use]
    pub fn header(&self) -> String {
        format!("{} was called {} times:", self.identity, self.calls)
    }

    /// Header followed by one line per paired record
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        std::iter::once(self.header())
            .chain(
                self.records
                    .iter()
                    .map(|r| format!("{}(*{}) -> {}", self.identity, r.input, r.output)),
            )
            .collect()
    }
}

impl std::fmt::Display for Transcript {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.lines().join("\n"))
    }
}

/// Read-only view over counters and call logs
pub struct HistoryReplayer {
    store: SharedStore,
}

impl HistoryReplayer {
    /// Create a replayer over `store`
    #[must_use]
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// Counter value for `identity`, zero if absent
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Decoding` if the counter is not a non-negative integer
    pub fn call_count(&self, identity: &str) -> CoreResult<u64> {
        let Some(raw) = self.store.get(&keys::counter_key(identity))? else {
            return Ok(0);
        };
        let count = decode_int(&raw)?;
        u64::try_from(count).map_err(|e| CoreError::decoding("call count", e))
    }

    /// Build the transcript for `identity`
    ///
    /// # Errors
    ///
    /// Returns error if the backend fails or a log entry is not UTF-8
    pub fn replay(&self, identity: &str) -> CoreResult<Transcript> {
        let calls = self.call_count(identity)?;
        let inputs = self.store.read_log(&keys::inputs_key(identity), 0, -1)?;
        let outputs = self.store.read_log(&keys::outputs_key(identity), 0, -1)?;
        let unmatched_inputs = inputs.len().saturating_sub(outputs.len()) as u64;

        let records = inputs
            .into_iter()
            .zip(outputs)
            .map(|(input, output)| {
                Ok(CallRecord {
                    input: decode_text(input)?,
                    output: decode_text(output)?,
                })
            })
            .collect::<CoreResult<Vec<_>>>()?;

        tracing::debug!(
            operation = identity,
            calls,
            records = records.len(),
            unmatched_inputs,
            "replayed history"
        );
        Ok(Transcript {
            identity: identity.to_string(),
            calls,
            records,
            unmatched_inputs,
        })
    }
}
