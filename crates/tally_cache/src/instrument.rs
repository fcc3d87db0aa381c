//! Call instrumentation.
//!
//! Wrappers compose by nesting. Each one exposes the same [`Operation`]
//! signature as the operation it wraps, so
//! `op.counted(store.clone()).logged(store)` counts every attempt and logs
//! arguments and results around it.
//!
//! Counting happens before the wrapped call and is never rolled back, so the
//! counter tracks attempts rather than successes. Likewise the argument log
//! is written before the call and the result log only after it returns `Ok`:
//! a failing call leaves the input log one entry ahead of the output log.

use serde::Serialize;
use std::marker::PhantomData;
use tally_core::CoreResult;
use tally_storage::{SharedStore, keys};

/// An invocable operation with a stable identity
pub trait Operation {
    /// Positional arguments, usually a tuple
    type Input: Serialize;
    /// Return value
    type Output: Serialize;

    /// Fully-qualified name used for counter and log keys
    fn identity(&self) -> &str;

    /// Invoke the operation
    ///
    /// # Errors
    ///
    /// Returns whatever the operation or its instrumentation fails with
    fn call(&self, input: Self::Input) -> CoreResult<Self::Output>;
}

/// Increments `{identity}` once per call attempt
pub struct Counted<O> {
    inner: O,
    store: SharedStore,
}

impl<O: Operation> Counted<O> {
    /// Wrap `inner`, counting on `store`
    #[must_use]
    pub fn new(inner: O, store: SharedStore) -> Self {
        Self { inner, store }
    }

    /// Wrapped operation
    #[must_use]
    pub fn inner(&self) -> &O {
        &self.inner
    }
}

impl<O: Operation> Operation for Counted<O> {
    type Input = O::Input;
    type Output = O::Output;

    fn identity(&self) -> &str {
        self.inner.identity()
    }

    fn call(&self, input: Self::Input) -> CoreResult<Self::Output> {
        let calls = self.store.increment(&keys::counter_key(self.identity()))?;
        tracing::trace!(operation = self.identity(), calls, "counted call");
        self.inner.call(input)
    }
}

/// Appends JSON-encoded arguments and results to `{identity}:inputs` and
/// `{identity}:outputs`
pub struct History<O> {
    inner: O,
    store: SharedStore,
}

impl<O: Operation> History<O> {
    /// Wrap `inner`, logging on `store`
    #[must_use]
    pub fn new(inner: O, store: SharedStore) -> Self {
        Self { inner, store }
    }

    /// Wrapped operation
    #[must_use]
    pub fn inner(&self) -> &O {
        &self.inner
    }
}

impl<O: Operation> Operation for History<O> {
    type Input = O::Input;
    type Output = O::Output;

    fn identity(&self) -> &str {
        self.inner.identity()
    }

    fn call(&self, input: Self::Input) -> CoreResult<Self::Output> {
        let identity = self.identity();
        let args = serde_json::to_vec(&input)?;
        self.store.append_to_log(&keys::inputs_key(identity), &args)?;

        let output = self.inner.call(input).inspect_err(|err| {
            tracing::debug!(operation = identity, error = %err, "call failed, output not logged");
        })?;

        let result = serde_json::to_vec(&output)?;
        let logged = self.store.append_to_log(&keys::outputs_key(identity), &result)?;
        tracing::trace!(operation = identity, logged, "logged call");
        Ok(output)
    }
}

/// Named closure usable as an [`Operation`]
pub struct FnOperation<F, I, O> {
    identity: String,
    f: F,
    _marker: PhantomData<fn(I) -> O>,
}

impl<F, I, O> FnOperation<F, I, O>
where
    F: Fn(I) -> CoreResult<O>,
{
    /// Create a named operation from a closure
    pub fn new(identity: impl Into<String>, f: F) -> Self {
        Self {
            identity: identity.into(),
            f,
            _marker: PhantomData,
        }
    }
}

impl<F, I, O> Operation for FnOperation<F, I, O>
where
    F: Fn(I) -> CoreResult<O>,
    I: Serialize,
    O: Serialize,
{
    type Input = I;
    type Output = O;

    fn identity(&self) -> &str {
        &self.identity
    }

    fn call(&self, input: I) -> CoreResult<O> {
        (self.f)(input)
    }
}

/// Builder-style wrapping for any [`Operation`]
pub trait Instrument: Operation + Sized {
    /// Count every call attempt
    fn counted(self, store: SharedStore) -> Counted<Self> {
        Counted::new(self, store)
    }

    /// Log arguments and results of every call
    fn logged(self, store: SharedStore) -> History<Self> {
        History::new(self, store)
    }
}

impl<O: Operation> Instrument for O {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tally_core::CoreError;
    use tally_storage::MemoryStore;

    fn shared() -> SharedStore {
        Arc::new(MemoryStore::new())
    }

    fn doubler() -> FnOperation<impl Fn((i64,)) -> CoreResult<i64>, (i64,), i64> {
        FnOperation::new("Math::double", |(n,): (i64,)| Ok(n * 2))
    }

    fn failing() -> FnOperation<impl Fn((String,)) -> CoreResult<String>, (String,), String> {
        FnOperation::new("Remote::call", |(arg,): (String,)| {
            Err(CoreError::Internal {
                message: format!("cannot handle {}", arg),
            })
        })
    }

    #[test]
    fn test_counted_increments_per_call() {
        let store = shared();
        let op = doubler().counted(store.clone());

        assert_eq!(op.call((2,)).unwrap(), 4);
        assert_eq!(op.call((5,)).unwrap(), 10);
        assert_eq!(store.get("Math::double").unwrap(), Some(b"2".to_vec()));
    }

    #[test]
    fn test_counted_counts_failed_attempts() {
        let store = shared();
        let op = failing().counted(store.clone());

        assert!(op.call(("x".to_string(),)).is_err());
        assert_eq!(store.get("Remote::call").unwrap(), Some(b"1".to_vec()));
    }

    #[test]
    fn test_history_logs_in_call_order() {
        let store = shared();
        let op = doubler().logged(store.clone());

        for n in [1, 2, 3] {
            op.call((n,)).unwrap();
        }

        let inputs = store.read_log("Math::double:inputs", 0, -1).unwrap();
        let outputs = store.read_log("Math::double:outputs", 0, -1).unwrap();
        assert_eq!(inputs, vec![b"[1]".to_vec(), b"[2]".to_vec(), b"[3]".to_vec()]);
        assert_eq!(outputs, vec![b"2".to_vec(), b"4".to_vec(), b"6".to_vec()]);
    }

    #[test]
    fn test_history_failure_leaves_input_ahead() {
        let store = shared();
        let op = failing().logged(store.clone());

        let err = op.call(("boom".to_string(),)).unwrap_err();
        assert!(err.to_string().contains("cannot handle boom"));
        assert_eq!(store.log_len("Remote::call:inputs").unwrap(), 1);
        assert_eq!(store.log_len("Remote::call:outputs").unwrap(), 0);
    }

    #[test]
    fn test_composed_wrappers() {
        let store = shared();
        let op = doubler().counted(store.clone()).logged(store.clone());
        assert_eq!(op.identity(), "Math::double");

        for n in 0..4 {
            assert_eq!(op.call((n,)).unwrap(), n * 2);
        }
        assert_eq!(store.get("Math::double").unwrap(), Some(b"4".to_vec()));
        assert_eq!(store.log_len("Math::double:inputs").unwrap(), 4);
        assert_eq!(store.log_len("Math::double:outputs").unwrap(), 4);
    }

    #[test]
    fn test_backend_failure_propagates() {
        let store = shared();
        // a plain value under the log key makes the append fail
        store.set("Math::double:inputs", b"oops").unwrap();
        let op = doubler().logged(store.clone());

        let result = op.call((1,));
        assert!(matches!(result, Err(CoreError::WrongType { .. })));
    }
}
