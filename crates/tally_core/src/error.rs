//! Core error types for TALLY.

/// Core result type
pub type CoreResult<T> = Result<T, CoreError>;

/// Core error type
///
/// A lookup for an absent key is not an error: backends return `Ok(None)`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoreError {
    /// The key-value backend could not be reached or failed mid-operation
    #[error("Backend unavailable: {reason}")]
    Backend {
        /// Backend failure message
        reason: String,
    },

    /// A stored value could not be coerced to the requested type
    #[error("Cannot decode value as {expected}: {reason}")]
    Decoding {
        /// Requested type
        expected: String,
        /// Decoder message
        reason: String,
    },

    /// The external fetch capability failed
    #[error("Fetch failed for {resource}: {reason}")]
    Fetch {
        /// Resource that was being fetched
        resource: String,
        /// Failure message
        reason: String,
    },

    /// A value key was used as a log, or a log key as a value
    #[error("Wrong kind of value held at key {key}")]
    WrongType {
        /// Offending key
        key: String,
    },

    /// Invalid argument passed to a store or cache operation
    #[error("Invalid argument {name}: {reason}")]
    InvalidArgument {
        /// Argument name
        name: String,
        /// Why it was rejected
        reason: String,
    },

    /// Internal error (for unexpected errors)
    #[error("Internal error: {message}")]
    Internal {
        /// Error message
        message: String,
    },
}

impl CoreError {
    /// Wrap any displayable backend failure
    pub fn backend(err: impl std::fmt::Display) -> Self {
        Self::Backend {
            reason: err.to_string(),
        }
    }

    /// Decoding failure for the named target type
    pub fn decoding(expected: &str, err: impl std::fmt::Display) -> Self {
        Self::Decoding {
            expected: expected.to_string(),
            reason: err.to_string(),
        }
    }

    /// Whether this error came from the backend rather than the data
    #[must_use]
    pub const fn is_backend(&self) -> bool {
        matches!(self, Self::Backend { .. })
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::decoding("json", err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CoreError::backend("connection refused");
        assert_eq!(format!("{}", err), "Backend unavailable: connection refused");

        let err = CoreError::WrongType {
            key: "ValueCache::store:inputs".to_string(),
        };
        assert_eq!(
            format!("{}", err),
            "Wrong kind of value held at key ValueCache::store:inputs"
        );
    }

    #[test]
    fn test_decoding_error() {
        let err = CoreError::decoding("integer", "invalid digit found in string");
        let s = err.to_string();
        assert!(s.contains("integer"));
        assert!(s.contains("invalid digit"));
        assert!(!err.is_backend());
    }

    #[test]
    fn test_fetch_error_display() {
        let err = CoreError::Fetch {
            resource: "http://example.test".to_string(),
            reason: "status 503".to_string(),
        };
        let s = err.to_string();
        assert!(s.contains("http://example.test"));
        assert!(s.contains("503"));
    }

    #[test]
    fn test_json_error_converts_to_decoding() {
        let err: CoreError = serde_json::from_str::<u32>("nope").unwrap_err().into();
        assert!(matches!(err, CoreError::Decoding { .. }));
    }

    #[test]
    fn test_error_equality() {
        let err1 = CoreError::backend("down");
        let err2 = CoreError::backend("down");
        assert_eq!(err1, err2);
        assert!(err1.is_backend());
    }
}
