//! Stored values and their coercions.
//!
//! Backends only hold raw bytes. Integers and floats are written in their
//! base-10 text form, so a value stored as `42` reads back as the bytes `b"42"`
//! and must be coerced on the way out.

use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Kind of a stored value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    /// UTF-8 text
    Text,
    /// Raw bytes
    Bytes,
    /// Signed 64-bit integer
    Integer,
    /// 64-bit float
    Float,
}

impl ValueKind {
    /// Lowercase name used in errors and on the command line
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Bytes => "bytes",
            Self::Integer => "integer",
            Self::Float => "float",
        }
    }
}

impl std::fmt::Display for ValueKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ValueKind {
    type Err = CoreError;

    fn from_str(s: &str) -> CoreResult<Self> {
        match s {
            "text" | "str" => Ok(Self::Text),
            "bytes" | "raw" => Ok(Self::Bytes),
            "integer" | "int" => Ok(Self::Integer),
            "float" => Ok(Self::Float),
            other => Err(CoreError::InvalidArgument {
                name: "kind".to_string(),
                reason: format!("unknown value kind '{}'", other),
            }),
        }
    }
}

/// An immutable payload accepted by the value cache
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StoredValue {
    /// UTF-8 text
    Text(String),
    /// Signed integer
    Integer(i64),
    /// Floating-point number
    Float(f64),
    /// Raw bytes
    Bytes(Vec<u8>),
}

impl StoredValue {
    /// Kind tag of this value
    #[must_use]
    pub const fn kind(&self) -> ValueKind {
        match self {
            Self::Text(_) => ValueKind::Text,
            Self::Bytes(_) => ValueKind::Bytes,
            Self::Integer(_) => ValueKind::Integer,
            Self::Float(_) => ValueKind::Float,
        }
    }

    /// Wire form written to the backend
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Self::Text(s) => s.as_bytes().to_vec(),
            Self::Bytes(b) => b.clone(),
            Self::Integer(i) => i.to_string().into_bytes(),
            // Debug keeps the fractional part, so 1.0 is written as "1.0"
            Self::Float(x) => format!("{:?}", x).into_bytes(),
        }
    }

    /// Decode raw backend bytes as the requested kind
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Decoding` if the bytes are not a valid `kind`
    pub fn decode(raw: Vec<u8>, kind: ValueKind) -> CoreResult<Self> {
        match kind {
            ValueKind::Bytes => Ok(Self::Bytes(raw)),
            ValueKind::Text => decode_text(raw).map(Self::Text),
            ValueKind::Integer => decode_int(&raw).map(Self::Integer),
            ValueKind::Float => decode_float(&raw).map(Self::Float),
        }
    }

    /// Convert to text
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Decoding` for numeric variants or non-UTF-8 bytes
    pub fn into_text(self) -> CoreResult<String> {
        match self {
            Self::Text(s) => Ok(s),
            Self::Bytes(b) => decode_text(b),
            other => Err(mismatch(ValueKind::Text, other.kind())),
        }
    }

    /// Convert to an integer
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Decoding` for floats or unparsable text/bytes
    pub fn into_int(self) -> CoreResult<i64> {
        match self {
            Self::Integer(i) => Ok(i),
            Self::Text(s) => decode_int(s.as_bytes()),
            Self::Bytes(b) => decode_int(&b),
            other => Err(mismatch(ValueKind::Integer, other.kind())),
        }
    }

    /// Convert to a float
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Decoding` for unparsable text/bytes
    pub fn into_float(self) -> CoreResult<f64> {
        match self {
            Self::Float(x) => Ok(x),
            Self::Integer(i) => Ok(i as f64),
            Self::Text(s) => decode_float(s.as_bytes()),
            Self::Bytes(b) => decode_float(&b),
        }
    }

    /// Raw bytes of any variant
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            Self::Bytes(b) => b,
            other => other.to_bytes(),
        }
    }
}

/// Decode raw bytes as UTF-8 text
///
/// # Errors
///
/// Returns `CoreError::Decoding` if the bytes are not valid UTF-8
pub fn decode_text(raw: Vec<u8>) -> CoreResult<String> {
    String::from_utf8(raw).map_err(|e| CoreError::decoding("text", e))
}

/// Decode raw bytes as a base-10 integer
///
/// # Errors
///
/// Returns `CoreError::Decoding` if the bytes are not a base-10 integer
pub fn decode_int(raw: &[u8]) -> CoreResult<i64> {
    let text = std::str::from_utf8(raw).map_err(|e| CoreError::decoding("integer", e))?;
    text.parse::<i64>()
        .map_err(|e| CoreError::decoding("integer", format!("{:?}: {}", text, e)))
}

/// Decode raw bytes as a float
///
/// # Errors
///
/// Returns `CoreError::Decoding` if the bytes are not a float literal
pub fn decode_float(raw: &[u8]) -> CoreResult<f64> {
    let text = std::str::from_utf8(raw).map_err(|e| CoreError::decoding("float", e))?;
    text.parse::<f64>()
        .map_err(|e| CoreError::decoding("float", format!("{:?}: {}", text, e)))
}

fn mismatch(expected: ValueKind, actual: ValueKind) -> CoreError {
    CoreError::decoding(expected.name(), format!("value is {}", actual))
}

impl From<String> for StoredValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for StoredValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<Vec<u8>> for StoredValue {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value)
    }
}

impl From<&[u8]> for StoredValue {
    fn from(value: &[u8]) -> Self {
        Self::Bytes(value.to_vec())
    }
}

impl From<i64> for StoredValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<i32> for StoredValue {
    fn from(value: i32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<f64> for StoredValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}
