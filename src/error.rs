//! Error taxonomy for pattern construction, wildcard keys and the wire format
//!
//! All structural validation happens at the boundary (construction, setting a
//! wildcard key, deserialization). Running out of keys is not an error: `next`
//! and `advance` report it through their `bool` return.

use thiserror::Error;

/// Errors raised while building or decoding key patterns
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatternError {
    /// Template string is malformed (brackets, reserved characters, empty)
    #[error("invalid pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// A bracket expression is inverted or falls outside its reference alphabet
    #[error("invalid wildcard '{wildcard}': {reason}")]
    InvalidWildcard { wildcard: String, reason: String },

    /// Wildcard key is not a structural subset of the template
    #[error("invalid wildcard key '{key}' for pattern '{pattern}': {reason}")]
    InvalidWildcardKey {
        key: String,
        pattern: String,
        reason: String,
    },

    /// Byte stream is truncated, corrupt, or decodes to an invalid pattern
    #[error("invalid serialized pattern: {0}")]
    InvalidSerializedPattern(String),

    /// Pool could not be configured
    #[error("invalid pool configuration: {0}")]
    InvalidPool(String),
}

impl PatternError {
    pub(crate) fn pattern(pattern: &str, reason: impl Into<String>) -> Self {
        Self::InvalidPattern {
            pattern: pattern.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn wildcard(wildcard: &str, reason: impl Into<String>) -> Self {
        Self::InvalidWildcard {
            wildcard: wildcard.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn wildcard_key(key: &str, pattern: &str, reason: impl Into<String>) -> Self {
        Self::InvalidWildcardKey {
            key: key.to_string(),
            pattern: pattern.to_string(),
            reason: reason.into(),
        }
    }
}

/// Result alias used throughout the library
pub type Result<T> = std::result::Result<T, PatternError>;
