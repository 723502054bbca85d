//! Error types for value, type and codec operations.

use std::fmt;

use cairn_types::Ref;
use thiserror::Error;

/// Errors that can occur while building, checking or converting values.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValueError {
    /// A value does not conform to the structural type it was checked or
    /// converted against (wrong kind, missing required field, bad choice).
    #[error("type mismatch: expected {expected}: {reason}")]
    TypeMismatch { expected: String, reason: String },

    /// A type descriptor references a package that is not registered.
    #[error("unknown package: {0}")]
    UnknownPackage(Ref),

    /// A package exists but has no type definition at the given ordinal.
    #[error("package {package} has no type at ordinal {ordinal}")]
    OrdinalOutOfRange { package: Ref, ordinal: u16 },

    /// Canonical encoding or decoding failed.
    #[error("codec error: {0}")]
    Codec(String),
}

impl ValueError {
    pub(crate) fn mismatch(expected: impl fmt::Display, reason: impl Into<String>) -> Self {
        Self::TypeMismatch {
            expected: expected.to_string(),
            reason: reason.into(),
        }
    }
}

/// Convenience alias for value results.
pub type ValueResult<T> = Result<T, ValueError>;
