use cairn_types::Ref;
use cairn_value::ValueError;

/// Errors from chunk and value store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The requested chunk was not found.
    #[error("chunk not found: {0}")]
    NotFound(Ref),

    /// Content hash mismatch on read (data corruption).
    #[error("hash mismatch for {expected}: computed {computed}")]
    HashMismatch { expected: Ref, computed: Ref },

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The chunk bytes hash correctly but do not decode to a value.
    #[error("corrupt chunk {id}: {reason}")]
    CorruptChunk { id: Ref, reason: String },

    /// Attempted to store a chunk under the null ref.
    #[error("cannot store chunk with null ref")]
    NullRef,

    /// A value-level failure (encoding, type resolution).
    #[error(transparent)]
    Value(#[from] ValueError),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
