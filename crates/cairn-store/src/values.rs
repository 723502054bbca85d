//! Typed value access on top of a chunk store.

use cairn_crypto::ContentHasher;
use cairn_types::Ref;
use cairn_value::{codec, Package, Value, ValueReader};
use tracing::{debug, warn};

use crate::chunk::StoredChunk;
use crate::error::{StoreError, StoreResult};
use crate::traits::ChunkStore;

/// Reads and writes whole values through a [`ChunkStore`].
///
/// Every chunk read is re-hashed and compared with the ref it was requested
/// under before it is decoded.
#[derive(Debug, Default)]
pub struct ValueStore<S> {
    chunks: S,
}

impl<S: ChunkStore> ValueStore<S> {
    pub fn new(chunks: S) -> Self {
        Self { chunks }
    }

    /// The underlying chunk store.
    pub fn chunk_store(&self) -> &S {
        &self.chunks
    }

    /// Encode `value`, store it, and return its ref.
    ///
    /// Only the value itself is written. Values it points at through
    /// [`Value::Ref`] must be written separately.
    pub fn write_value(&self, value: &Value) -> StoreResult<Ref> {
        let bytes = codec::encode(value)?;
        let r = self.chunks.write(&StoredChunk::new(bytes))?;
        debug!(value = %r.short_hex(), kind = %value.kind(), "wrote value");
        Ok(r)
    }

    /// Store a package so refs to its types can be resolved later.
    pub fn write_package(&self, package: &Package) -> StoreResult<Ref> {
        self.write_value(&Value::from(package.clone()))
    }

    /// Read the value stored under `r`.
    ///
    /// Fails with [`StoreError::NotFound`] when no such chunk exists.
    pub fn read_value(&self, r: &Ref) -> StoreResult<Value> {
        self.maybe_read_value(r)?.ok_or(StoreError::NotFound(*r))
    }

    /// Read the value stored under `r`, or `None` when it is absent.
    pub fn maybe_read_value(&self, r: &Ref) -> StoreResult<Option<Value>> {
        let Some(chunk) = self.chunks.read(r)? else {
            return Ok(None);
        };
        let computed = ContentHasher::VALUE.hash(&chunk.data);
        if computed != *r {
            warn!(expected = %r.short_hex(), computed = %computed.short_hex(), "chunk hash mismatch");
            return Err(StoreError::HashMismatch {
                expected: *r,
                computed,
            });
        }
        codec::decode(&chunk.data)
            .map(Some)
            .map_err(|e| StoreError::CorruptChunk {
                id: *r,
                reason: e.to_string(),
            })
    }

    pub fn has(&self, r: &Ref) -> StoreResult<bool> {
        self.chunks.exists(r)
    }
}

impl<S: ChunkStore> ValueReader for ValueStore<S> {
    type Error = StoreError;

    fn read_value(&self, target: &Ref) -> StoreResult<Value> {
        ValueStore::read_value(self, target)
    }
}
