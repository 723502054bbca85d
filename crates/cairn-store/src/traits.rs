use std::sync::Arc;

use cairn_types::Ref;

use crate::chunk::StoredChunk;
use crate::error::StoreResult;

/// Content-addressed chunk store with a single atomic root pointer.
///
/// All implementations must satisfy these invariants:
/// - Chunks are immutable once written. The same bytes always produce the
///   same ref.
/// - Write-then-link: chunks are written before any root that reaches them.
/// - Concurrent reads are always safe (chunks are immutable).
/// - The root only changes through [`update_root`](Self::update_root), which
///   is an atomic compare-and-set.
pub trait ChunkStore: Send + Sync {
    /// Read a chunk by ref.
    ///
    /// Returns `Ok(None)` if the chunk does not exist.
    fn read(&self, r: &Ref) -> StoreResult<Option<StoredChunk>>;

    /// Write a chunk and return its ref.
    ///
    /// If the chunk already exists, this is a no-op (idempotent).
    fn write(&self, chunk: &StoredChunk) -> StoreResult<Ref>;

    /// Check whether a chunk exists in the store.
    fn exists(&self, r: &Ref) -> StoreResult<bool>;

    /// Read multiple chunks in a batch.
    ///
    /// Default implementation calls `read()` for each ref.
    fn read_batch(&self, refs: &[Ref]) -> StoreResult<Vec<Option<StoredChunk>>> {
        refs.iter().map(|r| self.read(r)).collect()
    }

    /// Write multiple chunks in a batch and return their refs.
    ///
    /// Default implementation calls `write()` for each chunk.
    fn write_batch(&self, chunks: &[StoredChunk]) -> StoreResult<Vec<Ref>> {
        chunks.iter().map(|c| self.write(c)).collect()
    }

    /// The current root ref. Null for a fresh store.
    fn root(&self) -> StoreResult<Ref>;

    /// Set the root to `new` if it currently equals `expected`.
    ///
    /// Returns `false` (and changes nothing) when the root has moved.
    fn update_root(&self, new: Ref, expected: Ref) -> StoreResult<bool>;
}

impl<S: ChunkStore + ?Sized> ChunkStore for Arc<S> {
    fn read(&self, r: &Ref) -> StoreResult<Option<StoredChunk>> {
        (**self).read(r)
    }

    fn write(&self, chunk: &StoredChunk) -> StoreResult<Ref> {
        (**self).write(chunk)
    }

    fn exists(&self, r: &Ref) -> StoreResult<bool> {
        (**self).exists(r)
    }

    fn read_batch(&self, refs: &[Ref]) -> StoreResult<Vec<Option<StoredChunk>>> {
        (**self).read_batch(refs)
    }

    fn write_batch(&self, chunks: &[StoredChunk]) -> StoreResult<Vec<Ref>> {
        (**self).write_batch(chunks)
    }

    fn root(&self) -> StoreResult<Ref> {
        (**self).root()
    }

    fn update_root(&self, new: Ref, expected: Ref) -> StoreResult<bool> {
        (**self).update_root(new, expected)
    }
}
