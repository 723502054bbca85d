use std::collections::HashMap;
use std::sync::RwLock;

use cairn_types::Ref;
use tracing::debug;

use crate::chunk::StoredChunk;
use crate::error::{StoreError, StoreResult};
use crate::traits::ChunkStore;

/// In-memory, HashMap-based chunk store.
///
/// Intended for tests and embedding. Chunks and the root live behind
/// `RwLock`s, so the store can be shared across threads. Chunk bytes are
/// reference counted, so reads do not copy.
pub struct InMemoryChunkStore {
    chunks: RwLock<HashMap<Ref, StoredChunk>>,
    root: RwLock<Ref>,
}

impl InMemoryChunkStore {
    /// Create a new empty in-memory store with a null root.
    pub fn new() -> Self {
        Self {
            chunks: RwLock::new(HashMap::new()),
            root: RwLock::new(Ref::null()),
        }
    }

    /// Number of chunks currently stored.
    pub fn len(&self) -> usize {
        self.chunks.read().expect("lock poisoned").len()
    }

    /// Returns `true` if the store holds no chunks.
    pub fn is_empty(&self) -> bool {
        self.chunks.read().expect("lock poisoned").is_empty()
    }

    /// Total bytes across all stored chunks.
    pub fn total_bytes(&self) -> u64 {
        self.chunks
            .read()
            .expect("lock poisoned")
            .values()
            .map(|c| c.size)
            .sum()
    }

    /// Return a sorted list of all chunk refs in the store.
    pub fn all_refs(&self) -> Vec<Ref> {
        let map = self.chunks.read().expect("lock poisoned");
        let mut refs: Vec<Ref> = map.keys().copied().collect();
        refs.sort();
        refs
    }

    /// Store `chunk` under `r` without hashing it.
    #[cfg(test)]
    pub(crate) fn insert_unchecked(&self, r: Ref, chunk: StoredChunk) {
        self.chunks.write().expect("lock poisoned").insert(r, chunk);
    }
}

impl Default for InMemoryChunkStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ChunkStore for InMemoryChunkStore {
    fn read(&self, r: &Ref) -> StoreResult<Option<StoredChunk>> {
        let map = self.chunks.read().expect("lock poisoned");
        Ok(map.get(r).cloned())
    }

    fn write(&self, chunk: &StoredChunk) -> StoreResult<Ref> {
        let r = chunk.compute_ref();
        if r.is_null() {
            return Err(StoreError::NullRef);
        }
        let mut map = self.chunks.write().expect("lock poisoned");
        map.entry(r).or_insert_with(|| {
            debug!(chunk = %r.short_hex(), size = chunk.size, "stored chunk");
            chunk.clone()
        });
        Ok(r)
    }

    fn exists(&self, r: &Ref) -> StoreResult<bool> {
        let map = self.chunks.read().expect("lock poisoned");
        Ok(map.contains_key(r))
    }

    fn root(&self) -> StoreResult<Ref> {
        Ok(*self.root.read().expect("lock poisoned"))
    }

    fn update_root(&self, new: Ref, expected: Ref) -> StoreResult<bool> {
        let mut root = self.root.write().expect("lock poisoned");
        if *root != expected {
            return Ok(false);
        }
        debug!(from = %expected.short_hex(), to = %new.short_hex(), "root updated");
        *root = new;
        Ok(true)
    }
}

impl std::fmt::Debug for InMemoryChunkStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self.len();
        f.debug_struct("InMemoryChunkStore")
            .field("chunk_count", &count)
            .field("root", &*self.root.read().expect("lock poisoned"))
            .finish()
    }
}
