//! Content-addressed chunk storage for Cairn.
//!
//! A chunk is the canonical encoding of one [`Value`](cairn_value::Value),
//! stored under the BLAKE3 ref of its bytes. Stores also hold a single
//! mutable root ref, updated only by compare-and-set, which is how higher
//! layers publish new state atomically.
//!
//! # Storage Backends
//!
//! All backends implement the [`ChunkStore`] trait:
//!
//! - [`InMemoryChunkStore`] -- `HashMap`-based store for tests and embedding
//!
//! [`ValueStore`] layers value encoding, decoding and hash verification on
//! top of any backend, and is the [`ValueReader`](cairn_value::ValueReader)
//! that resolves futures. [`walk`] traverses everything reachable from a
//! value.
//!
//! # Design Rules
//!
//! 1. Chunks are immutable once written (content-addressing guarantees this).
//! 2. Write-then-link: write every chunk first, then move the root.
//! 3. Every chunk read through a [`ValueStore`] is verified against its ref.
//! 4. The chunk store never interprets chunk contents.

pub mod chunk;
pub mod error;
pub mod memory;
pub mod traits;
pub mod values;
pub mod walk;

pub use chunk::StoredChunk;
pub use error::{StoreError, StoreResult};
pub use memory::InMemoryChunkStore;
pub use traits::ChunkStore;
pub use values::ValueStore;
pub use walk::{reachable_refs, walk_refs};
