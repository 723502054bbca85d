use bytes::Bytes;
use cairn_crypto::ContentHasher;
use cairn_types::Ref;

/// A stored chunk: encoded bytes plus cached size.
///
/// The chunk store never interprets `data`; it is a pure key-value store
/// keyed by content hash.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredChunk {
    /// The canonical encoding of one value.
    pub data: Bytes,
    /// The size of `data` in bytes.
    pub size: u64,
}

impl StoredChunk {
    pub fn new(data: impl Into<Bytes>) -> Self {
        let data = data.into();
        let size = data.len() as u64;
        Self { data, size }
    }

    /// The content-addressed ref of this chunk.
    pub fn compute_ref(&self) -> Ref {
        ContentHasher::VALUE.hash(&self.data)
    }
}
