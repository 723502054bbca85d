use std::io::Write;

use cairn_types::Ref;

/// Domain-separated BLAKE3 content hasher.
///
/// Each hasher carries a domain tag (e.g., `"cairn-value-v1"`) that is
/// prepended to every hash computation, so identical bytes hashed under
/// different domains never collide.
pub struct ContentHasher {
    domain: &'static str,
}

impl ContentHasher {
    /// Hasher for canonical value encodings (values, packages, commits).
    pub const VALUE: Self = Self {
        domain: "cairn-value-v1",
    };

    /// Create a hasher with a custom domain tag.
    pub const fn new(domain: &'static str) -> Self {
        Self { domain }
    }

    fn start(&self) -> blake3::Hasher {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.domain.as_bytes());
        hasher.update(b":");
        hasher
    }

    /// Hash raw bytes with domain separation.
    pub fn hash(&self, data: &[u8]) -> Ref {
        let mut hasher = self.start();
        hasher.update(data);
        Ref::from_hash(*hasher.finalize().as_bytes())
    }

    /// Hash the bincode encoding of a serializable value without buffering it.
    ///
    /// Produces the same ref as `hash(&bincode::serialize(value)?)`.
    pub fn hash_bincode<T: serde::Serialize>(&self, value: &T) -> Result<Ref, HasherError> {
        let mut hasher = self.start();
        bincode::serialize_into(&mut hasher, value)
            .map_err(|e| HasherError::Serialization(e.to_string()))?;
        hasher
            .flush()
            .map_err(|e| HasherError::Serialization(e.to_string()))?;
        Ok(Ref::from_hash(*hasher.finalize().as_bytes()))
    }

    /// Verify that data produces the expected ref.
    pub fn verify(&self, data: &[u8], expected: &Ref) -> bool {
        self.hash(data) == *expected
    }

    /// The domain tag used by this hasher.
    pub fn domain(&self) -> &str {
        self.domain
    }
}

/// Errors from hashing operations.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum HasherError {
    #[error("serialization error: {0}")]
    Serialization(String),
}
