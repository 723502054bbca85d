//! Content hashing for Cairn.
//!
//! Provides the domain-separated BLAKE3 hasher that turns canonical value
//! encodings into [`Ref`](cairn_types::Ref)s. Every `Ref` in the system is
//! produced here, so the hashing scheme is defined in exactly one place.
//!
//! All hashing wraps the `blake3` crate; there is no custom cryptography.

pub mod hasher;

pub use hasher::{ContentHasher, HasherError};
