//! Foundation types for Cairn.
//!
//! This crate provides the content hash identity used by every other Cairn
//! crate. Values, packages and commits are all addressed by a [`Ref`], and
//! immutable instances memoize their own `Ref` in a [`RefCache`].
//!
//! # Key Types
//!
//! - [`Ref`]: Content-addressed identifier (BLAKE3 hash)
//! - [`RefCache`]: Lazily filled, shareable cell holding a computed `Ref`

pub mod cache;
pub mod error;
pub mod hash;

pub use cache::RefCache;
pub use error::TypeError;
pub use hash::Ref;
