//! Versioned datasets for Cairn.
//!
//! A [`Commit`] pairs a value with refs to the commits it was derived from,
//! forming a DAG of history. A [`CommitStore`] maps dataset names to head
//! commits and moves heads with compare-and-swap, so concurrent writers
//! cannot silently overwrite each other.
//!
//! History queries live in [`history`]: ancestry checks, common ancestors,
//! and a deterministic topological order. They load ancestors through a
//! [`ValueReader`](cairn_value::ValueReader) one commit at a time.

pub mod collections;
pub mod commit;
pub mod config;
pub mod error;
pub mod history;
pub mod store;
pub mod types;

pub use collections::{MapOfStringToCommit, SetOfRefOfCommit};
pub use commit::{load_commit, Commit};
pub use config::CommitStoreConfig;
pub use error::{DatasError, DatasResult};
pub use history::{ancestors, common_ancestor, is_ancestor, topological_order, CommitGraph};
pub use store::CommitStore;
pub use types::{commit_package, DatasTypes};
