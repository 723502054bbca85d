//! Error types for commits and the commit store.

use cairn_store::StoreError;
use cairn_types::Ref;
use cairn_value::ValueError;

/// Errors that can occur while building commits or moving dataset heads.
#[derive(Debug, thiserror::Error)]
pub enum DatasError {
    /// A commit names a parent that is not present in the backing store.
    #[error("unresolved parent: {0}")]
    UnresolvedParent(Ref),

    /// The dataset head was not the one the caller expected.
    #[error("concurrent modification of dataset {dataset:?}: expected {expected:?}, found {actual:?}")]
    ConcurrentModification {
        dataset: String,
        expected: Option<Ref>,
        actual: Option<Ref>,
    },

    /// A fast-forward was requested but the current head is not an
    /// ancestor of the new commit.
    #[error("dataset {dataset:?} needs a merge: head {head} is not an ancestor of {commit}")]
    MergeNeeded {
        dataset: String,
        head: Ref,
        commit: Ref,
    },

    /// The store root kept moving under unrelated writers.
    #[error("store root contended: gave up after {attempts} attempts")]
    RootContention { attempts: u32 },

    /// Invalid or unparsable configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Backing store failure.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Type or codec failure.
    #[error(transparent)]
    Value(#[from] ValueError),
}

/// Convenience alias for commit results.
pub type DatasResult<T> = Result<T, DatasError>;
