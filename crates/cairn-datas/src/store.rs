//! Named datasets whose heads move by compare-and-swap.
//!
//! The dataset index is a `Map<String, Commit>` stored as an ordinary value;
//! the chunk store root points at it. Every head change writes a new index
//! and swings the root with [`ChunkStore::update_root`]. Commits are written
//! as chunks of their own, and each names its parents by ref, so the index
//! stays small however long the histories behind it are.

use std::sync::Arc;

use cairn_store::{ChunkStore, ValueStore};
use cairn_types::Ref;
use cairn_value::{TypeRegistry, Value};
use tracing::{debug, warn};

use crate::collections::{MapOfStringToCommit, SetOfRefOfCommit};
use crate::commit::Commit;
use crate::config::CommitStoreConfig;
use crate::error::{DatasError, DatasResult};
use crate::history::is_ancestor;
use crate::types::DatasTypes;

/// A commit store over a [`ChunkStore`].
///
/// Safe to share between threads: all mutable state lives in the chunk
/// store, and heads only move through the root compare-and-set.
#[derive(Debug)]
pub struct CommitStore<S> {
    values: ValueStore<S>,
    registry: Arc<TypeRegistry>,
    types: DatasTypes,
    config: CommitStoreConfig,
}

impl<S: ChunkStore> CommitStore<S> {
    /// Open a commit store with the default configuration and a private
    /// type registry.
    pub fn new(chunks: S) -> DatasResult<Self> {
        Self::with_config(chunks, CommitStoreConfig::default(), Arc::new(TypeRegistry::new()))
    }

    /// Open a commit store, registering the commit package with `registry`
    /// and writing it to the chunk store.
    pub fn with_config(
        chunks: S,
        config: CommitStoreConfig,
        registry: Arc<TypeRegistry>,
    ) -> DatasResult<Self> {
        config.validate()?;
        let values = ValueStore::new(chunks);
        let types = DatasTypes::register(&registry);
        values.write_package(&crate::types::commit_package())?;
        debug!(package = %types.package_ref().short_hex(), "opened commit store");
        Ok(Self {
            values,
            registry,
            types,
            config,
        })
    }

    pub fn types(&self) -> &DatasTypes {
        &self.types
    }

    pub fn config(&self) -> &CommitStoreConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<TypeRegistry> {
        &self.registry
    }

    pub fn value_store(&self) -> &ValueStore<S> {
        &self.values
    }

    // ---------------------------------------------------------------
    // Reads
    // ---------------------------------------------------------------

    /// Snapshot of every dataset and its head.
    pub fn datasets(&self) -> DatasResult<MapOfStringToCommit> {
        let root = self.values.chunk_store().root()?;
        self.datasets_at(&root)
    }

    fn datasets_at(&self, root: &Ref) -> DatasResult<MapOfStringToCommit> {
        if root.is_null() {
            return Ok(MapOfStringToCommit::new());
        }
        let index = self.values.read_value(root)?;
        Ok(index.cast(&self.registry)?)
    }

    /// The head of `name`, or `None` if the dataset does not exist.
    pub fn head(&self, name: &str) -> DatasResult<Option<Commit>> {
        Ok(self.datasets()?.maybe_get(name))
    }

    /// The head of the configured default dataset.
    pub fn default_head(&self) -> DatasResult<Option<Commit>> {
        self.head(&self.config.default_dataset)
    }

    pub fn has(&self, name: &str) -> DatasResult<bool> {
        Ok(self.datasets()?.has(name))
    }

    /// Number of datasets.
    pub fn len(&self) -> DatasResult<usize> {
        Ok(self.datasets()?.len())
    }

    pub fn is_empty(&self) -> DatasResult<bool> {
        Ok(self.datasets()?.is_empty())
    }

    /// Read a previously stored commit by ref.
    pub fn read_commit(&self, r: &Ref) -> DatasResult<Commit> {
        Ok(self.values.read_value(r)?.cast(&self.registry)?)
    }

    // ---------------------------------------------------------------
    // Writes
    // ---------------------------------------------------------------

    /// Persist `commit` without moving any head.
    ///
    /// With `verify_parents` set, every parent must already be stored as a
    /// commit.
    pub fn accept(&self, commit: &Commit) -> DatasResult<Ref> {
        if self.config.verify_parents {
            for parent in commit.parent_refs() {
                let Some(stored) = self.values.maybe_read_value(&parent)? else {
                    warn!(parent = %parent.short_hex(), "commit rejected: parent not stored");
                    return Err(DatasError::UnresolvedParent(parent));
                };
                stored.cast::<Commit>(&self.registry)?;
            }
        }
        Ok(self.values.write_value(&Value::from(commit.clone()))?)
    }

    /// Point `name` at `commit` if its head is currently `expected`.
    ///
    /// `expected` is `None` when the dataset should not exist yet. A head
    /// mismatch fails with [`DatasError::ConcurrentModification`]. When the
    /// root moved only because another dataset changed, the swap is retried
    /// up to `max_root_retries` times.
    pub fn compare_and_swap(
        &self,
        name: &str,
        expected: Option<Ref>,
        commit: &Commit,
    ) -> DatasResult<()> {
        self.accept(commit)?;
        self.swap_head(name, expected, commit)
    }

    /// Advance `name` to `commit`, which must descend from the current head.
    ///
    /// `commit` is stored first so that its history can be walked. Fails
    /// with [`DatasError::MergeNeeded`] when the current head is not in
    /// `commit`'s history.
    pub fn fast_forward(&self, name: &str, commit: &Commit) -> DatasResult<()> {
        self.accept(commit)?;
        let head = self.head(name)?;
        if let Some(head) = &head {
            if !is_ancestor(&self.values, head, commit)? {
                return Err(DatasError::MergeNeeded {
                    dataset: name.to_string(),
                    head: head.content_ref(),
                    commit: commit.content_ref(),
                });
            }
        }
        self.swap_head(name, head.map(|h| h.content_ref()), commit)
    }

    /// Commit `value` on top of the current head of `name` and return the
    /// new head.
    pub fn commit_value(&self, name: &str, value: impl Into<Value>) -> DatasResult<Commit> {
        let head = self.head(name)?;
        let parents = SetOfRefOfCommit::from_commits(head.iter());
        let commit = Commit::with(&self.types, value, parents);
        self.compare_and_swap(name, head.map(|h| h.content_ref()), &commit)?;
        Ok(commit)
    }

    /// Delete `name` if its head is currently `expected`.
    pub fn remove_dataset(&self, name: &str, expected: Ref) -> DatasResult<()> {
        self.swap_index(name, Some(expected), |index| index.remove(name))?;
        debug!(dataset = name, "dataset removed");
        Ok(())
    }

    /// Point `name` at an already accepted `commit`.
    fn swap_head(&self, name: &str, expected: Option<Ref>, commit: &Commit) -> DatasResult<()> {
        self.swap_index(name, expected, |index| index.set(name, commit.clone()))?;
        debug!(dataset = name, head = %commit.content_ref().short_hex(), "dataset head advanced");
        Ok(())
    }

    /// Rewrite the dataset index under the root compare-and-set.
    fn swap_index(
        &self,
        name: &str,
        expected: Option<Ref>,
        update: impl Fn(&MapOfStringToCommit) -> MapOfStringToCommit,
    ) -> DatasResult<()> {
        let chunks = self.values.chunk_store();
        let attempts = self.config.max_root_retries.saturating_add(1);
        for attempt in 1..=attempts {
            let root = chunks.root()?;
            let index = self.datasets_at(&root)?;
            let actual = index.maybe_get(name).map(|c| c.content_ref());
            if actual != expected {
                warn!(
                    dataset = name,
                    expected = ?expected.map(|r| r.short_hex()),
                    actual = ?actual.map(|r| r.short_hex()),
                    "compare-and-swap rejected"
                );
                return Err(DatasError::ConcurrentModification {
                    dataset: name.to_string(),
                    expected,
                    actual,
                });
            }

            let next = self.values.write_value(&Value::from(update(&index)))?;
            if chunks.update_root(next, root)? {
                return Ok(());
            }
            debug!(dataset = name, attempt, "store root moved, retrying");
        }
        warn!(dataset = name, attempts, "gave up on contended store root");
        Err(DatasError::RootContention { attempts })
    }
}
