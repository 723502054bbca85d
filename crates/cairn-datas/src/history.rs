//! Commit history as a graph, and the traversal queries built on it.
//!
//! Parents are stored by ref, so walking history means loading commits one
//! at a time through a [`ValueReader`]. [`CommitGraph`] loads a history
//! once and answers repeated queries from memory; it indexes commits by ref
//! and keeps a forward-edge index (`children`) for descendant queries. The
//! free functions load only as much history as each query needs.
//!
//! # Invariants
//!
//! - The graph is acyclic. A commit's ref covers its parents' refs, so a
//!   cycle would require a hash collision.
//! - Every parent of a commit in the graph is itself in the graph.

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

use cairn_types::Ref;
use cairn_value::ValueReader;
use tracing::debug;

use crate::commit::{load_commit, Commit};
use crate::error::{DatasError, DatasResult};

#[derive(Clone, Debug, Default)]
pub struct CommitGraph {
    nodes: HashMap<Ref, Commit>,
    /// parent -> children
    children: HashMap<Ref, Vec<Ref>>,
    roots: Vec<Ref>,
}

impl CommitGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// The history of `head`, including `head` itself.
    ///
    /// `head` need not be stored; its ancestors are read through `reader`.
    pub fn from_head<R>(reader: &R, head: &Commit) -> DatasResult<Self>
    where
        R: ValueReader + ?Sized,
        DatasError: From<R::Error>,
    {
        Self::from_heads(reader, [head])
    }

    /// The union of the histories of several heads.
    pub fn from_heads<'a, R>(
        reader: &R,
        heads: impl IntoIterator<Item = &'a Commit>,
    ) -> DatasResult<Self>
    where
        R: ValueReader + ?Sized,
        DatasError: From<R::Error>,
    {
        let mut graph = Self::new();
        for head in heads {
            graph.absorb(reader, head)?;
        }
        debug!(commits = graph.len(), roots = graph.roots.len(), "built commit graph");
        Ok(graph)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    // ---------------------------------------------------------------
    // Mutation
    // ---------------------------------------------------------------

    /// Add a single commit whose parents are already in the graph.
    ///
    /// Returns `Ok(false)` if the commit was already present, and
    /// [`DatasError::UnresolvedParent`] if a parent is missing.
    pub fn add_commit(&mut self, commit: Commit) -> DatasResult<bool> {
        let id = commit.content_ref();
        if self.nodes.contains_key(&id) {
            return Ok(false);
        }
        if let Some(missing) = commit
            .parent_refs()
            .into_iter()
            .find(|p| !self.nodes.contains_key(p))
        {
            return Err(DatasError::UnresolvedParent(missing));
        }
        self.insert(commit);
        Ok(true)
    }

    /// Insert `head` and every ancestor not yet in the graph.
    fn absorb<R>(&mut self, reader: &R, head: &Commit) -> DatasResult<()>
    where
        R: ValueReader + ?Sized,
        DatasError: From<R::Error>,
    {
        if self.nodes.contains_key(&head.content_ref()) {
            return Ok(());
        }
        let mut queued = HashSet::from([head.content_ref()]);
        let mut queue = VecDeque::from([head.clone()]);
        while let Some(commit) = queue.pop_front() {
            for parent in commit.parent_refs() {
                if !self.nodes.contains_key(&parent) && queued.insert(parent) {
                    queue.push_back(load_commit(reader, &parent)?);
                }
            }
            self.insert(commit);
        }
        Ok(())
    }

    fn insert(&mut self, commit: Commit) {
        let id = commit.content_ref();
        for parent in commit.parent_refs() {
            self.children.entry(parent).or_default().push(id);
        }
        if commit.is_root() {
            self.roots.push(id);
        }
        debug!(commit = %id.short_hex(), parents = commit.parents().len(), "added commit to graph");
        self.nodes.insert(id, commit);
    }

    pub fn get(&self, id: &Ref) -> Option<&Commit> {
        self.nodes.get(id)
    }

    pub fn contains(&self, id: &Ref) -> bool {
        self.nodes.contains_key(id)
    }

    /// Commits without parents, ascending by ref.
    pub fn roots(&self) -> Vec<&Commit> {
        let mut roots: Vec<&Commit> = self.roots.iter().filter_map(|id| self.nodes.get(id)).collect();
        roots.sort_by_key(|c| c.content_ref());
        roots
    }

    // ---------------------------------------------------------------
    // Ancestor / Descendant queries
    // ---------------------------------------------------------------

    /// Ancestors of `id` up to `max_depth` generations back, nearest first.
    ///
    /// The commit itself is not included. Unknown refs yield an empty vec.
    pub fn ancestors(&self, id: &Ref, max_depth: usize) -> Vec<&Commit> {
        self.bfs(id, max_depth, |c| c.parent_refs())
    }

    /// Descendants of `id` up to `max_depth` generations forward.
    pub fn descendants(&self, id: &Ref, max_depth: usize) -> Vec<&Commit> {
        self.bfs(id, max_depth, |c| {
            let mut kids = self.children.get(&c.content_ref()).cloned().unwrap_or_default();
            kids.sort();
            kids
        })
    }

    fn bfs<'a>(
        &'a self,
        id: &Ref,
        max_depth: usize,
        next: impl Fn(&Commit) -> Vec<Ref>,
    ) -> Vec<&'a Commit> {
        let Some(start) = self.nodes.get(id) else {
            return Vec::new();
        };
        let mut visited = HashSet::from([*id]);
        let mut queue: VecDeque<(Ref, usize)> = next(start)
            .into_iter()
            .filter(|r| visited.insert(*r))
            .map(|r| (r, 1))
            .collect();
        let mut result = Vec::new();

        while let Some((current, depth)) = queue.pop_front() {
            if depth > max_depth {
                continue;
            }
            let Some(commit) = self.nodes.get(&current) else {
                continue;
            };
            result.push(commit);
            if depth < max_depth {
                for r in next(commit) {
                    if visited.insert(r) {
                        queue.push_back((r, depth + 1));
                    }
                }
            }
        }
        result
    }

    /// Returns `true` if `ancestor` is reachable from `descendant` through
    /// parent edges. A commit counts as its own ancestor.
    pub fn is_ancestor(&self, ancestor: &Ref, descendant: &Ref) -> bool {
        self.nodes.contains_key(ancestor) && self.ancestor_set(descendant).contains(ancestor)
    }

    // ---------------------------------------------------------------
    // Common ancestor
    // ---------------------------------------------------------------

    /// The nearest commit that both `a` and `b` descend from.
    ///
    /// Only lowest common ancestors qualify: commits none of whose children
    /// are shared by both histories. When there are several (criss-cross
    /// merges), the one closest to `b` wins, with parents visited in ref
    /// order. Returns `None` if either ref is unknown or the histories are
    /// disjoint.
    pub fn common_ancestor(&self, a: &Ref, b: &Ref) -> Option<&Commit> {
        if !self.nodes.contains_key(a) || !self.nodes.contains_key(b) {
            return None;
        }
        let from_a = self.ancestor_set(a);
        let from_b = self.ancestor_set(b);
        let shared = |r: &Ref| from_a.contains(r) && from_b.contains(r);
        let lowest = |r: &Ref| {
            self.children
                .get(r)
                .map_or(true, |kids| !kids.iter().any(|k| shared(k)))
        };

        let mut visited = HashSet::from([*b]);
        let mut queue = VecDeque::from([*b]);
        while let Some(current) = queue.pop_front() {
            if shared(&current) && lowest(&current) {
                return self.nodes.get(&current);
            }
            if let Some(commit) = self.nodes.get(&current) {
                for parent in commit.parent_refs() {
                    if visited.insert(parent) {
                        queue.push_back(parent);
                    }
                }
            }
        }
        None
    }

    /// `id` and everything it descends from.
    fn ancestor_set(&self, id: &Ref) -> HashSet<Ref> {
        let mut visited = HashSet::from([*id]);
        let mut queue = VecDeque::from([*id]);
        while let Some(current) = queue.pop_front() {
            if let Some(commit) = self.nodes.get(&current) {
                for parent in commit.parent_refs() {
                    if visited.insert(parent) {
                        queue.push_back(parent);
                    }
                }
            }
        }
        visited
    }

    // ---------------------------------------------------------------
    // Topological sort
    // ---------------------------------------------------------------

    /// Every commit, parents before children.
    ///
    /// Kahn's algorithm; among commits that are ready at the same time the
    /// smallest ref goes first, so the order is deterministic.
    pub fn topological_order(&self) -> Vec<&Commit> {
        let mut pending: HashMap<Ref, usize> = self
            .nodes
            .iter()
            .map(|(id, c)| (*id, c.parents().len()))
            .collect();
        let mut ready: BTreeSet<Ref> = pending
            .iter()
            .filter(|(_, n)| **n == 0)
            .map(|(id, _)| *id)
            .collect();

        let mut result = Vec::with_capacity(self.nodes.len());
        while let Some(current) = ready.pop_first() {
            if let Some(commit) = self.nodes.get(&current) {
                result.push(commit);
            }
            for child in self.children.get(&current).into_iter().flatten() {
                if let Some(n) = pending.get_mut(child) {
                    *n -= 1;
                    if *n == 0 {
                        ready.insert(*child);
                    }
                }
            }
        }
        result
    }

    // ---------------------------------------------------------------
    // Validation
    // ---------------------------------------------------------------

    /// Check that every parent edge lands on a commit in the graph.
    pub fn validate(&self) -> DatasResult<()> {
        for commit in self.nodes.values() {
            if let Some(missing) = commit
                .parent_refs()
                .into_iter()
                .find(|p| !self.nodes.contains_key(p))
            {
                return Err(DatasError::UnresolvedParent(missing));
            }
        }
        Ok(())
    }
}

/// Up to `max_depth` generations of `commit`'s history, nearest first.
///
/// Only the commits returned are read.
pub fn ancestors<R>(reader: &R, commit: &Commit, max_depth: usize) -> DatasResult<Vec<Commit>>
where
    R: ValueReader + ?Sized,
    DatasError: From<R::Error>,
{
    let mut visited = HashSet::from([commit.content_ref()]);
    let mut queue: VecDeque<(Ref, usize)> = commit
        .parent_refs()
        .into_iter()
        .filter(|r| visited.insert(*r))
        .map(|r| (r, 1))
        .collect();
    let mut result = Vec::new();

    while let Some((current, depth)) = queue.pop_front() {
        if depth > max_depth {
            continue;
        }
        let commit = load_commit(reader, &current)?;
        if depth < max_depth {
            for r in commit.parent_refs() {
                if visited.insert(r) {
                    queue.push_back((r, depth + 1));
                }
            }
        }
        result.push(commit);
    }
    Ok(result)
}

/// Returns `true` if `ancestor` is in the history of `descendant`, or is
/// `descendant` itself.
///
/// The search stops as soon as `ancestor` is reached.
pub fn is_ancestor<R>(reader: &R, ancestor: &Commit, descendant: &Commit) -> DatasResult<bool>
where
    R: ValueReader + ?Sized,
    DatasError: From<R::Error>,
{
    let target = ancestor.content_ref();
    if target == descendant.content_ref() {
        return Ok(true);
    }
    let mut visited = HashSet::new();
    let mut queue = VecDeque::from(descendant.parent_refs());
    while let Some(current) = queue.pop_front() {
        if current == target {
            return Ok(true);
        }
        if visited.insert(current) {
            queue.extend(load_commit(reader, &current)?.parent_refs());
        }
    }
    Ok(false)
}

pub fn common_ancestor<R>(reader: &R, a: &Commit, b: &Commit) -> DatasResult<Option<Commit>>
where
    R: ValueReader + ?Sized,
    DatasError: From<R::Error>,
{
    Ok(CommitGraph::from_heads(reader, [a, b])?
        .common_ancestor(&a.content_ref(), &b.content_ref())
        .cloned())
}

/// The full history of `head`, parents before children.
pub fn topological_order<R>(reader: &R, head: &Commit) -> DatasResult<Vec<Commit>>
where
    R: ValueReader + ?Sized,
    DatasError: From<R::Error>,
{
    Ok(CommitGraph::from_head(reader, head)?
        .topological_order()
        .into_iter()
        .cloned()
        .collect())
}
