//! Typed wrappers over the generic containers that hold commits.
//!
//! [`SetOfRefOfCommit`] is the type of a commit's parent set.
//! [`MapOfStringToCommit`] is the dataset index stored under the chunk store
//! root.

use std::ops::ControlFlow;

use cairn_types::Ref;
use cairn_value::{
    Future, FromValue, Map, RefValue, Set, SetDiff, TypeRef, TypeRegistry, Value, ValueError,
    ValueReader, ValueResult,
};

use crate::commit::{load_commit, Commit};
use crate::error::{DatasError, DatasResult};
use crate::types::DatasTypes;

fn as_commit(value: &Value) -> Option<Commit> {
    value.as_struct().and_then(|s| Commit::from_struct(s).ok())
}

fn shape_error(found: &Value, container: &str) -> ValueError {
    ValueError::TypeMismatch {
        expected: container.to_string(),
        reason: format!("member is a {}", found.kind()),
    }
}

fn ref_to(commit: &Commit) -> Value {
    Value::from(RefValue::new(commit.content_ref(), commit.type_ref().clone()))
}

fn target(value: &Value) -> Option<Ref> {
    value.as_ref_value().map(RefValue::target)
}

// ---------------------------------------------------------------------------
// SetOfRefOfCommit
// ---------------------------------------------------------------------------

/// A set of refs to commits.
///
/// Membership is by target ref. The commits themselves are loaded on demand
/// with [`resolve`](Self::resolve).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SetOfRefOfCommit {
    set: Set,
}

impl SetOfRefOfCommit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_commits<'a>(commits: impl IntoIterator<Item = &'a Commit>) -> Self {
        Self {
            set: Set::from_items(commits.into_iter().map(ref_to)),
        }
    }

    /// Refs to commits that need not be loaded, typed as `Ref<Commit>`.
    pub fn from_refs(types: &DatasTypes, refs: impl IntoIterator<Item = Ref>) -> Self {
        let commit = types.commit_type();
        Self {
            set: Set::from_items(refs.into_iter().map(|r| RefValue::new(r, commit.clone()))),
        }
    }

    /// Wrap a generic set whose members are all refs.
    pub fn from_set(set: &Set) -> ValueResult<Self> {
        if let Some(other) = set.values().find(|v| target(v).is_none()) {
            return Err(shape_error(other, "Set<Ref<Commit>>"));
        }
        Ok(Self { set: set.clone() })
    }

    pub fn as_set(&self) -> &Set {
        &self.set
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty()
    }

    pub fn len(&self) -> usize {
        self.set.len()
    }

    pub fn has(&self, commit: &Commit) -> bool {
        self.has_ref(&commit.content_ref())
    }

    pub fn has_ref(&self, r: &Ref) -> bool {
        self.set.values().any(|v| target(v) == Some(*r))
    }

    pub fn insert<'a>(&self, commits: impl IntoIterator<Item = &'a Commit>) -> SetOfRefOfCommit {
        Self {
            set: self.set.insert(commits.into_iter().map(ref_to)),
        }
    }

    pub fn remove<'a>(&self, commits: impl IntoIterator<Item = &'a Commit>) -> SetOfRefOfCommit {
        let gone: Vec<Ref> = commits.into_iter().map(Commit::content_ref).collect();
        self.filter(|r| !gone.contains(&r))
    }

    pub fn union(&self, others: &[SetOfRefOfCommit]) -> SetOfRefOfCommit {
        let sets: Vec<Set> = others.iter().map(|o| o.set.clone()).collect();
        Self {
            set: self.set.union(&sets),
        }
    }

    pub fn subtract(&self, others: &[SetOfRefOfCommit]) -> SetOfRefOfCommit {
        let sets: Vec<Set> = others.iter().map(|o| o.set.clone()).collect();
        Self {
            set: self.set.subtract(&sets),
        }
    }

    /// Visit target refs in set order until `f` breaks.
    pub fn iter(&self, mut f: impl FnMut(Ref) -> ControlFlow<()>) {
        self.set.iter(|v| match target(v) {
            Some(r) => f(r),
            None => ControlFlow::Continue(()),
        });
    }

    pub fn iter_all(&self, mut f: impl FnMut(Ref)) {
        self.iter(|r| {
            f(r);
            ControlFlow::Continue(())
        });
    }

    pub fn filter(&self, mut keep: impl FnMut(Ref) -> bool) -> SetOfRefOfCommit {
        Self {
            set: self.set.filter(|v| target(v).is_some_and(&mut keep)),
        }
    }

    /// An arbitrary member, or `None` for the empty set.
    pub fn any(&self) -> Option<Ref> {
        self.set.any().and_then(target)
    }

    /// Target refs, ascending.
    pub fn refs(&self) -> Vec<Ref> {
        let mut refs: Vec<Ref> = self.set.values().filter_map(target).collect();
        refs.sort();
        refs
    }

    /// Load every member through `reader`, ascending by ref.
    pub fn resolve<R>(&self, reader: &R) -> DatasResult<Vec<Commit>>
    where
        R: ValueReader + ?Sized,
        DatasError: From<R::Error>,
    {
        self.refs().iter().map(|r| load_commit(reader, r)).collect()
    }

    pub fn diff(&self, newer: &SetOfRefOfCommit) -> SetDiff {
        self.set.diff(&newer.set)
    }

    pub fn type_ref(types: &DatasTypes) -> TypeRef {
        types.set_of_ref_of_commit_type()
    }

    pub fn content_ref(&self) -> Ref {
        self.set.content_ref()
    }

    /// One unresolved future per member.
    pub fn chunks(&self) -> Vec<Future> {
        self.set.chunks()
    }
}

impl<'a> FromIterator<&'a Commit> for SetOfRefOfCommit {
    fn from_iter<I: IntoIterator<Item = &'a Commit>>(iter: I) -> Self {
        Self::from_commits(iter)
    }
}

impl From<SetOfRefOfCommit> for Value {
    fn from(s: SetOfRefOfCommit) -> Self {
        Value::Set(s.set)
    }
}

impl FromValue for SetOfRefOfCommit {
    fn from_value(value: &Value, registry: &TypeRegistry) -> ValueResult<Self> {
        let types = DatasTypes::register(registry);
        registry.check(value, &types.set_of_ref_of_commit_type(), &Ref::null())?;
        match value {
            Value::Set(set) => SetOfRefOfCommit::from_set(set),
            other => Err(shape_error(other, "Set<Ref<Commit>>")),
        }
    }
}

// ---------------------------------------------------------------------------
// MapOfStringToCommit
// ---------------------------------------------------------------------------

/// Dataset names mapped to their head commits.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MapOfStringToCommit {
    map: Map,
}

impl MapOfStringToCommit {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap a generic map with string keys and commit-shaped values.
    pub fn from_map(map: &Map) -> ValueResult<Self> {
        for (k, v) in map.entries() {
            if k.as_str().is_none() {
                return Err(ValueError::TypeMismatch {
                    expected: "Map<String, Commit>".to_string(),
                    reason: format!("key is a {}", k.kind()),
                });
            }
            match v {
                Value::Struct(s) => {
                    Commit::from_struct(s)?;
                }
                other => return Err(shape_error(other, "Map<String, Commit>")),
            }
        }
        Ok(Self { map: map.clone() })
    }

    pub fn as_map(&self) -> &Map {
        &self.map
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn has(&self, name: &str) -> bool {
        self.map.has(&Value::from(name))
    }

    /// The commit stored under `name`.
    ///
    /// # Panics
    ///
    /// Panics if `name` is absent. Use [`maybe_get`](Self::maybe_get) when
    /// absence is expected.
    pub fn get(&self, name: &str) -> Commit {
        match self.maybe_get(name) {
            Some(c) => c,
            None => panic!("no commit for dataset {name:?}"),
        }
    }

    pub fn maybe_get(&self, name: &str) -> Option<Commit> {
        self.map.maybe_get(&Value::from(name)).and_then(as_commit)
    }

    pub fn set(&self, name: &str, commit: Commit) -> MapOfStringToCommit {
        Self {
            map: self.map.set(name, commit),
        }
    }

    pub fn remove(&self, name: &str) -> MapOfStringToCommit {
        Self {
            map: self.map.remove(&Value::from(name)),
        }
    }

    /// Visit entries in name order until `f` breaks.
    pub fn iter(&self, mut f: impl FnMut(&str, &Commit) -> ControlFlow<()>) {
        self.map.iter(|k, v| match (k.as_str(), as_commit(v)) {
            (Some(name), Some(c)) => f(name, &c),
            _ => ControlFlow::Continue(()),
        });
    }

    pub fn iter_all(&self, mut f: impl FnMut(&str, &Commit)) {
        self.iter(|name, c| {
            f(name, c);
            ControlFlow::Continue(())
        });
    }

    pub fn filter(&self, mut keep: impl FnMut(&str, &Commit) -> bool) -> MapOfStringToCommit {
        Self {
            map: self.map.filter(|k, v| match (k.as_str(), as_commit(v)) {
                (Some(name), Some(c)) => keep(name, &c),
                _ => false,
            }),
        }
    }

    /// Dataset names, ascending.
    pub fn names(&self) -> Vec<String> {
        self.map
            .keys()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect()
    }

    pub fn type_ref(types: &DatasTypes) -> TypeRef {
        types.map_of_string_to_commit_type()
    }

    pub fn content_ref(&self) -> Ref {
        self.map.content_ref()
    }

    pub fn chunks(&self) -> Vec<Future> {
        self.map.chunks()
    }
}

impl From<MapOfStringToCommit> for Value {
    fn from(m: MapOfStringToCommit) -> Self {
        Value::Map(m.map)
    }
}

impl FromValue for MapOfStringToCommit {
    fn from_value(value: &Value, registry: &TypeRegistry) -> ValueResult<Self> {
        let types = DatasTypes::register(registry);
        registry.check(value, &types.map_of_string_to_commit_type(), &Ref::null())?;
        match value {
            Value::Map(map) => MapOfStringToCommit::from_map(map),
            other => Err(shape_error(other, "Map<String, Commit>")),
        }
    }
}
