use cairn_types::Ref;
use cairn_value::{
    Future, FromValue, Struct, TypeRef, TypeRegistry, Value, ValueError, ValueReader, ValueResult,
};

use crate::collections::SetOfRefOfCommit;
use crate::error::{DatasError, DatasResult};
use crate::types::DatasTypes;

const VALUE_FIELD: &str = "value";
const PARENTS_FIELD: &str = "parents";

/// A point in the history of a dataset: a value plus refs to the commits
/// it was derived from.
///
/// Commits are immutable. Setters return new commits; the content ref
/// changes whenever the value or the parent set does. Parents are held by
/// ref, so a commit is the same size however long its history is.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Commit {
    inner: Struct,
    value: Value,
    parents: SetOfRefOfCommit,
}

impl Commit {
    /// A root commit holding `false`.
    pub fn new(types: &DatasTypes) -> Self {
        Self::with(types, false, SetOfRefOfCommit::new())
    }

    pub fn with(types: &DatasTypes, value: impl Into<Value>, parents: SetOfRefOfCommit) -> Self {
        let value = value.into();
        let inner = Struct::new(
            types.commit_type().clone(),
            [
                (VALUE_FIELD, value.clone()),
                (PARENTS_FIELD, Value::from(parents.as_set().clone())),
            ],
        );
        Self {
            inner,
            value,
            parents,
        }
    }

    /// Reinterpret a struct as a commit.
    ///
    /// The struct must carry a value and a set of refs as its parents.
    pub fn from_struct(s: &Struct) -> ValueResult<Self> {
        let value = s
            .get(VALUE_FIELD)
            .cloned()
            .ok_or_else(|| not_a_commit(format!("missing field {VALUE_FIELD:?}")))?;
        let parents = match s.get(PARENTS_FIELD) {
            Some(Value::Set(set)) => SetOfRefOfCommit::from_set(set)?,
            Some(other) => return Err(not_a_commit(format!("parents is a {}", other.kind()))),
            None => return Err(not_a_commit(format!("missing field {PARENTS_FIELD:?}"))),
        };
        Ok(Self {
            inner: s.clone(),
            value,
            parents,
        })
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn set_value(&self, value: impl Into<Value>) -> Commit {
        let value = value.into();
        Self {
            inner: self.inner.set(VALUE_FIELD, value.clone()),
            value,
            parents: self.parents.clone(),
        }
    }

    pub fn parents(&self) -> &SetOfRefOfCommit {
        &self.parents
    }

    pub fn set_parents(&self, parents: SetOfRefOfCommit) -> Commit {
        Self {
            inner: self
                .inner
                .set(PARENTS_FIELD, Value::from(parents.as_set().clone())),
            value: self.value.clone(),
            parents,
        }
    }

    /// Load the parent commits through `reader`, ascending by ref.
    pub fn load_parents<R>(&self, reader: &R) -> DatasResult<Vec<Commit>>
    where
        R: ValueReader + ?Sized,
        DatasError: From<R::Error>,
    {
        self.parents.resolve(reader)
    }

    /// Returns `true` if this commit has no parents.
    pub fn is_root(&self) -> bool {
        self.parents.is_empty()
    }

    /// Returns `true` if this commit joins two or more lines of history.
    pub fn is_merge(&self) -> bool {
        self.parents.len() > 1
    }

    pub fn content_ref(&self) -> Ref {
        self.inner.content_ref()
    }

    pub fn type_ref(&self) -> &TypeRef {
        self.inner.type_ref()
    }

    /// The commit package plus one future per parent.
    pub fn chunks(&self) -> Vec<Future> {
        self.inner.chunks()
    }

    pub fn as_struct(&self) -> &Struct {
        &self.inner
    }

    /// Refs of the direct parents, ascending.
    pub fn parent_refs(&self) -> Vec<Ref> {
        self.parents.refs()
    }
}

fn not_a_commit(reason: String) -> ValueError {
    ValueError::TypeMismatch {
        expected: "struct Commit".to_string(),
        reason,
    }
}

/// Read the commit stored under `r`.
///
/// Only the commit itself is decoded; its parents stay refs.
pub fn load_commit<R>(reader: &R, r: &Ref) -> DatasResult<Commit>
where
    R: ValueReader + ?Sized,
    DatasError: From<R::Error>,
{
    match reader.read_value(r)? {
        Value::Struct(s) => Ok(Commit::from_struct(&s)?),
        other => Err(not_a_commit(format!("{} holds a {}", r.short_hex(), other.kind())).into()),
    }
}

impl From<Commit> for Value {
    fn from(c: Commit) -> Self {
        Value::Struct(c.inner)
    }
}

impl FromValue for Commit {
    /// Accepts commit structs and maps with `value` and `parents` entries.
    fn from_value(value: &Value, registry: &TypeRegistry) -> ValueResult<Self> {
        let types = DatasTypes::register(registry);
        match registry.convert(value, types.commit_type())? {
            Value::Struct(s) => Commit::from_struct(&s),
            other => Err(not_a_commit(format!("found {}", other.kind()))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cairn_store::{InMemoryChunkStore, StoreError, ValueStore};
    use cairn_value::{encode, Map, RefValue, Set};

    fn types() -> (TypeRegistry, DatasTypes) {
        let registry = TypeRegistry::new();
        let types = DatasTypes::register(&registry);
        (registry, types)
    }

    #[test]
    fn new_commit_defaults() {
        let (_, types) = types();
        let c = Commit::new(&types);
        assert_eq!(c.value(), &Value::from(false));
        assert!(c.parents().is_empty());
        assert!(c.is_root());
        assert!(!c.is_merge());
        assert_eq!(c.type_ref(), types.commit_type());
    }

    #[test]
    fn setters_return_new_commits() {
        let (_, types) = types();
        let c1 = Commit::new(&types);
        let c2 = c1.set_value("hello");
        assert_eq!(c1.value(), &Value::from(false));
        assert_eq!(c2.value(), &Value::from("hello"));
        assert_ne!(c1.content_ref(), c2.content_ref());

        let c3 = c2.set_parents(SetOfRefOfCommit::from_commits([&c1]));
        assert!(c2.is_root());
        assert!(!c3.is_root());
        assert_eq!(c3.parent_refs(), vec![c1.content_ref()]);
    }

    #[test]
    fn same_content_same_ref() {
        let (_, types) = types();
        let a = Commit::with(&types, 7, SetOfRefOfCommit::new());
        let b = Commit::new(&types).set_value(7);
        assert_eq!(a.content_ref(), b.content_ref());
        assert_eq!(a, b);
    }

    #[test]
    fn merge_commit() {
        let (_, types) = types();
        let left = Commit::with(&types, "l", SetOfRefOfCommit::new());
        let right = Commit::with(&types, "r", SetOfRefOfCommit::new());
        let merge = Commit::with(&types, "m", SetOfRefOfCommit::from_commits([&left, &right]));
        assert!(merge.is_merge());
        assert_eq!(merge.parents().len(), 2);
        assert!(merge.parents().has(&left) && merge.parents().has(&right));
    }

    #[test]
    fn chunks_are_the_package_and_the_parents() {
        let (_, types) = types();
        let parent = Commit::new(&types);
        let c = Commit::with(&types, 1, SetOfRefOfCommit::from_commits([&parent]));
        let targets: Vec<Ref> = c.chunks().iter().map(Future::target).collect();
        assert!(targets.contains(&types.package_ref()));
        assert!(targets.contains(&parent.content_ref()));
    }

    #[test]
    fn long_history_keeps_commits_small() {
        let (_, types) = types();
        let mut head = Commit::new(&types);
        let mut sizes = Vec::new();
        for i in 0..10_000 {
            head = Commit::with(&types, i, SetOfRefOfCommit::from_commits([&head]));
            if i % 2_500 == 0 {
                sizes.push(encode(&Value::from(head.clone())).unwrap().len());
            }
        }
        assert_ne!(head.content_ref(), Ref::null());
        assert!(sizes.windows(2).all(|w| w[0] == w[1]));
    }

    #[test]
    fn load_commit_reads_one_commit() {
        let (_, types) = types();
        let store = ValueStore::new(InMemoryChunkStore::new());
        let parent = Commit::with(&types, "p", SetOfRefOfCommit::new());
        let child = Commit::with(&types, "c", SetOfRefOfCommit::from_commits([&parent]));
        let r = store.write_value(&Value::from(child.clone())).unwrap();

        // The parent was never written, yet the child loads.
        let back = load_commit(&store, &r).unwrap();
        assert_eq!(back, child);
        assert!(matches!(
            back.load_parents(&store),
            Err(DatasError::Store(StoreError::NotFound(missing))) if missing == parent.content_ref()
        ));

        store.write_value(&Value::from(parent.clone())).unwrap();
        assert_eq!(back.load_parents(&store).unwrap(), vec![parent]);

        let not_commit = store.write_value(&Value::from("text")).unwrap();
        assert!(matches!(
            load_commit(&store, &not_commit),
            Err(DatasError::Value(ValueError::TypeMismatch { .. }))
        ));
    }

    #[test]
    fn cast_round_trip_through_value() {
        let (registry, types) = types();
        let parent = Commit::with(&types, 1, SetOfRefOfCommit::new());
        let c = Commit::with(&types, 2, SetOfRefOfCommit::from_commits([&parent]));
        let back: Commit = Value::from(c.clone()).cast(&registry).unwrap();
        assert_eq!(back, c);
        assert_eq!(back.parent_refs(), vec![parent.content_ref()]);
    }

    #[test]
    fn cast_from_generic_map() {
        let (registry, _) = types();
        let generic = Value::from(Map::new().set("value", "v").set("parents", Set::new()));
        let c: Commit = generic.cast(&registry).unwrap();
        assert_eq!(c.value(), &Value::from("v"));
        assert!(c.is_root());
    }

    #[test]
    fn cast_registers_package_on_demand() {
        let registry = TypeRegistry::new();
        let generic = Value::from(Map::new().set("value", 1).set("parents", Set::new()));
        assert!(generic.cast::<Commit>(&registry).is_ok());
        assert_eq!(registry.package_count(), 1);
    }

    #[test]
    fn cast_rejects_non_commits() {
        let (registry, _) = types();
        assert!(Value::from("nope").cast::<Commit>(&registry).is_err());

        let missing_parents = Value::from(Map::new().set("value", 1));
        assert!(matches!(
            missing_parents.cast::<Commit>(&registry),
            Err(ValueError::TypeMismatch { .. })
        ));

        let bad_parents = Value::from(Map::new().set("value", 1).set("parents", Set::from_items([1])));
        assert!(bad_parents.cast::<Commit>(&registry).is_err());

        let refs_to_numbers = Set::from_items([RefValue::to(&Value::from(1))]);
        let wrong_target = Value::from(Map::new().set("value", 1).set("parents", refs_to_numbers));
        assert!(wrong_target.cast::<Commit>(&registry).is_err());

        let other_struct = Struct::new(TypeRef::structure("Other", vec![], vec![]), Vec::<(String, Value)>::new());
        assert!(Value::from(other_struct).cast::<Commit>(&registry).is_err());
    }
}
