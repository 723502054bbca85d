//! Persistent, content-addressed set.

use std::fmt;
use std::ops::ControlFlow;

use cairn_types::{Ref, RefCache};

use crate::chunk::Future;
use crate::codec;
use crate::tree::Tree;
use crate::typeref::TypeRef;
use crate::value::Value;

/// An immutable set of values, kept in ascending order.
///
/// Like [`Map`](crate::Map), every update returns a new set and leaves the
/// receiver untouched.
#[derive(Clone, Default)]
pub struct Set {
    items: Tree<Value, ()>,
    cache: RefCache,
}

impl Set {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_items<T: Into<Value>>(items: impl IntoIterator<Item = T>) -> Self {
        Self::from_tree(
            items
                .into_iter()
                .fold(Tree::default(), |t, v| t.insert(v.into(), ())),
        )
    }

    fn from_tree(items: Tree<Value, ()>) -> Self {
        Self {
            items,
            cache: RefCache::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn has(&self, item: &Value) -> bool {
        self.items.contains(item)
    }

    /// A new set that also contains `items`.
    pub fn insert<T: Into<Value>>(&self, items: impl IntoIterator<Item = T>) -> Set {
        let mut tree = self.items.clone();
        let mut changed = false;
        for item in items {
            let item = item.into();
            if !tree.contains(&item) {
                tree = tree.insert(item, ());
                changed = true;
            }
        }
        if changed {
            Self::from_tree(tree)
        } else {
            self.clone()
        }
    }

    /// A new set without any of `items`.
    pub fn remove<'a>(&self, items: impl IntoIterator<Item = &'a Value>) -> Set {
        let mut tree = self.items.clone();
        let mut changed = false;
        for item in items {
            if let Some(next) = tree.remove(item) {
                tree = next;
                changed = true;
            }
        }
        if changed {
            Self::from_tree(tree)
        } else {
            self.clone()
        }
    }

    /// The union of this set and all of `others`.
    pub fn union(&self, others: &[Set]) -> Set {
        others.iter().fold(self.clone(), |acc, other| {
            // Insert the smaller side into the larger to keep most nodes shared.
            if other.len() > acc.len() {
                other.insert(acc.items.iter().map(|(v, _)| v.clone()))
            } else {
                acc.insert(other.items.iter().map(|(v, _)| v.clone()))
            }
        })
    }

    /// This set minus every member of `others`.
    pub fn subtract(&self, others: &[Set]) -> Set {
        others.iter().fold(self.clone(), |acc, other| {
            acc.remove(other.items.iter().map(|(v, _)| v))
        })
    }

    /// Visit members in ascending order until `f` breaks.
    pub fn iter(&self, mut f: impl FnMut(&Value) -> ControlFlow<()>) {
        for (v, _) in self.items.iter() {
            if f(v).is_break() {
                break;
            }
        }
    }

    pub fn iter_all(&self, mut f: impl FnMut(&Value)) {
        self.items.iter().for_each(|(v, _)| f(v));
    }

    pub fn filter(&self, mut keep: impl FnMut(&Value) -> bool) -> Set {
        let mut tree = Tree::default();
        for (v, _) in self.items.iter() {
            if keep(v) {
                tree = tree.insert(v.clone(), ());
            }
        }
        Self::from_tree(tree)
    }

    /// Borrowing iterator over members in ascending order.
    pub fn values(&self) -> impl ExactSizeIterator<Item = &Value> + '_ {
        self.items.iter().map(|(v, _)| v)
    }

    /// Some member of the set, chosen cheaply. Deterministic for a given
    /// set, but not necessarily the smallest.
    pub fn any(&self) -> Option<&Value> {
        self.items.root_entry().map(|(v, _)| v)
    }

    pub fn first(&self) -> Option<&Value> {
        self.items.first().map(|(v, _)| v)
    }

    pub fn type_ref(&self) -> TypeRef {
        TypeRef::set_of(TypeRef::value())
    }

    pub fn content_ref(&self) -> Ref {
        self.cache.ensure(|| codec::hash_set(self))
    }

    pub fn chunks(&self) -> Vec<Future> {
        self.items.iter().flat_map(|(v, _)| v.chunks()).collect()
    }
}

impl PartialEq for Set {
    fn eq(&self, other: &Self) -> bool {
        self.content_ref() == other.content_ref()
    }
}

impl Eq for Set {}

impl fmt::Debug for Set {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.values()).finish()
    }
}

impl<T: Into<Value>> FromIterator<T> for Set {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::from_items(iter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn nums(s: &Set) -> Vec<i64> {
        s.values().map(|v| v.as_number().unwrap() as i64).collect()
    }

    // -----------------------------------------------------------------------
    // Basic operations
    // -----------------------------------------------------------------------

    #[test]
    fn insert_and_has() {
        let s = Set::new().insert([3, 1, 2]);
        assert_eq!(s.len(), 3);
        assert!(s.has(&Value::from(2)));
        assert!(!s.has(&Value::from(4)));
        assert_eq!(nums(&s), vec![1, 2, 3]);
    }

    #[test]
    fn insert_duplicate_keeps_ref() {
        let s = Set::from_items([1, 2]);
        let again = s.insert([2]);
        assert_eq!(s.content_ref(), again.content_ref());
        assert_eq!(again.len(), 2);
    }

    #[test]
    fn insert_does_not_mutate_receiver() {
        let s1 = Set::from_items(["a"]);
        let s2 = s1.insert(["b"]);
        assert_eq!(s1.len(), 1);
        assert_eq!(s2.len(), 2);
    }

    #[test]
    fn remove_many() {
        let s = Set::from_items(0..10);
        let evens: Vec<Value> = (0..10).step_by(2).map(Value::from).collect();
        let odd = s.remove(&evens);
        assert_eq!(nums(&odd), vec![1, 3, 5, 7, 9]);
        assert_eq!(s.len(), 10);
    }

    #[test]
    fn union_and_subtract() {
        let a = Set::from_items([1, 2, 3]);
        let b = Set::from_items([3, 4]);
        let c = Set::from_items([5]);

        assert_eq!(nums(&a.union(&[b.clone(), c.clone()])), vec![1, 2, 3, 4, 5]);
        assert_eq!(nums(&a.subtract(&[b, c])), vec![1, 2]);
        assert_eq!(a.union(&[]), a);
    }

    #[test]
    fn any_is_a_member() {
        let s = Set::from_items(["x", "y", "z"]);
        assert!(s.has(s.any().unwrap()));
        assert!(Set::new().any().is_none());
    }

    #[test]
    fn iter_stops_on_break() {
        let s = Set::from_items(0..5);
        let mut seen = Vec::new();
        s.iter(|v| {
            seen.push(v.clone());
            if seen.len() == 2 {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        });
        assert_eq!(seen, vec![Value::from(0), Value::from(1)]);
    }

    #[test]
    fn filter_keeps_matching() {
        let s = Set::from_items(0..6);
        let big = s.filter(|v| v.as_number().unwrap() >= 3.0);
        assert_eq!(nums(&big), vec![3, 4, 5]);
    }

    #[test]
    fn debug_lists_members() {
        let s = Set::from_items([2, 1]);
        assert_eq!(format!("{s:?}"), "{1, 2}");
    }

    // -----------------------------------------------------------------------
    // Property tests
    // -----------------------------------------------------------------------

    proptest! {
        #[test]
        fn ref_is_independent_of_insertion_order(mut items in prop::collection::vec(-50i32..50, 0..40)) {
            let forward = Set::from_items(items.clone());
            items.reverse();
            let backward = Set::from_items(items);
            prop_assert_eq!(forward.content_ref(), backward.content_ref());
        }

        #[test]
        fn union_then_subtract_leaves_disjoint_part(
            a in prop::collection::btree_set(0i32..100, 0..30),
            b in prop::collection::btree_set(0i32..100, 0..30),
        ) {
            let sa = Set::from_items(a.iter().copied());
            let sb = Set::from_items(b.iter().copied());
            let got = sa.union(&[sb.clone()]).subtract(&[sb]);
            let want = Set::from_items(a.difference(&b).copied());
            prop_assert_eq!(got, want);
        }

        #[test]
        fn union_and_subtract_membership(
            a in prop::collection::vec(0i32..40, 0..20),
            b in prop::collection::vec(0i32..40, 0..20),
            x in 0i32..40,
        ) {
            let sa = Set::from_items(a);
            let sb = Set::from_items(b);
            let x = Value::from(x);
            prop_assert_eq!(sa.union(&[sb.clone()]).has(&x), sa.has(&x) || sb.has(&x));
            prop_assert_eq!(sa.subtract(&[sb.clone()]).has(&x), sa.has(&x) && !sb.has(&x));
        }

        #[test]
        fn len_matches_distinct_members(items in prop::collection::vec(0i32..20, 0..60)) {
            let distinct: std::collections::BTreeSet<_> = items.iter().copied().collect();
            prop_assert_eq!(Set::from_items(items).len(), distinct.len());
        }
    }
}
