//! Persistent, content-addressed map.

use std::fmt;
use std::ops::ControlFlow;

use cairn_types::{Ref, RefCache};

use crate::chunk::Future;
use crate::codec;
use crate::tree::Tree;
use crate::typeref::TypeRef;
use crate::value::Value;

/// An immutable map from values to values.
///
/// Entries are kept in ascending key order, which is also the order they are
/// encoded in, so two maps with the same entries have the same ref no matter
/// how they were built. `set` and `remove` return new maps that share all
/// untouched structure with the receiver.
#[derive(Clone, Default)]
pub struct Map {
    entries: Tree<Value, Value>,
    cache: RefCache,
}

impl Map {
    /// An empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a map from key/value pairs. Later duplicates win.
    pub fn from_entries<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<Value>,
        V: Into<Value>,
    {
        let tree = entries
            .into_iter()
            .fold(Tree::default(), |t, (k, v)| t.insert(k.into(), v.into()));
        Self::from_tree(tree)
    }

    fn from_tree(entries: Tree<Value, Value>) -> Self {
        Self {
            entries,
            cache: RefCache::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn has(&self, key: &Value) -> bool {
        self.entries.contains(key)
    }

    /// The value bound to `key`.
    ///
    /// # Panics
    ///
    /// Panics if `key` is not present. Use [`Map::maybe_get`] when absence is
    /// an expected outcome.
    pub fn get(&self, key: &Value) -> &Value {
        match self.entries.get(key) {
            Some(v) => v,
            None => panic!("map has no entry for key {key:?}"),
        }
    }

    /// The value bound to `key`, if any.
    pub fn maybe_get(&self, key: &Value) -> Option<&Value> {
        self.entries.get(key)
    }

    /// A new map with `key` bound to `value`. The receiver is unchanged.
    pub fn set(&self, key: impl Into<Value>, value: impl Into<Value>) -> Map {
        Self::from_tree(self.entries.insert(key.into(), value.into()))
    }

    /// A new map without `key`. The receiver is unchanged.
    pub fn remove(&self, key: &Value) -> Map {
        match self.entries.remove(key) {
            Some(entries) => Self::from_tree(entries),
            None => self.clone(),
        }
    }

    /// Visit entries in ascending key order until `f` breaks.
    pub fn iter(&self, mut f: impl FnMut(&Value, &Value) -> ControlFlow<()>) {
        for (k, v) in self.entries.iter() {
            if f(k, v).is_break() {
                break;
            }
        }
    }

    /// Visit every entry in ascending key order.
    pub fn iter_all(&self, mut f: impl FnMut(&Value, &Value)) {
        self.entries.iter().for_each(|(k, v)| f(k, v));
    }

    /// A new map holding the entries for which `keep` returns `true`.
    pub fn filter(&self, mut keep: impl FnMut(&Value, &Value) -> bool) -> Map {
        let mut tree = Tree::default();
        for (k, v) in self.entries.iter() {
            if keep(k, v) {
                tree = tree.insert(k.clone(), v.clone());
            }
        }
        Self::from_tree(tree)
    }

    /// Borrowing iterator over entries in ascending key order.
    pub fn entries(&self) -> impl ExactSizeIterator<Item = (&Value, &Value)> + '_ {
        self.entries.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &Value> + '_ {
        self.entries.iter().map(|(k, _)| k)
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> + '_ {
        self.entries.iter().map(|(_, v)| v)
    }

    /// The entry with the smallest key.
    pub fn first(&self) -> Option<(&Value, &Value)> {
        self.entries.first()
    }

    /// Generic maps are typed `Map<Value, Value>`.
    pub fn type_ref(&self) -> TypeRef {
        TypeRef::map_of(TypeRef::value(), TypeRef::value())
    }

    pub fn content_ref(&self) -> Ref {
        self.cache.ensure(|| codec::hash_map(self))
    }

    /// Futures referenced by any key or value.
    pub fn chunks(&self) -> Vec<Future> {
        self.entries
            .iter()
            .flat_map(|(k, v)| k.chunks().into_iter().chain(v.chunks()))
            .collect()
    }
}

impl PartialEq for Map {
    fn eq(&self, other: &Self) -> bool {
        self.content_ref() == other.content_ref()
    }
}

impl Eq for Map {}

impl fmt::Debug for Map {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.entries.iter()).finish()
    }
}

impl<K: Into<Value>, V: Into<Value>> FromIterator<(K, V)> for Map {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self::from_entries(iter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::RefValue;

    fn key(s: &str) -> Value {
        Value::from(s)
    }

    #[test]
    fn empty_map() {
        let m = Map::new();
        assert!(m.is_empty());
        assert_eq!(m.len(), 0);
        assert!(!m.has(&key("a")));
        assert!(m.maybe_get(&key("a")).is_none());
        assert!(m.first().is_none());
    }

    #[test]
    fn set_and_get() {
        let m = Map::new().set("a", 1).set("b", 2);
        assert_eq!(m.len(), 2);
        assert_eq!(m.get(&key("a")), &Value::from(1));
        assert_eq!(m.maybe_get(&key("b")), Some(&Value::from(2)));
    }

    #[test]
    #[should_panic(expected = "map has no entry")]
    fn get_missing_key_panics() {
        Map::new().set("a", 1).get(&key("zzz"));
    }

    #[test]
    fn set_does_not_mutate_receiver() {
        let m1 = Map::new().set("a", 1);
        let m2 = m1.set("b", 2);

        assert!(!m1.has(&key("b")));
        assert_eq!(m1.get(&key("a")), &Value::from(1));
        assert_eq!(m1.len(), 1);
        assert_eq!(m2.len(), 2);
        assert_ne!(m1.content_ref(), m2.content_ref());
    }

    #[test]
    fn remove_does_not_mutate_receiver() {
        let m1 = Map::new().set("a", 1).set("b", 2);
        let m2 = m1.remove(&key("a"));
        assert!(m1.has(&key("a")));
        assert!(!m2.has(&key("a")));
        assert_eq!(m2.len(), 1);
    }

    #[test]
    fn remove_missing_key_keeps_ref() {
        let m1 = Map::new().set("a", 1);
        let r = m1.content_ref();
        assert_eq!(m1.remove(&key("nope")).content_ref(), r);
    }

    #[test]
    fn insertion_order_does_not_change_ref() {
        let ab = Map::new().set("a", 1).set("b", 2);
        let ba = Map::new().set("b", 2).set("a", 1);
        assert_eq!(ab.content_ref(), ba.content_ref());
        assert_eq!(ab, ba);
    }

    #[test]
    fn remove_then_readd_restores_ref() {
        let m = Map::new().set("a", 1).set("b", 2);
        let round_trip = m.remove(&key("b")).set("b", 2);
        assert_eq!(m, round_trip);
    }

    #[test]
    fn iteration_is_ascending_by_key() {
        let m = Map::from_entries([("c", 3), ("a", 1), ("b", 2)]);
        let mut keys = Vec::new();
        m.iter_all(|k, _| keys.push(k.as_str().unwrap().to_string()));
        assert_eq!(keys, vec!["a", "b", "c"]);
    }

    #[test]
    fn iter_stops_on_break() {
        let m = Map::from_entries((0..10).map(|i| (i, i)));
        let mut seen = 0;
        m.iter(|_, _| {
            seen += 1;
            if seen == 3 {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        });
        assert_eq!(seen, 3);
    }

    #[test]
    fn filter_builds_fresh_map() {
        let m = Map::from_entries((0..10).map(|i| (i, i * 2)));
        let even = m.filter(|k, _| k.as_number().unwrap() as i64 % 2 == 0);
        assert_eq!(even.len(), 5);
        assert_eq!(m.len(), 10);
        assert!(even.has(&Value::from(4)));
        assert!(!even.has(&Value::from(5)));
    }

    #[test]
    fn mixed_key_kinds() {
        let m = Map::new()
            .set("s", 1)
            .set(true, 2)
            .set(7, 3)
            .set(Map::new().set("nested", 1), 4);
        assert_eq!(m.len(), 4);
        let kinds: Vec<_> = m.keys().map(Value::kind).collect();
        assert_eq!(
            kinds,
            vec![
                crate::Kind::Bool,
                crate::Kind::Number,
                crate::Kind::String,
                crate::Kind::Map
            ]
        );
        assert!(m.has(&Value::from(Map::new().set("nested", 1))));
    }

    #[test]
    fn chunks_collect_refs_of_entries() {
        let target = Value::from("elsewhere");
        let m = Map::new().set("r", RefValue::to(&target)).set("plain", 1);
        let chunks = m.chunks();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].target(), target.content_ref());
    }

    #[test]
    fn debug_lists_entries() {
        let m = Map::new().set("a", 1);
        assert_eq!(format!("{m:?}"), "{\"a\": 1}");
    }

    #[test]
    fn collect_from_iterator() {
        let m: Map = vec![("x", 1), ("y", 2)].into_iter().collect();
        assert_eq!(m.len(), 2);
    }
}
