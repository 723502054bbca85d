use std::fmt;
use std::sync::Arc;

use cairn_types::{Ref, RefCache};

use crate::chunk::Future;
use crate::codec;
use crate::typeref::TypeRef;
use crate::value::Value;

/// An immutable, ordered sequence of values.
#[derive(Clone, Default)]
pub struct List {
    items: Arc<Vec<Value>>,
    cache: RefCache,
}

impl List {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_items<T: Into<Value>>(items: impl IntoIterator<Item = T>) -> Self {
        Self::from_vec(items.into_iter().map(Into::into).collect())
    }

    fn from_vec(items: Vec<Value>) -> Self {
        Self {
            items: Arc::new(items),
            cache: RefCache::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.items.get(index)
    }

    /// A new list with `items` appended.
    pub fn append<T: Into<Value>>(&self, items: impl IntoIterator<Item = T>) -> List {
        let mut next = Vec::clone(&self.items);
        next.extend(items.into_iter().map(Into::into));
        Self::from_vec(next)
    }

    /// A new list with the element at `index` replaced, or `None` when
    /// `index` is out of bounds.
    pub fn set(&self, index: usize, value: impl Into<Value>) -> Option<List> {
        if index >= self.items.len() {
            return None;
        }
        let mut next = Vec::clone(&self.items);
        next[index] = value.into();
        Some(Self::from_vec(next))
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Value> {
        self.items.iter()
    }

    pub fn type_ref(&self) -> TypeRef {
        TypeRef::list_of(TypeRef::value())
    }

    pub fn content_ref(&self) -> Ref {
        self.cache.ensure(|| codec::hash_list(self))
    }

    pub fn chunks(&self) -> Vec<Future> {
        self.items.iter().flat_map(Value::chunks).collect()
    }
}

impl PartialEq for List {
    fn eq(&self, other: &Self) -> bool {
        self.content_ref() == other.content_ref()
    }
}

impl Eq for List {}

impl fmt::Debug for List {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.items.iter()).finish()
    }
}

impl<T: Into<Value>> FromIterator<T> for List {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::from_items(iter)
    }
}

impl<'a> IntoIterator for &'a List {
    type Item = &'a Value;
    type IntoIter = std::slice::Iter<'a, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_matters() {
        let a = List::from_items([1, 2]);
        let b = List::from_items([2, 1]);
        assert_ne!(a.content_ref(), b.content_ref());
    }

    #[test]
    fn append_and_set_leave_receiver_alone() {
        let l = List::from_items(["a"]);
        let appended = l.append(["b", "c"]);
        let replaced = appended.set(0, "z").unwrap();

        assert_eq!(l.len(), 1);
        assert_eq!(appended.get(0), Some(&Value::from("a")));
        assert_eq!(replaced.get(0), Some(&Value::from("z")));
        assert_eq!(replaced.len(), 3);
    }

    #[test]
    fn set_out_of_bounds() {
        assert!(List::new().set(0, 1).is_none());
    }

    #[test]
    fn debug_and_iter() {
        let l: List = [1, 2].into_iter().collect();
        assert_eq!(format!("{l:?}"), "[1, 2]");
        assert_eq!((&l).into_iter().count(), 2);
    }
}
