//! Structural diff of maps and sets.
//!
//! Both sides are walked together in ascending key order, so a diff costs a
//! single pass over the two containers.

use std::cmp::Ordering;
use std::iter::Peekable;

use crate::map::Map;
use crate::set::Set;
use crate::value::Value;

/// The result of comparing two maps.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MapDiff {
    /// Changes in ascending key order.
    pub changes: Vec<MapChange>,
}

/// A single change between two maps.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MapChange {
    /// The key exists only in the newer map.
    Added { key: Value, value: Value },
    /// The key exists only in the older map.
    Removed { key: Value, value: Value },
    /// The key exists in both maps with different values.
    Modified { key: Value, old: Value, new: Value },
}

impl MapChange {
    pub fn key(&self) -> &Value {
        match self {
            Self::Added { key, .. } | Self::Removed { key, .. } | Self::Modified { key, .. } => key,
        }
    }
}

impl MapDiff {
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn additions(&self) -> usize {
        self.count(|c| matches!(c, MapChange::Added { .. }))
    }

    pub fn removals(&self) -> usize {
        self.count(|c| matches!(c, MapChange::Removed { .. }))
    }

    pub fn modifications(&self) -> usize {
        self.count(|c| matches!(c, MapChange::Modified { .. }))
    }

    fn count(&self, pred: impl Fn(&MapChange) -> bool) -> usize {
        self.changes.iter().filter(|c| pred(c)).count()
    }
}

/// The result of comparing two sets.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SetDiff {
    /// Members only in the newer set, ascending.
    pub added: Vec<Value>,
    /// Members only in the older set, ascending.
    pub removed: Vec<Value>,
}

impl SetDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Merge two ascending key streams, calling `f` with the left entry, the
/// right entry, or both when the keys match.
fn merge_walk<'a, T: 'a>(
    left: impl Iterator<Item = (&'a Value, T)>,
    right: impl Iterator<Item = (&'a Value, T)>,
    mut f: impl FnMut(Option<(&'a Value, T)>, Option<(&'a Value, T)>),
) {
    let mut left: Peekable<_> = left.peekable();
    let mut right: Peekable<_> = right.peekable();
    loop {
        let order = match (left.peek(), right.peek()) {
            (None, None) => return,
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (Some((l, _)), Some((r, _))) => l.cmp(r),
        };
        match order {
            Ordering::Less => f(left.next(), None),
            Ordering::Greater => f(None, right.next()),
            Ordering::Equal => f(left.next(), right.next()),
        }
    }
}

impl Map {
    /// Changes that turn `self` into `newer`.
    pub fn diff(&self, newer: &Map) -> MapDiff {
        let mut changes = Vec::new();
        if self == newer {
            return MapDiff { changes };
        }
        merge_walk(self.entries(), newer.entries(), |old, new| match (old, new) {
            (Some((k, o)), Some((_, n))) => {
                if o != n {
                    changes.push(MapChange::Modified {
                        key: k.clone(),
                        old: o.clone(),
                        new: n.clone(),
                    });
                }
            }
            (Some((k, v)), None) => changes.push(MapChange::Removed {
                key: k.clone(),
                value: v.clone(),
            }),
            (None, Some((k, v))) => changes.push(MapChange::Added {
                key: k.clone(),
                value: v.clone(),
            }),
            (None, None) => {}
        });
        MapDiff { changes }
    }
}

impl Set {
    /// Members added and removed going from `self` to `newer`.
    pub fn diff(&self, newer: &Set) -> SetDiff {
        let mut diff = SetDiff::default();
        if self == newer {
            return diff;
        }
        merge_walk(
            self.values().map(|v| (v, ())),
            newer.values().map(|v| (v, ())),
            |old, new| match (old, new) {
                (Some((v, _)), None) => diff.removed.push(v.clone()),
                (None, Some((v, _))) => diff.added.push(v.clone()),
                _ => {}
            },
        );
        diff
    }
}
