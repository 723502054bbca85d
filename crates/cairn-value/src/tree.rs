//! Persistent AVL tree with path copying.
//!
//! Every update allocates new nodes only along the path from the root to the
//! touched key; all other subtrees are shared (`Arc`) between the old and the
//! new tree. The old tree is never modified and stays fully usable.

use std::cmp::Ordering;
use std::sync::Arc;

type Link<K, V> = Option<Arc<Node<K, V>>>;

struct Node<K, V> {
    key: K,
    value: V,
    left: Link<K, V>,
    right: Link<K, V>,
    height: u8,
    size: usize,
}

fn height<K, V>(link: &Link<K, V>) -> u8 {
    link.as_ref().map_or(0, |n| n.height)
}

fn size<K, V>(link: &Link<K, V>) -> usize {
    link.as_ref().map_or(0, |n| n.size)
}

fn node<K, V>(key: K, value: V, left: Link<K, V>, right: Link<K, V>) -> Arc<Node<K, V>> {
    Arc::new(Node {
        height: 1 + height(&left).max(height(&right)),
        size: 1 + size(&left) + size(&right),
        key,
        value,
        left,
        right,
    })
}

/// Build a node from two subtrees whose heights differ by at most two,
/// rotating as needed to restore the AVL invariant.
fn balance<K: Clone, V: Clone>(
    key: K,
    value: V,
    left: Link<K, V>,
    right: Link<K, V>,
) -> Arc<Node<K, V>> {
    let (hl, hr) = (height(&left), height(&right));
    if hl > hr + 1 {
        if let Some(l) = &left {
            if height(&l.left) >= height(&l.right) {
                return node(
                    l.key.clone(),
                    l.value.clone(),
                    l.left.clone(),
                    Some(node(key, value, l.right.clone(), right)),
                );
            }
            if let Some(lr) = &l.right {
                return node(
                    lr.key.clone(),
                    lr.value.clone(),
                    Some(node(l.key.clone(), l.value.clone(), l.left.clone(), lr.left.clone())),
                    Some(node(key, value, lr.right.clone(), right)),
                );
            }
        }
    } else if hr > hl + 1 {
        if let Some(r) = &right {
            if height(&r.right) >= height(&r.left) {
                return node(
                    r.key.clone(),
                    r.value.clone(),
                    Some(node(key, value, left, r.left.clone())),
                    r.right.clone(),
                );
            }
            if let Some(rl) = &r.left {
                return node(
                    rl.key.clone(),
                    rl.value.clone(),
                    Some(node(key, value, left, rl.left.clone())),
                    Some(node(r.key.clone(), r.value.clone(), rl.right.clone(), r.right.clone())),
                );
            }
        }
    }
    node(key, value, left, right)
}

fn insert<K: Ord + Clone, V: Clone>(link: &Link<K, V>, key: K, value: V) -> Arc<Node<K, V>> {
    match link {
        None => node(key, value, None, None),
        Some(n) => match key.cmp(&n.key) {
            Ordering::Less => balance(
                n.key.clone(),
                n.value.clone(),
                Some(insert(&n.left, key, value)),
                n.right.clone(),
            ),
            Ordering::Greater => balance(
                n.key.clone(),
                n.value.clone(),
                n.left.clone(),
                Some(insert(&n.right, key, value)),
            ),
            Ordering::Equal => node(key, value, n.left.clone(), n.right.clone()),
        },
    }
}

/// Remove `key`, returning `None` when the key is absent (nothing changed).
fn remove<K: Ord + Clone, V: Clone>(link: &Link<K, V>, key: &K) -> Option<Link<K, V>> {
    let n = link.as_ref()?;
    match key.cmp(&n.key) {
        Ordering::Less => {
            let left = remove(&n.left, key)?;
            Some(Some(balance(n.key.clone(), n.value.clone(), left, n.right.clone())))
        }
        Ordering::Greater => {
            let right = remove(&n.right, key)?;
            Some(Some(balance(n.key.clone(), n.value.clone(), n.left.clone(), right)))
        }
        Ordering::Equal => Some(match (&n.left, &n.right) {
            (None, right) => right.clone(),
            (left, None) => left.clone(),
            (left, Some(right)) => {
                let (k, v, rest) = pop_min(right);
                Some(balance(k, v, left.clone(), rest))
            }
        }),
    }
}

fn pop_min<K: Clone, V: Clone>(n: &Arc<Node<K, V>>) -> (K, V, Link<K, V>) {
    match &n.left {
        None => (n.key.clone(), n.value.clone(), n.right.clone()),
        Some(left) => {
            let (k, v, rest) = pop_min(left);
            (
                k,
                v,
                Some(balance(n.key.clone(), n.value.clone(), rest, n.right.clone())),
            )
        }
    }
}

/// An immutable ordered map from `K` to `V` with structural sharing.
pub(crate) struct Tree<K, V> {
    root: Link<K, V>,
}

impl<K, V> Clone for Tree<K, V> {
    fn clone(&self) -> Self {
        Self {
            root: self.root.clone(),
        }
    }
}

impl<K, V> Default for Tree<K, V> {
    fn default() -> Self {
        Self { root: None }
    }
}

impl<K: Ord + Clone, V: Clone> Tree<K, V> {
    pub(crate) fn len(&self) -> usize {
        size(&self.root)
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    pub(crate) fn get(&self, key: &K) -> Option<&V> {
        let mut cur = self.root.as_deref();
        while let Some(n) = cur {
            match key.cmp(&n.key) {
                Ordering::Less => cur = n.left.as_deref(),
                Ordering::Greater => cur = n.right.as_deref(),
                Ordering::Equal => return Some(&n.value),
            }
        }
        None
    }

    pub(crate) fn contains(&self, key: &K) -> bool {
        self.get(key).is_some()
    }

    /// A new tree with `key` bound to `value`.
    pub(crate) fn insert(&self, key: K, value: V) -> Self {
        Self {
            root: Some(insert(&self.root, key, value)),
        }
    }

    /// A new tree without `key`, or `None` when `key` is absent.
    pub(crate) fn remove(&self, key: &K) -> Option<Self> {
        remove(&self.root, key).map(|root| Self { root })
    }

    /// The entry at the root of the tree (cheapest element to reach).
    pub(crate) fn root_entry(&self) -> Option<(&K, &V)> {
        self.root.as_deref().map(|n| (&n.key, &n.value))
    }

    pub(crate) fn first(&self) -> Option<(&K, &V)> {
        let mut cur = self.root.as_deref()?;
        while let Some(left) = cur.left.as_deref() {
            cur = left;
        }
        Some((&cur.key, &cur.value))
    }

    /// In-order (ascending key) iterator.
    pub(crate) fn iter(&self) -> Iter<'_, K, V> {
        let mut iter = Iter {
            stack: Vec::with_capacity(usize::from(height(&self.root))),
            remaining: self.len(),
        };
        iter.push_left(self.root.as_deref());
        iter
    }

    #[cfg(test)]
    fn height(&self) -> u8 {
        height(&self.root)
    }

    /// Returns `true` when both trees share the node stored under `key`.
    #[cfg(test)]
    fn shares_node(&self, other: &Self, key: &K) -> bool {
        fn find<'a, K: Ord, V>(link: &'a Link<K, V>, key: &K) -> Option<&'a Arc<Node<K, V>>> {
            let n = link.as_ref()?;
            match key.cmp(&n.key) {
                Ordering::Less => find(&n.left, key),
                Ordering::Greater => find(&n.right, key),
                Ordering::Equal => Some(n),
            }
        }
        match (find(&self.root, key), find(&other.root, key)) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// Borrowing in-order iterator over a [`Tree`].
pub(crate) struct Iter<'a, K, V> {
    stack: Vec<&'a Node<K, V>>,
    remaining: usize,
}

impl<'a, K, V> Iter<'a, K, V> {
    fn push_left(&mut self, mut cur: Option<&'a Node<K, V>>) {
        while let Some(n) = cur {
            self.stack.push(n);
            cur = n.left.as_deref();
        }
    }
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        let n = self.stack.pop()?;
        self.push_left(n.right.as_deref());
        self.remaining -= 1;
        Some((&n.key, &n.value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V> ExactSizeIterator for Iter<'_, K, V> {}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(keys: impl IntoIterator<Item = u32>) -> Tree<u32, u32> {
        keys.into_iter()
            .fold(Tree::default(), |t, k| t.insert(k, k * 10))
    }

    fn is_balanced<K, V>(link: &Link<K, V>) -> bool {
        match link {
            None => true,
            Some(n) => {
                let (hl, hr) = (height(&n.left), height(&n.right));
                hl.abs_diff(hr) <= 1
                    && n.height == 1 + hl.max(hr)
                    && n.size == 1 + size(&n.left) + size(&n.right)
                    && is_balanced(&n.left)
                    && is_balanced(&n.right)
            }
        }
    }

    #[test]
    fn empty_tree() {
        let t: Tree<u32, u32> = Tree::default();
        assert!(t.is_empty());
        assert_eq!(t.len(), 0);
        assert!(t.get(&1).is_none());
        assert!(t.first().is_none());
        assert_eq!(t.iter().count(), 0);
    }

    #[test]
    fn insert_and_get() {
        let t = build([5, 3, 8, 1, 4]);
        assert_eq!(t.len(), 5);
        assert_eq!(t.get(&4), Some(&40));
        assert!(t.contains(&8));
        assert!(!t.contains(&7));
    }

    #[test]
    fn insert_existing_key_replaces_value() {
        let t = build([1, 2, 3]).insert(2, 99);
        assert_eq!(t.len(), 3);
        assert_eq!(t.get(&2), Some(&99));
    }

    #[test]
    fn iteration_is_ascending() {
        let t = build([9, 2, 7, 4, 1, 8]);
        let keys: Vec<u32> = t.iter().map(|(k, _)| *k).collect();
        assert_eq!(keys, vec![1, 2, 4, 7, 8, 9]);
        assert_eq!(t.iter().len(), 6);
        assert_eq!(t.first(), Some((&1, &10)));
    }

    #[test]
    fn stays_balanced_under_sequential_inserts() {
        let t = build(0..1024);
        assert!(is_balanced(&t.root));
        assert!(t.height() <= 14);
    }

    #[test]
    fn stays_balanced_under_removals() {
        let mut t = build(0..512);
        for k in (0..512).step_by(3) {
            t = t.remove(&k).expect("key present");
        }
        assert!(is_balanced(&t.root));
        assert_eq!(t.len(), 512 - 171);
        assert!(!t.contains(&0));
        assert!(t.contains(&1));
    }

    #[test]
    fn remove_missing_key_is_none() {
        let t = build([1, 2, 3]);
        assert!(t.remove(&4).is_none());
    }

    #[test]
    fn remove_node_with_two_children() {
        let t = build([50, 25, 75, 10, 30, 60, 90]);
        let t2 = t.remove(&50).unwrap();
        let keys: Vec<u32> = t2.iter().map(|(k, _)| *k).collect();
        assert_eq!(keys, vec![10, 25, 30, 60, 75, 90]);
        assert!(is_balanced(&t2.root));
    }

    #[test]
    fn updates_leave_original_untouched() {
        let t1 = build([1, 2, 3]);
        let t2 = t1.insert(4, 40);
        let t3 = t1.remove(&2).unwrap();

        assert_eq!(t1.len(), 3);
        assert!(!t1.contains(&4));
        assert!(t1.contains(&2));
        assert_eq!(t2.len(), 4);
        assert_eq!(t3.len(), 2);
    }

    #[test]
    fn updates_share_untouched_subtrees() {
        let t1 = build(0..64);
        let t2 = t1.insert(1000, 0);

        // The inserted key lands on the right spine, so the smallest keys
        // live in subtrees that were not copied.
        assert!(t1.shares_node(&t2, &0));
        assert!(!t1.shares_node(&t2, &1000));
    }

    #[test]
    fn root_entry_is_deterministic_for_same_history() {
        let a = build([3, 1, 2]);
        let b = build([3, 1, 2]);
        assert_eq!(a.root_entry(), b.root_entry());
    }
}
