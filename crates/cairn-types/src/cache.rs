//! Memoized ref cells for immutable values.
//!
//! Every immutable instance computes its [`Ref`] at most once. The cell is
//! shared between clones of the same instance (they have identical content)
//! and a derived instance always starts with a fresh, empty cell.

use std::fmt;
use std::sync::{Arc, OnceLock};

use crate::hash::Ref;

/// A lazily filled, thread-safe cell holding a computed [`Ref`].
///
/// Filling is single-shot: concurrent callers of [`RefCache::ensure`] block
/// until the first computation finishes and then observe the same value, so
/// no caller can ever read a partially written ref.
#[derive(Clone, Default)]
pub struct RefCache(Arc<OnceLock<Ref>>);

impl RefCache {
    /// Create an empty cell.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a cell that already holds `r`.
    pub fn with_ref(r: Ref) -> Self {
        let cell = OnceLock::new();
        let _ = cell.set(r);
        Self(Arc::new(cell))
    }

    /// Return the cached ref, computing and storing it first if needed.
    pub fn ensure(&self, compute: impl FnOnce() -> Ref) -> Ref {
        *self.0.get_or_init(compute)
    }

    /// The cached ref, if it has been computed.
    pub fn get(&self) -> Option<Ref> {
        self.0.get().copied()
    }
}

impl fmt::Debug for RefCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.get() {
            Some(r) => write!(f, "RefCache({})", r.short_hex()),
            None => write!(f, "RefCache(<empty>)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    #[test]
    fn ensure_computes_once() {
        let cache = RefCache::new();
        let calls = AtomicUsize::new(0);
        let r = Ref::from_hash([3; 32]);

        for _ in 0..3 {
            let got = cache.ensure(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                r
            });
            assert_eq!(got, r);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn clones_share_the_cell() {
        let cache = RefCache::new();
        let clone = cache.clone();
        cache.ensure(|| Ref::from_hash([4; 32]));
        assert_eq!(clone.get(), Some(Ref::from_hash([4; 32])));
    }

    #[test]
    fn with_ref_is_prefilled() {
        let cache = RefCache::with_ref(Ref::from_hash([5; 32]));
        let got = cache.ensure(|| Ref::null());
        assert_eq!(got, Ref::from_hash([5; 32]));
    }

    #[test]
    fn concurrent_ensure_agrees() {
        let cache = RefCache::new();
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = cache.clone();
                thread::spawn(move || cache.ensure(|| Ref::from_hash([6; 32])))
            })
            .collect();

        for h in handles {
            assert_eq!(h.join().expect("thread should not panic"), Ref::from_hash([6; 32]));
        }
    }

    #[test]
    fn debug_shows_state() {
        let cache = RefCache::new();
        assert_eq!(format!("{cache:?}"), "RefCache(<empty>)");
        cache.ensure(|| Ref::from_hash([0xab; 32]));
        assert_eq!(format!("{cache:?}"), "RefCache(abababab)");
    }
}
