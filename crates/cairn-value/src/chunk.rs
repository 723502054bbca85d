//! Lazily resolved references to dependent values.
//!
//! [`Value::chunks`](crate::Value::chunks) reports the values a value depends
//! on but does not hold inline as [`Future`]s. A future is materialized on
//! demand through a [`ValueReader`], which is the only place the value model
//! touches I/O.

use std::fmt;
use std::sync::{Arc, OnceLock};

use cairn_types::Ref;

use crate::value::Value;

/// Source of values by ref (a backing content store).
///
/// Implementations may block. Timeouts and retries are the implementation's
/// concern; failures are reported through the associated error type.
pub trait ValueReader {
    type Error;

    /// Read and decode the value stored under `target`.
    fn read_value(&self, target: &Ref) -> Result<Value, Self::Error>;
}

impl<R: ValueReader + ?Sized> ValueReader for &R {
    type Error = R::Error;

    fn read_value(&self, target: &Ref) -> Result<Value, Self::Error> {
        (**self).read_value(target)
    }
}

impl<R: ValueReader + ?Sized> ValueReader for Arc<R> {
    type Error = R::Error;

    fn read_value(&self, target: &Ref) -> Result<Value, Self::Error> {
        (**self).read_value(target)
    }
}

/// A reference to a value that may not have been loaded yet.
///
/// Once resolved, the value is memoized and shared by every clone of the
/// future.
#[derive(Clone)]
pub struct Future {
    target: Ref,
    value: Arc<OnceLock<Value>>,
}

impl Future {
    /// A future for the value stored under `target`.
    pub fn unresolved(target: Ref) -> Self {
        Self {
            target,
            value: Arc::new(OnceLock::new()),
        }
    }

    /// A future that is already resolved to `value`.
    pub fn resolved(value: Value) -> Self {
        let target = value.content_ref();
        let cell = OnceLock::new();
        let _ = cell.set(value);
        Self {
            target,
            value: Arc::new(cell),
        }
    }

    pub fn target(&self) -> Ref {
        self.target
    }

    pub fn is_resolved(&self) -> bool {
        self.value.get().is_some()
    }

    /// The value, if it has already been materialized.
    pub fn value(&self) -> Option<&Value> {
        self.value.get()
    }

    /// Materialize the value, reading it through `reader` on first use.
    pub fn resolve<R: ValueReader + ?Sized>(&self, reader: &R) -> Result<Value, R::Error> {
        if let Some(v) = self.value.get() {
            return Ok(v.clone());
        }
        let v = reader.read_value(&self.target)?;
        Ok(self.value.get_or_init(|| v).clone())
    }
}

impl PartialEq for Future {
    fn eq(&self, other: &Self) -> bool {
        self.target == other.target
    }
}

impl Eq for Future {}

impl fmt::Debug for Future {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Future")
            .field("target", &self.target)
            .field("resolved", &self.is_resolved())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::collections::HashMap;

    struct CountingReader {
        values: HashMap<Ref, Value>,
        reads: Cell<usize>,
    }

    impl ValueReader for CountingReader {
        type Error = String;

        fn read_value(&self, target: &Ref) -> Result<Value, String> {
            self.reads.set(self.reads.get() + 1);
            self.values
                .get(target)
                .cloned()
                .ok_or_else(|| format!("missing {target}"))
        }
    }

    fn reader_with(value: &Value) -> CountingReader {
        CountingReader {
            values: HashMap::from([(value.content_ref(), value.clone())]),
            reads: Cell::new(0),
        }
    }

    #[test]
    fn resolve_reads_once_and_memoizes() {
        let v = Value::from("payload");
        let reader = reader_with(&v);
        let future = Future::unresolved(v.content_ref());
        assert!(!future.is_resolved());

        assert_eq!(future.resolve(&reader).unwrap(), v);
        assert_eq!(future.clone().resolve(&reader).unwrap(), v);
        assert_eq!(reader.reads.get(), 1);
        assert!(future.is_resolved());
    }

    #[test]
    fn resolved_future_never_reads() {
        let v = Value::from(42);
        let reader = reader_with(&Value::from(false));
        let future = Future::resolved(v.clone());
        assert_eq!(future.target(), v.content_ref());
        assert_eq!(future.resolve(&reader).unwrap(), v);
        assert_eq!(reader.reads.get(), 0);
    }

    #[test]
    fn missing_value_surfaces_reader_error() {
        let reader = reader_with(&Value::from(true));
        let future = Future::unresolved(Ref::from_hash([1; 32]));
        assert!(future.resolve(&reader).is_err());
        assert!(!future.is_resolved());
    }

    #[test]
    fn equality_is_by_target() {
        let r = Ref::from_hash([2; 32]);
        assert_eq!(Future::unresolved(r), Future::unresolved(r));
        assert_ne!(Future::unresolved(r), Future::unresolved(Ref::null()));
    }
}
