//! Traversal of everything reachable from a stored value.
//!
//! Starting at a root ref, the walker loads each value, hands it to a
//! visitor, and queues the targets of the value's [`chunks`]. Each ref is
//! visited at most once, so shared sub-values and diamond-shaped histories
//! are loaded a single time.
//!
//! [`chunks`]: cairn_value::Value::chunks

use std::collections::{HashSet, VecDeque};
use std::ops::ControlFlow;

use cairn_types::Ref;
use cairn_value::{Value, ValueReader};
use tracing::debug;

/// Breadth-first walk from `root`.
///
/// `visit` is called once per reachable ref, root first. Returning
/// [`ControlFlow::Break`] stops the walk early. A ref that cannot be read
/// aborts the walk with the reader's error.
pub fn walk_refs<R, F>(reader: &R, root: &Ref, mut visit: F) -> Result<(), R::Error>
where
    R: ValueReader + ?Sized,
    F: FnMut(&Ref, &Value) -> ControlFlow<()>,
{
    let mut visited = HashSet::new();
    let mut queue = VecDeque::new();
    visited.insert(*root);
    queue.push_back(*root);

    while let Some(current) = queue.pop_front() {
        let value = reader.read_value(&current)?;
        if visit(&current, &value).is_break() {
            debug!(visited = visited.len(), "chunk walk stopped early");
            return Ok(());
        }
        for future in value.chunks() {
            if visited.insert(future.target()) {
                queue.push_back(future.target());
            }
        }
    }

    debug!(visited = visited.len(), "chunk walk complete");
    Ok(())
}

/// Every ref reachable from `root`, including `root`, in visit order.
pub fn reachable_refs<R>(reader: &R, root: &Ref) -> Result<Vec<Ref>, R::Error>
where
    R: ValueReader + ?Sized,
{
    let mut refs = Vec::new();
    walk_refs(reader, root, |r, _| {
        refs.push(*r);
        ControlFlow::Continue(())
    })?;
    Ok(refs)
}
