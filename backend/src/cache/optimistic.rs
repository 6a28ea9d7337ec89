//! Optimistic local changes with rollback
//!
//! [`apply_optimistically`] applies a change to locally mirrored state,
//! awaits the remote call, and lets the caller undo the change if the call
//! fails. The
//! list helpers implement the common case of removing an item and putting
//! it back where it was.

use std::future::Future;
use std::sync::{Mutex, MutexGuard};

fn lock<S>(cell: &Mutex<S>) -> MutexGuard<'_, S> {
    cell.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Snapshot-apply-attempt-restore
///
/// `apply` runs under the lock before `remote` is polled and returns the
/// undo record. If `remote` fails, `restore` runs under the lock with that
/// record and the error, and decides whether the change is undone. The lock
/// is never held across the remote call.
pub async fn apply_optimistically<S, U, T, E, Fut>(
    cell: &Mutex<S>,
    apply: impl FnOnce(&mut S) -> U,
    remote: Fut,
    restore: impl FnOnce(&mut S, U, &E),
) -> Result<T, E>
where
    Fut: Future<Output = Result<T, E>>,
{
    let undo = {
        let mut state = lock(cell);
        apply(&mut state)
    };

    match remote.await {
        Ok(value) => Ok(value),
        Err(err) => {
            let mut state = lock(cell);
            restore(&mut state, undo, &err);
            Err(err)
        }
    }
}

/// Remove the first item matching `predicate`, returning it with its index
pub fn remove_where<T>(list: &mut Vec<T>, predicate: impl Fn(&T) -> bool) -> Option<(usize, T)> {
    let index = list.iter().position(predicate)?;
    Some((index, list.remove(index)))
}

/// Put `item` back at `index` (or the end, if the list shrank)
///
/// Nothing is inserted when an item with the same key is already present.
/// Returns whether the item was inserted.
pub fn reinsert<T, K: PartialEq>(
    list: &mut Vec<T>,
    index: usize,
    item: T,
    key: impl Fn(&T) -> K,
) -> bool {
    let item_key = key(&item);
    if list.iter().any(|existing| key(existing) == item_key) {
        return false;
    }
    let index = index.min(list.len());
    list.insert(index, item);
    true
}
