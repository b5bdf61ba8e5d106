use std::sync::{Mutex, MutexGuard, PoisonError};

/// Locks a mutex, recovering the guard if a previous holder panicked.
/// Engine state stays usable after a user callback panics on another
/// thread; the registries hold plain data, so a poisoned lock carries no
/// broken invariant worth propagating.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
