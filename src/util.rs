use std::sync::{Mutex, MutexGuard, PoisonError};

/// Locks `mutex`, recovering the guard if a panicking holder poisoned it.
///
/// Observers, task bodies and host callbacks are always taken out of their
/// slot before they run, so user code never runs under one of these locks
/// and the protected data stays consistent after a poisoning panic.
#[inline]
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
  mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
